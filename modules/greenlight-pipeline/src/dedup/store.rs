//! Fingerprint persistence. One fingerprint per approved document;
//! pruning is logical (window-filtered at query time), never physical.
//!
//! Both implementations use exclusive-write/shared-read locking, so an
//! insert happens-before any later query on the same store instance.
//! Sufficient for concurrent topic loops, since only the controller
//! writes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::info;

use greenlight_common::ContentFingerprint;

#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Register a fingerprint. Called only for fully approved documents.
    async fn insert(&self, fingerprint: ContentFingerprint) -> Result<()>;

    /// Fingerprints created within the last `window_days`.
    async fn query_window(&self, window_days: i64) -> Result<Vec<ContentFingerprint>>;
}

/// In-memory store. Test fake and the default for dry runs.
pub struct MemoryFingerprintStore {
    entries: RwLock<Vec<ContentFingerprint>>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn seeded(entries: Vec<ContentFingerprint>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl Default for MemoryFingerprintStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FingerprintStore for MemoryFingerprintStore {
    async fn insert(&self, fingerprint: ContentFingerprint) -> Result<()> {
        self.entries
            .write()
            .expect("fingerprint lock poisoned")
            .push(fingerprint);
        Ok(())
    }

    async fn query_window(&self, window_days: i64) -> Result<Vec<ContentFingerprint>> {
        let cutoff = Utc::now() - Duration::days(window_days);
        Ok(self
            .entries
            .read()
            .expect("fingerprint lock poisoned")
            .iter()
            .filter(|f| f.created_at >= cutoff)
            .cloned()
            .collect())
    }
}

/// Append-only JSONL file store. Loaded fully at open; inserts append a
/// line and flush before becoming visible to readers.
pub struct JsonlFingerprintStore {
    path: PathBuf,
    entries: RwLock<Vec<ContentFingerprint>>,
}

impl JsonlFingerprintStore {
    pub fn open(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading fingerprint ledger {}", path.display()))?;
            for (i, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let fingerprint: ContentFingerprint = serde_json::from_str(line).with_context(
                    || format!("corrupt fingerprint ledger {} line {}", path.display(), i + 1),
                )?;
                entries.push(fingerprint);
            }
        }
        info!(
            path = %path.display(),
            fingerprints = entries.len(),
            "Opened fingerprint ledger"
        );
        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }
}

#[async_trait]
impl FingerprintStore for JsonlFingerprintStore {
    async fn insert(&self, fingerprint: ContentFingerprint) -> Result<()> {
        let line = serde_json::to_string(&fingerprint)?;
        // Write lock held across the file append so the on-disk ledger and
        // the in-memory view stay in the same order.
        let mut entries = self.entries.write().expect("fingerprint lock poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening fingerprint ledger {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        file.flush()?;
        entries.push(fingerprint);
        Ok(())
    }

    async fn query_window(&self, window_days: i64) -> Result<Vec<ContentFingerprint>> {
        let cutoff = Utc::now() - Duration::days(window_days);
        Ok(self
            .entries
            .read()
            .expect("fingerprint lock poisoned")
            .iter()
            .filter(|f| f.created_at >= cutoff)
            .cloned()
            .collect())
    }
}
