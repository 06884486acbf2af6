//! Corpus-wide image reuse ledger. Shared across all concurrent topic
//! loops; increment-and-check is atomic under a single lock so the reuse
//! cap holds under concurrency.

use std::collections::HashMap;
use std::sync::Mutex;

pub struct ImageUsageLedger {
    cap: u32,
    counts: Mutex<HashMap<String, u32>>,
}

impl ImageUsageLedger {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve one use of the image identified by `key`. Returns false
    /// if the image is already at its cap; the counter is not touched in
    /// that case.
    pub fn try_reserve(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().expect("ledger lock poisoned");
        let count = counts.entry(key.to_string()).or_insert(0);
        if *count >= self.cap {
            return false;
        }
        *count += 1;
        true
    }

    /// Return one previously reserved use, e.g. when the document the
    /// image was assigned to never publishes. Saturates at zero.
    pub fn release(&self, key: &str) {
        let mut counts = self.counts.lock().expect("ledger lock poisoned");
        if let Some(count) = counts.get_mut(key) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn count(&self, key: &str) -> u32 {
        *self
            .counts
            .lock()
            .expect("ledger lock poisoned")
            .get(key)
            .unwrap_or(&0)
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Highest counter currently recorded. Diagnostic.
    pub fn max_count(&self) -> u32 {
        self.counts
            .lock()
            .expect("ledger lock poisoned")
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn reserve_up_to_cap_then_refuse() {
        let ledger = ImageUsageLedger::new(3);
        assert!(ledger.try_reserve("img-a"));
        assert!(ledger.try_reserve("img-a"));
        assert!(ledger.try_reserve("img-a"));
        assert!(!ledger.try_reserve("img-a"));
        assert_eq!(ledger.count("img-a"), 3);
    }

    #[test]
    fn release_returns_quota() {
        let ledger = ImageUsageLedger::new(1);
        assert!(ledger.try_reserve("img-a"));
        assert!(!ledger.try_reserve("img-a"));

        ledger.release("img-a");
        assert_eq!(ledger.count("img-a"), 0);
        assert!(ledger.try_reserve("img-a"));
    }

    #[test]
    fn release_of_unknown_key_is_noop() {
        let ledger = ImageUsageLedger::new(1);
        ledger.release("never-reserved");
        assert_eq!(ledger.count("never-reserved"), 0);
    }

    #[test]
    fn keys_are_independent() {
        let ledger = ImageUsageLedger::new(1);
        assert!(ledger.try_reserve("img-a"));
        assert!(ledger.try_reserve("img-b"));
        assert!(!ledger.try_reserve("img-a"));
    }

    #[test]
    fn cap_holds_under_concurrent_reservation() {
        let ledger = Arc::new(ImageUsageLedger::new(3));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || ledger.try_reserve("img-a")));
        }
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 3);
        assert_eq!(ledger.count("img-a"), 3);
    }
}
