//! Run-completion notification seam.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::stats::RunReport;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn run_complete(&self, report: &RunReport) -> Result<()>;
}

/// Default notifier: the report goes to the structured log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn run_complete(&self, report: &RunReport) -> Result<()> {
        info!(
            published = report.published(),
            attempts = report.total_attempts(),
            "Run complete\n{report}"
        );
        Ok(())
    }
}
