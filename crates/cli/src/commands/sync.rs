//! vms sync command

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use clap::{Args, Subcommand};
use console::style;
use federation::{SyncFilter, SyncProcessor, SyncQueue, SyncStatus};
use indicatif::{ProgressBar, ProgressStyle};
use shared::{NullLogger, VmsConfig};
use vms_adapter::in_memory_store;

use super::{load_config, require_platform};

const FAILED_SHOWN: usize = 20;

#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    pub command: SyncSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum SyncSubcommand {
    /// Show queue counts and failed operations
    Status,
    /// Deliver every due operation now
    Drain,
    /// Put a failed operation back in line
    Retry {
        /// Operation id
        id: String,
    },
    /// Remove completed operations
    Purge {
        /// Only those completed more than this many hours ago
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
}

impl SyncCommand {
    pub async fn run(&self, config_path: Option<&Path>) -> anyhow::Result<()> {
        let config = load_config(config_path)?;
        let queue = open_queue(&config)?;

        match &self.command {
            SyncSubcommand::Status => print_status(&queue)?,
            SyncSubcommand::Drain => drain(&config, queue).await?,
            SyncSubcommand::Retry { id } => {
                let op = queue.retry(id, Utc::now())?;
                println!("{} {} is {}", style("✓").green(), op.id, op.status.as_str());
            }
            SyncSubcommand::Purge { older_than_hours } => {
                let before = Utc::now() - chrono::Duration::hours((*older_than_hours).max(0));
                let removed = queue.purge_completed(before)?;
                println!("{} Removed {} completed operation(s)", style("✓").green(), removed);
            }
        }
        Ok(())
    }
}

/// The queue file named by `sync.storePath`
fn open_queue(config: &VmsConfig) -> anyhow::Result<SyncQueue> {
    if config.sync.store_path.is_none() {
        bail!("sync.storePath is not set; the queue only lives inside a running server");
    }
    Ok(SyncQueue::from_config(&config.sync)?)
}

fn print_status(queue: &SyncQueue) -> anyhow::Result<()> {
    let stats = queue.stats(None)?;
    println!("{}", style("Sync queue").bold());
    println!("  pending:     {}", stats.pending);
    println!("  in progress: {}", stats.in_progress);
    println!("  completed:   {}", stats.completed);
    println!("  failed:      {}", style(stats.failed).red());
    if let Some(oldest) = stats.oldest_pending_at {
        println!("  oldest pending since {}", oldest.to_rfc3339());
    }

    let failed = queue.list(&SyncFilter {
        status: Some(SyncStatus::Failed),
        limit: Some(FAILED_SHOWN),
        ..Default::default()
    })?;
    for op in failed {
        println!(
            "  {} {} {} [{}] {}",
            style("✗").red(),
            op.id,
            op.kind.as_str(),
            op.company_id.as_str(),
            op.last_error.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn drain(config: &VmsConfig, queue: SyncQueue) -> anyhow::Result<()> {
    let platform = require_platform(config)?;
    let processor = SyncProcessor::new(
        Arc::new(queue),
        Some(platform),
        in_memory_store(),
        config.sync.clone(),
        Arc::new(NullLogger),
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    spinner.set_message("Delivering queued writes...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let report = processor.drain(Utc::now()).await;
    spinner.finish_and_clear();
    let report = report?;

    println!(
        "{} {} attempted, {} delivered, {} rescheduled, {} failed, {} held back",
        style("✓").green(),
        report.attempted,
        style(report.succeeded).green(),
        style(report.rescheduled).yellow(),
        style(report.failed).red(),
        report.skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use federation::{NewSyncOperation, SyncKind};
    use shared::CompanyId;

    fn config_with_store(dir: &Path) -> VmsConfig {
        let mut config = VmsConfig::default();
        config.sync.store_path = Some(dir.join("queue.json"));
        config
    }

    #[test]
    fn test_open_queue_requires_store_path() {
        assert!(open_queue(&VmsConfig::default()).is_err());
    }

    #[test]
    fn test_queue_file_is_shared_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_store(dir.path());

        let queue = open_queue(&config).unwrap();
        let kind = SyncKind::DeleteActor {
            actor_id: "actor-1".to_string(),
        };
        queue
            .enqueue(NewSyncOperation::new(CompanyId::new("acme"), kind), Utc::now())
            .unwrap();

        let reopened = open_queue(&config).unwrap();
        assert_eq!(reopened.stats(None).unwrap().pending, 1);
        assert!(print_status(&reopened).is_ok());
    }

    #[tokio::test]
    async fn test_drain_requires_platform() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_store(dir.path());
        let queue = open_queue(&config).unwrap();
        assert!(drain(&config, queue).await.is_err());
    }
}
