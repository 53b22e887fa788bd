use std::path::Path;

use embraceu_core::queue::QueueStatus;
use serde::Serialize;

use crate::commands::common::{open_queue, Connectivity};
use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub queue: QueueStatus,
    pub dead_letters: usize,
    pub remote_configured: bool,
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("State:        {}", report.queue.state),
        format!(
            "Connectivity: {}",
            if report.queue.is_online {
                "online"
            } else {
                "offline"
            }
        ),
        format!("Pending:      {}", report.queue.pending),
        format!("Dead letters: {}", report.dead_letters),
    ];
    if !report.remote_configured {
        lines.push("Remote not configured; saves stay queued.".to_string());
    }
    lines
}

pub async fn run_status(
    as_json: bool,
    config: &CliConfig,
    store_path: &Path,
) -> Result<StatusReport, CliError> {
    let queue = open_queue(config, store_path, Connectivity::Detect).await?;
    let report = StatusReport {
        queue: queue.status(),
        dead_letters: queue.dead_letters().await?.len(),
        remote_configured: config.has_remote(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(report)
}
