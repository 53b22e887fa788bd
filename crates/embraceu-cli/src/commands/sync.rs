use std::path::Path;

use embraceu_core::SyncReport;

use crate::commands::common::{open_queue, Connectivity};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_sync(
    as_json: bool,
    config: &CliConfig,
    store_path: &Path,
) -> Result<SyncReport, CliError> {
    if !config.has_remote() {
        return Err(CliError::RemoteNotConfigured);
    }

    let queue = open_queue(config, store_path, Connectivity::Detect).await?;
    let report = queue.sync_queue().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(report)
}
