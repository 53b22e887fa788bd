use std::path::Path;

use embraceu_core::{SaveOutcome, WellnessRecord};

use crate::commands::common::{open_queue, Connectivity};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_save(
    table: &str,
    data: &str,
    offline: bool,
    config: &CliConfig,
    store_path: &Path,
) -> Result<SaveOutcome, CliError> {
    let record = WellnessRecord::from_parts(table, data)?;
    let connectivity = if offline {
        Connectivity::Offline
    } else {
        Connectivity::Detect
    };

    let queue = open_queue(config, store_path, connectivity).await?;
    let outcome = queue.save_record(record).await?;

    match outcome.entry_id {
        Some(id) if outcome.queued => println!("queued {id}"),
        _ => println!("saved"),
    }
    Ok(outcome)
}
