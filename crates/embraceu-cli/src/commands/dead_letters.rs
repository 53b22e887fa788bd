use std::path::Path;

use crate::cli::DeadLetterCommands;
use crate::commands::common::{
    entry_to_list_item, format_entry_lines, open_queue, Connectivity, EntryListItem,
};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_dead_letters(
    command: DeadLetterCommands,
    config: &CliConfig,
    store_path: &Path,
) -> Result<(), CliError> {
    let queue = open_queue(config, store_path, Connectivity::Offline).await?;

    match command {
        DeadLetterCommands::List { json } => {
            let entries = queue.dead_letters().await?;
            if json {
                let items = entries
                    .iter()
                    .map(entry_to_list_item)
                    .collect::<Vec<EntryListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if entries.is_empty() {
                println!("No dead letters.");
            } else {
                for line in format_entry_lines(&entries) {
                    println!("{line}");
                }
            }
        }
        DeadLetterCommands::Requeue => {
            let count = queue.requeue_dead_letters().await?;
            println!("Requeued {count} dead letters");
        }
        DeadLetterCommands::Discard => {
            let count = queue.discard_dead_letters().await?;
            println!("Discarded {count} dead letters");
        }
    }
    Ok(())
}
