use std::path::Path;

use crate::commands::common::{
    entry_to_list_item, format_entry_lines, open_queue, Connectivity, EntryListItem,
};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_queue(as_json: bool, config: &CliConfig, store_path: &Path) -> Result<(), CliError> {
    let queue = open_queue(config, store_path, Connectivity::Offline).await?;
    let entries = queue.pending_entries().await;

    if as_json {
        let items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }
    for line in format_entry_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}
