use ballast_core::LocalStore;

use crate::commands::common::{entry_to_list_item, format_entry_lines, CliContext, EntryListItem};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    profile: Option<&str>,
    as_json: bool,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let entries = store.list_entries(profile, limit).await?;

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entries.is_empty() {
        println!("No entries yet.");
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
