use ballast_core::LocalStore;

use crate::commands::common::{format_queue_lines, mutation_to_queue_item, CliContext, QueueItem};
use crate::error::CliError;

pub async fn run_queue(limit: usize, as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let pending = store.list_pending_mutations(limit).await?;

    if as_json {
        let json_items = pending
            .iter()
            .map(mutation_to_queue_item)
            .collect::<Vec<QueueItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    let total = store.count_pending_mutations().await?;
    if total == 0 {
        println!("Queue is empty.");
        return Ok(());
    }

    for line in format_queue_lines(&pending) {
        println!("{line}");
    }
    if total > pending.len() {
        println!("... {} more", total - pending.len());
    }
    Ok(())
}
