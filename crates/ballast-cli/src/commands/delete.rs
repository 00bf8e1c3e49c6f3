use ballast_core::LocalStore;

use crate::commands::common::{normalize_entry_identifier, resolve_entry, CliContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, ctx: &CliContext) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let store = ctx.open_store().await?;
    let entry = resolve_entry(&normalized_id, &store).await?;

    store.delete_entry(&entry.id).await?;
    println!("{}", entry.id);
    Ok(())
}
