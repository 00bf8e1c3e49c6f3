use std::sync::Arc;

use ballast_core::{LocalStore, SyncEngine};

use crate::commands::common::{resolve_token, CliContext};
use crate::error::CliError;

pub async fn run_seed(token: Option<String>, as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let token = resolve_token(token).ok_or(CliError::TokenRequired)?;
    let config = ctx.sync_config()?;
    if !config.is_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let store = Arc::new(ctx.open_store().await?);
    let entries = store.list_entries(None, usize::MAX).await?;
    let engine = SyncEngine::new(Arc::clone(&store), &config)?;
    let report = engine.seed_entries(&token, &entries).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "created {}, already present {}, failed {}",
        report.created, report.already_present, report.failed
    );
    for error in &report.errors {
        println!("  {error}");
    }
    Ok(())
}
