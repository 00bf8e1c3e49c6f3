use std::sync::Arc;

use ballast_core::{LocalStore, SyncEngine, SyncReport};

use crate::commands::common::{format_sync_timestamp, resolve_token, CliContext};
use crate::error::CliError;

pub async fn run_sync(token: Option<String>, as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let store = Arc::new(ctx.open_store().await?);
    let engine = SyncEngine::new(Arc::clone(&store), &ctx.sync_config()?)?;
    let report = engine
        .sync_pending_entries(resolve_token(token).as_deref())
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_sync_report(&report) {
        println!("{line}");
    }
    if report.is_clean() {
        if let Some(last_sync) = store.get_settings().await?.last_sync {
            println!("Last sync: {}", format_sync_timestamp(last_sync));
        }
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![report.summary()];
    lines.extend(report.errors.iter().map(|error| format!("  {error}")));
    lines
}
