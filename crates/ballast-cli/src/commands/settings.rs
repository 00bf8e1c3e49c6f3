use ballast_core::models::{AppSettings, SettingsPatch};
use ballast_core::LocalStore;

use crate::commands::common::{format_sync_timestamp, CliContext};
use crate::error::CliError;

pub async fn run_settings_show(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let store = ctx.open_store().await?;
    let settings = store.get_settings().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        for line in format_settings_lines(&settings) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_settings_set(
    auto_sync: Option<bool>,
    reminders: Option<bool>,
    reminder_hour: Option<u8>,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let patch = SettingsPatch {
        auto_sync,
        reminders_enabled: reminders,
        reminder_hour,
        ..SettingsPatch::default()
    };
    if patch == SettingsPatch::default() {
        return Err(CliError::EmptyChange);
    }

    let store = ctx.open_store().await?;
    let settings = store.save_settings(patch).await?;
    for line in format_settings_lines(&settings) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_settings_lines(settings: &AppSettings) -> Vec<String> {
    let on_off = |enabled: bool| if enabled { "on" } else { "off" };
    vec![
        format!("Auto sync:     {}", on_off(settings.auto_sync)),
        format!(
            "Reminders:     {} at {:02}:00",
            on_off(settings.reminders_enabled),
            settings.reminder_hour
        ),
        format!(
            "Last sync:     {}",
            settings
                .last_sync
                .map_or_else(|| "never".to_string(), format_sync_timestamp)
        ),
    ]
}
