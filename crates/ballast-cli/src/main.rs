//! Ballast CLI - log body mass from the terminal
//!
//! Entries are written locally first and replayed against the remote
//! service by `ballast sync` or `ballast watch`.

mod cli;
mod commands;
mod config_file;
mod error;

use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::Directive;

use crate::cli::{Cli, Commands, ConfigCommands, ProfileCommands, SettingsCommands};
use crate::commands::add::{run_add, AddArgs};
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::{run_config_init, run_config_show, ConfigInitArgs};
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, EditArgs};
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::profile::{run_profile_set, run_profile_show, ProfileArgs};
use crate::commands::queue::run_queue;
use crate::commands::seed::run_seed;
use crate::commands::settings::{run_settings_set, run_settings_show};
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "ballast=info"
        .parse::<Directive>()
        .map_err(|error| CliError::Config(error.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::resolve(cli.data_dir, cli.config);

    match cli.command {
        Some(Commands::Add {
            mass,
            unit,
            note,
            tags,
            at,
        }) => {
            run_add(
                AddArgs {
                    mass,
                    unit,
                    note,
                    tags,
                    at,
                },
                &ctx,
            )
            .await?;
        }
        Some(Commands::List {
            limit,
            profile,
            json,
        }) => run_list(limit, profile.as_deref(), json, &ctx).await?,
        Some(Commands::Edit {
            id,
            mass,
            unit,
            note,
            clear_note,
            tags,
            clear_tags,
            at,
        }) => {
            let args = EditArgs {
                mass,
                unit,
                note,
                clear_note,
                tags,
                clear_tags,
                at,
            };
            run_edit(&id, args, &ctx).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, &ctx).await?,
        Some(Commands::Queue { limit, json }) => run_queue(limit, json, &ctx).await?,
        Some(Commands::Sync { token, json }) => run_sync(token, json, &ctx).await?,
        Some(Commands::Seed { token, json }) => run_seed(token, json, &ctx).await?,
        Some(Commands::Watch { token, interval }) => run_watch(token, interval, &ctx).await?,
        Some(Commands::Profile { command }) => match command {
            ProfileCommands::Show { json } => run_profile_show(json, &ctx).await?,
            ProfileCommands::Set {
                name,
                email,
                bio,
                unit,
                goal,
            } => {
                let args = ProfileArgs {
                    name,
                    email,
                    bio,
                    unit,
                    goal,
                };
                run_profile_set(args, &ctx).await?;
            }
        },
        Some(Commands::Settings { command }) => match command {
            SettingsCommands::Show { json } => run_settings_show(json, &ctx).await?,
            SettingsCommands::Set {
                auto_sync,
                reminders,
                reminder_hour,
            } => run_settings_set(auto_sync, reminders, reminder_hour, &ctx).await?,
        },
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => run_config_show(&ctx)?,
            ConfigCommands::Init {
                api_url,
                page_size,
                poll_interval,
                require_auth,
                storage,
            } => {
                let args = ConfigInitArgs {
                    api_url,
                    page_size,
                    poll_interval,
                    require_auth,
                    storage,
                };
                run_config_init(args, &ctx)?;
            }
        },
        Some(Commands::Export { format, output }) => {
            run_export(format, output.as_deref(), &ctx).await?;
        }
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
