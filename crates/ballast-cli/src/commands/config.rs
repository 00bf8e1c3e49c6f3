use crate::cli::StorageArg;
use crate::commands::common::CliContext;
use crate::config_file::normalize_api_base_url;
use crate::error::CliError;

pub fn run_config_show(ctx: &CliContext) -> Result<(), CliError> {
    let config = ctx.load_config()?;
    let sync = ctx.sync_config()?;

    println!("Config file:   {}", ctx.config_path.display());
    println!("Data dir:      {}", ctx.data_dir.display());
    println!(
        "Storage:       {}",
        serde_json::to_value(config.storage_kind())?
            .as_str()
            .unwrap_or("auto")
    );
    println!(
        "API base URL:  {}",
        sync.api_base_url.as_deref().unwrap_or("(offline only)")
    );
    println!("Page size:     {}", sync.page_size);
    println!("Poll interval: {}s", sync.poll_interval.as_secs());
    println!("Require auth:  {}", sync.require_auth);
    Ok(())
}

pub struct ConfigInitArgs {
    pub api_url: Option<String>,
    pub page_size: Option<usize>,
    pub poll_interval: Option<u64>,
    pub require_auth: Option<bool>,
    pub storage: Option<StorageArg>,
}

/// Merge the given values into the config file, creating it if needed.
pub fn run_config_init(args: ConfigInitArgs, ctx: &CliContext) -> Result<(), CliError> {
    let mut config = ctx.load_config()?;

    if let Some(api_url) = args.api_url {
        config.api_base_url = normalize_api_base_url(Some(api_url)).map_err(CliError::Config)?;
    }
    if args.page_size.is_some() {
        config.page_size = args.page_size;
    }
    if args.poll_interval.is_some() {
        config.poll_interval_secs = args.poll_interval;
    }
    if args.require_auth.is_some() {
        config.require_auth = args.require_auth;
    }
    if let Some(storage) = args.storage {
        config.storage = Some(storage.into());
    }

    config
        .save_to_path(&ctx.config_path)
        .map_err(CliError::Config)?;
    println!("{}", ctx.config_path.display());
    Ok(())
}
