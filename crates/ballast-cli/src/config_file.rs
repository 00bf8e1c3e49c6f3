//! Persistent CLI configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ballast_core::util::{is_http_url, normalize_text_option};
use ballast_core::{StorageKind, SyncConfig};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub require_auth: Option<bool>,
    #[serde(default)]
    pub storage: Option<StorageKind>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ballast")
        .join(CONFIG_FILE_NAME)
}

/// Trim a URL, require http(s) and drop trailing slashes.
pub fn normalize_api_base_url(value: Option<String>) -> Result<Option<String>, String> {
    let Some(url) = normalize_text_option(value) else {
        return Ok(None);
    };
    if !is_http_url(&url) {
        return Err(format!("API base URL must include http:// or https://: {url}"));
    }
    Ok(Some(url.trim_end_matches('/').to_string()))
}

impl CliConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize()?;
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage.unwrap_or_default()
    }

    /// Sync settings with `BALLAST_API_URL` taking precedence over the file.
    pub fn sync_config(&self) -> Result<SyncConfig, String> {
        let env_url = normalize_api_base_url(std::env::var("BALLAST_API_URL").ok())?;
        Ok(self.sync_config_with_url(env_url))
    }

    fn sync_config_with_url(&self, url_override: Option<String>) -> SyncConfig {
        let mut config = SyncConfig::new();
        if let Some(url) = url_override.or_else(|| self.api_base_url.clone()) {
            config = config.with_api_base_url(url);
        }
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        if let Some(secs) = self.poll_interval_secs {
            config = config.with_poll_interval(Duration::from_secs(secs.max(1)));
        }
        config.with_require_auth(self.require_auth.unwrap_or(false))
    }

    fn normalize(&mut self) -> Result<(), String> {
        self.version = self.version.max(default_config_version());
        self.api_base_url = normalize_api_base_url(self.api_base_url.take())?;
        self.page_size = self.page_size.map(|size| size.max(1));
        self.poll_interval_secs = self.poll_interval_secs.map(|secs| secs.max(1));
        Ok(())
    }
}
