//! Persistent settings loaded from `config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use stemix_client::ClientConfig;
use stemix_core::EngineConfig;
use tracing::{debug, info};

use crate::cli::ApiArgs;

const CONFIG_FILE: &str = "config.json";

/// Everything the player reads from disk. Missing keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub api: ClientConfig,
    /// Tempo assumed for stems when neither the job nor the command line
    /// provides one.
    pub original_bpm: Option<f64>,
}

impl Settings {
    /// Default location, `<config dir>/stemix/config.json` on most platforms.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "stemix").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Read settings from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings = Self::from_json(&json)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.engine.validate()?;
        Ok(settings)
    }

    /// Apply command line overrides for the API connection.
    pub fn apply_api_args(&mut self, args: &ApiArgs) {
        if let Some(base_url) = &args.api {
            self.api.base_url.clone_from(base_url);
        }
        if args.token.is_some() {
            self.api.token.clone_from(&args.token);
        }
        if args.api_key.is_some() {
            self.api.api_key.clone_from(&args.api_key);
        }
    }
}
