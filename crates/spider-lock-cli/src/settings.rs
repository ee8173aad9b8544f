//! Configuration management for spider-lock
//!
//! Sources are layered in increasing precedence:
//! 1. YAML file (`conf/spider-lock.yml` if present, or `--config`)
//! 2. Environment variables `SPIDER_LOCK__<SECTION>__<KEY>`
//! 3. Command line overrides

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use spider_lock::LockSettings;
use spider_lock_redis::RedisSettings;

use crate::cli::Cli;
use crate::logging::LogSettings;

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "conf/spider-lock.yml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SPIDER_LOCK";

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Values supplied on the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub redis_url: Option<String>,
    pub log_level: Option<String>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            redis_url: cli.redis_url.clone(),
            log_level: cli.log_level.clone(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lock: LockSettings,
    pub redis: RedisSettings,
    pub logging: LogSettings,
}

impl Settings {
    /// Load settings for a parsed command line
    pub fn load(cli: &Cli) -> Result<Self, SettingsError> {
        Self::load_from(cli.config.as_deref(), &Overrides::from(cli))
    }

    /// Load settings from an optional explicit file plus overrides
    ///
    /// An explicit file must exist; the default file is optional.
    pub fn load_from(path: Option<&Path>, overrides: &Overrides) -> Result<Self, SettingsError> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let settings = Config::builder()
            .add_source(File::from(file).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("redis.url", overrides.redis_url.clone())?
            .set_override_option("logging.level", overrides.log_level.clone())?
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}
