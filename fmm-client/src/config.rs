use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7003";
pub const ENV_VAR: &str = "FMM_ENV";
pub const BASE_URL_VAR: &str = "FMM_API_BASE_URL";

const APP_DIR: &str = "fmm-client";

/// Deployment environment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    /// Name of the variable holding this environment's base URL,
    /// e.g. `FMM_API_BASE_URL_PRODUCTION`.
    pub fn base_url_var(&self) -> String {
        format!("{BASE_URL_VAR}_{}", self.as_str().to_ascii_uppercase())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" | "testing" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub environment: Environment,
    pub base_url: String,
    pub request_timeout_seconds: u64,
    /// Client channel tag sent with the login exchange.
    pub source: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            base_url: DEFAULT_BASE_URL.to_owned(),
            request_timeout_seconds: 10,
            source: "weapp".to_owned(),
            user_agent: concat!("fmm-client/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ClientConfig {
    /// Defaults with environment variable overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Loads the config file from the user config directory, writing the
    /// defaults out when it is missing or unreadable, then applies
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = match Self::config_file_path().and_then(Self::from_file) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "failed to load client config, using defaults");
                let config = Self::default();
                if let Err(save_err) = config.save() {
                    warn!(error = %save_err, "failed to save default client config");
                }
                config
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_file_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_DIR).join("config.json"))
    }

    /// Where the persisted session lives by default.
    pub fn default_store_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_DIR).join("session.json"))
    }

    /// Applies `FMM_ENV`, then the per-environment base URL variable, then
    /// the generic `FMM_API_BASE_URL`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_VAR) {
            match name.parse() {
                Ok(env) => self.environment = env,
                Err(e) => warn!(error = %e, "ignoring {ENV_VAR}"),
            }
        }

        let base = lookup(&self.environment.base_url_var())
            .or_else(|| lookup(BASE_URL_VAR))
            .filter(|value| !value.trim().is_empty());
        if let Some(base) = base {
            debug!(environment = %self.environment, base_url = %base, "base url from environment");
            self.base_url = base.trim().to_owned();
        }
    }

    /// The base URL, validated and without a trailing slash.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        Url::parse(trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        Ok(trimmed.to_owned())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
