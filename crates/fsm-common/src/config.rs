//! ---
//! fsm_section: "01-core-functionality"
//! fsm_subsection: "module"
//! fsm_type: "source"
//! fsm_scope: "code"
//! fsm_description: "Shared configuration and tracing bootstrap."
//! fsm_version: "v0.0.0-prealpha"
//! fsm_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_base_url() -> String {
    "http://localhost:3000/api".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_mock_latency() -> Duration {
    Duration::from_millis(500)
}

fn default_mock_token_seed() -> String {
    "fsm-console-mock".to_owned()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("target/fsm-console/credentials.json")
}

fn default_login_route() -> String {
    "/login".to_owned()
}

fn default_landing_route() -> String {
    "/dashboard".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the console access core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "FSM_CONSOLE_CONFIG";

    /// Load configuration from disk, respecting the `FSM_CONSOLE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Load and validate a specific file, bypassing the environment override.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_path(path.as_ref().to_path_buf())
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()?;
        self.navigation.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Authentication backend selection and REST client tuning.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    /// Serve logins from the in-memory demo directory instead of the REST endpoint.
    #[serde(default)]
    pub mock: bool,
    #[serde(default = "default_mock_latency")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub mock_latency: Duration,
    #[serde(default = "default_mock_token_seed")]
    pub mock_token_seed: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            mock: false,
            mock_latency: default_mock_latency(),
            mock_token_seed: default_mock_token_seed(),
        }
    }
}

impl AuthConfig {
    /// Parsed base URL of the authentication endpoint.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("auth base_url '{}' is not a valid URL", self.base_url))
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url()?;
        if url.cannot_be_a_base() {
            return Err(anyhow!(
                "auth base_url '{}' cannot be used as a base URL",
                self.base_url
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("auth request_timeout must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

/// Named views the session owner navigates to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationConfig {
    #[serde(default = "default_login_route")]
    pub login_route: String,
    #[serde(default = "default_landing_route")]
    pub landing_route: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            login_route: default_login_route(),
            landing_route: default_landing_route(),
        }
    }
}

impl NavigationConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, route) in [
            ("login_route", &self.login_route),
            ("landing_route", &self.landing_route),
        ] {
            if !route.starts_with('/') {
                return Err(anyhow!("navigation {name} '{route}' must start with '/'"));
            }
        }
        if self.login_route == self.landing_route {
            return Err(anyhow!(
                "navigation login_route and landing_route must differ"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log file; no file is written when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter used when neither `FSM_CONSOLE_LOG` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
            level: default_log_level(),
        }
    }
}
