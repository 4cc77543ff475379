//! Client configuration handling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokenward_core::store::DEFAULT_CREDENTIAL_TTL_DAYS;
use tokenward_core::transport::DEFAULT_TIMEOUT_SECS;
use tokenward_core::{
    ACCESS_TOKEN_KEY, CredentialKeys, REFRESH_TOKEN_KEY, SessionOptions, SetOptions, TokenwardError,
};
use url::Url;

const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// GraphQL endpoint every request is sent to.
    pub endpoint: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Client-side credential jar.
    pub jar_path: PathBuf,

    /// Try the OS keyring before the credential jar.
    pub prefer_keyring: bool,

    pub request_timeout_secs: u64,

    /// Days a credential survives after its last write.
    pub credential_ttl_days: i64,

    /// Let concurrent requests share one refresh.
    pub single_flight_refresh: bool,

    /// Logging level.
    pub log_level: String,

    pub access_key: String,
    pub refresh_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let jar_path = project_dirs()
            .map(|d| d.data_dir().join("credentials.json"))
            .unwrap_or_else(|| PathBuf::from(".tokenward/credentials.json"));

        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            config_path: PathBuf::new(),
            jar_path,
            prefer_keyring: false,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            credential_ttl_days: DEFAULT_CREDENTIAL_TTL_DAYS,
            single_flight_refresh: false,
            log_level: "info".to_string(),
            access_key: ACCESS_TOKEN_KEY.to_string(),
            refresh_key: REFRESH_TOKEN_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid endpoint URL {:?}", self.endpoint))
    }

    /// Write options for the configured credential TTL.
    pub fn set_options(&self) -> Result<SetOptions, TokenwardError> {
        SetOptions::with_ttl_days(self.credential_ttl_days).map_err(|e| TokenwardError::Config {
            message: format!("credential_ttl_days: {}", e),
        })
    }

    pub fn session_options(&self) -> Result<SessionOptions, TokenwardError> {
        Ok(SessionOptions {
            keys: CredentialKeys::new(&self.access_key, &self.refresh_key),
            set_options: self.set_options()?,
            single_flight_refresh: self.single_flight_refresh,
        })
    }
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file yields defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = path.unwrap_or_else(default_config_path);
    load_from(&config_path)
}

fn load_from(config_path: &Path) -> Result<ClientConfig> {
    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        ClientConfig::default()
    };

    config.config_path = config_path.to_path_buf();
    config.endpoint_url()?;
    config
        .set_options()
        .with_context(|| format!("Invalid config in {:?}", config_path))?;

    Ok(config)
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("client.toml"))
        .unwrap_or_else(|| PathBuf::from("tokenward.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "tokenward")
}
