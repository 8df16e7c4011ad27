//! Configuration management for the turnier CLI and client library

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::{Result, TurnierError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Refresh the session once it has less than 30 minutes left.
pub const DEFAULT_REFRESH_THRESHOLD_MS: i64 = 30 * 60 * 1000;

/// Settings persisted by the CLI in `<config_dir>/turnier/config.json`.
///
/// Fields missing from the file take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub endpoint: String,
    pub timeout: u64,
    pub refresh_threshold_ms: i64,
    pub storage_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            refresh_threshold_ms: DEFAULT_REFRESH_THRESHOLD_MS,
            storage_dir: default_storage_dir(),
        }
    }
}

impl CliConfig {
    /// Load the CLI config, writing defaults when the file is missing or unreadable
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        if config_file.exists() {
            let content = fs::read_to_string(&config_file)
                .await
                .map_err(|e| TurnierError::io_from_error("Reading config", e))?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    tracing::warn!(
                        "Config file {} is corrupt ({}), resetting to defaults",
                        config_file.display(),
                        e
                    );
                    let config = Self::default();
                    config.save(&config_file).await?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save(&config_file).await?;
            Ok(config)
        }
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TurnierError::directory("Creating config directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content)
            .await
            .map_err(|e| TurnierError::storage_write("Writing config", e))?;
        Ok(())
    }

    /// Path of the persisted session file
    pub fn session_path(&self) -> PathBuf {
        self.storage_dir.join("session.json")
    }

    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let use_proxy =
            !self.endpoint.contains("localhost") && !self.endpoint.contains("127.0.0.1");

        ClientConfigBuilder::new()
            .base_url(&self.endpoint)
            .timeout(self.timeout)
            .refresh_threshold_ms(self.refresh_threshold_ms)
            .use_proxy(use_proxy)
            .storage_path(self.session_path())
            .build()
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turnier")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turnier")
}

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Refresh once the token has less than this many milliseconds left
    #[serde(default = "default_refresh_threshold_ms")]
    pub refresh_threshold_ms: i64,
    /// How far the server extends a session on refresh. Informational only,
    /// the server decides.
    #[serde(default)]
    pub refresh_extension_secs: Option<u64>,
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
    /// Session file location; `None` keeps the session in memory
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_refresh_threshold_ms() -> i64 {
    DEFAULT_REFRESH_THRESHOLD_MS
}

fn default_use_proxy() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: default_timeout(),
            refresh_threshold_ms: default_refresh_threshold_ms(),
            refresh_extension_secs: None,
            use_proxy: default_use_proxy(),
            storage_path: None,
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<u64>,
    refresh_threshold_ms: Option<i64>,
    refresh_extension_secs: Option<u64>,
    use_proxy: Option<bool>,
    storage_path: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn refresh_threshold_ms(mut self, threshold: i64) -> Self {
        self.refresh_threshold_ms = Some(threshold);
        self
    }

    pub fn refresh_extension_secs(mut self, secs: u64) -> Self {
        self.refresh_extension_secs = Some(secs);
        self
    }

    pub fn use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = Some(use_proxy);
        self
    }

    pub fn storage_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_file_and_env(self.config_file.as_deref())?;

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(threshold) = self.refresh_threshold_ms {
            config.refresh_threshold_ms = threshold;
        }
        if let Some(secs) = self.refresh_extension_secs {
            config.refresh_extension_secs = Some(secs);
        }
        if let Some(use_proxy) = self.use_proxy {
            config.use_proxy = use_proxy;
        }
        if let Some(path) = self.storage_path {
            config.storage_path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    pub fn new() -> Result<Self> {
        Self::from_file_and_env::<&str>(None)
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Defaults, then the optional file, then `TURNIER_*` environment variables
    pub fn from_file_and_env<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("timeout", DEFAULT_TIMEOUT_SECS)?
            .set_default("refresh_threshold_ms", DEFAULT_REFRESH_THRESHOLD_MS)?
            .set_default("use_proxy", true)?;

        if let Some(config_path) = config_file {
            if config_path.as_ref().exists() {
                builder = builder.add_source(File::from(config_path.as_ref()));
            }
        }
        builder = builder.add_source(Environment::with_prefix("TURNIER").try_parsing(true));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(TurnierError::invalid_endpoint("Base URL cannot be empty"));
        }
        if self.timeout == 0 {
            return Err(TurnierError::config("Timeout must be at least one second"));
        }
        if self.refresh_threshold_ms < 0 {
            return Err(TurnierError::config("Refresh threshold cannot be negative"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Resolve an endpoint against the base URL. Absolute URLs pass through.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }

        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        let base_url =
            if self.base_url.starts_with("http://") || self.base_url.starts_with("https://") {
                self.base_url.clone()
            } else {
                format!("https://{}", self.base_url)
            };

        format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
    }
}
