use config::{Config as ConfigLoader, ConfigError, Environment, File};
use ezstudy_llm::{AiConfig, ServiceConfig};
use ezstudy_persist::{SessionSettings, WriterConfig};
use ezstudy_types::UserProfile;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_service")]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub user: UserProfile,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Defaults to the platform data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            debounce_ms: default_debounce_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl StorageConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ezstudy"),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::new().writer(WriterConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.debounce_ms)),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn default_service() -> ServiceConfig {
    ServiceConfig::new(DEFAULT_BACKEND_URL)
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_max_delay_ms() -> u64 {
    2000
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. EZSTUDY_* environment variables, `__` between section and key
    ///    (e.g. EZSTUDY_SERVICE__BACKEND_URL)
    /// 4. BACKEND_URL, kept for existing deployments
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .set_default("service.backend_url", DEFAULT_BACKEND_URL)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("EZSTUDY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("service.backend_url", std::env::var("BACKEND_URL").ok())?;

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder()
            .set_default("service.backend_url", DEFAULT_BACKEND_URL)?
            .add_source(File::from(path.as_ref()));

        builder.build()?.try_deserialize()
    }
}
