use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

pub const DEFAULT_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

const API_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub azure: AzureConfig,
    pub ingest: IngestConfig,
    pub chat: ChatConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Non-secret half of the hosted endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// Load settings from built-in defaults, `config/{CONFIG_ENV}` and `INDIE__*` env vars.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Self::with_defaults(Config::builder())?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(
                Environment::with_prefix("INDIE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("azure.endpoint", "")?
            .set_default("azure.deployment", "")?
            .set_default("azure.api_version", DEFAULT_API_VERSION)?
            .set_default("ingest.max_file_bytes", DEFAULT_MAX_FILE_BYTES as i64)?
            .set_default("chat.temperature", 0.7)?
            .set_default("chat.max_tokens", 1000)?
            .set_default("http.timeout_secs", 120)?
            .set_default("logging.level", "info")
    }

    /// The API key is only ever taken from the environment, never from a config file.
    pub fn api_key() -> Option<String> {
        env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Connection a fresh session starts with.
    pub fn initial_connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            endpoint: self.azure.endpoint.clone(),
            api_key: Self::api_key().unwrap_or_default(),
            deployment: self.azure.deployment.clone(),
            api_version: self.azure.api_version.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            azure: AzureConfig {
                endpoint: String::new(),
                deployment: String::new(),
                api_version: DEFAULT_API_VERSION.to_string(),
            },
            ingest: IngestConfig {
                max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            },
            chat: ChatConfig {
                temperature: 0.7,
                max_tokens: 1000,
            },
            http: HttpConfig { timeout_secs: 120 },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

/// Endpoint settings a session talks to. Replaced wholesale on save.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Endpoint and key are present, so a client can be built.
    pub fn has_credentials(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// Everything a completion call needs, deployment included.
    pub fn is_complete(&self) -> bool {
        self.has_credentials() && !self.deployment.trim().is_empty()
    }

    pub fn masked_key(&self) -> String {
        if self.api_key.is_empty() {
            return String::new();
        }
        let tail: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if self.api_key.chars().count() <= 8 {
            "*".repeat(self.api_key.chars().count())
        } else {
            format!("****{}", tail)
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.masked_key())
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}
