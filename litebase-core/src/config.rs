use std::path::Path;

use serde::Deserialize;

/// Minimum HMAC secret length accepted at startup.
const MIN_SECRET_BYTES: usize = 32;

/// Configuration load / validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Load(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "failed to load configuration: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level application configuration.
///
/// Loaded from a YAML file (default `litebase.yaml`, overridable through the
/// `LITEBASE_CONFIG` environment variable), then patched with individual
/// environment overrides. `.env` files are honoured before either step.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rest: RestConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite://litebase.db`.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://litebase.db".into(),
            max_connections: 4,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing secret shared with the token issuer.
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Row cap applied to SELECTs when the client sends no limit or range.
    pub max_rows: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self { max_rows: 1000 }
    }
}

impl AppConfig {
    /// Load configuration for the running process.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path =
            std::env::var("LITEBASE_CONFIG").unwrap_or_else(|_| "litebase.yaml".to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("LITEBASE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LITEBASE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(secret) = std::env::var("LITEBASE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(max_rows) = std::env::var("LITEBASE_MAX_ROWS") {
            if let Ok(max_rows) = max_rows.parse() {
                self.rest.max_rows = max_rows;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        if self.rest.max_rows == 0 {
            return Err(ConfigError::Invalid("rest.max_rows must be positive".into()));
        }
        Ok(())
    }
}
