//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden by
//! `QUILLPOST_*` environment variables. Missing values fall back to defaults,
//! so an absent or empty file yields a runnable development setup.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token and account-link settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outgoing mail settings
    #[serde(default)]
    pub email: EmailConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Absolute base URL used for links in responses and emails
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl ServerConfig {
    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or `sqlite:` URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/quillpost.db".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign JWTs and account tokens
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    /// Access token lifetime in minutes
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    /// Refresh token lifetime in days
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
    /// Lifetime of email confirmation and password reset links, in seconds
    #[serde(default = "default_account_token_timeout_secs")]
    pub account_token_timeout_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
            account_token_timeout_secs: default_account_token_timeout_secs(),
        }
    }
}

/// Secret used when none is configured; fine for development only
pub const INSECURE_DEFAULT_SECRET: &str = "insecure-development-secret-change-me";

fn default_secret_key() -> String {
    INSECURE_DEFAULT_SECRET.to_string()
}

fn default_access_token_minutes() -> i64 {
    60
}

fn default_refresh_token_days() -> i64 {
    1
}

fn default_account_token_timeout_secs() -> i64 {
    3 * 24 * 60 * 60
}

/// Email configuration
///
/// With an empty `smtp_host` messages are written to the log instead of
/// being sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    /// Sender mailbox, e.g. `Quillpost <noreply@example.com>`
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "Quillpost <noreply@localhost>".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid
    /// YAML is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Variables follow the pattern `QUILLPOST_<SECTION>_<FIELD>`, e.g.
    /// `QUILLPOST_SERVER_PORT` or `QUILLPOST_AUTH_SECRET_KEY`.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.secret_key must not be empty".to_string(),
            ));
        }
        if self.auth.access_token_minutes <= 0 || self.auth.refresh_token_days <= 0 {
            return Err(ConfigError::ValidationError(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if !self.server.public_url.starts_with("http") {
            return Err(ConfigError::ValidationError(format!(
                "server.public_url must be an absolute http(s) URL, got '{}'",
                self.server.public_url
            )));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("QUILLPOST_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("QUILLPOST_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("QUILLPOST_SERVER_PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Ok(cors_origin) = std::env::var("QUILLPOST_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(url) = std::env::var("QUILLPOST_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("QUILLPOST_AUTH_SECRET_KEY") {
            self.auth.secret_key = secret;
        }
        if let Ok(minutes) = std::env::var("QUILLPOST_AUTH_ACCESS_TOKEN_MINUTES") {
            if let Ok(minutes) = minutes.parse::<i64>() {
                self.auth.access_token_minutes = minutes;
            }
        }
        if let Ok(days) = std::env::var("QUILLPOST_AUTH_REFRESH_TOKEN_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.refresh_token_days = days;
            }
        }

        if let Ok(host) = std::env::var("QUILLPOST_EMAIL_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Ok(port) = std::env::var("QUILLPOST_EMAIL_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.email.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("QUILLPOST_EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("QUILLPOST_EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }
        if let Ok(from) = std::env::var("QUILLPOST_EMAIL_FROM_ADDRESS") {
            self.email.from_address = from;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
