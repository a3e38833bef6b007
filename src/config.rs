//! Server configuration from environment variables.
//!
//! Values are loaded from the process environment (a `.env` file is read by
//! the binary before this runs). Everything has a sensible default except
//! the upstream API key, which is validated lazily by the handlers so the
//! server can still boot for local development without one.

use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Default upstream API root.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,

    /// Upstream API key; handlers reject requests when absent
    pub openai_api_key: Option<String>,
    /// Upstream API root, overridable for testing
    pub openai_base_url: String,
    /// Model for the real-time session
    pub realtime_model: String,
    /// Model for the text extraction fallback
    pub chat_model: String,
    /// Assistant voice
    pub voice: String,

    /// Comma-separated allowed CORS origins, or "*"
    pub cors_allowed_origins: Option<String>,
    /// Diagnostic ring-buffer capacity
    pub diag_capacity: usize,
    /// Negotiation relay timeout; never times out unless configured
    pub negotiation_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            chat_model: "gpt-4o".to_string(),
            voice: "alloy".to_string(),
            cors_allowed_origins: None,
            diag_capacity: crate::diag::DEFAULT_DIAG_CAPACITY,
            negotiation_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT".to_string(),
                value: raw,
            })?,
            Err(_) => defaults.port,
        };

        let diag_capacity = match std::env::var("DIAG_BUFFER_CAPACITY") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "DIAG_BUFFER_CAPACITY".to_string(),
                value: raw,
            })?,
            Err(_) => defaults.diag_capacity,
        };

        let negotiation_timeout = match std::env::var("NEGOTIATION_TIMEOUT_MS") {
            Ok(raw) => {
                let ms: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "NEGOTIATION_TIMEOUT_MS".to_string(),
                    value: raw,
                })?;
                Some(Duration::from_millis(ms))
            }
            Err(_) => None,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or(defaults.openai_base_url),
            realtime_model: std::env::var("REALTIME_MODEL").unwrap_or(defaults.realtime_model),
            chat_model: std::env::var("CHAT_MODEL").unwrap_or(defaults.chat_model),
            voice: std::env::var("VOICE").unwrap_or(defaults.voice),
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS").ok(),
            diag_capacity,
            negotiation_timeout,
        })
    }

    /// Bind address in `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
