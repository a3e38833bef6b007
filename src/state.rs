//! Shared application state.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::diag::DiagLogger;

/// State shared across all request handlers.
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Shared HTTP client for upstream calls
    pub http: reqwest::Client,
    /// Diagnostic ring buffer
    pub diag: Arc<DiagLogger>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let diag = DiagLogger::new(config.diag_capacity);
        Arc::new(Self {
            config,
            http: reqwest::Client::new(),
            diag,
        })
    }
}
