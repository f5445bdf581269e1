//! Application state shared across handlers.

use crate::config::Config;
use crate::error::Result;
use crate::export::HttpCoverFetcher;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Cover image client, shared so connections are pooled.
    pub fetcher: Arc<HttpCoverFetcher>,
}

impl AppState {
    /// Create application state from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpCoverFetcher::new(&config.cover)?;
        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
        })
    }
}
