//! Web search module
//!
//! Wraps third-party web-search APIs behind the [`SearchClient`] trait.
//! Results come back as a ranked list of title/url/snippet records.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

mod providers;

pub use providers::{BraveClient, SerpApiClient, TavilyClient};

use crate::config::SearchConfig;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A single ranked search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title
    pub title: String,

    /// Page url
    pub url: String,

    /// Snippet or content excerpt
    pub snippet: String,

    /// Provider relevance score, when the provider reports one
    pub score: Option<f64>,
}

/// A web-search backend
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Search the web, returning at most `max_results` ranked results
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError>;
}

/// Create a search client based on the provider specified in config
///
/// Supports "tavily", "brave", and "serpapi" providers.
pub fn create_client(config: &SearchConfig) -> Result<Arc<dyn SearchClient>, SearchError> {
    debug!(provider = %config.provider, "create_client: called");
    match config.provider.as_str() {
        "tavily" => Ok(Arc::new(TavilyClient::from_config(config)?)),
        "brave" => Ok(Arc::new(BraveClient::from_config(config)?)),
        "serpapi" => Ok(Arc::new(SerpApiClient::from_config(config)?)),
        other => Err(SearchError::InvalidResponse(format!(
            "Unknown search provider: '{}'. Supported: tavily, brave, serpapi",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_known_providers() {
        let mut config = SearchConfig::default();

        for provider in ["tavily", "brave", "serpapi"] {
            config.provider = provider.to_string();
            assert!(create_client(&config).is_ok(), "provider {} should build", provider);
        }
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let config = SearchConfig {
            provider: "altavista".to_string(),
            ..SearchConfig::default()
        };
        assert!(create_client(&config).is_err());
    }
}
