//! Search provider implementations
//!
//! Tavily, Brave, and SerpAPI clients. Each parses its provider's payload
//! into the shared [`SearchResult`] shape.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{SearchClient, SearchError, SearchResult};
use crate::config::SearchConfig;

/// Shared construction for the provider clients
fn build_http(config: &SearchConfig) -> Result<Client, SearchError> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()
        .map_err(SearchError::Network)
}

/// Read an API key from the environment at call time
fn api_key(env_name: &str) -> Result<String, SearchError> {
    std::env::var(env_name).map_err(|_| SearchError::MissingApiKey(env_name.to_string()))
}

/// Fail on a non-success HTTP status, preserving the response body
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(SearchError::ApiError { status, message })
    }
}

/// Tavily search API client
pub struct TavilyClient {
    api_key_env: String,
    http: Client,
}

impl TavilyClient {
    /// Create a new client from configuration
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self {
            api_key_env: config.api_key_env.clone(),
            http: build_http(config)?,
        })
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        debug!(%query, max_results, "search: called (tavily)");
        let key = api_key(&self.api_key_env)?;

        let body = serde_json::json!({
            "api_key": key,
            "query": query,
            "max_results": max_results,
            "search_depth": "basic",
        });

        let response = self.http.post("https://api.tavily.com/search").json(&body).send().await?;
        let response = check_status(response).await?;
        let payload: Value = response.json().await?;

        let results = payload["results"]
            .as_array()
            .ok_or_else(|| SearchError::InvalidResponse("Missing 'results' array".to_string()))?;

        Ok(results
            .iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r["title"].as_str().unwrap_or("(no title)").to_string(),
                url: r["url"].as_str().unwrap_or_default().to_string(),
                snippet: r["content"].as_str().unwrap_or_default().to_string(),
                score: r["score"].as_f64(),
            })
            .collect())
    }
}

/// Brave Search API client
pub struct BraveClient {
    api_key_env: String,
    http: Client,
}

impl BraveClient {
    /// Create a new client from configuration
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self {
            api_key_env: config.api_key_env.clone(),
            http: build_http(config)?,
        })
    }
}

#[async_trait]
impl SearchClient for BraveClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        debug!(%query, max_results, "search: called (brave)");
        let key = api_key(&self.api_key_env)?;

        let response = self
            .http
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", key)
            .query(&[("q", query), ("count", &max_results.to_string())])
            .send()
            .await?;
        let response = check_status(response).await?;
        let payload: Value = response.json().await?;

        let results = payload["web"]["results"]
            .as_array()
            .ok_or_else(|| SearchError::InvalidResponse("Missing 'web.results' array".to_string()))?;

        Ok(results
            .iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r["title"].as_str().unwrap_or("(no title)").to_string(),
                url: r["url"].as_str().unwrap_or_default().to_string(),
                snippet: r["description"].as_str().unwrap_or_default().to_string(),
                score: None,
            })
            .collect())
    }
}

/// SerpAPI client
pub struct SerpApiClient {
    api_key_env: String,
    http: Client,
}

impl SerpApiClient {
    /// Create a new client from configuration
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self {
            api_key_env: config.api_key_env.clone(),
            http: build_http(config)?,
        })
    }
}

#[async_trait]
impl SearchClient for SerpApiClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        debug!(%query, max_results, "search: called (serpapi)");
        let key = api_key(&self.api_key_env)?;

        let response = self
            .http
            .get("https://serpapi.com/search")
            .query(&[
                ("q", query),
                ("api_key", &key),
                ("num", &max_results.to_string()),
                ("engine", "google"),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let payload: Value = response.json().await?;

        let results = payload["organic_results"]
            .as_array()
            .ok_or_else(|| SearchError::InvalidResponse("Missing 'organic_results' array".to_string()))?;

        Ok(results
            .iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r["title"].as_str().unwrap_or("(no title)").to_string(),
                url: r["link"].as_str().unwrap_or_default().to_string(),
                snippet: r["snippet"].as_str().unwrap_or_default().to_string(),
                score: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_api_key_missing() {
        unsafe { std::env::remove_var("TUTOR_TEST_SEARCH_KEY") };
        assert!(matches!(
            api_key("TUTOR_TEST_SEARCH_KEY"),
            Err(SearchError::MissingApiKey(_))
        ));
    }

    #[test]
    #[serial]
    fn test_api_key_present() {
        unsafe { std::env::set_var("TUTOR_TEST_SEARCH_KEY", "sk-search") };
        assert_eq!(api_key("TUTOR_TEST_SEARCH_KEY").unwrap(), "sk-search");
        unsafe { std::env::remove_var("TUTOR_TEST_SEARCH_KEY") };
    }
}
