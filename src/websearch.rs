//! Web search collaborator for the assistant chat.
//!
//! - **[`DisabledSearcher`]**: returns no results; used when `[search].provider = "disabled"`.
//! - **[`GoogleSearcher`]**: queries the Google Custom Search JSON API.
//!
//! Search is best effort. Callers treat an error the same as an empty
//! result list.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::SearchConfig;

const GOOGLE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

#[async_trait]
pub trait Searcher: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

pub struct DisabledSearcher;

#[async_trait]
impl Searcher for DisabledSearcher {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        Ok(Vec::new())
    }
}

pub struct GoogleSearcher {
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
    max_results: usize,
}

impl GoogleSearcher {
    /// # Errors
    ///
    /// Fails when either credential variable is unset.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        let engine_id = std::env::var(&config.engine_id_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.engine_id_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            engine_id,
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl Searcher for GoogleSearcher {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let num = self.max_results.to_string();
        let response = self
            .client
            .get(GOOGLE_ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Search API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        Ok(parse_search_response(&json))
    }
}

/// Pull `items[].{title, snippet, link}` out of a Custom Search response.
/// A response without `items` has no results.
fn parse_search_response(json: &serde_json::Value) -> Vec<SearchResult> {
    let field = |item: &serde_json::Value, key: &str| {
        item.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    json.get("items")
        .and_then(|items| items.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| SearchResult {
                    title: field(item, "title"),
                    snippet: field(item, "snippet"),
                    link: field(item, "link"),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build the searcher selected by `[search].provider`.
pub fn create_searcher(config: &SearchConfig) -> Result<Arc<dyn Searcher>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledSearcher)),
        "google" => Ok(Arc::new(GoogleSearcher::new(config)?)),
        other => bail!("Unknown search provider: {}", other),
    }
}
