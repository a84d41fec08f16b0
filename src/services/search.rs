// src/services/search.rs

//! Web and news search provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Freshness, SearchConfig};

/// Upper bound the search API accepts for `count`.
const MAX_COUNT: usize = 20;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    Web,
    News,
}

/// One normalized search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub kind: HitKind,
    pub title: String,
    pub url: String,
    /// Description, first snippet, or title, whichever is present first
    pub content: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        count: usize,
        freshness: Freshness,
    ) -> Result<Vec<SearchHit>>;
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    #[serde(default)]
    web: Vec<RawHit>,
    #[serde(default)]
    news: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    snippets: Vec<String>,
}

impl RawHit {
    fn normalize(self, kind: HitKind) -> SearchHit {
        let title = self.title.unwrap_or_default().trim().to_string();
        let url = self.url.unwrap_or_default().trim().to_string();
        let content = [self.description, self.snippets.into_iter().next()]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| title.clone());
        SearchHit {
            kind,
            title,
            url,
            content,
        }
    }
}

/// You.com unified search client (web + news in one call).
#[derive(Clone)]
pub struct YouComSearch {
    client: Client,
    api_base: String,
    api_key: String,
}

impl YouComSearch {
    pub fn new(client: Client, config: &SearchConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Build a provider when the configured API key variable is set.
    pub fn from_env(client: Client, config: &SearchConfig) -> Option<Self> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Some(Self::new(client, config, key.trim())),
            _ => None,
        }
    }
}

#[async_trait]
impl SearchProvider for YouComSearch {
    async fn search(
        &self,
        query: &str,
        count: usize,
        freshness: Freshness,
    ) -> Result<Vec<SearchHit>> {
        let count = count.clamp(1, MAX_COUNT);
        let response = self
            .client
            .get(format!("{}/search", self.api_base))
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .query(&[
                ("query", query.to_string()),
                ("count", count.to_string()),
                ("freshness", freshness.to_string()),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::backend(format!(
                "search returned HTTP {} for '{}'",
                status.as_u16(),
                query
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let hits = parsed
            .results
            .web
            .into_iter()
            .take(count)
            .map(|h| h.normalize(HitKind::Web))
            .chain(
                parsed
                    .results
                    .news
                    .into_iter()
                    .take(count)
                    .map(|h| h.normalize(HitKind::News)),
            )
            .collect();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_search_normalizes_hits() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/search")
            .match_header("x-api-key", "you-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "Rillet ERP updates".into()),
                Matcher::UrlEncoded("count".into(), "3".into()),
                Matcher::UrlEncoded("freshness".into(), "week".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                "results": {
                    "web": [
                        { "url": "https://ex.com/a", "title": "A", "description": "", "snippets": ["First snippet"] },
                        { "url": "https://ex.com/b", "title": "B" }
                    ],
                    "news": [
                        { "url": "https://news.ex.com/c", "title": "C", "description": "Story" }
                    ]
                }
            }"#,
            )
            .create_async()
            .await;

        let config = SearchConfig {
            api_base: format!("{}/v1", server.url()),
            ..SearchConfig::default()
        };
        let provider = YouComSearch::new(Client::new(), &config, "you-key");
        let hits = provider
            .search("Rillet ERP updates", 3, Freshness::Week)
            .await
            .unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].content, "First snippet");
        assert_eq!(hits[1].content, "B");
        assert_eq!(hits[2].kind, HitKind::News);
        assert_eq!(hits[2].content, "Story");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_http_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/search")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let config = SearchConfig {
            api_base: format!("{}/v1", server.url()),
            ..SearchConfig::default()
        };
        let provider = YouComSearch::new(Client::new(), &config, "bad");
        assert!(provider.search("q", 3, Freshness::Day).await.is_err());
    }
}
