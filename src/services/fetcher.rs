// src/services/fetcher.rs

//! Page fetching.
//!
//! The [`Fetcher`] trait is the only way the pipeline reaches the network,
//! so runs can be driven from fixtures in tests.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::create_async_client;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve the body of `url` as text. Single attempt, no retries.
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// Fetcher backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&CrawlerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/notes")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><p>hello</p></body></html>")
            .create_async()
            .await;

        let body = fetcher()
            .fetch(&format!("{}/notes", server.url()))
            .await
            .unwrap();
        assert!(body.contains("hello"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let url = format!("{}/missing", server.url());
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert_eq!(err, FetchError::Status { url, status: 404 });
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect() {
        let mut server = Server::new_async().await;
        let _redirect = server
            .mock("GET", "/old")
            .with_status(301)
            .with_header("location", "/new")
            .create_async()
            .await;
        let _target = server
            .mock("GET", "/new")
            .with_status(200)
            .with_body("moved here")
            .create_async()
            .await;

        let body = fetcher()
            .fetch(&format!("{}/old", server.url()))
            .await
            .unwrap();
        assert_eq!(body, "moved here");
    }

    #[tokio::test]
    async fn test_fetch_transport_error() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let err = fetcher().fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport { .. } | FetchError::Timeout { .. }
        ));
    }
}
