// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::redirect::Policy;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Maximum redirect hops followed per request.
const MAX_REDIRECTS: usize = 10;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}
