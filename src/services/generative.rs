// src/services/generative.rs

//! Generative text backend.
//!
//! [`GeminiBackend`] talks to the `generateContent` REST endpoint. The
//! backend is optional: without an API key every classification takes the
//! keyword fallback path.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::ClassifierConfig;

/// Finish reasons treated as a refusal.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "BLOCKED",
];

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    /// The backend refused to answer; carries the reason it gave
    Blocked(String),
}

/// Sampling parameters for one request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GenerationParams {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

impl GenerateContentResponse {
    fn into_generation(self) -> Generation {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Generation::Blocked(reason);
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Generation::Text(String::new());
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if BLOCKING_FINISH_REASONS.contains(&reason) {
                return Generation::Blocked(reason.to_string());
            }
        }

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Generation::Text(text)
    }
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(client: Client, config: &ClassifierConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.trim_start_matches("models/").to_string(),
            api_key: api_key.into(),
        }
    }

    /// Build a backend when the configured API key variable is set.
    pub fn from_env(client: Client, config: &ClassifierConfig) -> Option<Self> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Some(Self::new(client, config, key.trim())),
            _ => {
                log::info!(
                    "{} not set; classification uses keyword fallback only",
                    config.api_key_env
                );
                None
            }
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
            },
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(params.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::backend(format!(
                "generateContent returned HTTP {}: {}",
                status.as_u16(),
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Ok(parsed.into_generation())
    }
}
