//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Content segmentation thresholds
    #[serde(default)]
    pub segmenter: SegmenterConfig,

    /// Generative classification settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Keyword gate term lists
    #[serde(default)]
    pub relevance: RelevanceConfig,

    /// Search ingestion settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Source discovery rules
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.segmenter.max_key_chars == 0 {
            return Err(AppError::validation("segmenter.max_key_chars must be > 0"));
        }
        if self.classifier.request_timeout_secs == 0 {
            return Err(AppError::validation(
                "classifier.request_timeout_secs must be > 0",
            ));
        }
        if self.classifier.max_claim_chars < 2 {
            return Err(AppError::validation(
                "classifier.max_claim_chars must be >= 2",
            ));
        }
        if self.relevance.software_terms.is_empty() {
            return Err(AppError::validation("relevance.software_terms is empty"));
        }
        if self.relevance.domain_terms.is_empty() {
            return Err(AppError::validation("relevance.domain_terms is empty"));
        }
        if self.relevance.min_domain_matches == 0 {
            return Err(AppError::validation(
                "relevance.min_domain_matches must be > 0",
            ));
        }
        if self.discovery.max_sources_per_competitor == 0 {
            return Err(AppError::validation(
                "discovery.max_sources_per_competitor must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay after each completed source in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum sources processed concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Thresholds used when splitting a page into chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// A chunk body shorter than this is dropped
    #[serde(default = "defaults::min_chunk_chars")]
    pub min_chunk_chars: usize,

    /// Text nodes must be longer than this to be collected
    #[serde(default = "defaults::min_text_chars")]
    pub min_text_chars: usize,

    /// Headings are truncated to this many characters to form chunk keys
    #[serde(default = "defaults::max_key_chars")]
    pub max_key_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: defaults::min_chunk_chars(),
            min_text_chars: defaults::min_text_chars(),
            max_key_chars: defaults::max_key_chars(),
        }
    }
}

/// Generative backend and event-shaping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL of the generateContent API
    #[serde(default = "defaults::gemini_api_base")]
    pub api_base: String,

    /// Model identifier
    #[serde(default = "defaults::gemini_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "defaults::gemini_key_env")]
    pub api_key_env: String,

    #[serde(default = "defaults::temperature")]
    pub temperature: f32,

    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,

    /// Timeout for a single generation request
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout_secs: u64,

    /// Wall-clock budget for generative calls across one run
    #[serde(default = "defaults::run_budget")]
    pub run_budget_secs: u64,

    /// Content excerpt length embedded in prompts
    #[serde(default = "defaults::excerpt_chars")]
    pub excerpt_chars: usize,

    #[serde(default = "defaults::max_claim_chars")]
    pub max_claim_chars: usize,

    #[serde(default = "defaults::max_snippet_chars")]
    pub max_snippet_chars: usize,

    #[serde(default = "defaults::max_evidence_url_chars")]
    pub max_evidence_url_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::gemini_api_base(),
            model: defaults::gemini_model(),
            api_key_env: defaults::gemini_key_env(),
            temperature: defaults::temperature(),
            max_tokens: defaults::max_tokens(),
            request_timeout_secs: defaults::request_timeout(),
            run_budget_secs: defaults::run_budget(),
            excerpt_chars: defaults::excerpt_chars(),
            max_claim_chars: defaults::max_claim_chars(),
            max_snippet_chars: defaults::max_snippet_chars(),
            max_evidence_url_chars: defaults::max_evidence_url_chars(),
        }
    }
}

/// Term lists for the keyword relevance gate.
///
/// Terms are matched case-insensitively and must start on a word boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Any match rejects the content outright
    #[serde(default = "defaults::exclude_terms")]
    pub exclude_terms: Vec<String>,

    /// At least one must be present
    #[serde(default = "defaults::software_terms")]
    pub software_terms: Vec<String>,

    /// Functional vocabulary of the monitored domain
    #[serde(default = "defaults::domain_terms")]
    pub domain_terms: Vec<String>,

    /// Minimum number of distinct domain terms required
    #[serde(default = "defaults::min_domain_matches")]
    pub min_domain_matches: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            exclude_terms: defaults::exclude_terms(),
            software_terms: defaults::software_terms(),
            domain_terms: defaults::domain_terms(),
            min_domain_matches: defaults::min_domain_matches(),
        }
    }
}

/// Search-API ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "defaults::search_api_base")]
    pub api_base: String,

    /// Environment variable holding the API key
    #[serde(default = "defaults::search_key_env")]
    pub api_key_env: String,

    #[serde(default = "defaults::results_per_query")]
    pub results_per_query: usize,

    /// Hits with less content than this are ignored
    #[serde(default = "defaults::min_content_chars")]
    pub min_content_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::search_api_base(),
            api_key_env: defaults::search_key_env(),
            results_per_query: defaults::results_per_query(),
            min_content_chars: defaults::min_content_chars(),
        }
    }
}

/// Source discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "defaults::max_sources_per_competitor")]
    pub max_sources_per_competitor: usize,

    #[serde(default = "defaults::max_label_chars")]
    pub max_label_chars: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_sources_per_competitor: defaults::max_sources_per_competitor(),
            max_label_chars: defaults::max_label_chars(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; IntelCrawler/1.0; +https://github.com/intel-crawler)".into()
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn request_delay() -> u64 {
        0
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Segmenter defaults
    pub fn min_chunk_chars() -> usize {
        200
    }
    pub fn min_text_chars() -> usize {
        20
    }
    pub fn max_key_chars() -> usize {
        120
    }

    // Classifier defaults
    pub fn gemini_api_base() -> String {
        "https://generativelanguage.googleapis.com/v1beta".into()
    }
    pub fn gemini_model() -> String {
        "gemini-2.0-flash".into()
    }
    pub fn gemini_key_env() -> String {
        "GEMINI_API_KEY".into()
    }
    pub fn temperature() -> f32 {
        0.15
    }
    pub fn max_tokens() -> u32 {
        700
    }
    pub fn request_timeout() -> u64 {
        45
    }
    pub fn run_budget() -> u64 {
        900
    }
    pub fn excerpt_chars() -> usize {
        1500
    }
    pub fn max_claim_chars() -> usize {
        500
    }
    pub fn max_snippet_chars() -> usize {
        2000
    }
    pub fn max_evidence_url_chars() -> usize {
        512
    }

    // Search defaults
    pub fn search_api_base() -> String {
        "https://ydc-index.io/v1".into()
    }
    pub fn search_key_env() -> String {
        "YOU_API_KEY".into()
    }
    pub fn results_per_query() -> usize {
        3
    }
    pub fn min_content_chars() -> usize {
        50
    }

    // Discovery defaults
    pub fn max_sources_per_competitor() -> usize {
        15
    }
    pub fn max_label_chars() -> usize {
        200
    }

    // Relevance defaults
    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    pub fn exclude_terms() -> Vec<String> {
        terms(&[
            // Consumer banking
            "personal account",
            "savings account",
            "checking account",
            "credit card",
            "debit card",
            "mortgage",
            "loan",
            "personal finance",
            "consumer banking",
            "retail banking",
            "bank account",
            "financial advisor",
            // Politics and legal
            "immigration",
            "federal crackdown",
            "court case",
            "lawsuit",
            "criminal",
            "politics",
            "election",
            "military",
            // Entertainment
            "sports",
            "entertainment",
            "celebrity",
            "music",
            "movie",
            "gaming",
            // Crypto and trading
            "cryptocurrency",
            "bitcoin",
            "blockchain",
            "nft",
            "forex",
            // Real estate
            "real estate",
            "housing market",
            // Recruiting
            "job posting",
            "career opportunities",
            "hiring",
            // Security incidents
            "malicious",
            "hijack",
            "data breach",
            "breach",
            "cyber attack",
            "cyberattack",
            "ransomware",
            "phishing",
            "scam",
            "exploit",
            "vulnerability",
            "security threat",
            "malware",
            // Markets and earnings
            "stock price",
            "share price",
            "shares tumble",
            "shares rise",
            "earnings report",
            "quarterly earnings",
            "revenue growth",
            "stock plummets",
            "stock soars",
            "market cap",
            "ipo",
            "acquisition price",
            "tariffs",
            "trade war",
            "economic downturn",
            // Training courses
            "online course",
            "training course",
            "certification",
            "udemy",
            "coursera",
            "tutorial",
            "bootcamp",
            "from zero to expert",
            "beginner guide",
            // Health and environment
            "microplastics",
            "plastic particles",
            "health risk",
            "medical",
            "disease",
            "cancer",
            "virus",
            "pandemic",
            "climate change",
            "pollution",
        ])
    }

    pub fn software_terms() -> Vec<String> {
        terms(&[
            "software",
            "system",
            "platform",
            "solution",
            "product",
            "application",
            "cloud",
            "saas",
            "technology",
            "tool",
            "module",
            "feature",
            "release",
            "update",
            "version",
            "integration",
            "api",
        ])
    }

    pub fn domain_terms() -> Vec<String> {
        terms(&[
            "erp",
            "accounting software",
            "financial management",
            "general ledger",
            "ledger",
            "revenue recognition",
            "accounts payable",
            "ap automation",
            "accounts receivable",
            "financial close",
            "month-end close",
            "chart of accounts",
            "journal entries",
            "journal entry",
            "financial reporting",
            "consolidation",
            "multi-entity",
            "intercompany",
            "subledger",
            "sub-ledger",
            "reconciliation",
            "trial balance",
            "financial statements",
            "expense management",
            "procurement",
            "order management",
            "billing system",
            "invoicing",
            "payment processing",
            "accounting automation",
            "financial planning",
            "budgeting software",
            "audit trail",
            "compliance",
            "gaap",
            "ifrs",
            "asc 606",
            "asc 842",
        ])
    }

    pub fn min_domain_matches() -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.crawler.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_domain_terms() {
        let mut config = Config::default();
        config.relevance.domain_terms.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            timeout_secs = 5

            [segmenter]
            min_chunk_chars = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.timeout_secs, 5);
        assert_eq!(config.crawler.max_concurrent, 4);
        assert_eq!(config.segmenter.min_chunk_chars, 120);
        assert_eq!(config.segmenter.max_key_chars, 120);
        assert_eq!(config.classifier.model, "gemini-2.0-flash");
        assert!(!config.relevance.domain_terms.is_empty());
    }
}
