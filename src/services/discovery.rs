//! Source discovery service.
//!
//! Finds release-note, documentation, API-changelog and deprecation pages by
//! scanning a competitor homepage for same-site links whose URL or text
//! matches known patterns.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Competitor, DiscoveryConfig, Source, SourceKind};
use crate::services::Fetcher;
use crate::utils::{bare_host, normalize_whitespace, truncate_graphemes};

/// Patterns per source kind, most specific kind first.
const PATTERNS: &[(SourceKind, &[&str])] = &[
    (
        SourceKind::ApiChangelog,
        &[
            r"api.*changelog",
            r"api.*release",
            r"api.*updates?",
            r"developer.*changelog",
        ],
    ),
    (
        SourceKind::Deprecation,
        &[
            r"deprecat",
            r"sunset",
            r"end[-_ ]?of[-_ ]?life",
            r"\beol\b",
            r"retiring",
        ],
    ),
    (
        SourceKind::ReleaseNotes,
        &[
            r"release[-_ ]?notes?",
            r"what'?s[-_ ]?new",
            r"changelog",
            r"product[-_ ]?updates?",
            r"latest[-_ ]?updates?",
            r"announcements?",
        ],
    ),
    (
        SourceKind::FeatureDocs,
        &[
            r"features?",
            r"capabilities",
            r"documentation",
            r"product[-_ ]?guide",
            r"user[-_ ]?guide",
        ],
    ),
];

/// Label used when a link has neither text nor a path segment.
const DEFAULT_LABEL: &str = "Documentation";

/// Service for discovering crawlable sources on competitor websites.
pub struct SourceDiscovery {
    fetcher: Arc<dyn Fetcher>,
    patterns: Vec<(SourceKind, Vec<Regex>)>,
    link_selector: Selector,
    config: DiscoveryConfig,
}

impl SourceDiscovery {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &DiscoveryConfig) -> Result<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(kind, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|p| {
                        Regex::new(&format!("(?i){}", p))
                            .map_err(|e| AppError::discovery(format!("bad pattern {}: {}", p, e)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((*kind, compiled))
            })
            .collect::<Result<Vec<_>>>()?;

        let link_selector =
            Selector::parse("a[href]").map_err(|e| AppError::selector("a[href]", e))?;

        Ok(Self {
            fetcher,
            patterns,
            link_selector,
            config: config.clone(),
        })
    }

    /// Fetch a competitor homepage and derive its sources.
    pub async fn discover(&self, competitor: &Competitor) -> Result<Vec<Source>> {
        let html = self.fetcher.fetch(&competitor.website).await?;
        log::debug!("Accessed: {}", competitor.website);

        let sources = self.extract_sources(&html, competitor)?;
        log::info!(
            "Discovered {} sources for {}",
            sources.len(),
            competitor.name
        );
        Ok(sources)
    }

    /// Classify the same-site links of a page into sources.
    pub fn extract_sources(&self, html: &str, competitor: &Competitor) -> Result<Vec<Source>> {
        let base = Url::parse(&competitor.website)?;
        let base_host = bare_host(&base)
            .ok_or_else(|| AppError::discovery(format!("{} has no host", competitor.website)))?;

        let document = Html::parse_document(html);
        let mut seen_urls = HashSet::new();
        let mut sources = Vec::new();

        for element in document.select(&self.link_selector) {
            if sources.len() >= self.config.max_sources_per_competitor {
                break;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if href.starts_with('#') || href.starts_with("javascript") {
                continue;
            }
            let Ok(mut link) = base.join(href) else {
                continue;
            };
            if !matches!(link.scheme(), "http" | "https") {
                continue;
            }
            if !Self::same_site(&base_host, &link) {
                continue;
            }

            link.set_query(None);
            link.set_fragment(None);
            let clean_url = link.to_string();
            if seen_urls.contains(&clean_url) {
                continue;
            }

            let text = normalize_whitespace(&element.text().collect::<String>());
            let combined = format!("{} {}", clean_url, text);
            let Some(kind) = self.classify(&combined) else {
                continue;
            };

            seen_urls.insert(clean_url.clone());
            sources.push(Source {
                competitor: competitor.name.clone(),
                label: self.label(&text, &link),
                url: clean_url,
                kind,
            });
        }

        Ok(sources)
    }

    fn classify(&self, combined: &str) -> Option<SourceKind> {
        self.patterns
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(combined)))
            .map(|(kind, _)| *kind)
    }

    /// Same host, or a subdomain of it, ignoring `www.`.
    fn same_site(base_host: &str, link: &Url) -> bool {
        bare_host(link).is_some_and(|host| {
            host == base_host || host.ends_with(&format!(".{}", base_host))
        })
    }

    fn label(&self, text: &str, link: &Url) -> String {
        let label = if !text.is_empty() {
            text.to_string()
        } else {
            link.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string())
        };
        truncate_graphemes(&label, self.config.max_label_chars)
    }
}
