// src/models/competitor.rs

//! Competitor registry and crawlable source structures.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Kind of page a source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ReleaseNotes,
    FeatureDocs,
    ApiChangelog,
    Deprecation,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::ReleaseNotes,
        SourceKind::FeatureDocs,
        SourceKind::ApiChangelog,
        SourceKind::Deprecation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ReleaseNotes => "release_notes",
            SourceKind::FeatureDocs => "feature_docs",
            SourceKind::ApiChangelog => "api_changelog",
            SourceKind::Deprecation => "deprecation",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| AppError::validation(format!("unknown source kind '{}'", s)))
    }
}

/// A source URL declared directly in the seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub url: String,

    #[serde(default)]
    pub label: String,

    pub kind: SourceKind,
}

/// A vendor whose public documentation is monitored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,

    /// Homepage used as the discovery entry point
    pub website: String,

    /// Market segment (e.g., "traditional", "modern", "mid-market")
    pub category: String,

    #[serde(default)]
    pub description: String,

    /// 1 = highest
    pub priority: u8,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Queries used by the search ingestion path
    #[serde(default)]
    pub search_terms: Vec<String>,

    /// Sources declared up front, crawled before discovered ones
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

fn default_enabled() -> bool {
    true
}

impl Competitor {
    /// Check whether this competitor is crawled at the given priority ceiling.
    pub fn is_active(&self, max_priority: u8) -> bool {
        self.enabled && self.priority <= max_priority
    }

    /// Sources declared in the seed, bound to this competitor.
    pub fn declared_sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.sources.iter().map(|spec| Source {
            competitor: self.name.clone(),
            url: spec.url.clone(),
            label: spec.label.clone(),
            kind: spec.kind,
        })
    }
}

/// A single crawlable page bound to a competitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub competitor: String,
    pub url: String,
    pub label: String,
    pub kind: SourceKind,
}

impl Source {
    /// Load discovered sources from a JSON file.
    pub async fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write discovered sources to a JSON file.
    pub async fn save_all(path: impl AsRef<Path>, sources: &[Source]) -> Result<()> {
        let content = serde_json::to_string_pretty(sources)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Competitors plus every source known for them.
///
/// Registry order is seed order; within a competitor, declared sources come
/// before discovered ones.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    competitors: Vec<Competitor>,
    discovered: Vec<Source>,
}

impl Registry {
    pub fn new(competitors: Vec<Competitor>, discovered: Vec<Source>) -> Self {
        Self {
            competitors,
            discovered,
        }
    }

    pub fn competitors(&self) -> &[Competitor] {
        &self.competitors
    }

    /// Sources found by discovery, as loaded from `sources.json`.
    pub fn discovered(&self) -> &[Source] {
        &self.discovered
    }

    pub fn competitor(&self, name: &str) -> Option<&Competitor> {
        self.competitors.iter().find(|c| c.name == name)
    }

    /// Enabled competitors at or above the given priority, in registry order.
    pub fn active_competitors(&self, max_priority: u8) -> Vec<&Competitor> {
        self.competitors
            .iter()
            .filter(|c| c.is_active(max_priority))
            .collect()
    }

    /// Every source of the active competitors, deduplicated by URL.
    pub fn sources(&self, max_priority: u8) -> Vec<Source> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for competitor in self.active_competitors(max_priority) {
            let discovered = self
                .discovered
                .iter()
                .filter(|s| s.competitor == competitor.name)
                .cloned();

            for source in competitor.declared_sources().chain(discovered) {
                if seen.insert(source.url.clone()) {
                    sources.push(source);
                }
            }
        }

        sources
    }

    /// Number of sources known for one competitor.
    pub fn source_count(&self, name: &str) -> usize {
        let declared = self.competitor(name).map_or(0, |c| c.sources.len());
        declared + self.discovered.iter().filter(|s| s.competitor == name).count()
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for competitor in &self.competitors {
            if competitor.name.trim().is_empty() {
                return Err(AppError::validation("competitor with empty name"));
            }
            if !names.insert(competitor.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate competitor '{}'",
                    competitor.name
                )));
            }
            if !(1..=3).contains(&competitor.priority) {
                return Err(AppError::validation(format!(
                    "competitor '{}' has priority {} (expected 1-3)",
                    competitor.name, competitor.priority
                )));
            }
            url::Url::parse(&competitor.website)?;
            for spec in &competitor.sources {
                url::Url::parse(&spec.url)?;
            }
        }
        Ok(())
    }
}

/// Search freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl Freshness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Day => "day",
            Freshness::Week => "week",
            Freshness::Month => "month",
            Freshness::Year => "year",
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Freshness {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Freshness::Day),
            "week" => Ok(Freshness::Week),
            "month" => Ok(Freshness::Month),
            "year" => Ok(Freshness::Year),
            other => Err(AppError::validation(format!(
                "unknown freshness '{}' (expected day, week, month or year)",
                other
            ))),
        }
    }
}
