//! Keyword relevance gate.
//!
//! Cheap pre-filter run before any generative call. Content passes only if it
//! contains no exclusion term, at least one software indicator, and enough
//! domain vocabulary.

use crate::models::RelevanceConfig;

/// Outcome of the relevance check, naming the stage that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Relevant,
    /// Matched an off-topic term
    Excluded(String),
    NoSoftwareIndicator,
    /// Fewer domain terms than required
    InsufficientDomainTerms { found: usize, required: usize },
}

impl Verdict {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Verdict::Relevant)
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    exclude_terms: Vec<String>,
    software_terms: Vec<String>,
    domain_terms: Vec<String>,
    min_domain_matches: usize,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(&RelevanceConfig::default())
    }
}

impl RelevanceFilter {
    pub fn new(config: &RelevanceConfig) -> Self {
        let lower = |terms: &[String]| -> Vec<String> {
            terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            exclude_terms: lower(&config.exclude_terms),
            software_terms: lower(&config.software_terms),
            domain_terms: lower(&config.domain_terms),
            min_domain_matches: config.min_domain_matches.max(1),
        }
    }

    pub fn is_relevant(&self, title: &str, body: &str) -> bool {
        self.verdict(title, body).is_relevant()
    }

    pub fn verdict(&self, title: &str, body: &str) -> Verdict {
        let text = format!("{} {}", title, body).to_lowercase();

        if let Some(term) = self.exclude_terms.iter().find(|t| contains_term(&text, t)) {
            return Verdict::Excluded(term.clone());
        }

        if !self.software_terms.iter().any(|t| contains_term(&text, t)) {
            return Verdict::NoSoftwareIndicator;
        }

        let found = self
            .domain_terms
            .iter()
            .filter(|t| contains_term(&text, t))
            .count();
        if found < self.min_domain_matches {
            return Verdict::InsufficientDomainTerms {
                found,
                required: self.min_domain_matches,
            };
        }

        Verdict::Relevant
    }
}

/// Whether `term` occurs in `text` starting at a word boundary.
///
/// Stricter than a plain substring search: short terms such as `api` or
/// `erp` would otherwise match inside `capital` or `enterprise`. Both
/// arguments are expected in lowercase.
fn contains_term(text: &str, term: &str) -> bool {
    text.match_indices(term).any(|(idx, _)| {
        text[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}
