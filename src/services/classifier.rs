//! Event classification.
//!
//! Turns a changed chunk (or a search hit) into a capability [`Event`].
//! Content must first pass the keyword relevance gate. When a generative
//! backend is configured it is asked for a structured JSON answer; any
//! refusal, timeout or malformed answer falls back to keyword heuristics, so
//! relevant content always yields an event unless the model explicitly
//! judged it off-topic.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::time::{Duration, Instant};

use crate::models::{ChangeType, ClassifierConfig, Event, Theme};
use crate::services::generative::{Generation, GenerationParams, GenerativeBackend};
use crate::services::relevance::{RelevanceFilter, Verdict};
use crate::utils::{normalize_whitespace, truncate_graphemes};

/// Which ingestion path produced the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPath {
    /// Changed chunk of a crawled documentation page
    Docs,
    /// Search-API hit
    Search,
}

/// Everything the classifier needs to know about one piece of content.
#[derive(Debug, Clone)]
pub struct ClassifyRequest<'a> {
    pub path: IngestPath,
    /// Event id to assign
    pub id: String,
    pub competitor: &'a str,
    /// Source kind (docs) or competitor category (search), for the prompt
    pub context: &'a str,
    pub url: &'a str,
    /// Chunk heading or hit title
    pub title: &'a str,
    pub body: &'a str,
    pub content_hash: &'a str,
}

/// Why no event was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Irrelevant(Verdict),
    /// The model judged the content off-topic
    OffTopic,
    /// Too little content to classify
    TooShort,
    /// The backend refused to answer
    Blocked(String),
    /// The answer was empty or not the expected JSON
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyOutcome {
    Classified(Event),
    Skipped(SkipReason),
}

/// Classification fields of an event, before identity and evidence are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub theme: Option<Theme>,
    pub change_type: ChangeType,
    pub claim: String,
    pub summary: [String; 3],
}

/// Result of the generative step alone.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerativeOutcome {
    Draft(EventDraft),
    Skipped(SkipReason),
    /// No backend, deadline exhausted, timeout or transport error
    BackendUnavailable,
}

const NEW_FEATURE_TERMS: &[&str] = &["launch", "introduce", "new", "release", "unveil"];
const ENHANCEMENT_TERMS: &[&str] = &["update", "improve", "enhance", "upgrade"];
const DEPRECATION_TERMS: &[&str] = &["deprecat", "sunset", "end of life", "discontinue"];
const PARTNERSHIP_TERMS: &[&str] = &["partner", "acquisition", "acquire", "merge"];

#[derive(Clone)]
pub struct EventClassifier {
    backend: Option<Arc<dyn GenerativeBackend>>,
    relevance: RelevanceFilter,
    config: ClassifierConfig,
    /// Search hits with less content than this are skipped
    min_content_chars: usize,
    /// Generative calls stop once this passes
    deadline: Option<Instant>,
}

impl EventClassifier {
    pub fn new(
        config: &ClassifierConfig,
        relevance: RelevanceFilter,
        backend: Option<Arc<dyn GenerativeBackend>>,
    ) -> Self {
        Self {
            backend,
            relevance,
            config: config.clone(),
            min_content_chars: 0,
            deadline: None,
        }
    }

    pub fn with_min_content_chars(mut self, min_content_chars: usize) -> Self {
        self.min_content_chars = min_content_chars;
        self
    }

    /// Copy of this classifier whose generative budget starts now.
    pub fn for_run(&self) -> Self {
        let mut classifier = self.clone();
        classifier.deadline =
            Some(Instant::now() + Duration::from_secs(self.config.run_budget_secs));
        classifier
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn relevance(&self) -> &RelevanceFilter {
        &self.relevance
    }

    pub async fn classify(&self, request: &ClassifyRequest<'_>) -> ClassifyOutcome {
        if request.path == IngestPath::Search
            && request.body.trim().chars().count() < self.min_content_chars
        {
            return ClassifyOutcome::Skipped(SkipReason::TooShort);
        }

        let verdict = self.relevance.verdict(request.title, request.body);
        if !verdict.is_relevant() {
            log::debug!("[{}] irrelevant: {:?}", request.url, verdict);
            return ClassifyOutcome::Skipped(SkipReason::Irrelevant(verdict));
        }

        let draft = match self.generate(request).await {
            GenerativeOutcome::Draft(draft) => draft,
            GenerativeOutcome::Skipped(SkipReason::OffTopic) => {
                log::debug!("[{}] judged off-topic by model", request.url);
                return ClassifyOutcome::Skipped(SkipReason::OffTopic);
            }
            GenerativeOutcome::Skipped(reason) => {
                log::debug!("[{}] generative answer unusable: {:?}", request.url, reason);
                self.fallback(request)
            }
            GenerativeOutcome::BackendUnavailable => self.fallback(request),
        };

        ClassifyOutcome::Classified(self.build_event(request, draft))
    }

    /// Ask the backend for a draft.
    pub async fn generate(&self, request: &ClassifyRequest<'_>) -> GenerativeOutcome {
        let Some(backend) = &self.backend else {
            return GenerativeOutcome::BackendUnavailable;
        };

        let mut params = GenerationParams::from_config(&self.config);
        if let Some(deadline) = self.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::debug!("Generative budget exhausted; using fallback for {}", request.url);
                return GenerativeOutcome::BackendUnavailable;
            }
            params.timeout = params.timeout.min(remaining);
        }

        let prompt = self.prompt(request);
        let generation =
            match tokio::time::timeout(params.timeout, backend.generate(&prompt, &params)).await {
                Ok(Ok(generation)) => generation,
                Ok(Err(e)) => {
                    log::warn!("Generative backend failed for {}: {}", request.url, e);
                    return GenerativeOutcome::BackendUnavailable;
                }
                Err(_) => {
                    log::warn!("Generative backend timed out for {}", request.url);
                    return GenerativeOutcome::BackendUnavailable;
                }
            };

        match generation {
            Generation::Blocked(reason) => GenerativeOutcome::Skipped(SkipReason::Blocked(reason)),
            Generation::Text(text) => match parse_draft(&text, request) {
                Ok(draft) => GenerativeOutcome::Draft(draft),
                Err(reason) => GenerativeOutcome::Skipped(reason),
            },
        }
    }

    /// Keyword-only classification.
    pub fn fallback(&self, request: &ClassifyRequest<'_>) -> EventDraft {
        let text = format!("{} {}", request.title, request.body).to_lowercase();
        let change_type = fallback_change_type(&text, request.path);
        let title = normalize_whitespace(request.title);

        match request.path {
            IngestPath::Docs => {
                let sentence = first_sentence(request.body);
                let raw_claim = if sentence.is_empty() { &title } else { &sentence };
                EventDraft {
                    theme: Some(Theme::Unspecified),
                    change_type,
                    claim: self.claim(raw_claim, request),
                    summary: [
                        format!(
                            "{} has changed something related to \"{}\".",
                            request.competitor, title
                        ),
                        "This affects how their ERP product behaves or is positioned.".to_string(),
                        "Check the linked documentation for exact behavior and limitations."
                            .to_string(),
                    ],
                }
            }
            IngestPath::Search => {
                let raw_claim = if title.is_empty() {
                    first_sentence(request.body)
                } else {
                    title.clone()
                };
                EventDraft {
                    theme: None,
                    change_type,
                    claim: self.claim(&raw_claim, request),
                    summary: [
                        format!("{} announced: {}", request.competitor, title),
                        "This is a recent update from the competitor.".to_string(),
                        "Check the linked article for full details.".to_string(),
                    ],
                }
            }
        }
    }

    fn claim(&self, raw: &str, request: &ClassifyRequest<'_>) -> String {
        let raw = normalize_whitespace(raw);
        if raw.is_empty() {
            let placeholder = format!("{} published an update", request.competitor);
            return finalize_claim(&placeholder, self.config.max_claim_chars);
        }
        finalize_claim(&raw, self.config.max_claim_chars)
    }

    fn build_event(&self, request: &ClassifyRequest<'_>, draft: EventDraft) -> Event {
        Event {
            id: request.id.clone(),
            competitor: request.competitor.to_string(),
            theme: draft.theme,
            change_type: draft.change_type,
            claim: finalize_claim(&draft.claim, self.config.max_claim_chars),
            summary: draft.summary,
            evidence_url: truncate_graphemes(request.url, self.config.max_evidence_url_chars),
            evidence_snippet: truncate_graphemes(request.body.trim(), self.config.max_snippet_chars),
            content_hash: request.content_hash.to_string(),
            created_at: Utc::now(),
        }
    }

    fn prompt(&self, request: &ClassifyRequest<'_>) -> String {
        let excerpt = truncate_graphemes(request.body.trim(), self.config.excerpt_chars);
        match request.path {
            IngestPath::Docs => format!(
                r#"You review release notes and product documentation published by ERP vendors.
Readers are engineers who may not have an accounting background.

Classify the changed section below for an internal capability change feed.
If it does not describe a product capability relevant to ERP or accounting, answer with null.
Otherwise answer with one JSON object with exactly these keys:
- "theme": one of [{themes}]
- "change_type": one of ["new_feature", "enhancement", "deprecation", "limitation", "other"]
- "claim": one precise sentence stating what the vendor changed
- "summary": an array of exactly 3 plain-language bullets (what it means, why it matters, competitive insight)
Explain accounting jargon briefly in parentheses.

Competitor: {competitor}
Source type: {context}
Page URL: {url}
Section heading: {title}

Changed text:
"""{excerpt}""""#,
                themes = Theme::labels(),
                competitor = request.competitor,
                context = request.context,
                url = request.url,
                title = request.title,
                excerpt = excerpt,
            ),
            IngestPath::Search => format!(
                r#"You track product news about ERP and accounting software vendors.

Decide whether the article below describes a change to {competitor}'s ERP or accounting software.
Answer null for consumer banking, market or earnings news, security incidents, training courses or any other off-topic content.
Otherwise answer with one JSON object with exactly these keys:
- "change_type": one of ["new_feature", "enhancement", "deprecation", "partnership", "announcement", "other"]
- "claim": one sentence stating what changed
- "summary": an array of exactly 3 plain-language bullets for engineers new to ERP

Competitor: {competitor} ({context})
Title: {title}
URL: {url}

Content:
"""{excerpt}""""#,
                competitor = request.competitor,
                context = request.context,
                title = request.title,
                url = request.url,
                excerpt = excerpt,
            ),
        }
    }
}

/// Parse a model answer into a draft.
fn parse_draft(raw: &str, request: &ClassifyRequest<'_>) -> Result<EventDraft, SkipReason> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(SkipReason::Malformed("empty answer".to_string()));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| SkipReason::Malformed(format!("invalid JSON: {}", e)))?;

    let object = match value {
        Value::Null => return Err(SkipReason::OffTopic),
        Value::Object(object) => object,
        other => {
            return Err(SkipReason::Malformed(format!(
                "expected object, got {}",
                json_kind(&other)
            )));
        }
    };

    let claim = string_field(&object, "claim")
        .ok_or_else(|| SkipReason::Malformed("missing claim".to_string()))?;

    let change_type = match string_field(&object, "change_type") {
        Some(label) => ChangeType::parse(&label),
        None => match request.path {
            IngestPath::Docs => ChangeType::Unspecified,
            IngestPath::Search => ChangeType::Announcement,
        },
    };

    let theme = match request.path {
        IngestPath::Docs => Some(
            string_field(&object, "theme")
                .map(|t| Theme::parse(&t))
                .unwrap_or(Theme::Unspecified),
        ),
        IngestPath::Search => None,
    };

    let summary = summary_field(&object, request.competitor)?;

    Ok(EventDraft {
        theme,
        change_type,
        claim,
        summary,
    })
}

/// Remove an optional markdown code fence around the answer.
fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text;
    }
    let inner = text.trim_matches('`').trim();
    match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => inner[4..].trim(),
        _ => inner,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(normalize_whitespace)
        .filter(|s| !s.is_empty())
}

/// Exactly three bullets from `summary` (or `beginner_summary`).
///
/// The raw array must hold at least three entries; blank entries are dropped
/// and, if at least one survives, the rest is padded.
fn summary_field(object: &Map<String, Value>, competitor: &str) -> Result<[String; 3], SkipReason> {
    let items = object
        .get("summary")
        .or_else(|| object.get("beginner_summary"))
        .and_then(Value::as_array)
        .ok_or_else(|| SkipReason::Malformed("missing summary".to_string()))?;

    if items.len() < 3 {
        return Err(SkipReason::Malformed(format!(
            "summary has {} entries",
            items.len()
        )));
    }

    let mut bullets: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(normalize_whitespace)
        .filter(|s| !s.is_empty())
        .take(3)
        .collect();

    if bullets.is_empty() {
        return Err(SkipReason::Malformed("summary has no text".to_string()));
    }

    while bullets.len() < 3 {
        bullets.push(format!(
            "See the linked evidence for more details about this {} update.",
            competitor
        ));
    }

    let [a, b, c]: [String; 3] = bullets
        .try_into()
        .map_err(|_| SkipReason::Malformed("summary length".to_string()))?;
    Ok([a, b, c])
}

/// Change type from keyword presence, in priority order.
fn fallback_change_type(text: &str, path: IngestPath) -> ChangeType {
    let has = |terms: &[&str]| terms.iter().any(|t| text.contains(t));

    if has(NEW_FEATURE_TERMS) {
        ChangeType::NewFeature
    } else if has(ENHANCEMENT_TERMS) {
        ChangeType::Enhancement
    } else if has(DEPRECATION_TERMS) {
        ChangeType::Deprecation
    } else if path == IngestPath::Search && has(PARTNERSHIP_TERMS) {
        ChangeType::Partnership
    } else if path == IngestPath::Search {
        ChangeType::Announcement
    } else {
        ChangeType::Unspecified
    }
}

/// Text up to and including the first sentence terminator followed by a space.
fn first_sentence(body: &str) -> String {
    let body = normalize_whitespace(body);
    let end = [". ", "! ", "? "]
        .iter()
        .filter_map(|sep| body.find(sep))
        .min();
    match end {
        Some(idx) => body[..=idx].to_string(),
        None => body,
    }
}

/// Bound a claim to `max` graphemes, ending with a period.
fn finalize_claim(raw: &str, max: usize) -> String {
    const SENTENCE_END: [char; 3] = ['.', '!', '?'];

    let trimmed = raw.trim();
    if trimmed.ends_with(SENTENCE_END) && trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let mut claim = truncate_graphemes(trimmed.trim_end_matches('.'), max.saturating_sub(1));
    claim.truncate(claim.trim_end().len());
    if !claim.ends_with(SENTENCE_END) {
        claim.push('.');
    }
    claim
}
