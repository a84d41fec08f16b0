//! Capability event data structure.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Nature of a competitor change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    NewFeature,
    Enhancement,
    Deprecation,
    Limitation,
    Partnership,
    Announcement,
    Other,
    Unspecified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::NewFeature => "new_feature",
            ChangeType::Enhancement => "enhancement",
            ChangeType::Deprecation => "deprecation",
            ChangeType::Limitation => "limitation",
            ChangeType::Partnership => "partnership",
            ChangeType::Announcement => "announcement",
            ChangeType::Other => "other",
            ChangeType::Unspecified => "unspecified",
        }
    }

    /// Lenient parse of a model-produced label.
    ///
    /// Accepts snake_case, spaces or hyphens, and "new capability" as an
    /// alias of `new_feature`. Unknown labels map to `Other`.
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "new_feature" | "new_capability" | "feature" => ChangeType::NewFeature,
            "enhancement" | "improvement" => ChangeType::Enhancement,
            "deprecation" | "deprecated" => ChangeType::Deprecation,
            "limitation" => ChangeType::Limitation,
            "partnership" => ChangeType::Partnership,
            "announcement" => ChangeType::Announcement,
            "unspecified" | "" => ChangeType::Unspecified,
            _ => ChangeType::Other,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional area a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    GeneralLedger,
    RevenueRecognition,
    AccountsPayable,
    AccountsReceivable,
    CloseManagement,
    Consolidation,
    Reporting,
    Automation,
    Ai,
    Integrations,
    Procurement,
    Compliance,
    Platform,
    Other,
    Unspecified,
}

impl Theme {
    const ALL: [Theme; 15] = [
        Theme::GeneralLedger,
        Theme::RevenueRecognition,
        Theme::AccountsPayable,
        Theme::AccountsReceivable,
        Theme::CloseManagement,
        Theme::Consolidation,
        Theme::Reporting,
        Theme::Automation,
        Theme::Ai,
        Theme::Integrations,
        Theme::Procurement,
        Theme::Compliance,
        Theme::Platform,
        Theme::Other,
        Theme::Unspecified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::GeneralLedger => "general_ledger",
            Theme::RevenueRecognition => "revenue_recognition",
            Theme::AccountsPayable => "accounts_payable",
            Theme::AccountsReceivable => "accounts_receivable",
            Theme::CloseManagement => "close_management",
            Theme::Consolidation => "consolidation",
            Theme::Reporting => "reporting",
            Theme::Automation => "automation",
            Theme::Ai => "ai",
            Theme::Integrations => "integrations",
            Theme::Procurement => "procurement",
            Theme::Compliance => "compliance",
            Theme::Platform => "platform",
            Theme::Other => "other",
            Theme::Unspecified => "unspecified",
        }
    }

    /// Comma-separated label list, for prompts.
    pub fn labels() -> String {
        Self::ALL
            .iter()
            .map(Theme::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Lenient parse; unknown labels map to `Other`.
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        if normalized.is_empty() {
            return Theme::Unspecified;
        }
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == normalized)
            .unwrap_or(Theme::Other)
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured record of one observed competitor change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Deterministic identifier; the event store refuses duplicates
    pub id: String,

    pub competitor: String,

    /// Functional area (docs path only)
    #[serde(default)]
    pub theme: Option<Theme>,

    pub change_type: ChangeType,

    /// One sentence describing the change
    pub claim: String,

    /// Three plain-language bullets
    pub summary: [String; 3],

    pub evidence_url: String,

    pub evidence_snippet: String,

    /// Hash of the content the event was derived from
    pub content_hash: String,

    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Format event for display using a template.
    ///
    /// Supported placeholders:
    /// - `{id}`, `{competitor}`, `{theme}`, `{change_type}`, `{claim}`
    /// - `{url}`, `{date}`
    pub fn format(&self, template: &str) -> String {
        let theme = self.theme.map_or("-", |t| t.as_str());
        template
            .replace("{id}", &self.id)
            .replace("{competitor}", &self.competitor)
            .replace("{theme}", theme)
            .replace("{change_type}", self.change_type.as_str())
            .replace("{claim}", &self.claim)
            .replace("{url}", &self.evidence_url)
            .replace("{date}", &self.created_at.format("%Y-%m-%d %H:%M").to_string())
    }
}

/// Derive a stable event id from its identifying parts.
pub fn event_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("evt-{}", &digest[..24])
}
