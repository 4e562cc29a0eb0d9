//! Core domain types for ControlQA.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

/// A fully resolved `(Family, ControlID)` pair, e.g. `AC` / `2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlIdentifier {
    pub family: String,
    pub control_id: String,
}

impl ControlIdentifier {
    pub fn new(family: impl Into<String>, control_id: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            control_id: control_id.into(),
        }
    }
}

impl std::fmt::Display for ControlIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.family, self.control_id)
    }
}

/// A control as persisted in the document store.
///
/// Field names follow the store's document shape so import files can be
/// exported from it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDocument {
    #[serde(rename = "Family")]
    pub family: String,
    #[serde(rename = "ControlID")]
    pub control_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    /// Newline-separated question text as generated upstream.
    #[serde(rename = "GeneratedQuestions", default)]
    pub generated_questions: String,
}

/// A control resolved for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRecord {
    /// Human-readable control name, e.g. "Access Control".
    pub name: String,
    /// Questions to answer, blank lines removed, in stored order.
    pub generated_questions: Vec<String>,
}

impl From<&ControlDocument> for ControlRecord {
    fn from(doc: &ControlDocument) -> Self {
        Self {
            name: doc.name.clone(),
            generated_questions: split_questions(&doc.generated_questions),
        }
    }
}

/// Split newline-separated question text into trimmed, non-empty questions.
pub fn split_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Retrieval and answers
// ---------------------------------------------------------------------------

/// One ranked document returned by the search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
    pub score: f64,
}

/// A synthesized answer to one generated question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question: String,
    pub answer: String,
    /// Citation list for the hits the answer was grounded on.
    pub source_list: String,
}

/// A prior chat message forwarded by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for audit record identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(pub Uuid);

impl AuditId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AuditId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The response of one pipeline invocation, written once and never read back
/// by the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: AuditId::new(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
