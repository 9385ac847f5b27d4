//! Unresolved concept hints
//!
//! A hint that resolves to no concept is not an error. It is recorded here,
//! deduplicated per (normalized hint, topic, subtopic), and queued for a
//! reviewer who can resolve it (after adding an alias or concept) or ignore it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::curriculum::{LessonId, SubtopicId, TopicId};
use crate::domain::ingestion::QuestionId;
use crate::error::Result;

pub type HintId = i64;

/// Review status of an unresolved hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintStatus {
    Pending,
    Resolved,
    Ignored,
}

impl HintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "resolved" => Some(Self::Resolved),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }
}

impl std::fmt::Display for HintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded resolution failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedConceptHint {
    pub id: HintId,
    pub hint: String,
    pub normalized_hint: String,
    pub question_id: Option<QuestionId>,
    pub lesson_id: Option<LessonId>,
    pub topic_id: TopicId,
    pub subtopic_id: Option<SubtopicId>,
    pub occurrence_count: i64,
    pub status: HintStatus,
    pub resolution_note: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// A failure to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedHintReport {
    pub hint: String,
    pub question_id: Option<QuestionId>,
    pub lesson_id: Option<LessonId>,
    pub topic_id: TopicId,
    pub subtopic_id: Option<SubtopicId>,
}

/// Deduplication key: normalized hint plus topic and subtopic scope
pub fn scope_key(normalized_hint: &str, topic_id: TopicId, subtopic_id: Option<SubtopicId>) -> String {
    format!(
        "{}::{}::{}",
        normalized_hint,
        topic_id,
        subtopic_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
    )
}

/// Listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintFilter {
    pub status: Option<HintStatus>,
    pub topic_id: Option<TopicId>,
    pub limit: Option<usize>,
}

/// Sink and review queue for unresolved hints
#[async_trait]
pub trait UnresolvedHintRepository: Send + Sync {
    /// Create the scoped record or bump its count
    ///
    /// Ignored records are left untouched; resolved records that fail again
    /// are reopened as pending. Returns `None` when the hint normalizes to
    /// nothing.
    async fn record_unresolved_hint(
        &self,
        report: &UnresolvedHintReport,
    ) -> Result<Option<UnresolvedConceptHint>>;

    async fn get_hint(&self, id: HintId) -> Result<Option<UnresolvedConceptHint>>;

    /// Most frequent first
    async fn list_hints(&self, filter: &HintFilter) -> Result<Vec<UnresolvedConceptHint>>;

    async fn set_hint_status(
        &self,
        id: HintId,
        status: HintStatus,
        note: Option<&str>,
    ) -> Result<UnresolvedConceptHint>;
}
