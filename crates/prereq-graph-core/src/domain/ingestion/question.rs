//! Analyzed questions and their candidate prerequisites
//!
//! The analysis payload is loosely shaped JSON produced upstream. It is
//! parsed once at this boundary into [`CandidatePrerequisite`] values;
//! malformed entries are rejected one by one instead of failing the question.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::curriculum::{LessonId, SubtopicId, TopicId};
use crate::error::{Error, Result};

pub type QuestionId = i64;

/// Analysis pipeline state of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A question as left by the analysis pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedQuestion {
    pub id: QuestionId,
    pub lesson_id: LessonId,
    pub topic_id: Option<TopicId>,
    pub subtopic_id: Option<SubtopicId>,
    pub status: AnalysisStatus,
    /// Raw analysis JSON
    pub payload: Option<String>,
}

/// A validated candidate prerequisite from the analysis payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePrerequisite {
    /// Display label; may be blank
    pub label: String,
    /// Trimmed, non-blank, deduplicated hints
    pub concept_hints: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    label: String,
    #[serde(alias = "concept_hints")]
    concept_hints: Vec<String>,
}

impl From<RawCandidate> for CandidatePrerequisite {
    fn from(raw: RawCandidate) -> Self {
        let mut concept_hints: Vec<String> = Vec::with_capacity(raw.concept_hints.len());
        for hint in raw.concept_hints {
            let hint = hint.trim();
            if !hint.is_empty() && !concept_hints.iter().any(|h| h == hint) {
                concept_hints.push(hint.to_string());
            }
        }
        Self {
            label: raw.label.trim().to_string(),
            concept_hints,
        }
    }
}

/// A payload entry that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub index: usize,
    pub reason: String,
}

/// Result of parsing an analysis payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPayload {
    pub candidates: Vec<CandidatePrerequisite>,
    pub rejected: Vec<RejectedCandidate>,
}

/// Parse the candidate prerequisites out of an analysis payload
///
/// Accepts either `{"prerequisites": [...]}` or a bare array. A payload that
/// is not JSON, or whose list is not an array, is a [`Error::MalformedPayload`].
pub fn parse_payload(raw: &str) -> Result<ParsedPayload> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| Error::MalformedPayload(format!("not valid JSON: {}", e)))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut fields) => match fields.remove("prerequisites") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(Error::MalformedPayload(format!(
                    "'prerequisites' must be an array, found {}",
                    json_kind(&other)
                )));
            }
        },
        other => {
            return Err(Error::MalformedPayload(format!(
                "expected an object or array, found {}",
                json_kind(&other)
            )));
        }
    };

    let mut parsed = ParsedPayload::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<RawCandidate>(entry) {
            Ok(raw) => parsed.candidates.push(raw.into()),
            Err(e) => parsed.rejected.push(RejectedCandidate {
                index,
                reason: e.to_string(),
            }),
        }
    }
    Ok(parsed)
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

/// Read access to analyzed questions
#[async_trait]
pub trait AnalyzedQuestionSource: Send + Sync {
    async fn get_question(&self, id: QuestionId) -> Result<Option<AnalyzedQuestion>>;

    /// IDs of completed questions that have a topic, ascending
    async fn list_analyzed_question_ids(&self) -> Result<Vec<QuestionId>>;
}
