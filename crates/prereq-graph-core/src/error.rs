//! Error types for prereq-graph

use thiserror::Error;

/// Result type alias using prereq-graph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// prereq-graph error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Not-found errors (E001-E099)
    #[error("Prerequisite '{0}' not found. Run `prereq-graph list` to see all prerequisites.")]
    PrerequisiteNotFound(i64),

    #[error("Concept '{0}' not found in the concept registry.")]
    ConceptNotFound(i64),

    #[error("Topic '{0}' not found in the topic registry.")]
    TopicNotFound(i64),

    #[error("Question '{0}' not found.")]
    QuestionNotFound(i64),

    #[error("Unresolved hint '{0}' not found. Run `prereq-graph hints list` to see pending hints.")]
    HintNotFound(i64),

    // Validation errors (E100-E199)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot merge prerequisite '{0}' into itself")]
    SelfMerge(i64),

    #[error("Prerequisite '{0}' is not a label-only node awaiting review")]
    NotLabelOnly(i64),

    #[error("Canonical key '{key}' already belongs to prerequisite '{existing_id}'")]
    CanonicalKeyConflict { key: String, existing_id: i64 },

    // Integrity errors (E200-E299)
    #[error("Concept merge redirect cycle detected starting at concept '{0}'")]
    ConceptRedirectCycle(i64),

    #[error("Malformed analysis payload: {0}")]
    MalformedPayload(String),

    // Storage errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Operation '{operation}' gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Operation '{0}' timed out")]
    Timeout(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::PrerequisiteNotFound(_) => "E001",
            Self::ConceptNotFound(_) => "E002",
            Self::TopicNotFound(_) => "E003",
            Self::QuestionNotFound(_) => "E004",
            Self::HintNotFound(_) => "E005",
            Self::InvalidInput(_) => "E100",
            Self::SelfMerge(_) => "E101",
            Self::NotLabelOnly(_) => "E102",
            Self::CanonicalKeyConflict { .. } => "E103",
            Self::ConceptRedirectCycle(_) => "E200",
            Self::MalformedPayload(_) => "E201",
            Self::DatabaseError(_) => "E400",
            Self::RetriesExhausted { .. } => "E401",
            Self::Timeout(_) => "E402",
            Self::ConfigError(_) => "E600",
            Self::Serialization(_) | Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::PrerequisiteNotFound(_) => Some("prereq-graph list".to_string()),
            Self::HintNotFound(_) => Some("prereq-graph hints list".to_string()),
            Self::NotLabelOnly(id) => Some(format!("prereq-graph link {} --concepts <ids>", id)),
            Self::CanonicalKeyConflict { existing_id, .. } => Some(format!(
                "prereq-graph merge <ids> --target-id {}",
                existing_id
            )),
            Self::RetriesExhausted { .. } | Self::Timeout(_) => {
                Some("Retry later; another writer is holding the database".to_string())
            }
            Self::ConfigError(_) => Some("prereq-graph config list".to_string()),
            _ => None,
        }
    }

    /// Whether the error is a validation failure that should be surfaced without retry
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::SelfMerge(_)
                | Self::NotLabelOnly(_)
                | Self::CanonicalKeyConflict { .. }
        )
    }

    /// Whether the error refers to a missing row
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PrerequisiteNotFound(_)
                | Self::ConceptNotFound(_)
                | Self::TopicNotFound(_)
                | Self::QuestionNotFound(_)
                | Self::HintNotFound(_)
        )
    }

    /// Whether retrying the same operation may succeed
    ///
    /// SQLite reports lock contention as SQLITE_BUSY (5) or SQLITE_LOCKED (6),
    /// including their extended codes (e.g. 517 = BUSY_SNAPSHOT).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::DatabaseError(sqlx::Error::Database(db_err)) => {
                let primary_code = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                matches!(primary_code, Some(5) | Some(6))
                    || db_err.message().contains("database is locked")
            }
            Self::DatabaseError(sqlx::Error::PoolTimedOut) => true,
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::PrerequisiteNotFound(1).code(), "E001");
        assert_eq!(Error::SelfMerge(1).code(), "E101");
        assert_eq!(Error::ConceptRedirectCycle(3).code(), "E200");
        assert_eq!(Error::Other("x".into()).code(), "E9999");
    }

    #[test]
    fn test_classification_helpers() {
        assert!(Error::InvalidInput("empty".into()).is_validation());
        assert!(Error::NotLabelOnly(4).is_validation());
        assert!(!Error::PrerequisiteNotFound(4).is_validation());
        assert!(Error::QuestionNotFound(9).is_not_found());
        assert!(Error::Timeout("ingest".into()).is_transient());
        assert!(!Error::InvalidInput("x".into()).is_transient());
        assert!(Error::DatabaseError(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!Error::DatabaseError(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn test_suggestions() {
        let err = Error::CanonicalKeyConflict {
            key: "CONCEPT::1|2".into(),
            existing_id: 12,
        };
        assert_eq!(
            err.suggestion().as_deref(),
            Some("prereq-graph merge <ids> --target-id 12")
        );
        assert!(Error::MalformedPayload("x".into()).suggestion().is_none());
    }
}
