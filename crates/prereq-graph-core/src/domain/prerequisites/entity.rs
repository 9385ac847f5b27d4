//! Prerequisite graph entities
//!
//! A prerequisite is a unit of background knowledge. It is either
//! concept-backed (identified by its sorted concept-id set) or label-only
//! (identified by its normalized label, always awaiting review).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::concepts::{ConceptId, normalize_key};
use crate::domain::curriculum::{SubtopicId, TopicId};
use crate::error::{Error, Result};

/// Identifier of a prerequisite node
pub type PrerequisiteId = i64;

/// Prefix of canonical keys derived from a concept-id set
pub const CONCEPT_KEY_PREFIX: &str = "CONCEPT::";

/// Prefix of canonical keys derived from a normalized label
pub const LABEL_ONLY_KEY_PREFIX: &str = "LABEL_ONLY::";

/// Review reason for nodes created without any concept
pub const LABEL_ONLY_REASON: &str = "label-only, no concepts";

/// Review reason for reviewer deprecation
pub const DEPRECATED_BY_REVIEWER_REASON: &str = "deprecated by reviewer";

/// Deterministic identity of a prerequisite node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Key for a concept-backed node: distinct IDs sorted ascending, `|`-joined
    ///
    /// The key is invariant under permutation and duplication of the input.
    pub fn for_concepts(concept_ids: &[ConceptId]) -> Result<Self> {
        let mut ids = concept_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        if ids.is_empty() {
            return Err(Error::InvalidInput(
                "A concept-backed prerequisite needs at least one concept".to_string(),
            ));
        }

        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self(format!("{}{}", CONCEPT_KEY_PREFIX, joined)))
    }

    /// Key for a label-only node
    pub fn for_label(raw_label: &str) -> Result<Self> {
        let normalized = normalize_key(raw_label);
        if normalized.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Label '{}' is empty after normalization",
                raw_label
            )));
        }
        Ok(Self(format!("{}{}", LABEL_ONLY_KEY_PREFIX, normalized)))
    }

    /// Wrap a key read back from storage
    pub fn from_stored(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_label_only(&self) -> bool {
        self.0.starts_with(LABEL_ONLY_KEY_PREFIX)
    }

    pub fn is_concept_backed(&self) -> bool {
        self.0.starts_with(CONCEPT_KEY_PREFIX)
    }
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a prerequisite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteStatus {
    Active,
    NeedsReview,
    Deprecated,
}

impl PrerequisiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::NeedsReview => "needs_review",
            Self::Deprecated => "deprecated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "active" => Some(Self::Active),
            "needs_review" => Some(Self::NeedsReview),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrerequisiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A prerequisite node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prerequisite {
    pub id: PrerequisiteId,
    pub canonical_key: CanonicalKey,
    /// System-normalized name
    pub name: String,
    /// Human-facing label
    pub display_name: String,
    pub status: PrerequisiteStatus,
    pub review_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prerequisite {
    pub fn is_label_only(&self) -> bool {
        self.canonical_key.is_label_only()
    }

    /// Whether a reviewer may upgrade this node by supplying concepts
    pub fn is_awaiting_concepts(&self) -> bool {
        self.is_label_only() && self.status == PrerequisiteStatus::NeedsReview
    }
}

/// Values for a node about to be created
#[derive(Debug, Clone)]
pub struct NewPrerequisite {
    pub canonical_key: CanonicalKey,
    pub name: String,
    pub display_name: String,
    pub status: PrerequisiteStatus,
    pub review_reason: Option<String>,
}

impl NewPrerequisite {
    /// A label-only node; always NEEDS_REVIEW regardless of any classification
    pub fn label_only(raw_label: &str) -> Result<Self> {
        let canonical_key = CanonicalKey::for_label(raw_label)?;
        Ok(Self {
            canonical_key,
            name: normalize_key(raw_label),
            display_name: raw_label.trim().to_string(),
            status: PrerequisiteStatus::NeedsReview,
            review_reason: Some(LABEL_ONLY_REASON.to_string()),
        })
    }
}

/// Strength tier of a topic edge, derived from its frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
}

impl Strength {
    pub const ALL: [Strength; 3] = [Strength::Strong, Strength::Medium, Strength::Weak];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "weak" => Some(Self::Weak),
            "medium" => Some(Self::Medium),
            "strong" => Some(Self::Strong),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What last wrote an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Ingestion,
    AdminMerge,
    AdminUpgrade,
}

impl EdgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::AdminMerge => "admin_merge",
            Self::AdminUpgrade => "admin_upgrade",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ingestion" => Some(Self::Ingestion),
            "admin_merge" => Some(Self::AdminMerge),
            "admin_upgrade" => Some(Self::AdminUpgrade),
            _ => None,
        }
    }
}

/// A Prerequisite→Topic edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteTopicEdge {
    pub prerequisite_id: PrerequisiteId,
    pub topic_id: TopicId,
    pub subtopic_id: Option<SubtopicId>,
    pub frequency: i64,
    pub strength: Strength,
    pub source: EdgeSource,
    pub last_updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concept_key_is_permutation_invariant() {
        let a = CanonicalKey::for_concepts(&[42, 7, 19]).unwrap();
        let b = CanonicalKey::for_concepts(&[19, 42, 7, 7]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "CONCEPT::7|19|42");
        assert!(a.is_concept_backed());
        assert!(!a.is_label_only());
    }

    #[test]
    fn test_concept_key_sorts_numerically() {
        let key = CanonicalKey::for_concepts(&[10, 9, 100]).unwrap();
        assert_eq!(key.as_str(), "CONCEPT::9|10|100");
    }

    #[test]
    fn test_empty_concept_set_rejected() {
        assert!(matches!(
            CanonicalKey::for_concepts(&[]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_label_key() {
        let key = CanonicalKey::for_label("  Göz Kasları ").unwrap();
        assert_eq!(key.as_str(), "LABEL_ONLY::goz kaslari");
        assert!(key.is_label_only());
        assert!(CanonicalKey::for_label(" - ").is_err());
    }

    #[test]
    fn test_label_only_node_is_never_active() {
        let node = NewPrerequisite::label_only("Orbita duvarları").unwrap();
        assert_eq!(node.status, PrerequisiteStatus::NeedsReview);
        assert_eq!(node.review_reason.as_deref(), Some(LABEL_ONLY_REASON));
        assert_eq!(node.name, "orbita duvarlari");
        assert_eq!(node.display_name, "Orbita duvarları");
    }

    #[test]
    fn test_strength_ordering() {
        assert!(Strength::Strong > Strength::Medium);
        assert!(Strength::Medium > Strength::Weak);
        assert_eq!(Strength::parse("STRONG"), Some(Strength::Strong));
    }

    #[test]
    fn test_status_parse_accepts_hyphen() {
        assert_eq!(
            PrerequisiteStatus::parse("needs-review"),
            Some(PrerequisiteStatus::NeedsReview)
        );
        assert_eq!(PrerequisiteStatus::parse("merged"), None);
    }
}
