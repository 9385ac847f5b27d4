//! Concept registry types
//!
//! Concepts are canonical anatomical or medical terms. They are created and
//! edited by the concept registry; the graph engine only reads them and
//! follows their merge redirects.

use serde::{Deserialize, Serialize};

/// Identifier of a concept in the registry
pub type ConceptId = i64;

/// A canonical domain term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub preferred_label: String,
    /// Unique normalization key of the preferred label
    pub normalized_label: String,
    pub status: ConceptStatus,
    /// Canonical concept this one was folded into (set iff status is Merged)
    pub merged_into: Option<ConceptId>,
}

impl Concept {
    /// Whether the concept can be returned from resolution as-is
    pub fn is_resolvable(&self) -> bool {
        self.status.is_resolvable()
    }
}

/// Lifecycle status of a concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptStatus {
    Active,
    NeedsReview,
    Merged,
}

impl ConceptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::NeedsReview => "needs_review",
            Self::Merged => "merged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "needs_review" => Some(Self::NeedsReview),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }

    /// Active and needs-review concepts are eligible resolution targets
    pub fn is_resolvable(&self) -> bool {
        matches!(self, Self::Active | Self::NeedsReview)
    }
}

impl std::fmt::Display for ConceptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a lookup key matched a concept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The key equals the concept's normalized label
    Label,
    /// The key equals one of the concept's active aliases
    Alias,
}

/// A registry hit for a lookup key
#[derive(Debug, Clone)]
pub struct ConceptMatch {
    pub concept: Concept,
    pub kind: MatchKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(ConceptStatus::parse("active"), Some(ConceptStatus::Active));
        assert_eq!(ConceptStatus::parse("NEEDS_REVIEW"), Some(ConceptStatus::NeedsReview));
        assert_eq!(ConceptStatus::parse("merged"), Some(ConceptStatus::Merged));
        assert_eq!(ConceptStatus::parse("retired"), None);
    }

    #[test]
    fn test_resolvable_statuses() {
        assert!(ConceptStatus::Active.is_resolvable());
        assert!(ConceptStatus::NeedsReview.is_resolvable());
        assert!(!ConceptStatus::Merged.is_resolvable());
    }
}
