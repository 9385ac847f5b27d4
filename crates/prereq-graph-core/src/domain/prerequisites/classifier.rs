//! Lifecycle classification for new prerequisite nodes
//!
//! Pure and synchronous. Rules are applied in order and the first match wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::domain::concepts::{Concept, key_tokens, normalize_key};

use super::entity::PrerequisiteStatus;

pub const REASON_OUTSIDE_SCOPE: &str = "outside scope";
pub const REASON_NO_HINTS: &str = "no concept hints provided";
pub const REASON_UNMAPPED: &str = "could not map to existing concepts";
pub const REASON_GENERIC: &str = "overly generic or ambiguous label";
pub const REASON_MULTI_CONCEPT_UNCLEAR: &str = "multiple concepts but label unclear";
pub const REASON_TOO_SHORT: &str = "label too short";
pub const REASON_COUNT_MISMATCH: &str = "hint/concept count mismatch";

/// Clinical and treatment vocabulary, matched against the normalized label
static CLINICAL_DENYLIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(tedavi\w*|treatments?|therap\w*|tani(si|da|lar\w*)?|diagnos\w*|ilac\w*|drugs?|medications?|doz(u|lar\w*)?|dos(e|es|age)|prognoz\w*|prognosis|farmakoloji\w*|pharmacolog\w*|endikasyon\w*|kontrendikasyon\w*|indications?|contraindications?|komplikasyon\w*|complications?)\b",
    )
    .expect("denylist pattern is valid")
});

/// Whole-label patterns that carry no specific anatomical content
static GENERIC_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(sinir seyri|nerve course|course nerve|genel anatomi|general anatomy|anatomi|anatomy|temel kavramlar|basic concepts|genel bilgiler|general information)$",
    )
    .expect("generic label pattern is valid")
});

/// Minimum token length for a shared word to count as a lexical reference
const MIN_SHARED_TOKEN_LEN: usize = 3;

/// Outcome of classifying a candidate node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: PrerequisiteStatus,
    pub review_reason: Option<String>,
}

impl Classification {
    fn active() -> Self {
        Self {
            status: PrerequisiteStatus::Active,
            review_reason: None,
        }
    }

    fn review(reason: &str) -> Self {
        Self {
            status: PrerequisiteStatus::NeedsReview,
            review_reason: Some(reason.to_string()),
        }
    }

    fn deprecated(reason: &str) -> Self {
        Self {
            status: PrerequisiteStatus::Deprecated,
            review_reason: Some(reason.to_string()),
        }
    }
}

/// Decides status and review reason for a candidate prerequisite
#[derive(Debug, Clone, Copy, Default)]
pub struct PrerequisiteClassifier {
    config: ClassifierConfig,
}

impl PrerequisiteClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a label given its hints and the concepts they resolved to
    pub fn classify(&self, label: &str, concept_hints: &[String], resolved: &[Concept]) -> Classification {
        let normalized = normalize_key(label);
        let hint_count = concept_hints.iter().filter(|h| !h.trim().is_empty()).count();

        if CLINICAL_DENYLIST.is_match(&normalized) {
            return Classification::deprecated(REASON_OUTSIDE_SCOPE);
        }
        if hint_count == 0 {
            return Classification::review(REASON_NO_HINTS);
        }
        if resolved.is_empty() {
            return Classification::review(REASON_UNMAPPED);
        }
        if GENERIC_LABEL.is_match(&normalized) {
            return Classification::review(REASON_GENERIC);
        }
        if resolved.len() > 1 && !resolved.iter().all(|c| references_concept(&normalized, c)) {
            return Classification::review(REASON_MULTI_CONCEPT_UNCLEAR);
        }
        if normalized.chars().count() < self.config.min_label_len {
            return Classification::review(REASON_TOO_SHORT);
        }
        if hint_count.saturating_sub(resolved.len()) > self.config.hint_mismatch_margin {
            return Classification::review(REASON_COUNT_MISMATCH);
        }

        Classification::active()
    }
}

/// Whether a normalized label mentions a concept
///
/// Either the concept's whole key appears in the label, or the two share a
/// word of at least three characters.
fn references_concept(normalized_label: &str, concept: &Concept) -> bool {
    let concept_key = normalize_key(&concept.preferred_label);
    if concept_key.is_empty() {
        return false;
    }
    if normalized_label.contains(&concept_key) {
        return true;
    }

    key_tokens(&concept_key)
        .filter(|token| token.chars().count() >= MIN_SHARED_TOKEN_LEN)
        .any(|token| key_tokens(normalized_label).any(|word| word == token))
}
