//! Concept registry access and hint resolution
//!
//! The concept registry is owned elsewhere. This module normalizes free-text
//! hints, looks them up through [`ConceptRepository`], and follows merge
//! redirects to the surviving canonical concept.

mod entity;
mod normalize;
mod repository;
mod resolver;

pub use entity::{Concept, ConceptId, ConceptMatch, ConceptStatus, MatchKind};
pub use normalize::{fold_case_and_diacritics, key_tokens, lookup_keys, normalize_key};
pub use repository::ConceptRepository;
pub use resolver::ConceptResolver;
