//! Repository trait for concept registry lookups
//!
//! The registry is owned by another subsystem; the graph engine needs only
//! these read operations.

use async_trait::async_trait;

use crate::error::Result;

use super::entity::{Concept, ConceptId, ConceptMatch};

/// Read access to the concept/alias registry
#[async_trait]
pub trait ConceptRepository: Send + Sync {
    /// Find concepts whose normalized label or an active alias equals any key
    ///
    /// Returns raw hits regardless of concept status; eligibility and
    /// redirect following are the resolver's job.
    async fn find_by_normalized_keys(&self, keys: &[String]) -> Result<Vec<ConceptMatch>>;

    /// Get a concept by ID
    async fn get_concept(&self, id: ConceptId) -> Result<Option<Concept>>;

    /// Get several concepts by ID; missing IDs are silently skipped
    async fn get_concepts(&self, ids: &[ConceptId]) -> Result<Vec<Concept>>;
}
