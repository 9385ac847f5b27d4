//! Graph audit log
//!
//! Every structural change to the graph (node creation, merge, upgrade,
//! relink, deprecation) leaves a `GraphEvent` written in the same
//! transaction as the change itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::concepts::ConceptId;

use super::entity::{CanonicalKey, PrerequisiteId, PrerequisiteStatus};

/// Type of graph event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphEventType {
    /// A new prerequisite node was created
    Created,
    /// Several nodes were merged into one
    Merged,
    /// A label-only node was folded into an existing concept-backed node
    LabelOnlyMerged,
    /// A label-only node was upgraded in place to a concept-backed node
    Upgraded,
    /// A node's concept links were replaced
    Relinked,
    /// A reviewer deprecated a node
    Deprecated,
}

impl GraphEventType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created" => Some(Self::Created),
            "merged" => Some(Self::Merged),
            "label_only_merged" => Some(Self::LabelOnlyMerged),
            "upgraded" => Some(Self::Upgraded),
            "relinked" => Some(Self::Relinked),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Merged => "merged",
            Self::LabelOnlyMerged => "label_only_merged",
            Self::Upgraded => "upgraded",
            Self::Relinked => "relinked",
            Self::Deprecated => "deprecated",
        }
    }
}

impl std::fmt::Display for GraphEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An audit record for a structural graph change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEvent {
    pub id: Uuid,
    pub event_type: GraphEventType,
    /// Node that survives the change
    pub prerequisite_id: Option<PrerequisiteId>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl GraphEvent {
    pub fn new(
        event_type: GraphEventType,
        prerequisite_id: Option<PrerequisiteId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            prerequisite_id,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn created(
        prerequisite_id: PrerequisiteId,
        canonical_key: &CanonicalKey,
        status: PrerequisiteStatus,
        concept_ids: &[ConceptId],
    ) -> Self {
        Self::new(
            GraphEventType::Created,
            Some(prerequisite_id),
            serde_json::json!({
                "canonical_key": canonical_key,
                "status": status,
                "concept_ids": concept_ids,
            }),
        )
    }

    pub fn merged(
        canonical_id: PrerequisiteId,
        removed_ids: &[PrerequisiteId],
        concepts_merged: usize,
        edges_updated: usize,
    ) -> Self {
        Self::new(
            GraphEventType::Merged,
            Some(canonical_id),
            serde_json::json!({
                "removed_ids": removed_ids,
                "concepts_merged": concepts_merged,
                "edges_updated": edges_updated,
            }),
        )
    }

    pub fn label_only_merged(
        target_id: PrerequisiteId,
        source_id: PrerequisiteId,
        edges_updated: usize,
    ) -> Self {
        Self::new(
            GraphEventType::LabelOnlyMerged,
            Some(target_id),
            serde_json::json!({
                "source_id": source_id,
                "edges_updated": edges_updated,
            }),
        )
    }

    pub fn upgraded(
        prerequisite_id: PrerequisiteId,
        previous_key: &CanonicalKey,
        canonical_key: &CanonicalKey,
        concept_ids: &[ConceptId],
    ) -> Self {
        Self::new(
            GraphEventType::Upgraded,
            Some(prerequisite_id),
            serde_json::json!({
                "previous_key": previous_key,
                "canonical_key": canonical_key,
                "concept_ids": concept_ids,
            }),
        )
    }

    pub fn relinked(
        prerequisite_id: PrerequisiteId,
        previous_concept_ids: &[ConceptId],
        concept_ids: &[ConceptId],
        status: PrerequisiteStatus,
    ) -> Self {
        Self::new(
            GraphEventType::Relinked,
            Some(prerequisite_id),
            serde_json::json!({
                "previous_concept_ids": previous_concept_ids,
                "concept_ids": concept_ids,
                "status": status,
            }),
        )
    }

    pub fn deprecated(prerequisite_id: PrerequisiteId, previous_status: PrerequisiteStatus) -> Self {
        Self::new(
            GraphEventType::Deprecated,
            Some(prerequisite_id),
            serde_json::json!({ "previous_status": previous_status }),
        )
    }
}
