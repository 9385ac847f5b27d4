//! Reviewer-triggered structural changes: merges, upgrades, relinks
//!
//! Each operation is validated here and then applied by the repository in a
//! single transaction. Lock contention rolls the transaction back and the
//! whole operation is retried with backoff.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::StrengthConfig;
use crate::domain::concepts::{Concept, ConceptId, ConceptResolver};
use crate::domain::curriculum::{SubtopicId, TopicId};
use crate::error::{Error, Result};
use crate::util::retry_on_lock;

use super::classifier::PrerequisiteClassifier;
use super::entity::{Prerequisite, PrerequisiteId, PrerequisiteTopicEdge, Strength};
use super::repository::PrerequisiteGraphRepository;

/// Which node survives an N→1 merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeTarget {
    /// One of the selected nodes
    Id(PrerequisiteId),
    /// The node whose normalized name matches, created label-only if absent
    Name(String),
}

/// A validated N→1 merge
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Distinct selected IDs, at least two
    pub ids: Vec<PrerequisiteId>,
    pub target: MergeTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub canonical_id: PrerequisiteId,
    pub removed_ids: Vec<PrerequisiteId>,
    pub concepts_merged: usize,
    pub edges_updated: usize,
}

/// A validated label-only upgrade
#[derive(Debug, Clone)]
pub struct LabelOnlyMergeRequest {
    pub prerequisite_id: PrerequisiteId,
    /// Canonical concepts, sorted by ID
    pub concepts: Vec<Concept>,
    pub admin_label: Option<String>,
}

impl LabelOnlyMergeRequest {
    pub fn concept_ids(&self) -> Vec<ConceptId> {
        self.concepts.iter().map(|c| c.id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelOnlyMergeKind {
    /// Folded into an existing node with the same concept set
    Merged { target_id: PrerequisiteId },
    /// Rewritten in place as a concept-backed node
    Upgraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOnlyMergeOutcome {
    pub kind: LabelOnlyMergeKind,
    /// The node that carries the edges afterwards
    pub prerequisite_id: PrerequisiteId,
    pub edges_updated: usize,
    pub concepts_linked: usize,
}

/// One edge after aggregation across merged nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedEdge {
    pub topic_id: TopicId,
    pub subtopic_id: Option<SubtopicId>,
    pub frequency: i64,
    pub strength: Strength,
}

/// Sum edge frequencies per topic and recompute strength
///
/// The subtopic of the most recently updated contributing edge is kept.
/// Output is ordered by topic ID.
pub fn aggregate_edges(edges: &[PrerequisiteTopicEdge], strength: &StrengthConfig) -> Vec<AggregatedEdge> {
    let mut by_topic: BTreeMap<TopicId, (i64, &PrerequisiteTopicEdge)> = BTreeMap::new();

    for edge in edges {
        by_topic
            .entry(edge.topic_id)
            .and_modify(|(total, latest)| {
                *total += edge.frequency;
                if edge.last_updated_at >= latest.last_updated_at {
                    *latest = edge;
                }
            })
            .or_insert((edge.frequency, edge));
    }

    by_topic
        .into_iter()
        .map(|(topic_id, (frequency, latest))| AggregatedEdge {
            topic_id,
            subtopic_id: latest.subtopic_id,
            frequency,
            strength: strength.strength_of(frequency),
        })
        .collect()
}

/// Executes reviewer merges, upgrades, relinks and deprecations
#[derive(Clone)]
pub struct MergeExecutor {
    repository: Arc<dyn PrerequisiteGraphRepository>,
    resolver: ConceptResolver,
    classifier: PrerequisiteClassifier,
    strength: StrengthConfig,
    max_lock_wait_ms: u64,
}

impl MergeExecutor {
    pub fn new(
        repository: Arc<dyn PrerequisiteGraphRepository>,
        resolver: ConceptResolver,
        classifier: PrerequisiteClassifier,
        strength: StrengthConfig,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            repository,
            resolver,
            classifier,
            strength,
            max_lock_wait_ms,
        }
    }

    /// Merge two or more nodes into one
    pub async fn merge_prerequisites(
        &self,
        ids: &[PrerequisiteId],
        target: MergeTarget,
    ) -> Result<MergeSummary> {
        let mut distinct: Vec<PrerequisiteId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !distinct.contains(id) {
                distinct.push(*id);
            }
        }

        if distinct.len() < 2 {
            return match distinct.first() {
                Some(id) => Err(Error::SelfMerge(*id)),
                None => Err(Error::InvalidInput(
                    "Select at least two prerequisites to merge".to_string(),
                )),
            };
        }

        let target = match target {
            MergeTarget::Id(id) if !distinct.contains(&id) => {
                return Err(Error::InvalidInput(format!(
                    "Merge target {} is not one of the selected prerequisites",
                    id
                )));
            }
            MergeTarget::Name(name) if name.trim().is_empty() => {
                return Err(Error::InvalidInput("Merge target name is empty".to_string()));
            }
            MergeTarget::Name(name) => MergeTarget::Name(name.trim().to_string()),
            other => other,
        };

        let request = MergeRequest {
            ids: distinct,
            target,
        };

        let repository = &self.repository;
        let strength = &self.strength;
        let request_ref = &request;
        let summary = retry_on_lock("merge_prerequisites", self.max_lock_wait_ms, move || {
            repository.merge_prerequisites(request_ref, strength)
        })
        .await?;

        info!(
            prerequisite_id = summary.canonical_id,
            removed = ?summary.removed_ids,
            concepts_merged = summary.concepts_merged,
            edges_updated = summary.edges_updated,
            "Merged prerequisites"
        );
        Ok(summary)
    }

    /// Attach reviewer-chosen concepts to a label-only node
    ///
    /// Merges into the node that already owns the concept set, or upgrades
    /// the label-only node in place when there is none.
    pub async fn merge_label_only_prerequisite(
        &self,
        prerequisite_id: PrerequisiteId,
        concept_ids: &[ConceptId],
        admin_label: Option<&str>,
    ) -> Result<LabelOnlyMergeOutcome> {
        if concept_ids.is_empty() {
            return Err(Error::InvalidInput(
                "At least one concept is required to upgrade a label-only prerequisite".to_string(),
            ));
        }

        let concepts = self.resolver.resolve_ids(concept_ids).await?;
        let request = LabelOnlyMergeRequest {
            prerequisite_id,
            concepts,
            admin_label: admin_label
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string),
        };

        let repository = &self.repository;
        let strength = &self.strength;
        let request_ref = &request;
        let outcome = retry_on_lock("merge_label_only_prerequisite", self.max_lock_wait_ms, move || {
            repository.merge_label_only(request_ref, strength)
        })
        .await?;

        match outcome.kind {
            LabelOnlyMergeKind::Merged { target_id } => info!(
                prerequisite_id,
                target_id,
                edges_updated = outcome.edges_updated,
                "Merged label-only prerequisite into existing node"
            ),
            LabelOnlyMergeKind::Upgraded => info!(
                prerequisite_id,
                concepts_linked = outcome.concepts_linked,
                edges_updated = outcome.edges_updated,
                "Upgraded label-only prerequisite in place"
            ),
        }
        Ok(outcome)
    }

    /// Replace a node's concept links and reclassify it
    pub async fn link_concepts_to_prerequisite(
        &self,
        prerequisite_id: PrerequisiteId,
        concept_ids: &[ConceptId],
    ) -> Result<Prerequisite> {
        if concept_ids.is_empty() {
            return Err(Error::InvalidInput(
                "At least one concept is required; deprecate the prerequisite instead".to_string(),
            ));
        }

        let concepts = self.resolver.resolve_ids(concept_ids).await?;

        let repository = &self.repository;
        let classifier = &self.classifier;
        let concepts_ref = &concepts;
        let updated = retry_on_lock("link_concepts_to_prerequisite", self.max_lock_wait_ms, move || {
            repository.relink_concepts(prerequisite_id, concepts_ref, classifier)
        })
        .await?;

        info!(
            prerequisite_id,
            canonical_key = %updated.canonical_key,
            status = %updated.status,
            "Relinked prerequisite concepts"
        );
        Ok(updated)
    }

    /// Mark a node as deprecated by a reviewer
    pub async fn deprecate_prerequisite(&self, prerequisite_id: PrerequisiteId) -> Result<Prerequisite> {
        let repository = &self.repository;
        let updated = retry_on_lock("deprecate_prerequisite", self.max_lock_wait_ms, move || {
            repository.deprecate(prerequisite_id)
        })
        .await?;

        info!(prerequisite_id, "Deprecated prerequisite");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prerequisites::EdgeSource;
    use chrono::{Duration, Utc};

    fn edge(prerequisite_id: i64, topic_id: i64, subtopic_id: Option<i64>, frequency: i64, age_secs: i64) -> PrerequisiteTopicEdge {
        let strength = StrengthConfig::default();
        PrerequisiteTopicEdge {
            prerequisite_id,
            topic_id,
            subtopic_id,
            frequency,
            strength: strength.strength_of(frequency),
            source: EdgeSource::Ingestion,
            last_updated_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_aggregate_conserves_frequency_per_topic() {
        let edges = vec![
            edge(1, 10, None, 3, 100),
            edge(2, 10, Some(5), 2, 10),
            edge(3, 10, Some(6), 4, 50),
            edge(2, 20, None, 1, 10),
        ];

        let aggregated = aggregate_edges(&edges, &StrengthConfig::default());
        assert_eq!(aggregated.len(), 2);

        assert_eq!(aggregated[0].topic_id, 10);
        assert_eq!(aggregated[0].frequency, 9);
        assert_eq!(aggregated[0].strength, Strength::Medium);
        // newest contributor wins the subtopic
        assert_eq!(aggregated[0].subtopic_id, Some(5));

        assert_eq!(aggregated[1].topic_id, 20);
        assert_eq!(aggregated[1].frequency, 1);
        assert_eq!(aggregated[1].strength, Strength::Weak);
    }

    #[test]
    fn test_aggregate_crosses_strong_threshold() {
        let edges = vec![edge(1, 10, None, 6, 5), edge(2, 10, None, 4, 1)];
        let aggregated = aggregate_edges(&edges, &StrengthConfig::default());
        assert_eq!(aggregated[0].frequency, 10);
        assert_eq!(aggregated[0].strength, Strength::Strong);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate_edges(&[], &StrengthConfig::default()).is_empty());
    }
}
