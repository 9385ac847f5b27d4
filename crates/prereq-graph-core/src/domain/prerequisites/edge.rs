//! Topic edge accumulation
//!
//! Frequency is incremented atomically in storage. Strength is recomputed
//! from the returned frequency and written with a guard on that value, so a
//! slow writer can never overwrite the strength of a newer increment.

use std::sync::Arc;

use tracing::debug;

use crate::config::StrengthConfig;
use crate::domain::curriculum::{SubtopicId, TopicId};
use crate::error::{Error, Result};

use super::entity::{PrerequisiteId, PrerequisiteTopicEdge};
use super::repository::PrerequisiteGraphRepository;

#[derive(Clone)]
pub struct GraphEdgeAccumulator {
    repository: Arc<dyn PrerequisiteGraphRepository>,
    strength: StrengthConfig,
}

impl GraphEdgeAccumulator {
    pub fn new(repository: Arc<dyn PrerequisiteGraphRepository>, strength: StrengthConfig) -> Self {
        Self { repository, strength }
    }

    /// Record one more observation of `prerequisite_id` for `topic_id`
    pub async fn add_edge(
        &self,
        prerequisite_id: PrerequisiteId,
        topic_id: TopicId,
        subtopic_id: Option<SubtopicId>,
    ) -> Result<PrerequisiteTopicEdge> {
        let frequency = self
            .repository
            .increment_edge(prerequisite_id, topic_id, subtopic_id)
            .await?;

        let strength = self.strength.strength_of(frequency);
        let applied = self
            .repository
            .set_edge_strength(prerequisite_id, topic_id, frequency, strength)
            .await?;

        debug!(
            prerequisite_id,
            topic_id,
            frequency,
            strength = %strength,
            applied,
            "Accumulated topic edge"
        );

        self.repository
            .get_edge(prerequisite_id, topic_id)
            .await?
            .ok_or_else(|| {
                Error::Other(format!(
                    "Edge ({}, {}) vanished after upsert",
                    prerequisite_id, topic_id
                ))
            })
    }
}
