//! Repository trait for the prerequisite graph
//!
//! The graph engine owns prerequisite nodes, their concept links, their topic
//! edges, question-concept links and the audit log. Reviewer operations are
//! applied as one storage transaction each.

use async_trait::async_trait;

use crate::config::StrengthConfig;
use crate::domain::concepts::{Concept, ConceptId};
use crate::domain::curriculum::{SubtopicId, Topic, TopicId};
use crate::domain::ingestion::QuestionId;
use crate::error::Result;

use super::candidates::CandidateProfile;
use super::classifier::PrerequisiteClassifier;
use super::entity::{
    CanonicalKey, NewPrerequisite, Prerequisite, PrerequisiteId, PrerequisiteStatus,
    PrerequisiteTopicEdge, Strength,
};
use super::event::GraphEvent;
use super::merge::{LabelOnlyMergeOutcome, LabelOnlyMergeRequest, MergeRequest, MergeSummary};
use super::query::{
    CoverageEntry, EvidenceQuestion, Page, PrerequisiteQuery, PrerequisiteSummary,
    PrerequisiteTopic, TopicPrerequisite,
};

/// Storage for the prerequisite graph
#[async_trait]
pub trait PrerequisiteGraphRepository: Send + Sync {
    // ========== Node Operations ==========

    async fn get_prerequisite(&self, id: PrerequisiteId) -> Result<Option<Prerequisite>>;

    async fn find_by_canonical_key(&self, key: &CanonicalKey) -> Result<Option<Prerequisite>>;

    /// Find the node whose name, or normalized display name, equals `normalized_name`
    async fn find_by_name(&self, normalized_name: &str) -> Result<Option<Prerequisite>>;

    /// Insert a node and its concept links unless the canonical key exists
    ///
    /// Returns the surviving node and whether this call created it. Concurrent
    /// callers with the same key converge on one row.
    async fn create_if_absent(
        &self,
        node: &NewPrerequisite,
        concept_ids: &[ConceptId],
    ) -> Result<(Prerequisite, bool)>;

    /// Concepts linked to a node, ordered by ID
    async fn concepts_of(&self, id: PrerequisiteId) -> Result<Vec<Concept>>;

    /// Idempotently link a question to a concept
    async fn link_question_concept(
        &self,
        question_id: QuestionId,
        concept_id: ConceptId,
        confidence: f64,
    ) -> Result<()>;

    // ========== Edge Operations ==========

    /// Insert the edge with frequency 1 or atomically add 1 to it
    ///
    /// Overwrites the subtopic and timestamp. Returns the post-increment frequency.
    async fn increment_edge(
        &self,
        prerequisite_id: PrerequisiteId,
        topic_id: TopicId,
        subtopic_id: Option<SubtopicId>,
    ) -> Result<i64>;

    /// Write `strength` only if the edge still has `frequency`
    ///
    /// Returns false when a newer increment has landed in between.
    async fn set_edge_strength(
        &self,
        prerequisite_id: PrerequisiteId,
        topic_id: TopicId,
        frequency: i64,
        strength: Strength,
    ) -> Result<bool>;

    async fn get_edge(
        &self,
        prerequisite_id: PrerequisiteId,
        topic_id: TopicId,
    ) -> Result<Option<PrerequisiteTopicEdge>>;

    // ========== Reviewer Operations ==========

    /// Merge the selected nodes into the target in one transaction
    async fn merge_prerequisites(
        &self,
        request: &MergeRequest,
        strength: &StrengthConfig,
    ) -> Result<MergeSummary>;

    /// Merge or upgrade a label-only node in one transaction
    async fn merge_label_only(
        &self,
        request: &LabelOnlyMergeRequest,
        strength: &StrengthConfig,
    ) -> Result<LabelOnlyMergeOutcome>;

    /// Replace concept links, recompute the key and reclassify, in one transaction
    async fn relink_concepts(
        &self,
        id: PrerequisiteId,
        concepts: &[Concept],
        classifier: &PrerequisiteClassifier,
    ) -> Result<Prerequisite>;

    async fn deprecate(&self, id: PrerequisiteId) -> Result<Prerequisite>;

    // ========== Read Model ==========

    async fn topic_prerequisites(&self, topic_id: TopicId) -> Result<Vec<TopicPrerequisite>>;

    /// Edges of a node joined with topic and lesson names
    async fn prerequisite_topics(&self, id: PrerequisiteId) -> Result<Vec<PrerequisiteTopic>>;

    async fn list_prerequisites(&self, query: &PrerequisiteQuery) -> Result<Page<PrerequisiteSummary>>;

    /// Scoring inputs for every node, topics restricted to `lesson` if given
    async fn candidate_profiles(&self, lesson: Option<&str>) -> Result<Vec<CandidateProfile>>;

    /// Total edge frequency per node over topics of `lesson` (all lessons if `None`)
    ///
    /// Nodes without an edge in scope are omitted.
    async fn lesson_importance(&self, lesson: Option<&str>) -> Result<Vec<(PrerequisiteId, i64)>>;

    /// Questions linked to the node's concepts within its edge topics
    async fn evidence_questions(
        &self,
        id: PrerequisiteId,
        limit: usize,
    ) -> Result<Vec<EvidenceQuestion>>;

    async fn status_counts(&self) -> Result<Vec<(PrerequisiteStatus, i64)>>;

    async fn strength_counts(&self) -> Result<Vec<(Strength, i64)>>;

    /// Node count for every topic that has at least one edge
    async fn prerequisite_counts_per_topic(&self) -> Result<Vec<(TopicId, i64)>>;

    /// Nodes with the most STRONG topic edges
    async fn strong_coverage(&self, limit: usize) -> Result<Vec<CoverageEntry>>;

    /// Registry topics with no STRONG edge
    async fn topics_without_strong_edges(&self) -> Result<Vec<Topic>>;

    // ========== Audit Log ==========

    /// Most recent events first, optionally for one node
    async fn recent_events(
        &self,
        prerequisite_id: Option<PrerequisiteId>,
        limit: usize,
    ) -> Result<Vec<GraphEvent>>;
}
