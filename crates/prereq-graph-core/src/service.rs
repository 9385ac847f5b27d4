//! Prerequisite graph service
//!
//! The single entry point callers use. Wires the SQLite repositories into the
//! domain components and exposes ingestion, reviewer and query operations.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::domain::concepts::{ConceptId, ConceptResolver};
use crate::domain::curriculum::TopicId;
use crate::domain::hints::{HintFilter, HintId, HintStatus, UnresolvedConceptHint, UnresolvedHintRepository};
use crate::domain::ingestion::{
    BulkIngestionReport, BulkIngestionRunner, IngestionReport, QuestionGraphIngestor, QuestionId,
};
use crate::domain::prerequisites::{
    GraphAnalytics, GraphEdgeAccumulator, GraphEvent, GraphQueryService, LabelOnlyMergeOutcome,
    MergeCandidate, MergeCandidateFinder, MergeExecutor, MergeSummary, MergeTarget, Page,
    Prerequisite, PrerequisiteCanonicalizer, PrerequisiteClassifier, PrerequisiteDetail,
    PrerequisiteGraphRepository, PrerequisiteId, PrerequisiteQuery, PrerequisiteSummary,
    PrerequisiteTopic, TopicPrerequisite,
};
use crate::error::{Error, Result};
use crate::infrastructure::concepts::SqliteConceptRepository;
use crate::infrastructure::curriculum::SqliteCurriculumRepository;
use crate::infrastructure::graph::SqlitePrerequisiteGraphRepository;
use crate::infrastructure::hints::SqliteUnresolvedHintRepository;
use crate::storage::Database;

/// Facade over the prerequisite graph engine
#[derive(Clone)]
pub struct PrerequisiteGraphService {
    graph: Arc<dyn PrerequisiteGraphRepository>,
    hints: Arc<dyn UnresolvedHintRepository>,
    canonicalizer: PrerequisiteCanonicalizer,
    ingestor: QuestionGraphIngestor,
    bulk: BulkIngestionRunner,
    merges: MergeExecutor,
    candidates: MergeCandidateFinder,
    queries: GraphQueryService,
}

impl PrerequisiteGraphService {
    /// Build the service over a migrated SQLite pool
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        let concepts = Arc::new(SqliteConceptRepository::new(pool.clone()));
        let curriculum = Arc::new(SqliteCurriculumRepository::new(pool.clone()));
        let graph: Arc<dyn PrerequisiteGraphRepository> =
            Arc::new(SqlitePrerequisiteGraphRepository::new(pool.clone()));
        let hints: Arc<dyn UnresolvedHintRepository> =
            Arc::new(SqliteUnresolvedHintRepository::new(pool));

        let classifier = PrerequisiteClassifier::new(config.classifier);
        let resolver = ConceptResolver::new(concepts.clone());
        let canonicalizer = PrerequisiteCanonicalizer::new(graph.clone(), concepts, classifier);
        let accumulator = GraphEdgeAccumulator::new(graph.clone(), config.strength);

        let ingestor = QuestionGraphIngestor::new(
            curriculum.clone(),
            graph.clone(),
            hints.clone(),
            resolver.clone(),
            canonicalizer.clone(),
            accumulator,
            config.ingestion.max_lock_wait_ms,
        );
        let bulk = BulkIngestionRunner::new(ingestor.clone(), curriculum.clone(), config.ingestion);
        let merges = MergeExecutor::new(
            graph.clone(),
            resolver,
            classifier,
            config.strength,
            config.ingestion.max_lock_wait_ms,
        );
        let candidates = MergeCandidateFinder::new(graph.clone(), config.merge);
        let queries = GraphQueryService::new(graph.clone(), curriculum, config.query);

        Self {
            graph,
            hints,
            canonicalizer,
            ingestor,
            bulk,
            merges,
            candidates,
            queries,
        }
    }

    /// Build the service over an open database
    pub fn from_database(database: &Database, config: &Config) -> Self {
        Self::new(database.pool().clone(), config)
    }

    // ========== Ingestion ==========

    /// Fold one analyzed question into the graph
    pub async fn ingest(&self, question_id: QuestionId) -> Result<IngestionReport> {
        self.ingestor.ingest(question_id).await
    }

    /// Re-ingest every completed question with a topic
    pub async fn process_all_analyzed_questions(&self) -> Result<BulkIngestionReport> {
        self.bulk.run().await
    }

    /// Find or create the label-only node for a free-text label
    pub async fn find_or_create_label_prerequisite(&self, label: &str) -> Result<Prerequisite> {
        self.canonicalizer.find_or_create_by_label(label).await
    }

    // ========== Queries ==========

    pub async fn get_topic_prerequisites(&self, topic_id: TopicId) -> Result<Vec<TopicPrerequisite>> {
        self.queries.topic_prerequisites(topic_id).await
    }

    pub async fn get_prerequisite_topics(&self, name: &str) -> Result<Vec<PrerequisiteTopic>> {
        self.queries.prerequisite_topics(name).await
    }

    pub async fn get_all_prerequisites(&self, query: &PrerequisiteQuery) -> Result<Page<PrerequisiteSummary>> {
        self.queries.list_prerequisites(query).await
    }

    pub async fn get_prerequisite_detail(
        &self,
        prerequisite_id: PrerequisiteId,
        lesson: Option<&str>,
        include_evidence: bool,
    ) -> Result<PrerequisiteDetail> {
        self.queries
            .prerequisite_detail(prerequisite_id, lesson, include_evidence)
            .await
    }

    pub async fn get_learning_path_for_topic(&self, topic_id: TopicId) -> Result<Vec<String>> {
        self.queries.learning_path(topic_id).await
    }

    /// True when the topic has no STRONG prerequisite yet
    pub async fn should_block_advanced_content_generation(&self, topic_id: TopicId) -> Result<bool> {
        self.queries.should_block_advanced_content(topic_id).await
    }

    pub async fn analytics(&self, top_n: Option<usize>) -> Result<GraphAnalytics> {
        self.queries.analytics(top_n).await
    }

    // ========== Reviewer Operations ==========

    pub async fn find_merge_candidates(
        &self,
        prerequisite_id: PrerequisiteId,
        lesson: Option<&str>,
    ) -> Result<Vec<MergeCandidate>> {
        self.candidates.find_candidates(prerequisite_id, lesson).await
    }

    pub async fn merge_prerequisites(
        &self,
        ids: &[PrerequisiteId],
        target: MergeTarget,
    ) -> Result<MergeSummary> {
        self.merges.merge_prerequisites(ids, target).await
    }

    pub async fn merge_label_only_prerequisite(
        &self,
        prerequisite_id: PrerequisiteId,
        concept_ids: &[ConceptId],
        admin_label: Option<&str>,
    ) -> Result<LabelOnlyMergeOutcome> {
        self.merges
            .merge_label_only_prerequisite(prerequisite_id, concept_ids, admin_label)
            .await
    }

    pub async fn link_concepts_to_prerequisite(
        &self,
        prerequisite_id: PrerequisiteId,
        concept_ids: &[ConceptId],
    ) -> Result<Prerequisite> {
        self.merges
            .link_concepts_to_prerequisite(prerequisite_id, concept_ids)
            .await
    }

    pub async fn deprecate_prerequisite(&self, prerequisite_id: PrerequisiteId) -> Result<Prerequisite> {
        self.merges.deprecate_prerequisite(prerequisite_id).await
    }

    // ========== Unresolved Hints ==========

    pub async fn get_unresolved_hint(&self, id: HintId) -> Result<UnresolvedConceptHint> {
        self.hints.get_hint(id).await?.ok_or(Error::HintNotFound(id))
    }

    pub async fn list_unresolved_hints(&self, filter: &HintFilter) -> Result<Vec<UnresolvedConceptHint>> {
        self.hints.list_hints(filter).await
    }

    /// Mark a hint as handled, typically after an alias was added upstream
    pub async fn resolve_hint(&self, id: HintId, note: Option<&str>) -> Result<UnresolvedConceptHint> {
        let hint = self.hints.set_hint_status(id, HintStatus::Resolved, note).await?;
        info!(hint_id = id, hint = %hint.hint, "Resolved unresolved hint");
        Ok(hint)
    }

    /// Stop tracking a hint; later failures of it are not counted
    pub async fn ignore_hint(&self, id: HintId, note: Option<&str>) -> Result<UnresolvedConceptHint> {
        let hint = self.hints.set_hint_status(id, HintStatus::Ignored, note).await?;
        info!(hint_id = id, hint = %hint.hint, "Ignored unresolved hint");
        Ok(hint)
    }

    // ========== Audit Log ==========

    pub async fn recent_events(
        &self,
        prerequisite_id: Option<PrerequisiteId>,
        limit: usize,
    ) -> Result<Vec<GraphEvent>> {
        self.graph.recent_events(prerequisite_id, limit).await
    }
}
