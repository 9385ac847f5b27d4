//! Per-question graph ingestion
//!
//! Best-effort enrichment: a question that is not ready is skipped, and one
//! failing candidate never stops the others. Ingestion never touches the
//! question's own analysis status.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::concepts::ConceptResolver;
use crate::domain::curriculum::TopicId;
use crate::domain::hints::{UnresolvedHintReport, UnresolvedHintRepository};
use crate::domain::prerequisites::{
    GraphEdgeAccumulator, PrerequisiteCanonicalizer, PrerequisiteGraphRepository, PrerequisiteId,
    PrerequisiteTopicEdge,
};
use crate::error::{Error, Result};
use crate::util::retry_on_lock;

use super::question::{
    AnalysisStatus, AnalyzedQuestion, AnalyzedQuestionSource, CandidatePrerequisite, QuestionId,
    parse_payload,
};

/// Confidence recorded for question→concept links made by ingestion
pub const INGESTION_LINK_CONFIDENCE: f64 = 1.0;

/// Why a question produced no graph changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NotAnalyzed { status: AnalysisStatus },
    NoTopic,
    NoPayload,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnalyzed { status } => write!(f, "analysis status is {}", status),
            Self::NoTopic => write!(f, "question has no topic"),
            Self::NoPayload => write!(f, "question has no analysis payload"),
        }
    }
}

/// What one ingestion call did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub question_id: QuestionId,
    pub skipped: Option<SkipReason>,
    pub candidates_seen: usize,
    /// Payload entries that failed validation
    pub candidates_rejected: usize,
    pub candidates_without_hints: usize,
    /// Candidates whose hints resolved to no concept
    pub candidates_unresolved: usize,
    pub candidates_linked: usize,
    pub candidates_failed: usize,
    /// Candidates that mapped to a prerequisite this call already counted
    pub duplicates_skipped: usize,
    pub unresolved_hints: Vec<String>,
    pub prerequisite_ids: Vec<PrerequisiteId>,
    pub edges: Vec<PrerequisiteTopicEdge>,
}

impl IngestionReport {
    fn skipped(question_id: QuestionId, reason: SkipReason) -> Self {
        Self {
            question_id,
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Orchestrates resolution, canonicalization and edge accumulation for one question
#[derive(Clone)]
pub struct QuestionGraphIngestor {
    questions: Arc<dyn AnalyzedQuestionSource>,
    graph: Arc<dyn PrerequisiteGraphRepository>,
    hints: Arc<dyn UnresolvedHintRepository>,
    resolver: ConceptResolver,
    canonicalizer: PrerequisiteCanonicalizer,
    accumulator: GraphEdgeAccumulator,
    max_lock_wait_ms: u64,
}

impl QuestionGraphIngestor {
    pub fn new(
        questions: Arc<dyn AnalyzedQuestionSource>,
        graph: Arc<dyn PrerequisiteGraphRepository>,
        hints: Arc<dyn UnresolvedHintRepository>,
        resolver: ConceptResolver,
        canonicalizer: PrerequisiteCanonicalizer,
        accumulator: GraphEdgeAccumulator,
        max_lock_wait_ms: u64,
    ) -> Self {
        Self {
            questions,
            graph,
            hints,
            resolver,
            canonicalizer,
            accumulator,
            max_lock_wait_ms,
        }
    }

    /// Ingest one analyzed question into the graph
    pub async fn ingest(&self, question_id: QuestionId) -> Result<IngestionReport> {
        let question = self
            .questions
            .get_question(question_id)
            .await?
            .ok_or(Error::QuestionNotFound(question_id))?;

        if question.status != AnalysisStatus::Completed {
            let reason = SkipReason::NotAnalyzed {
                status: question.status,
            };
            info!(question_id, reason = %reason, "Skipping ingestion");
            return Ok(IngestionReport::skipped(question_id, reason));
        }
        let Some(topic_id) = question.topic_id else {
            info!(question_id, reason = %SkipReason::NoTopic, "Skipping ingestion");
            return Ok(IngestionReport::skipped(question_id, SkipReason::NoTopic));
        };
        let Some(payload) = question.payload.as_deref().filter(|p| !p.trim().is_empty()) else {
            info!(question_id, reason = %SkipReason::NoPayload, "Skipping ingestion");
            return Ok(IngestionReport::skipped(question_id, SkipReason::NoPayload));
        };

        let parsed = parse_payload(payload)?;
        let mut report = IngestionReport {
            question_id,
            candidates_seen: parsed.candidates.len() + parsed.rejected.len(),
            candidates_rejected: parsed.rejected.len(),
            ..Default::default()
        };
        for rejected in &parsed.rejected {
            warn!(
                question_id,
                index = rejected.index,
                reason = %rejected.reason,
                "Rejected malformed candidate prerequisite"
            );
        }

        let mut counted: HashSet<PrerequisiteId> = HashSet::new();
        for candidate in &parsed.candidates {
            if let Err(e) = self
                .ingest_candidate(&question, topic_id, candidate, &mut counted, &mut report)
                .await
            {
                warn!(
                    question_id,
                    label = %candidate.label,
                    error = %e,
                    "Candidate prerequisite failed; continuing"
                );
                report.candidates_failed += 1;
            }
        }

        info!(
            question_id,
            topic_id,
            linked = report.candidates_linked,
            unresolved = report.candidates_unresolved,
            failed = report.candidates_failed,
            edges = report.edges.len(),
            "Ingested question"
        );
        Ok(report)
    }

    async fn ingest_candidate(
        &self,
        question: &AnalyzedQuestion,
        topic_id: TopicId,
        candidate: &CandidatePrerequisite,
        counted: &mut HashSet<PrerequisiteId>,
        report: &mut IngestionReport,
    ) -> Result<()> {
        if candidate.concept_hints.is_empty() {
            debug!(question_id = question.id, label = %candidate.label, "Candidate has no concept hints");
            report.candidates_without_hints += 1;
            return Ok(());
        }

        let concepts = self.resolver.resolve(&candidate.concept_hints).await?;

        if concepts.is_empty() {
            for hint in &candidate.concept_hints {
                let recorded = self
                    .hints
                    .record_unresolved_hint(&UnresolvedHintReport {
                        hint: hint.clone(),
                        question_id: Some(question.id),
                        lesson_id: Some(question.lesson_id),
                        topic_id,
                        subtopic_id: question.subtopic_id,
                    })
                    .await?;
                if let Some(recorded) = recorded {
                    warn!(
                        question_id = question.id,
                        topic_id,
                        hint = %hint,
                        occurrences = recorded.occurrence_count,
                        "Concept hint did not resolve"
                    );
                    report.unresolved_hints.push(hint.clone());
                }
            }
            report.candidates_unresolved += 1;
            return Ok(());
        }

        let concept_ids: Vec<_> = concepts.iter().map(|c| c.id).collect();

        // Linking and canonicalization are idempotent, so lock contention can be retried
        let graph = &self.graph;
        let canonicalizer = &self.canonicalizer;
        let concept_ids_ref = &concept_ids;
        let question_id = question.id;
        let prerequisite = retry_on_lock("canonicalize_candidate", self.max_lock_wait_ms, move || async move {
            for concept_id in concept_ids_ref {
                graph
                    .link_question_concept(question_id, *concept_id, INGESTION_LINK_CONFIDENCE)
                    .await?;
            }
            canonicalizer
                .find_or_create_by_concepts(concept_ids_ref, &candidate.label, &candidate.concept_hints)
                .await
        })
        .await?;

        report.candidates_linked += 1;
        if !counted.insert(prerequisite.id) {
            debug!(
                question_id,
                prerequisite_id = prerequisite.id,
                "Prerequisite already counted for this question"
            );
            report.duplicates_skipped += 1;
            return Ok(());
        }

        let edge = self
            .accumulator
            .add_edge(prerequisite.id, topic_id, question.subtopic_id)
            .await?;
        report.prerequisite_ids.push(prerequisite.id);
        report.edges.push(edge);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::concepts::{Concept, ConceptId, ConceptMatch, ConceptRepository, ConceptStatus};
    use crate::domain::prerequisites::{PrerequisiteClassifier, Strength};
    use crate::infrastructure::concepts::SqliteConceptRepository;
    use crate::infrastructure::curriculum::SqliteCurriculumRepository;
    use crate::infrastructure::graph::SqlitePrerequisiteGraphRepository;
    use crate::infrastructure::hints::SqliteUnresolvedHintRepository;
    use crate::storage::migrations::run_migrations;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Registry that errors whenever a lookup touches the broken key
    struct FlakyRegistry {
        inner: SqliteConceptRepository,
        broken_key: &'static str,
    }

    #[async_trait]
    impl ConceptRepository for FlakyRegistry {
        async fn find_by_normalized_keys(&self, keys: &[String]) -> Result<Vec<ConceptMatch>> {
            if keys.iter().any(|k| k == self.broken_key) {
                return Err(Error::Other("registry unavailable".to_string()));
            }
            self.inner.find_by_normalized_keys(keys).await
        }

        async fn get_concept(&self, id: ConceptId) -> Result<Option<Concept>> {
            self.inner.get_concept(id).await
        }

        async fn get_concepts(&self, ids: &[ConceptId]) -> Result<Vec<Concept>> {
            self.inner.get_concepts(ids).await
        }
    }

    async fn setup(payload: serde_json::Value) -> QuestionGraphIngestor {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let curriculum = Arc::new(SqliteCurriculumRepository::new(pool.clone()));
        curriculum.upsert_lesson(1, "Anatomi").await.unwrap();
        curriculum.upsert_topic(10, 1, "Orbita").await.unwrap();
        curriculum
            .upsert_question(&AnalyzedQuestion {
                id: 1,
                lesson_id: 1,
                topic_id: Some(10),
                subtopic_id: None,
                status: AnalysisStatus::Completed,
                payload: Some(payload.to_string()),
            })
            .await
            .unwrap();

        let sqlite_concepts = SqliteConceptRepository::new(pool.clone());
        sqlite_concepts.insert_concept("Orbita", ConceptStatus::Active).await.unwrap();
        sqlite_concepts.insert_concept("Bozuk", ConceptStatus::Active).await.unwrap();
        sqlite_concepts.insert_concept("Optik sinir", ConceptStatus::Active).await.unwrap();
        let concepts: Arc<dyn ConceptRepository> = Arc::new(FlakyRegistry {
            inner: sqlite_concepts,
            broken_key: "bozuk",
        });

        let config = Config::default();
        let graph: Arc<dyn PrerequisiteGraphRepository> =
            Arc::new(SqlitePrerequisiteGraphRepository::new(pool.clone()));
        let hints = Arc::new(SqliteUnresolvedHintRepository::new(pool));
        let canonicalizer = PrerequisiteCanonicalizer::new(
            graph.clone(),
            concepts.clone(),
            PrerequisiteClassifier::new(config.classifier),
        );
        QuestionGraphIngestor::new(
            curriculum,
            graph.clone(),
            hints,
            ConceptResolver::new(concepts),
            canonicalizer,
            GraphEdgeAccumulator::new(graph, config.strength),
            config.ingestion.max_lock_wait_ms,
        )
    }

    #[tokio::test]
    async fn test_failing_candidate_does_not_stop_the_others() {
        let ingestor = setup(json!({ "prerequisites": [
            { "label": "Orbita duvarları", "conceptHints": ["Orbita"] },
            { "label": "Bozuk kayıt", "conceptHints": ["Bozuk"] },
            { "label": "Optik sinir seyri", "conceptHints": ["Optik sinir"] },
        ]}))
        .await;

        let report = ingestor.ingest(1).await.unwrap();

        assert_eq!(report.candidates_seen, 3);
        assert_eq!(report.candidates_failed, 1);
        assert_eq!(report.candidates_linked, 2);
        assert_eq!(report.edges.len(), 2);
        assert!(report.edges.iter().all(|e| e.topic_id == 10 && e.frequency == 1));
    }

    #[tokio::test]
    async fn test_same_prerequisite_counts_once_per_question() {
        let ingestor = setup(json!({ "prerequisites": [
            { "label": "Orbita", "conceptHints": ["Orbita"] },
            { "label": "Orbita yine", "conceptHints": ["orbita"] },
        ]}))
        .await;

        let report = ingestor.ingest(1).await.unwrap();

        assert_eq!(report.candidates_linked, 2);
        assert_eq!(report.duplicates_skipped, 1);
        assert_eq!(report.prerequisite_ids.len(), 1);
        assert_eq!(report.edges.len(), 1);
        assert_eq!(report.edges[0].frequency, 1);
        assert_eq!(report.edges[0].strength, Strength::Weak);
    }

    #[tokio::test]
    async fn test_unknown_question_is_an_error() {
        let ingestor = setup(json!({ "prerequisites": [] })).await;
        let result = ingestor.ingest(99).await;
        assert!(matches!(result, Err(Error::QuestionNotFound(99))));
    }
}
