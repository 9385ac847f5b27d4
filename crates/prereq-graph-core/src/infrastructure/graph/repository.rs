//! SQLite implementation of the PrerequisiteGraphRepository

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::StrengthConfig;
use crate::domain::concepts::{Concept, ConceptId};
use crate::domain::curriculum::{SubtopicId, Topic, TopicId};
use crate::domain::ingestion::QuestionId;
use crate::domain::prerequisites::{
    CandidateProfile, CanonicalKey, CoverageEntry, EvidenceQuestion, GraphEvent,
    LabelOnlyMergeOutcome, LabelOnlyMergeRequest, MergeRequest, MergeSummary, NewPrerequisite,
    Page, Prerequisite, PrerequisiteClassifier, PrerequisiteGraphRepository, PrerequisiteId,
    PrerequisiteQuery, PrerequisiteSort, PrerequisiteStatus, PrerequisiteSummary,
    PrerequisiteTopic, PrerequisiteTopicEdge, Strength, TopicPrerequisite,
};
use crate::error::{Error, Result};
use crate::infrastructure::concepts::ConceptRow;
use crate::infrastructure::curriculum::TopicRow;
use crate::infrastructure::now_timestamp;

use super::reviewer;
use super::rows::{
    EdgeRow, EventRow, PrerequisiteTopicRow, SummaryRow, TopicPrerequisiteRow, parse_status,
    parse_strength,
};

/// Filter shared by the listing and its count; binds ?1 status, ?2 lesson, ?3 search pattern
const LIST_FILTER: &str = r#"
    (?1 IS NULL OR p.status = ?1)
    AND (?2 IS NULL OR EXISTS (
        SELECT 1 FROM prerequisite_topic_edges le
        JOIN topics lt ON lt.id = le.topic_id
        JOIN lessons ll ON ll.id = lt.lesson_id
        WHERE le.prerequisite_id = p.id AND LOWER(ll.name) = LOWER(?2)
    ))
    AND (?3 IS NULL OR p.name LIKE ?3 OR LOWER(p.display_name) LIKE ?3)
"#;

/// SQLite implementation of the prerequisite graph repository
#[derive(Clone)]
pub struct SqlitePrerequisiteGraphRepository {
    pool: SqlitePool,
}

impl SqlitePrerequisiteGraphRepository {
    /// Create a new SQLite prerequisite graph repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrerequisiteGraphRepository for SqlitePrerequisiteGraphRepository {
    // ========== Node Operations ==========

    async fn get_prerequisite(&self, id: PrerequisiteId) -> Result<Option<Prerequisite>> {
        let mut conn = self.pool.acquire().await?;
        reviewer::fetch_prerequisite(&mut conn, id).await
    }

    async fn find_by_canonical_key(&self, key: &CanonicalKey) -> Result<Option<Prerequisite>> {
        let mut conn = self.pool.acquire().await?;
        reviewer::fetch_by_key(&mut conn, key).await
    }

    async fn find_by_name(&self, normalized_name: &str) -> Result<Option<Prerequisite>> {
        let mut conn = self.pool.acquire().await?;
        reviewer::fetch_by_name(&mut conn, normalized_name).await
    }

    async fn create_if_absent(
        &self,
        node: &NewPrerequisite,
        concept_ids: &[ConceptId],
    ) -> Result<(Prerequisite, bool)> {
        let mut tx = self.pool.begin().await?;

        let created = reviewer::insert_prerequisite(&mut tx, node).await?;
        let prerequisite = reviewer::fetch_by_key(&mut tx, &node.canonical_key)
            .await?
            .ok_or_else(|| {
                Error::Other(format!(
                    "Prerequisite '{}' vanished after insert",
                    node.canonical_key
                ))
            })?;

        if created {
            reviewer::link_concepts(&mut tx, prerequisite.id, concept_ids).await?;
            let event = GraphEvent::created(
                prerequisite.id,
                &prerequisite.canonical_key,
                prerequisite.status,
                concept_ids,
            );
            reviewer::insert_event(&mut tx, &event).await?;
        }

        tx.commit().await?;
        Ok((prerequisite, created))
    }

    async fn concepts_of(&self, id: PrerequisiteId) -> Result<Vec<Concept>> {
        let rows: Vec<ConceptRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.preferred_label, c.normalized_label, c.status, c.merged_into
            FROM prerequisite_concepts pc
            JOIN concepts c ON c.id = pc.concept_id
            WHERE pc.prerequisite_id = ?
            ORDER BY c.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_concept()).collect()
    }

    async fn link_question_concept(
        &self,
        question_id: QuestionId,
        concept_id: ConceptId,
        confidence: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO question_concepts (question_id, concept_id, confidence)
            VALUES (?, ?, ?)
            ON CONFLICT(question_id, concept_id) DO UPDATE SET
                confidence = MAX(question_concepts.confidence, excluded.confidence)
            "#,
        )
        .bind(question_id)
        .bind(concept_id)
        .bind(confidence)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========== Edge Operations ==========

    async fn increment_edge(
        &self,
        prerequisite_id: PrerequisiteId,
        topic_id: TopicId,
        subtopic_id: Option<SubtopicId>,
    ) -> Result<i64> {
        let (frequency,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO prerequisite_topic_edges
            (prerequisite_id, topic_id, subtopic_id, frequency, strength, source, last_updated_at)
            VALUES (?, ?, ?, 1, 'weak', 'ingestion', ?)
            ON CONFLICT(prerequisite_id, topic_id) DO UPDATE SET
                frequency = prerequisite_topic_edges.frequency + 1,
                subtopic_id = excluded.subtopic_id,
                last_updated_at = excluded.last_updated_at
            RETURNING frequency
            "#,
        )
        .bind(prerequisite_id)
        .bind(topic_id)
        .bind(subtopic_id)
        .bind(now_timestamp())
        .fetch_one(&self.pool)
        .await?;

        Ok(frequency)
    }

    async fn set_edge_strength(
        &self,
        prerequisite_id: PrerequisiteId,
        topic_id: TopicId,
        frequency: i64,
        strength: Strength,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE prerequisite_topic_edges SET strength = ?
            WHERE prerequisite_id = ? AND topic_id = ? AND frequency = ?
            "#,
        )
        .bind(strength.as_str())
        .bind(prerequisite_id)
        .bind(topic_id)
        .bind(frequency)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_edge(
        &self,
        prerequisite_id: PrerequisiteId,
        topic_id: TopicId,
    ) -> Result<Option<PrerequisiteTopicEdge>> {
        let row: Option<EdgeRow> = sqlx::query_as(
            "SELECT * FROM prerequisite_topic_edges WHERE prerequisite_id = ? AND topic_id = ?",
        )
        .bind(prerequisite_id)
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_edge()).transpose()
    }

    // ========== Reviewer Operations ==========

    async fn merge_prerequisites(
        &self,
        request: &MergeRequest,
        strength: &StrengthConfig,
    ) -> Result<MergeSummary> {
        reviewer::merge_prerequisites(&self.pool, request, strength).await
    }

    async fn merge_label_only(
        &self,
        request: &LabelOnlyMergeRequest,
        strength: &StrengthConfig,
    ) -> Result<LabelOnlyMergeOutcome> {
        reviewer::merge_label_only(&self.pool, request, strength).await
    }

    async fn relink_concepts(
        &self,
        id: PrerequisiteId,
        concepts: &[Concept],
        classifier: &PrerequisiteClassifier,
    ) -> Result<Prerequisite> {
        reviewer::relink_concepts(&self.pool, id, concepts, classifier).await
    }

    async fn deprecate(&self, id: PrerequisiteId) -> Result<Prerequisite> {
        reviewer::deprecate(&self.pool, id).await
    }

    // ========== Read Model ==========

    async fn topic_prerequisites(&self, topic_id: TopicId) -> Result<Vec<TopicPrerequisite>> {
        let rows: Vec<TopicPrerequisiteRow> = sqlx::query_as(
            r#"
            SELECT p.id AS prerequisite_id, p.name, p.display_name, p.status,
                   e.subtopic_id, e.frequency, e.strength
            FROM prerequisite_topic_edges e
            JOIN prerequisites p ON p.id = e.prerequisite_id
            WHERE e.topic_id = ?
            "#,
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_item()).collect()
    }

    async fn prerequisite_topics(&self, id: PrerequisiteId) -> Result<Vec<PrerequisiteTopic>> {
        let rows: Vec<PrerequisiteTopicRow> = sqlx::query_as(
            r#"
            SELECT e.topic_id, t.name AS topic_name, t.lesson_id, l.name AS lesson_name,
                   e.subtopic_id, e.frequency, e.strength, e.source
            FROM prerequisite_topic_edges e
            JOIN topics t ON t.id = e.topic_id
            JOIN lessons l ON l.id = t.lesson_id
            WHERE e.prerequisite_id = ?
            ORDER BY e.frequency DESC, e.topic_id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_item()).collect()
    }

    async fn list_prerequisites(&self, query: &PrerequisiteQuery) -> Result<Page<PrerequisiteSummary>> {
        let status = query.status.map(|s| s.as_str());
        let lesson = query.lesson.as_deref().map(str::trim).filter(|l| !l.is_empty());
        let search = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let order_by = match query.sort {
            PrerequisiteSort::Frequency => "total_frequency DESC, p.id",
            PrerequisiteSort::Name => "p.display_name COLLATE NOCASE, p.id",
            PrerequisiteSort::TopicCount => "topic_count DESC, total_frequency DESC, p.id",
            PrerequisiteSort::Recent => "p.updated_at DESC, p.id",
        };

        let count_sql = format!("SELECT COUNT(*) FROM prerequisites p WHERE {}", LIST_FILTER);
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(status)
            .bind(lesson)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            r#"
            SELECT p.*,
                   COALESCE((SELECT SUM(e.frequency) FROM prerequisite_topic_edges e
                             WHERE e.prerequisite_id = p.id), 0) AS total_frequency,
                   (SELECT COUNT(*) FROM prerequisite_topic_edges e
                    WHERE e.prerequisite_id = p.id) AS topic_count,
                   (SELECT COUNT(*) FROM prerequisite_concepts pc
                    WHERE pc.prerequisite_id = p.id) AS concept_count
            FROM prerequisites p
            WHERE {}
            ORDER BY {}
            LIMIT ?4 OFFSET ?5
            "#,
            LIST_FILTER, order_by
        );
        let rows: Vec<SummaryRow> = sqlx::query_as(&list_sql)
            .bind(status)
            .bind(lesson)
            .bind(&search)
            .bind(i64::from(query.page_size))
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(|r| r.into_summary())
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total: total as u64,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn candidate_profiles(&self, lesson: Option<&str>) -> Result<Vec<CandidateProfile>> {
        let nodes: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, display_name, status FROM prerequisites ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let links: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT prerequisite_id, concept_id FROM prerequisite_concepts ORDER BY prerequisite_id, concept_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let edges: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT e.prerequisite_id, e.topic_id
            FROM prerequisite_topic_edges e
            JOIN topics t ON t.id = e.topic_id
            JOIN lessons l ON l.id = t.lesson_id
            WHERE ?1 IS NULL OR LOWER(l.name) = LOWER(?1)
            ORDER BY e.prerequisite_id, e.topic_id
            "#,
        )
        .bind(lesson)
        .fetch_all(&self.pool)
        .await?;

        let mut concepts_by_node: HashMap<i64, Vec<ConceptId>> = HashMap::new();
        for (prerequisite_id, concept_id) in links {
            concepts_by_node.entry(prerequisite_id).or_default().push(concept_id);
        }
        let mut topics_by_node: HashMap<i64, Vec<TopicId>> = HashMap::new();
        for (prerequisite_id, topic_id) in edges {
            topics_by_node.entry(prerequisite_id).or_default().push(topic_id);
        }

        nodes
            .into_iter()
            .map(|(id, display_name, status)| {
                Ok(CandidateProfile {
                    prerequisite_id: id,
                    display_name,
                    status: parse_status(&status)?,
                    concept_ids: concepts_by_node.remove(&id).unwrap_or_default(),
                    topic_ids: topics_by_node.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn lesson_importance(&self, lesson: Option<&str>) -> Result<Vec<(PrerequisiteId, i64)>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT e.prerequisite_id, SUM(e.frequency) AS importance
            FROM prerequisite_topic_edges e
            JOIN topics t ON t.id = e.topic_id
            JOIN lessons l ON l.id = t.lesson_id
            WHERE ?1 IS NULL OR LOWER(l.name) = LOWER(?1)
            GROUP BY e.prerequisite_id
            "#,
        )
        .bind(lesson)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn evidence_questions(
        &self,
        id: PrerequisiteId,
        limit: usize,
    ) -> Result<Vec<EvidenceQuestion>> {
        let rows: Vec<(i64, i64, i64, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT DISTINCT q.id, q.lesson_id, q.topic_id, q.subtopic_id
            FROM questions q
            JOIN question_concepts qc ON qc.question_id = q.id
            JOIN prerequisite_concepts pc ON pc.concept_id = qc.concept_id AND pc.prerequisite_id = ?1
            JOIN prerequisite_topic_edges e ON e.prerequisite_id = ?1 AND e.topic_id = q.topic_id
            ORDER BY q.id DESC
            LIMIT ?2
            "#,
        )
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(question_id, lesson_id, topic_id, subtopic_id)| EvidenceQuestion {
                question_id,
                lesson_id,
                topic_id,
                subtopic_id,
            })
            .collect())
    }

    async fn status_counts(&self) -> Result<Vec<(PrerequisiteStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM prerequisites GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_status(&status)?, count)))
            .collect()
    }

    async fn strength_counts(&self) -> Result<Vec<(Strength, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT strength, COUNT(*) FROM prerequisite_topic_edges GROUP BY strength")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(strength, count)| Ok((parse_strength(&strength)?, count)))
            .collect()
    }

    async fn prerequisite_counts_per_topic(&self) -> Result<Vec<(TopicId, i64)>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT topic_id, COUNT(*) FROM prerequisite_topic_edges GROUP BY topic_id ORDER BY topic_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn strong_coverage(&self, limit: usize) -> Result<Vec<CoverageEntry>> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT p.id, p.display_name, COUNT(*) AS strong_topic_count
            FROM prerequisite_topic_edges e
            JOIN prerequisites p ON p.id = e.prerequisite_id
            WHERE e.strength = 'strong'
            GROUP BY p.id, p.display_name
            ORDER BY strong_topic_count DESC, p.id
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(prerequisite_id, display_name, strong_topic_count)| CoverageEntry {
                prerequisite_id,
                display_name,
                strong_topic_count,
            })
            .collect())
    }

    async fn topics_without_strong_edges(&self) -> Result<Vec<Topic>> {
        let rows: Vec<TopicRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.lesson_id, l.name AS lesson_name, t.name
            FROM topics t
            JOIN lessons l ON l.id = t.lesson_id
            WHERE NOT EXISTS (
                SELECT 1 FROM prerequisite_topic_edges e
                WHERE e.topic_id = t.id AND e.strength = 'strong'
            )
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TopicRow::into_topic).collect())
    }

    // ========== Audit Log ==========

    async fn recent_events(
        &self,
        prerequisite_id: Option<PrerequisiteId>,
        limit: usize,
    ) -> Result<Vec<GraphEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, event_type, prerequisite_id, payload, created_at
            FROM prerequisite_graph_events
            WHERE ?1 IS NULL OR prerequisite_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(prerequisite_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Loaded graph events");
        rows.into_iter().map(|r| r.into_event()).collect()
    }
}
