//! SQLite implementation of the UnresolvedHintRepository

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::concepts::normalize_key;
use crate::domain::hints::{
    HintFilter, HintId, HintStatus, UnresolvedConceptHint, UnresolvedHintReport,
    UnresolvedHintRepository, scope_key,
};
use crate::error::{Error, Result};
use crate::infrastructure::{now_timestamp, parse_timestamp};

const HINT_COLUMNS: &str = "id, hint, normalized_hint, question_id, lesson_id, topic_id, subtopic_id, \
     occurrence_count, status, resolution_note, first_seen_at, last_seen_at";

/// SQLite implementation of the unresolved-hint queue
#[derive(Clone)]
pub struct SqliteUnresolvedHintRepository {
    pool: SqlitePool,
}

impl SqliteUnresolvedHintRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnresolvedHintRepository for SqliteUnresolvedHintRepository {
    async fn record_unresolved_hint(
        &self,
        report: &UnresolvedHintReport,
    ) -> Result<Option<UnresolvedConceptHint>> {
        let normalized = normalize_key(&report.hint);
        if normalized.is_empty() {
            return Ok(None);
        }
        let key = scope_key(&normalized, report.topic_id, report.subtopic_id);
        let now = now_timestamp();

        // Ignored rows keep their count; resolved rows that fail again reopen
        let sql = format!(
            r#"
            INSERT INTO unresolved_concept_hints (
                scope_key, hint, normalized_hint, question_id, lesson_id, topic_id, subtopic_id,
                occurrence_count, status, first_seen_at, last_seen_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, 'pending', ?, ?)
            ON CONFLICT(scope_key) DO UPDATE SET
                occurrence_count = CASE WHEN status = 'ignored'
                    THEN occurrence_count ELSE occurrence_count + 1 END,
                question_id = CASE WHEN status = 'ignored'
                    THEN question_id ELSE excluded.question_id END,
                last_seen_at = CASE WHEN status = 'ignored'
                    THEN last_seen_at ELSE excluded.last_seen_at END,
                status = CASE WHEN status = 'resolved' THEN 'pending' ELSE status END
            RETURNING {}
            "#,
            HINT_COLUMNS
        );

        let row: HintRow = sqlx::query_as(&sql)
            .bind(&key)
            .bind(report.hint.trim())
            .bind(&normalized)
            .bind(report.question_id)
            .bind(report.lesson_id)
            .bind(report.topic_id)
            .bind(report.subtopic_id)
            .bind(&now)
            .bind(&now)
            .fetch_one(&self.pool)
            .await?;

        debug!(
            hint_id = row.id,
            scope_key = %key,
            occurrences = row.occurrence_count,
            "Recorded unresolved concept hint"
        );
        row.into_hint().map(Some)
    }

    async fn get_hint(&self, id: HintId) -> Result<Option<UnresolvedConceptHint>> {
        let sql = format!("SELECT {} FROM unresolved_concept_hints WHERE id = ?", HINT_COLUMNS);
        let row: Option<HintRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_hint()).transpose()
    }

    async fn list_hints(&self, filter: &HintFilter) -> Result<Vec<UnresolvedConceptHint>> {
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let sql = format!(
            r#"
            SELECT {}
            FROM unresolved_concept_hints
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR topic_id = ?2)
            ORDER BY occurrence_count DESC, last_seen_at DESC, id
            LIMIT ?3
            "#,
            HINT_COLUMNS
        );

        let rows: Vec<HintRow> = sqlx::query_as(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.topic_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.into_hint()).collect()
    }

    async fn set_hint_status(
        &self,
        id: HintId,
        status: HintStatus,
        note: Option<&str>,
    ) -> Result<UnresolvedConceptHint> {
        let sql = format!(
            "UPDATE unresolved_concept_hints SET status = ?, resolution_note = ? WHERE id = ? RETURNING {}",
            HINT_COLUMNS
        );
        let row: Option<HintRow> = sqlx::query_as(&sql)
            .bind(status.as_str())
            .bind(note)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(Error::HintNotFound(id))?.into_hint()
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
struct HintRow {
    id: i64,
    hint: String,
    normalized_hint: String,
    question_id: Option<i64>,
    lesson_id: Option<i64>,
    topic_id: i64,
    subtopic_id: Option<i64>,
    occurrence_count: i64,
    status: String,
    resolution_note: Option<String>,
    first_seen_at: String,
    last_seen_at: String,
}

impl HintRow {
    fn into_hint(self) -> Result<UnresolvedConceptHint> {
        let status = HintStatus::parse(&self.status)
            .ok_or_else(|| Error::Other(format!("Invalid hint status: {}", self.status)))?;

        Ok(UnresolvedConceptHint {
            id: self.id,
            hint: self.hint,
            normalized_hint: self.normalized_hint,
            question_id: self.question_id,
            lesson_id: self.lesson_id,
            topic_id: self.topic_id,
            subtopic_id: self.subtopic_id,
            occurrence_count: self.occurrence_count,
            status,
            resolution_note: self.resolution_note,
            first_seen_at: parse_timestamp(&self.first_seen_at),
            last_seen_at: parse_timestamp(&self.last_seen_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqliteUnresolvedHintRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");

        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        SqliteUnresolvedHintRepository::new(pool)
    }

    fn report(hint: &str, topic_id: i64, subtopic_id: Option<i64>) -> UnresolvedHintReport {
        UnresolvedHintReport {
            hint: hint.to_string(),
            question_id: Some(1),
            lesson_id: Some(1),
            topic_id,
            subtopic_id,
        }
    }

    #[tokio::test]
    async fn test_repeated_hint_increments_count() {
        let repo = setup_test_db().await;

        let first = repo.record_unresolved_hint(&report("Canalis opticus", 10, None)).await.unwrap().unwrap();
        let second = repo.record_unresolved_hint(&report("canalis  OPTICUS.", 10, None)).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.occurrence_count, 2);
        assert_eq!(second.normalized_hint, "canalis opticus");
        assert_eq!(second.status, HintStatus::Pending);
    }

    #[tokio::test]
    async fn test_scope_separates_topics_and_subtopics() {
        let repo = setup_test_db().await;

        repo.record_unresolved_hint(&report("orbita apeksi", 10, None)).await.unwrap();
        repo.record_unresolved_hint(&report("orbita apeksi", 10, Some(3))).await.unwrap();
        repo.record_unresolved_hint(&report("orbita apeksi", 11, None)).await.unwrap();

        let all = repo.list_hints(&HintFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|h| h.occurrence_count == 1));

        let topic_10 = repo
            .list_hints(&HintFilter { topic_id: Some(10), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(topic_10.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_hint_is_not_recorded() {
        let repo = setup_test_db().await;
        assert!(repo.record_unresolved_hint(&report(" ... ", 10, None)).await.unwrap().is_none());
        assert!(repo.list_hints(&HintFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ignored_hint_stays_ignored() {
        let repo = setup_test_db().await;
        let hint = repo.record_unresolved_hint(&report("sella turcica", 10, None)).await.unwrap().unwrap();
        repo.set_hint_status(hint.id, HintStatus::Ignored, Some("not anatomy")).await.unwrap();

        let again = repo.record_unresolved_hint(&report("sella turcica", 10, None)).await.unwrap().unwrap();
        assert_eq!(again.status, HintStatus::Ignored);
        assert_eq!(again.occurrence_count, 1);
        assert_eq!(again.resolution_note.as_deref(), Some("not anatomy"));
    }

    #[tokio::test]
    async fn test_resolved_hint_reopens_on_new_failure() {
        let repo = setup_test_db().await;
        let hint = repo.record_unresolved_hint(&report("pterygopalatin fossa", 10, None)).await.unwrap().unwrap();
        repo.set_hint_status(hint.id, HintStatus::Resolved, Some("alias added")).await.unwrap();

        let again = repo.record_unresolved_hint(&report("pterygopalatin fossa", 10, None)).await.unwrap().unwrap();
        assert_eq!(again.status, HintStatus::Pending);
        assert_eq!(again.occurrence_count, 2);
    }

    #[tokio::test]
    async fn test_list_orders_by_frequency_and_filters_status() {
        let repo = setup_test_db().await;
        for _ in 0..3 {
            repo.record_unresolved_hint(&report("foramen rotundum", 10, None)).await.unwrap();
        }
        let rare = repo.record_unresolved_hint(&report("foramen spinosum", 10, None)).await.unwrap().unwrap();
        repo.set_hint_status(rare.id, HintStatus::Ignored, None).await.unwrap();

        let all = repo.list_hints(&HintFilter::default()).await.unwrap();
        assert_eq!(all[0].normalized_hint, "foramen rotundum");
        assert_eq!(all[0].occurrence_count, 3);

        let pending = repo
            .list_hints(&HintFilter { status: Some(HintStatus::Pending), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let limited = repo
            .list_hints(&HintFilter { limit: Some(1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_set_status_unknown_hint() {
        let repo = setup_test_db().await;
        assert!(matches!(
            repo.set_hint_status(77, HintStatus::Resolved, None).await,
            Err(Error::HintNotFound(77))
        ));
    }
}
