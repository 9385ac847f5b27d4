//! Registry snapshot import
//!
//! Loads lessons, topics, subtopics, concepts, aliases and analyzed questions
//! from a JSON snapshot exported by the upstream registries. Used to seed a
//! local database for tooling and tests; the engine never writes these tables
//! itself.
//!
//! # Format
//!
//! ```json
//! {
//!   "lessons":   [{"id": 1, "name": "Anatomi"}],
//!   "topics":    [{"id": 10, "lesson_id": 1, "name": "Orbita"}],
//!   "subtopics": [{"id": 100, "topic_id": 10, "name": "Orbita duvarları"}],
//!   "concepts":  [{"id": 7, "preferred_label": "Orbita", "status": "active"}],
//!   "aliases":   [{"concept_id": 7, "alias": "göz çukuru"}],
//!   "questions": [{"id": 1, "lesson_id": 1, "topic_id": 10,
//!                  "analysis_status": "completed", "analysis_payload": {...}}]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::domain::concepts::{ConceptStatus, normalize_key};
use crate::domain::ingestion::AnalysisStatus;
use crate::error::{Error, Result};

/// Tables in import order (parents before children)
pub const SNAPSHOT_TABLES: &[&str] = &[
    "lessons",
    "topics",
    "subtopics",
    "concepts",
    "concept_aliases",
    "questions",
];

// =============================================================================
// Record Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: i64,
    pub lesson_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtopicRecord {
    pub id: i64,
    pub topic_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptRecord {
    pub id: i64,
    pub preferred_label: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub merged_into: Option<i64>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRecord {
    pub concept_id: i64,
    pub alias: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: i64,
    pub lesson_id: i64,
    #[serde(default)]
    pub topic_id: Option<i64>,
    #[serde(default)]
    pub subtopic_id: Option<i64>,
    #[serde(default)]
    pub analysis_status: Option<String>,
    /// Either an embedded JSON document or its serialized text
    #[serde(default)]
    pub analysis_payload: Option<serde_json::Value>,
}

/// Full registry snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub lessons: Vec<LessonRecord>,
    #[serde(default)]
    pub topics: Vec<TopicRecord>,
    #[serde(default)]
    pub subtopics: Vec<SubtopicRecord>,
    #[serde(default)]
    pub concepts: Vec<ConceptRecord>,
    #[serde(default)]
    pub aliases: Vec<AliasRecord>,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
}

/// Result of an import operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    /// Number of records imported per table
    pub record_counts: HashMap<String, usize>,
    /// Total records imported
    pub total_records: usize,
    /// Records that were skipped, with the reason
    pub warnings: Vec<String>,
}

impl ImportResult {
    fn count(&mut self, table: &str) {
        *self.record_counts.entry(table.to_string()).or_insert(0) += 1;
        self.total_records += 1;
    }
}

// =============================================================================
// Import Functions
// =============================================================================

/// Read and parse a snapshot file
pub fn load_snapshot(path: &Path) -> Result<RegistrySnapshot> {
    let content = std::fs::read_to_string(path)?;
    let snapshot = serde_json::from_str(&content)?;
    Ok(snapshot)
}

/// Read a snapshot file and import it
pub async fn import_snapshot_file(pool: &SqlitePool, path: &Path) -> Result<ImportResult> {
    let snapshot = load_snapshot(path)?;
    import_snapshot(pool, &snapshot).await
}

/// Upsert every snapshot record in one transaction
///
/// Rows are keyed by their registry IDs, so importing the same snapshot
/// twice leaves the database unchanged. A record that violates a constraint
/// is skipped with a warning instead of aborting the import.
pub async fn import_snapshot(pool: &SqlitePool, snapshot: &RegistrySnapshot) -> Result<ImportResult> {
    let mut result = ImportResult::default();
    let mut tx = pool.begin().await?;

    for lesson in &snapshot.lessons {
        let outcome = sqlx::query(
            "INSERT INTO lessons (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(lesson.id)
        .bind(lesson.name.trim())
        .execute(&mut *tx)
        .await;
        record(&mut result, "lessons", lesson.id, outcome);
    }

    for topic in &snapshot.topics {
        let outcome = sqlx::query(
            "INSERT INTO topics (id, lesson_id, name) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET lesson_id = excluded.lesson_id, name = excluded.name",
        )
        .bind(topic.id)
        .bind(topic.lesson_id)
        .bind(topic.name.trim())
        .execute(&mut *tx)
        .await;
        record(&mut result, "topics", topic.id, outcome);
    }

    for subtopic in &snapshot.subtopics {
        let outcome = sqlx::query(
            "INSERT INTO subtopics (id, topic_id, name) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET topic_id = excluded.topic_id, name = excluded.name",
        )
        .bind(subtopic.id)
        .bind(subtopic.topic_id)
        .bind(subtopic.name.trim())
        .execute(&mut *tx)
        .await;
        record(&mut result, "subtopics", subtopic.id, outcome);
    }

    // Merge redirects are applied after every concept exists
    let mut redirects: Vec<(i64, i64)> = Vec::new();
    for concept in &snapshot.concepts {
        let normalized = normalize_key(&concept.preferred_label);
        if normalized.is_empty() {
            result
                .warnings
                .push(format!("concepts {}: label is empty after normalization", concept.id));
            continue;
        }
        let status = match concept.status.as_deref().map(ConceptStatus::parse) {
            None => ConceptStatus::Active,
            Some(Some(status)) => status,
            Some(None) => {
                result.warnings.push(format!(
                    "concepts {}: unknown status '{}'",
                    concept.id,
                    concept.status.as_deref().unwrap_or_default()
                ));
                continue;
            }
        };
        let stored_status = if status == ConceptStatus::Merged {
            match concept.merged_into {
                Some(target) => redirects.push((concept.id, target)),
                None => {
                    result
                        .warnings
                        .push(format!("concepts {}: merged without merged_into", concept.id));
                    continue;
                }
            }
            ConceptStatus::Active
        } else {
            status
        };

        let outcome = sqlx::query(
            r#"
            INSERT INTO concepts (id, preferred_label, normalized_label, status, merged_into)
            VALUES (?, ?, ?, ?, NULL)
            ON CONFLICT(id) DO UPDATE SET
                preferred_label = excluded.preferred_label,
                normalized_label = excluded.normalized_label,
                status = excluded.status,
                merged_into = NULL
            "#,
        )
        .bind(concept.id)
        .bind(concept.preferred_label.trim())
        .bind(&normalized)
        .bind(stored_status.as_str())
        .execute(&mut *tx)
        .await;
        record(&mut result, "concepts", concept.id, outcome);
    }

    for (concept_id, target) in redirects {
        let outcome = sqlx::query("UPDATE concepts SET status = 'merged', merged_into = ? WHERE id = ?")
            .bind(target)
            .bind(concept_id)
            .execute(&mut *tx)
            .await;
        if let Err(e) = outcome {
            result
                .warnings
                .push(format!("concepts {}: redirect to {} failed: {}", concept_id, target, e));
        }
    }

    for alias in &snapshot.aliases {
        let normalized = normalize_key(&alias.alias);
        if normalized.is_empty() {
            result.warnings.push(format!(
                "concept_aliases {}: alias '{}' is empty after normalization",
                alias.concept_id, alias.alias
            ));
            continue;
        }
        let outcome = sqlx::query(
            r#"
            INSERT INTO concept_aliases (concept_id, alias, normalized_alias, is_active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(concept_id, normalized_alias) DO UPDATE SET
                alias = excluded.alias,
                is_active = excluded.is_active
            "#,
        )
        .bind(alias.concept_id)
        .bind(alias.alias.trim())
        .bind(&normalized)
        .bind(alias.is_active)
        .execute(&mut *tx)
        .await;
        record(&mut result, "concept_aliases", alias.concept_id, outcome);
    }

    for question in &snapshot.questions {
        let status = match question.analysis_status.as_deref() {
            None => AnalysisStatus::Pending,
            Some(raw) => match AnalysisStatus::parse(raw) {
                Some(status) => status,
                None => {
                    result.warnings.push(format!(
                        "questions {}: unknown analysis status '{}'",
                        question.id, raw
                    ));
                    continue;
                }
            },
        };
        let payload = match &question.analysis_payload {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(raw)) => Some(raw.clone()),
            Some(value) => Some(serde_json::to_string(value)?),
        };

        let outcome = sqlx::query(
            r#"
            INSERT INTO questions (id, lesson_id, topic_id, subtopic_id, analysis_status, analysis_payload)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                lesson_id = excluded.lesson_id,
                topic_id = excluded.topic_id,
                subtopic_id = excluded.subtopic_id,
                analysis_status = excluded.analysis_status,
                analysis_payload = excluded.analysis_payload
            "#,
        )
        .bind(question.id)
        .bind(question.lesson_id)
        .bind(question.topic_id)
        .bind(question.subtopic_id)
        .bind(status.as_str())
        .bind(payload)
        .execute(&mut *tx)
        .await;
        record(&mut result, "questions", question.id, outcome);
    }

    tx.commit().await.map_err(Error::DatabaseError)?;

    info!(
        total_records = result.total_records,
        warnings = result.warnings.len(),
        "Imported registry snapshot"
    );
    Ok(result)
}

fn record(
    result: &mut ImportResult,
    table: &str,
    id: i64,
    outcome: std::result::Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error>,
) {
    match outcome {
        Ok(_) => result.count(table),
        Err(e) => {
            warn!(table, id, error = %e, "Skipping snapshot record");
            result.warnings.push(format!("{} {}: {}", table, id, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::concepts::{ConceptRepository, ConceptResolver};
    use crate::infrastructure::concepts::SqliteConceptRepository;
    use crate::storage::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");

        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    fn sample() -> RegistrySnapshot {
        serde_json::from_value(serde_json::json!({
            "lessons": [{"id": 1, "name": "Anatomi"}],
            "topics": [{"id": 10, "lesson_id": 1, "name": "Orbita"}],
            "subtopics": [{"id": 100, "topic_id": 10, "name": "Orbita duvarları"}],
            "concepts": [
                {"id": 7, "preferred_label": "Orbita"},
                {"id": 8, "preferred_label": "Göz çukuru", "status": "merged", "merged_into": 7}
            ],
            "aliases": [{"concept_id": 7, "alias": "orbital cavity"}],
            "questions": [{
                "id": 1, "lesson_id": 1, "topic_id": 10, "subtopic_id": 100,
                "analysis_status": "completed",
                "analysis_payload": {"prerequisites": [{"label": "Orbita", "conceptHints": ["orbita"]}]}
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_import_counts_records() {
        let pool = setup_test_db().await;
        let result = import_snapshot(&pool, &sample()).await.unwrap();

        assert_eq!(result.total_records, 7);
        assert_eq!(result.record_counts["concepts"], 2);
        assert!(result.warnings.is_empty());

        let (payload,): (String,) = sqlx::query_as("SELECT analysis_payload FROM questions WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(payload.contains("conceptHints"));
    }

    #[tokio::test]
    async fn test_import_is_idempotent_and_applies_redirects() {
        let pool = setup_test_db().await;
        import_snapshot(&pool, &sample()).await.unwrap();
        import_snapshot(&pool, &sample()).await.unwrap();

        let concepts = SqliteConceptRepository::new(pool.clone());
        let merged = concepts.get_concept(8).await.unwrap().unwrap();
        assert_eq!(merged.status, ConceptStatus::Merged);
        assert_eq!(merged.merged_into, Some(7));

        let resolver = ConceptResolver::new(Arc::new(concepts));
        let resolved = resolver.resolve(&["Orbital cavity".to_string()]).await.unwrap();
        assert_eq!(resolved[0].id, 7);
    }

    #[tokio::test]
    async fn test_bad_records_become_warnings() {
        let pool = setup_test_db().await;
        let snapshot: RegistrySnapshot = serde_json::from_value(serde_json::json!({
            "lessons": [{"id": 1, "name": "Anatomi"}],
            "topics": [{"id": 10, "lesson_id": 99, "name": "Orphan"}],
            "concepts": [{"id": 1, "preferred_label": " ... "}],
            "questions": [{"id": 1, "lesson_id": 1, "analysis_status": "done"}]
        }))
        .unwrap();

        let result = import_snapshot(&pool, &snapshot).await.unwrap();
        assert_eq!(result.total_records, 1);
        assert_eq!(result.warnings.len(), 3);
    }

    #[tokio::test]
    async fn test_load_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, serde_json::to_string(&sample()).unwrap()).unwrap();

        let pool = setup_test_db().await;
        let result = import_snapshot_file(&pool, &path).await.unwrap();
        assert_eq!(result.record_counts["questions"], 1);

        assert!(load_snapshot(&dir.path().join("missing.json")).is_err());
    }
}
