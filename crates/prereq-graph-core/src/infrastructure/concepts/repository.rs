//! SQLite implementation of the ConceptRepository
//!
//! Besides the read-only trait, the repository exposes a few write helpers
//! used to seed the registry from snapshots and in tests.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::concepts::{
    Concept, ConceptId, ConceptMatch, ConceptRepository, ConceptStatus, MatchKind, normalize_key,
};
use crate::error::{Error, Result};
use crate::infrastructure::placeholders;

/// SQLite implementation of the concept registry
#[derive(Clone)]
pub struct SqliteConceptRepository {
    pool: SqlitePool,
}

impl SqliteConceptRepository {
    /// Create a new SQLite concept repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a concept, keyed by the normalized preferred label
    pub async fn insert_concept(&self, preferred_label: &str, status: ConceptStatus) -> Result<Concept> {
        let normalized_label = normalize_key(preferred_label);
        if normalized_label.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Concept label '{}' is empty after normalization",
                preferred_label
            )));
        }

        let row: ConceptRow = sqlx::query_as(
            r#"
            INSERT INTO concepts (preferred_label, normalized_label, status)
            VALUES (?, ?, ?)
            RETURNING id, preferred_label, normalized_label, status, merged_into
            "#,
        )
        .bind(preferred_label.trim())
        .bind(&normalized_label)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        debug!(concept_id = row.id, normalized_label = %normalized_label, "Concept inserted");
        row.into_concept()
    }

    /// Add an active alias to a concept; re-adding an alias reactivates it
    pub async fn add_alias(&self, concept_id: ConceptId, alias: &str) -> Result<()> {
        let normalized_alias = normalize_key(alias);
        if normalized_alias.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Alias '{}' is empty after normalization",
                alias
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO concept_aliases (concept_id, alias, normalized_alias, is_active)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(concept_id, normalized_alias) DO UPDATE SET
                alias = excluded.alias,
                is_active = 1
            "#,
        )
        .bind(concept_id)
        .bind(alias.trim())
        .bind(&normalized_alias)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stop an alias from matching without deleting it
    pub async fn deactivate_alias(&self, concept_id: ConceptId, alias: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE concept_aliases SET is_active = 0 WHERE concept_id = ? AND normalized_alias = ?",
        )
        .bind(concept_id)
        .bind(normalize_key(alias))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Redirect a concept into another one
    pub async fn mark_merged(&self, concept_id: ConceptId, merged_into: ConceptId) -> Result<()> {
        let result = sqlx::query("UPDATE concepts SET status = 'merged', merged_into = ? WHERE id = ?")
            .bind(merged_into)
            .bind(concept_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ConceptNotFound(concept_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ConceptRepository for SqliteConceptRepository {
    async fn find_by_normalized_keys(&self, keys: &[String]) -> Result<Vec<ConceptMatch>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let label_sql = format!(
            "SELECT id, preferred_label, normalized_label, status, merged_into
             FROM concepts
             WHERE normalized_label IN ({})
             ORDER BY id",
            placeholders(keys.len())
        );
        let mut label_query = sqlx::query_as::<_, ConceptRow>(&label_sql);
        for key in keys {
            label_query = label_query.bind(key);
        }
        let label_rows = label_query.fetch_all(&self.pool).await?;

        let alias_sql = format!(
            "SELECT DISTINCT c.id, c.preferred_label, c.normalized_label, c.status, c.merged_into
             FROM concept_aliases a
             JOIN concepts c ON c.id = a.concept_id
             WHERE a.is_active = 1 AND a.normalized_alias IN ({})
             ORDER BY c.id",
            placeholders(keys.len())
        );
        let mut alias_query = sqlx::query_as::<_, ConceptRow>(&alias_sql);
        for key in keys {
            alias_query = alias_query.bind(key);
        }
        let alias_rows = alias_query.fetch_all(&self.pool).await?;

        let mut matches = Vec::with_capacity(label_rows.len() + alias_rows.len());
        for row in label_rows {
            matches.push(ConceptMatch {
                concept: row.into_concept()?,
                kind: MatchKind::Label,
            });
        }
        for row in alias_rows {
            matches.push(ConceptMatch {
                concept: row.into_concept()?,
                kind: MatchKind::Alias,
            });
        }
        Ok(matches)
    }

    async fn get_concept(&self, id: ConceptId) -> Result<Option<Concept>> {
        let row: Option<ConceptRow> = sqlx::query_as(
            "SELECT id, preferred_label, normalized_label, status, merged_into FROM concepts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_concept()).transpose()
    }

    async fn get_concepts(&self, ids: &[ConceptId]) -> Result<Vec<Concept>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, preferred_label, normalized_label, status, merged_into
             FROM concepts WHERE id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, ConceptRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter().map(|r| r.into_concept()).collect()
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
pub(crate) struct ConceptRow {
    id: i64,
    preferred_label: String,
    normalized_label: String,
    status: String,
    merged_into: Option<i64>,
}

impl ConceptRow {
    pub(crate) fn into_concept(self) -> Result<Concept> {
        let status = ConceptStatus::parse(&self.status)
            .ok_or_else(|| Error::Other(format!("Invalid concept status: {}", self.status)))?;

        Ok(Concept {
            id: self.id,
            preferred_label: self.preferred_label,
            normalized_label: self.normalized_label,
            status,
            merged_into: self.merged_into,
        })
    }
}
