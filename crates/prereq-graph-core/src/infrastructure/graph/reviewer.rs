//! Transactional reviewer operations
//!
//! Each public function here runs in one transaction: every source row is
//! re-read inside it, and any error rolls the whole change back.

use sqlx::{SqliteConnection, SqlitePool};

use crate::config::StrengthConfig;
use crate::domain::concepts::{Concept, ConceptId, normalize_key};
use crate::domain::prerequisites::{
    AggregatedEdge, CanonicalKey, DEPRECATED_BY_REVIEWER_REASON, EdgeSource, GraphEvent,
    LabelOnlyMergeKind, LabelOnlyMergeOutcome, LabelOnlyMergeRequest, MergeRequest, MergeSummary,
    MergeTarget, NewPrerequisite, Prerequisite, PrerequisiteClassifier, PrerequisiteId,
    PrerequisiteStatus, PrerequisiteTopicEdge, aggregate_edges,
};
use crate::error::{Error, Result};
use crate::infrastructure::{format_timestamp, now_timestamp, placeholders};

use super::rows::{EdgeRow, PrerequisiteRow};

// ========== Connection Helpers ==========

pub(super) async fn fetch_prerequisite(
    conn: &mut SqliteConnection,
    id: PrerequisiteId,
) -> Result<Option<Prerequisite>> {
    let row: Option<PrerequisiteRow> = sqlx::query_as("SELECT * FROM prerequisites WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| r.into_prerequisite()).transpose()
}

pub(super) async fn fetch_by_key(
    conn: &mut SqliteConnection,
    key: &CanonicalKey,
) -> Result<Option<Prerequisite>> {
    let row: Option<PrerequisiteRow> =
        sqlx::query_as("SELECT * FROM prerequisites WHERE canonical_key = ?")
            .bind(key.as_str())
            .fetch_optional(&mut *conn)
            .await?;

    row.map(|r| r.into_prerequisite()).transpose()
}

/// Match on the stored name first, then on the normalized display name
pub(super) async fn fetch_by_name(
    conn: &mut SqliteConnection,
    normalized_name: &str,
) -> Result<Option<Prerequisite>> {
    let row: Option<PrerequisiteRow> =
        sqlx::query_as("SELECT * FROM prerequisites WHERE name = ? ORDER BY id LIMIT 1")
            .bind(normalized_name)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(row) = row {
        return row.into_prerequisite().map(Some);
    }

    let displays: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, display_name FROM prerequisites ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;

    match displays
        .into_iter()
        .find(|(_, display)| normalize_key(display) == normalized_name)
    {
        Some((id, _)) => fetch_prerequisite(conn, id).await,
        None => Ok(None),
    }
}

/// Insert a node unless its key exists; returns whether a row was written
pub(super) async fn insert_prerequisite(
    conn: &mut SqliteConnection,
    node: &NewPrerequisite,
) -> Result<bool> {
    let now = now_timestamp();
    let result = sqlx::query(
        r#"
        INSERT INTO prerequisites (canonical_key, name, display_name, status, review_reason, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(canonical_key) DO NOTHING
        "#,
    )
    .bind(node.canonical_key.as_str())
    .bind(&node.name)
    .bind(&node.display_name)
    .bind(node.status.as_str())
    .bind(&node.review_reason)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn concept_ids_of(
    conn: &mut SqliteConnection,
    ids: &[PrerequisiteId],
) -> Result<Vec<ConceptId>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT DISTINCT concept_id FROM prerequisite_concepts
         WHERE prerequisite_id IN ({}) ORDER BY concept_id",
        placeholders(ids.len())
    );
    let mut query = sqlx::query_as::<_, (i64,)>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Link concepts to a node, skipping existing links; returns the number added
pub(super) async fn link_concepts(
    conn: &mut SqliteConnection,
    prerequisite_id: PrerequisiteId,
    concept_ids: &[ConceptId],
) -> Result<usize> {
    let mut inserted = 0;
    for concept_id in concept_ids {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO prerequisite_concepts (prerequisite_id, concept_id) VALUES (?, ?)",
        )
        .bind(prerequisite_id)
        .bind(concept_id)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected() as usize;
    }
    Ok(inserted)
}

pub(super) async fn edges_of(
    conn: &mut SqliteConnection,
    ids: &[PrerequisiteId],
) -> Result<Vec<PrerequisiteTopicEdge>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT * FROM prerequisite_topic_edges
         WHERE prerequisite_id IN ({}) ORDER BY prerequisite_id, topic_id",
        placeholders(ids.len())
    );
    let mut query = sqlx::query_as::<_, EdgeRow>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    rows.into_iter().map(|r| r.into_edge()).collect()
}

/// Drop every edge of `involved` and write `edges` onto `target`
async fn replace_edges(
    conn: &mut SqliteConnection,
    target: PrerequisiteId,
    involved: &[PrerequisiteId],
    edges: &[AggregatedEdge],
    source: EdgeSource,
) -> Result<()> {
    let sql = format!(
        "DELETE FROM prerequisite_topic_edges WHERE prerequisite_id IN ({})",
        placeholders(involved.len())
    );
    let mut delete = sqlx::query(&sql);
    for id in involved {
        delete = delete.bind(id);
    }
    delete.execute(&mut *conn).await?;

    let now = now_timestamp();
    for edge in edges {
        sqlx::query(
            r#"
            INSERT INTO prerequisite_topic_edges
            (prerequisite_id, topic_id, subtopic_id, frequency, strength, source, last_updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(target)
        .bind(edge.topic_id)
        .bind(edge.subtopic_id)
        .bind(edge.frequency)
        .bind(edge.strength.as_str())
        .bind(source.as_str())
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn delete_prerequisites(conn: &mut SqliteConnection, ids: &[PrerequisiteId]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let sql = format!("DELETE FROM prerequisites WHERE id IN ({})", placeholders(ids.len()));
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

async fn touch(conn: &mut SqliteConnection, id: PrerequisiteId) -> Result<()> {
    sqlx::query("UPDATE prerequisites SET updated_at = ? WHERE id = ?")
        .bind(now_timestamp())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) async fn insert_event(conn: &mut SqliteConnection, event: &GraphEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO prerequisite_graph_events (id, event_type, prerequisite_id, payload, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(event.event_type.as_str())
    .bind(event.prerequisite_id)
    .bind(serde_json::to_string(&event.payload)?)
    .bind(format_timestamp(event.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn require(conn: &mut SqliteConnection, id: PrerequisiteId) -> Result<Prerequisite> {
    fetch_prerequisite(conn, id)
        .await?
        .ok_or(Error::PrerequisiteNotFound(id))
}

// ========== Reviewer Operations ==========

/// Resolve a by-name merge target, creating a label-only node when absent
async fn resolve_named_target(conn: &mut SqliteConnection, label: &str) -> Result<Prerequisite> {
    let normalized = normalize_key(label);
    if let Some(existing) = fetch_by_name(conn, &normalized).await? {
        return Ok(existing);
    }

    let node = NewPrerequisite::label_only(label)?;
    let created = insert_prerequisite(conn, &node).await?;
    let target = fetch_by_key(conn, &node.canonical_key)
        .await?
        .ok_or_else(|| Error::Other(format!("Merge target '{}' vanished after insert", label)))?;

    if created {
        let event = GraphEvent::created(target.id, &target.canonical_key, target.status, &[]);
        insert_event(conn, &event).await?;
    }
    Ok(target)
}

pub(super) async fn merge_prerequisites(
    pool: &SqlitePool,
    request: &MergeRequest,
    strength: &StrengthConfig,
) -> Result<MergeSummary> {
    let mut tx = pool.begin().await?;

    for id in &request.ids {
        require(&mut tx, *id).await?;
    }

    let canonical = match &request.target {
        MergeTarget::Id(id) => require(&mut tx, *id).await?,
        MergeTarget::Name(label) => resolve_named_target(&mut tx, label).await?,
    };

    let removed_ids: Vec<PrerequisiteId> = request
        .ids
        .iter()
        .copied()
        .filter(|id| *id != canonical.id)
        .collect();
    let mut involved = removed_ids.clone();
    involved.push(canonical.id);

    let removed_concepts = concept_ids_of(&mut tx, &removed_ids).await?;
    let concepts_merged = link_concepts(&mut tx, canonical.id, &removed_concepts).await?;

    let edges = edges_of(&mut tx, &involved).await?;
    let aggregated = aggregate_edges(&edges, strength);
    replace_edges(&mut tx, canonical.id, &involved, &aggregated, EdgeSource::AdminMerge).await?;

    delete_prerequisites(&mut tx, &removed_ids).await?;
    touch(&mut tx, canonical.id).await?;

    let summary = MergeSummary {
        canonical_id: canonical.id,
        removed_ids,
        concepts_merged,
        edges_updated: aggregated.len(),
    };
    let event = GraphEvent::merged(
        summary.canonical_id,
        &summary.removed_ids,
        summary.concepts_merged,
        summary.edges_updated,
    );
    insert_event(&mut tx, &event).await?;

    tx.commit().await?;
    Ok(summary)
}

pub(super) async fn merge_label_only(
    pool: &SqlitePool,
    request: &LabelOnlyMergeRequest,
    strength: &StrengthConfig,
) -> Result<LabelOnlyMergeOutcome> {
    let mut tx = pool.begin().await?;

    let source = require(&mut tx, request.prerequisite_id).await?;
    if !source.is_awaiting_concepts() {
        return Err(Error::NotLabelOnly(source.id));
    }

    let concept_ids = request.concept_ids();
    let key = CanonicalKey::for_concepts(&concept_ids)?;

    let outcome = match fetch_by_key(&mut tx, &key).await? {
        Some(target) if target.id != source.id => {
            let involved = [source.id, target.id];
            let edges = edges_of(&mut tx, &involved).await?;
            let aggregated = aggregate_edges(&edges, strength);
            replace_edges(&mut tx, target.id, &involved, &aggregated, EdgeSource::AdminMerge).await?;

            if let Some(label) = &request.admin_label {
                sqlx::query("UPDATE prerequisites SET display_name = ?, updated_at = ? WHERE id = ?")
                    .bind(label)
                    .bind(now_timestamp())
                    .bind(target.id)
                    .execute(&mut *tx)
                    .await?;
            } else {
                touch(&mut tx, target.id).await?;
            }

            let concepts_linked = link_concepts(&mut tx, target.id, &concept_ids).await?;
            delete_prerequisites(&mut tx, &[source.id]).await?;

            let event = GraphEvent::label_only_merged(target.id, source.id, aggregated.len());
            insert_event(&mut tx, &event).await?;

            LabelOnlyMergeOutcome {
                kind: LabelOnlyMergeKind::Merged { target_id: target.id },
                prerequisite_id: target.id,
                edges_updated: aggregated.len(),
                concepts_linked,
            }
        }
        _ => {
            let display_name = request
                .admin_label
                .clone()
                .unwrap_or_else(|| source.display_name.clone());
            let name = match normalize_key(&display_name) {
                name if name.is_empty() => source.name.clone(),
                name => name,
            };

            sqlx::query(
                r#"
                UPDATE prerequisites
                SET canonical_key = ?, name = ?, display_name = ?, status = 'active',
                    review_reason = NULL, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(key.as_str())
            .bind(&name)
            .bind(&display_name)
            .bind(now_timestamp())
            .bind(source.id)
            .execute(&mut *tx)
            .await?;

            // The new key names exactly these concepts
            sqlx::query("DELETE FROM prerequisite_concepts WHERE prerequisite_id = ?")
                .bind(source.id)
                .execute(&mut *tx)
                .await?;
            let concepts_linked = link_concepts(&mut tx, source.id, &concept_ids).await?;

            let edges = sqlx::query(
                "UPDATE prerequisite_topic_edges SET source = 'admin_upgrade', last_updated_at = ?
                 WHERE prerequisite_id = ?",
            )
            .bind(now_timestamp())
            .bind(source.id)
            .execute(&mut *tx)
            .await?;

            let event = GraphEvent::upgraded(source.id, &source.canonical_key, &key, &concept_ids);
            insert_event(&mut tx, &event).await?;

            LabelOnlyMergeOutcome {
                kind: LabelOnlyMergeKind::Upgraded,
                prerequisite_id: source.id,
                edges_updated: edges.rows_affected() as usize,
                concepts_linked,
            }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

pub(super) async fn relink_concepts(
    pool: &SqlitePool,
    id: PrerequisiteId,
    concepts: &[Concept],
    classifier: &PrerequisiteClassifier,
) -> Result<Prerequisite> {
    let mut tx = pool.begin().await?;

    let node = require(&mut tx, id).await?;
    let previous_ids = concept_ids_of(&mut tx, &[id]).await?;

    let mut concept_ids: Vec<ConceptId> = concepts.iter().map(|c| c.id).collect();
    concept_ids.sort_unstable();
    concept_ids.dedup();
    let key = CanonicalKey::for_concepts(&concept_ids)?;

    if let Some(other) = fetch_by_key(&mut tx, &key).await? {
        if other.id != id {
            return Err(Error::CanonicalKeyConflict {
                key: key.to_string(),
                existing_id: other.id,
            });
        }
    }

    sqlx::query("DELETE FROM prerequisite_concepts WHERE prerequisite_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    link_concepts(&mut tx, id, &concept_ids).await?;

    let hints: Vec<String> = concepts.iter().map(|c| c.preferred_label.clone()).collect();
    let classification = classifier.classify(&node.display_name, &hints, concepts);

    let row: PrerequisiteRow = sqlx::query_as(
        r#"
        UPDATE prerequisites
        SET canonical_key = ?, status = ?, review_reason = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(key.as_str())
    .bind(classification.status.as_str())
    .bind(&classification.review_reason)
    .bind(now_timestamp())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    let updated = row.into_prerequisite()?;

    let event = GraphEvent::relinked(id, &previous_ids, &concept_ids, updated.status);
    insert_event(&mut tx, &event).await?;

    tx.commit().await?;
    Ok(updated)
}

pub(super) async fn deprecate(pool: &SqlitePool, id: PrerequisiteId) -> Result<Prerequisite> {
    let mut tx = pool.begin().await?;

    let node = require(&mut tx, id).await?;

    let row: PrerequisiteRow = sqlx::query_as(
        "UPDATE prerequisites SET status = ?, review_reason = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(PrerequisiteStatus::Deprecated.as_str())
    .bind(DEPRECATED_BY_REVIEWER_REASON)
    .bind(now_timestamp())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    let updated = row.into_prerequisite()?;

    insert_event(&mut tx, &GraphEvent::deprecated(id, node.status)).await?;

    tx.commit().await?;
    Ok(updated)
}
