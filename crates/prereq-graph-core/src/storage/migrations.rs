//! Database migrations
//!
//! This module manages SQLite schema migrations for prereq-graph.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Curriculum and concept registry tables (read by the engine)
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS lessons (
        id INTEGER PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY NOT NULL,
        lesson_id INTEGER NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
        name TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_topics_lesson_id ON topics(lesson_id);

    CREATE TABLE IF NOT EXISTS subtopics (
        id INTEGER PRIMARY KEY NOT NULL,
        topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS concepts (
        id INTEGER PRIMARY KEY NOT NULL,
        preferred_label TEXT NOT NULL,
        normalized_label TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'needs_review', 'merged')),
        merged_into INTEGER REFERENCES concepts(id),
        CHECK (status != 'merged' OR merged_into IS NOT NULL)
    );

    CREATE TABLE IF NOT EXISTS concept_aliases (
        id INTEGER PRIMARY KEY NOT NULL,
        concept_id INTEGER NOT NULL REFERENCES concepts(id) ON DELETE CASCADE,
        alias TEXT NOT NULL,
        normalized_alias TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        UNIQUE (concept_id, normalized_alias)
    );

    CREATE INDEX IF NOT EXISTS idx_concept_aliases_normalized ON concept_aliases(normalized_alias);

    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY NOT NULL,
        lesson_id INTEGER NOT NULL REFERENCES lessons(id) ON DELETE CASCADE,
        topic_id INTEGER REFERENCES topics(id) ON DELETE SET NULL,
        subtopic_id INTEGER REFERENCES subtopics(id) ON DELETE SET NULL,
        analysis_status TEXT NOT NULL DEFAULT 'pending'
            CHECK (analysis_status IN ('pending', 'processing', 'completed', 'failed')),
        analysis_payload TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_questions_status ON questions(analysis_status);

    CREATE TABLE IF NOT EXISTS question_concepts (
        question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        concept_id INTEGER NOT NULL REFERENCES concepts(id) ON DELETE CASCADE,
        confidence REAL NOT NULL DEFAULT 1.0,
        PRIMARY KEY (question_id, concept_id)
    );

    CREATE INDEX IF NOT EXISTS idx_question_concepts_concept ON question_concepts(concept_id);
"#;

/// Migration 2: Prerequisite graph (nodes, concept links, topic edges)
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS prerequisites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        canonical_key TEXT NOT NULL,
        name TEXT NOT NULL,
        display_name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'needs_review'
            CHECK (status IN ('active', 'needs_review', 'deprecated')),
        review_reason TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_prerequisites_canonical_key ON prerequisites(canonical_key);
    CREATE INDEX IF NOT EXISTS idx_prerequisites_name ON prerequisites(name);
    CREATE INDEX IF NOT EXISTS idx_prerequisites_status ON prerequisites(status);

    CREATE TABLE IF NOT EXISTS prerequisite_concepts (
        prerequisite_id INTEGER NOT NULL REFERENCES prerequisites(id) ON DELETE CASCADE,
        concept_id INTEGER NOT NULL REFERENCES concepts(id) ON DELETE CASCADE,
        PRIMARY KEY (prerequisite_id, concept_id)
    );

    CREATE INDEX IF NOT EXISTS idx_prerequisite_concepts_concept ON prerequisite_concepts(concept_id);

    CREATE TABLE IF NOT EXISTS prerequisite_topic_edges (
        prerequisite_id INTEGER NOT NULL REFERENCES prerequisites(id) ON DELETE CASCADE,
        topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
        subtopic_id INTEGER REFERENCES subtopics(id) ON DELETE SET NULL,
        frequency INTEGER NOT NULL DEFAULT 1 CHECK (frequency > 0),
        strength TEXT NOT NULL DEFAULT 'weak' CHECK (strength IN ('weak', 'medium', 'strong')),
        source TEXT NOT NULL DEFAULT 'ingestion'
            CHECK (source IN ('ingestion', 'admin_merge', 'admin_upgrade')),
        last_updated_at TEXT NOT NULL,
        PRIMARY KEY (prerequisite_id, topic_id)
    );

    CREATE INDEX IF NOT EXISTS idx_prerequisite_topic_edges_topic ON prerequisite_topic_edges(topic_id);
    CREATE INDEX IF NOT EXISTS idx_prerequisite_topic_edges_strength ON prerequisite_topic_edges(strength);
"#;

/// Migration 3: Unresolved concept hints and the graph audit log
const MIGRATION_V3: &str = r#"
    CREATE TABLE IF NOT EXISTS unresolved_concept_hints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scope_key TEXT NOT NULL UNIQUE,
        hint TEXT NOT NULL,
        normalized_hint TEXT NOT NULL,
        question_id INTEGER,
        lesson_id INTEGER,
        topic_id INTEGER NOT NULL,
        subtopic_id INTEGER,
        occurrence_count INTEGER NOT NULL DEFAULT 1,
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'resolved', 'ignored')),
        resolution_note TEXT,
        first_seen_at TEXT NOT NULL,
        last_seen_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_unresolved_hints_status ON unresolved_concept_hints(status);
    CREATE INDEX IF NOT EXISTS idx_unresolved_hints_topic ON unresolved_concept_hints(topic_id);

    CREATE TABLE IF NOT EXISTS prerequisite_graph_events (
        id TEXT PRIMARY KEY NOT NULL,
        event_type TEXT NOT NULL,
        prerequisite_id INTEGER,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_graph_events_prerequisite ON prerequisite_graph_events(prerequisite_id);
    CREATE INDEX IF NOT EXISTS idx_graph_events_created_at ON prerequisite_graph_events(created_at);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Curriculum and concept registry");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Prerequisite graph");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    if current_version < 3 {
        tracing::info!("Applying migration v3: Unresolved hints and graph audit log");
        sqlx::raw_sql(MIGRATION_V3).execute(pool).await?;
        record_migration(pool, 3).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}
