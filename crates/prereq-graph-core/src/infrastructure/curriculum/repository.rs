//! SQLite implementation of TopicDirectory and AnalyzedQuestionSource
//!
//! Lessons, topics, subtopics and questions are owned upstream. The upsert
//! helpers exist for snapshot import and tests.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use crate::domain::curriculum::{LessonId, SubtopicId, Topic, TopicDirectory, TopicId};
use crate::domain::ingestion::{AnalysisStatus, AnalyzedQuestion, AnalyzedQuestionSource, QuestionId};
use crate::error::{Error, Result};

/// SQLite access to the curriculum registries and analyzed questions
#[derive(Clone)]
pub struct SqliteCurriculumRepository {
    pool: SqlitePool,
}

impl SqliteCurriculumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_lesson(&self, id: LessonId, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO lessons (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_topic(&self, id: TopicId, lesson_id: LessonId, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO topics (id, lesson_id, name) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET lesson_id = excluded.lesson_id, name = excluded.name",
        )
        .bind(id)
        .bind(lesson_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_subtopic(&self, id: SubtopicId, topic_id: TopicId, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO subtopics (id, topic_id, name) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET topic_id = excluded.topic_id, name = excluded.name",
        )
        .bind(id)
        .bind(topic_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a question with its analysis state
    pub async fn upsert_question(&self, question: &AnalyzedQuestion) -> Result<()> {
        sqlx::query(
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
        .bind(question.status.as_str())
        .bind(&question.payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TopicDirectory for SqliteCurriculumRepository {
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        let row: Option<TopicRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.lesson_id, l.name AS lesson_name, t.name
            FROM topics t
            JOIN lessons l ON l.id = t.lesson_id
            WHERE t.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TopicRow::into_topic))
    }

    async fn list_topics(&self, lesson: Option<&str>) -> Result<Vec<Topic>> {
        let rows: Vec<TopicRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.lesson_id, l.name AS lesson_name, t.name
            FROM topics t
            JOIN lessons l ON l.id = t.lesson_id
            WHERE ?1 IS NULL OR LOWER(l.name) = LOWER(?1)
            ORDER BY t.id
            "#,
        )
        .bind(lesson)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TopicRow::into_topic).collect())
    }
}

#[async_trait]
impl AnalyzedQuestionSource for SqliteCurriculumRepository {
    async fn get_question(&self, id: QuestionId) -> Result<Option<AnalyzedQuestion>> {
        let row: Option<QuestionRow> = sqlx::query_as(
            r#"
            SELECT id, lesson_id, topic_id, subtopic_id, analysis_status, analysis_payload
            FROM questions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_question()).transpose()
    }

    async fn list_analyzed_question_ids(&self) -> Result<Vec<QuestionId>> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM questions
             WHERE analysis_status = 'completed' AND topic_id IS NOT NULL
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

// ========== Database Row Types ==========

#[derive(Debug, FromRow)]
pub(crate) struct TopicRow {
    id: i64,
    lesson_id: i64,
    lesson_name: String,
    name: String,
}

impl TopicRow {
    pub(crate) fn into_topic(self) -> Topic {
        Topic {
            id: self.id,
            lesson_id: self.lesson_id,
            lesson_name: self.lesson_name,
            name: self.name,
        }
    }
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: i64,
    lesson_id: i64,
    topic_id: Option<i64>,
    subtopic_id: Option<i64>,
    analysis_status: String,
    analysis_payload: Option<String>,
}

impl QuestionRow {
    fn into_question(self) -> Result<AnalyzedQuestion> {
        let status = AnalysisStatus::parse(&self.analysis_status).ok_or_else(|| {
            Error::Other(format!("Invalid analysis status: {}", self.analysis_status))
        })?;

        Ok(AnalyzedQuestion {
            id: self.id,
            lesson_id: self.lesson_id,
            topic_id: self.topic_id,
            subtopic_id: self.subtopic_id,
            status,
            payload: self.analysis_payload,
        })
    }
}
