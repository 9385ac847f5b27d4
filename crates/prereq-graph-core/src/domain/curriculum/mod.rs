//! Lesson, topic and subtopic registry access
//!
//! The curriculum registries are edited elsewhere; the graph engine reads
//! them to validate topic references and to label query results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub type LessonId = i64;
pub type TopicId = i64;
pub type SubtopicId = i64;

/// An exam topic together with its lesson
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub lesson_id: LessonId,
    pub lesson_name: String,
    pub name: String,
}

/// Read access to the topic registry
#[async_trait]
pub trait TopicDirectory: Send + Sync {
    /// Get a topic by ID
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>>;

    /// List topics, optionally restricted to a lesson (matched case-insensitively by name)
    async fn list_topics(&self, lesson: Option<&str>) -> Result<Vec<Topic>>;
}
