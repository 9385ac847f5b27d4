//! Row types for the prerequisite graph tables

use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::prerequisites::{
    CanonicalKey, EdgeSource, GraphEvent, GraphEventType, Prerequisite, PrerequisiteStatus,
    PrerequisiteSummary, PrerequisiteTopic, PrerequisiteTopicEdge, Strength, TopicPrerequisite,
};
use crate::error::{Error, Result};
use crate::infrastructure::parse_timestamp;

pub(super) fn parse_status(raw: &str) -> Result<PrerequisiteStatus> {
    PrerequisiteStatus::parse(raw)
        .ok_or_else(|| Error::Other(format!("Invalid prerequisite status: {}", raw)))
}

pub(super) fn parse_strength(raw: &str) -> Result<Strength> {
    Strength::parse(raw).ok_or_else(|| Error::Other(format!("Invalid edge strength: {}", raw)))
}

fn parse_source(raw: &str) -> Result<EdgeSource> {
    EdgeSource::parse(raw).ok_or_else(|| Error::Other(format!("Invalid edge source: {}", raw)))
}

#[derive(Debug, FromRow)]
pub(super) struct PrerequisiteRow {
    id: i64,
    canonical_key: String,
    name: String,
    display_name: String,
    status: String,
    review_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PrerequisiteRow {
    pub(super) fn into_prerequisite(self) -> Result<Prerequisite> {
        Ok(Prerequisite {
            id: self.id,
            canonical_key: CanonicalKey::from_stored(self.canonical_key),
            name: self.name,
            display_name: self.display_name,
            status: parse_status(&self.status)?,
            review_reason: self.review_reason,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct EdgeRow {
    prerequisite_id: i64,
    topic_id: i64,
    subtopic_id: Option<i64>,
    frequency: i64,
    strength: String,
    source: String,
    last_updated_at: String,
}

impl EdgeRow {
    pub(super) fn into_edge(self) -> Result<PrerequisiteTopicEdge> {
        Ok(PrerequisiteTopicEdge {
            prerequisite_id: self.prerequisite_id,
            topic_id: self.topic_id,
            subtopic_id: self.subtopic_id,
            frequency: self.frequency,
            strength: parse_strength(&self.strength)?,
            source: parse_source(&self.source)?,
            last_updated_at: parse_timestamp(&self.last_updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct TopicPrerequisiteRow {
    prerequisite_id: i64,
    name: String,
    display_name: String,
    status: String,
    subtopic_id: Option<i64>,
    frequency: i64,
    strength: String,
}

impl TopicPrerequisiteRow {
    pub(super) fn into_item(self) -> Result<TopicPrerequisite> {
        Ok(TopicPrerequisite {
            prerequisite_id: self.prerequisite_id,
            name: self.name,
            display_name: self.display_name,
            status: parse_status(&self.status)?,
            subtopic_id: self.subtopic_id,
            frequency: self.frequency,
            strength: parse_strength(&self.strength)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct PrerequisiteTopicRow {
    topic_id: i64,
    topic_name: String,
    lesson_id: i64,
    lesson_name: String,
    subtopic_id: Option<i64>,
    frequency: i64,
    strength: String,
    source: String,
}

impl PrerequisiteTopicRow {
    pub(super) fn into_item(self) -> Result<PrerequisiteTopic> {
        Ok(PrerequisiteTopic {
            topic_id: self.topic_id,
            topic_name: self.topic_name,
            lesson_id: self.lesson_id,
            lesson_name: self.lesson_name,
            subtopic_id: self.subtopic_id,
            frequency: self.frequency,
            strength: parse_strength(&self.strength)?,
            source: parse_source(&self.source)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct SummaryRow {
    #[sqlx(flatten)]
    prerequisite: PrerequisiteRow,
    total_frequency: i64,
    topic_count: i64,
    concept_count: i64,
}

impl SummaryRow {
    pub(super) fn into_summary(self) -> Result<PrerequisiteSummary> {
        Ok(PrerequisiteSummary {
            prerequisite: self.prerequisite.into_prerequisite()?,
            total_frequency: self.total_frequency,
            topic_count: self.topic_count,
            concept_count: self.concept_count,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct EventRow {
    id: String,
    event_type: String,
    prerequisite_id: Option<i64>,
    payload: String,
    created_at: String,
}

impl EventRow {
    pub(super) fn into_event(self) -> Result<GraphEvent> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::Other(format!("Invalid event id {}: {}", self.id, e)))?;
        let event_type = GraphEventType::parse(&self.event_type)
            .ok_or_else(|| Error::Other(format!("Invalid event type: {}", self.event_type)))?;

        Ok(GraphEvent {
            id,
            event_type,
            prerequisite_id: self.prerequisite_id,
            payload: serde_json::from_str(&self.payload)?,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}
