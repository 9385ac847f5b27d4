//! Read-only graph aggregations
//!
//! Everything here is derived from stored edges and links at read time;
//! nothing is cached or materialized.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::domain::concepts::{Concept, normalize_key};
use crate::domain::curriculum::{LessonId, SubtopicId, Topic, TopicDirectory, TopicId};
use crate::domain::ingestion::QuestionId;
use crate::error::{Error, Result};

use super::entity::{EdgeSource, Prerequisite, PrerequisiteId, PrerequisiteStatus, Strength};
use super::repository::PrerequisiteGraphRepository;

/// Largest page size accepted by listings
pub const MAX_PAGE_SIZE: u32 = 100;

/// Cap on evidence questions in a detail view
pub const MAX_EVIDENCE_QUESTIONS: usize = 20;

/// A prerequisite as seen from one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPrerequisite {
    pub prerequisite_id: PrerequisiteId,
    pub name: String,
    pub display_name: String,
    pub status: PrerequisiteStatus,
    pub subtopic_id: Option<SubtopicId>,
    pub frequency: i64,
    pub strength: Strength,
}

/// A topic as seen from one prerequisite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteTopic {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub lesson_id: LessonId,
    pub lesson_name: String,
    pub subtopic_id: Option<SubtopicId>,
    pub frequency: i64,
    pub strength: Strength,
    pub source: EdgeSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteSort {
    /// Total edge frequency, highest first
    #[default]
    Frequency,
    /// Display name, alphabetical
    Name,
    /// Number of linked topics, highest first
    TopicCount,
    /// Most recently updated first
    Recent,
}

impl PrerequisiteSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "frequency" => Some(Self::Frequency),
            "name" => Some(Self::Name),
            "topic_count" | "topics" => Some(Self::TopicCount),
            "recent" => Some(Self::Recent),
            _ => None,
        }
    }
}

/// Filter, sort and pagination for prerequisite listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteQuery {
    pub status: Option<PrerequisiteStatus>,
    /// Only nodes with an edge to a topic of this lesson
    pub lesson: Option<String>,
    /// Substring of the name or display name
    pub search: Option<String>,
    pub sort: PrerequisiteSort,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl Default for PrerequisiteQuery {
    fn default() -> Self {
        Self {
            status: None,
            lesson: None,
            search: None,
            sort: PrerequisiteSort::default(),
            page: 1,
            page_size: 20,
        }
    }
}

impl PrerequisiteQuery {
    /// Row offset of the page; widened so far-out pages never wrap
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)).saturating_mul(i64::from(self.page_size))
    }

    fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(Error::InvalidInput("Page numbers start at 1".to_string()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }
}

/// Listing row: a node plus its edge and link counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisiteSummary {
    pub prerequisite: Prerequisite,
    pub total_frequency: i64,
    pub topic_count: i64,
    pub concept_count: i64,
}

/// Edge counts per strength tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternBreakdown {
    pub strong: usize,
    pub medium: usize,
    pub weak: usize,
}

impl PatternBreakdown {
    pub fn from_strengths(strengths: impl IntoIterator<Item = Strength>) -> Self {
        let mut breakdown = Self::default();
        for strength in strengths {
            match strength {
                Strength::Strong => breakdown.strong += 1,
                Strength::Medium => breakdown.medium += 1,
                Strength::Weak => breakdown.weak += 1,
            }
        }
        breakdown
    }
}

/// A question supporting a prerequisite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceQuestion {
    pub question_id: QuestionId,
    pub lesson_id: LessonId,
    pub topic_id: TopicId,
    pub subtopic_id: Option<SubtopicId>,
}

/// Detail read model for one prerequisite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisiteDetail {
    pub prerequisite: Prerequisite,
    pub concepts: Vec<Concept>,
    pub topics: Vec<PrerequisiteTopic>,
    /// Total edge frequency within the lesson scope
    pub exam_importance: i64,
    /// 1-based position by importance among nodes of the same scope
    pub rank: Option<usize>,
    /// Number of nodes ranked in the scope
    pub ranked_out_of: usize,
    pub pattern: PatternBreakdown,
    pub evidence: Option<Vec<EvidenceQuestion>>,
}

/// A node with its count of STRONG topic edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub prerequisite_id: PrerequisiteId,
    pub display_name: String,
    pub strong_topic_count: i64,
}

/// Graph-wide statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAnalytics {
    pub total_prerequisites: i64,
    pub active_prerequisites: i64,
    pub needs_review_prerequisites: i64,
    pub deprecated_prerequisites: i64,
    pub total_edges: i64,
    pub strong_edges: i64,
    pub medium_edges: i64,
    pub weak_edges: i64,
    /// Mean node count over topics with at least one edge
    pub average_prerequisites_per_topic: f64,
    pub top_prerequisites: Vec<CoverageEntry>,
    pub topics_without_strong_prerequisite: Vec<Topic>,
}

/// Sort strength descending, then frequency descending, then name
pub fn sort_by_strength_then_frequency(items: &mut [TopicPrerequisite]) {
    items.sort_by(|a, b| {
        b.strength
            .cmp(&a.strength)
            .then_with(|| b.frequency.cmp(&a.frequency))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
}

/// Read-only queries over the graph
#[derive(Clone)]
pub struct GraphQueryService {
    repository: Arc<dyn PrerequisiteGraphRepository>,
    topics: Arc<dyn TopicDirectory>,
    config: QueryConfig,
}

impl GraphQueryService {
    pub fn new(
        repository: Arc<dyn PrerequisiteGraphRepository>,
        topics: Arc<dyn TopicDirectory>,
        config: QueryConfig,
    ) -> Self {
        Self {
            repository,
            topics,
            config,
        }
    }

    async fn require_topic(&self, topic_id: TopicId) -> Result<Topic> {
        self.topics
            .get_topic(topic_id)
            .await?
            .ok_or(Error::TopicNotFound(topic_id))
    }

    /// Prerequisites of a topic, strongest first
    pub async fn topic_prerequisites(&self, topic_id: TopicId) -> Result<Vec<TopicPrerequisite>> {
        self.require_topic(topic_id).await?;
        let mut items = self.repository.topic_prerequisites(topic_id).await?;
        sort_by_strength_then_frequency(&mut items);
        Ok(items)
    }

    /// Topics of the prerequisite whose name or display name normalizes to `name`
    ///
    /// An unknown name yields an empty list.
    pub async fn prerequisite_topics(&self, name: &str) -> Result<Vec<PrerequisiteTopic>> {
        let normalized = normalize_key(name);
        if normalized.is_empty() {
            return Err(Error::InvalidInput("Prerequisite name is empty".to_string()));
        }

        match self.repository.find_by_name(&normalized).await? {
            Some(prerequisite) => self.repository.prerequisite_topics(prerequisite.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Filtered, sorted, paginated listing
    pub async fn list_prerequisites(&self, query: &PrerequisiteQuery) -> Result<Page<PrerequisiteSummary>> {
        query.validate()?;
        self.repository.list_prerequisites(query).await
    }

    /// Detail read model with importance, rank and optional evidence
    pub async fn prerequisite_detail(
        &self,
        prerequisite_id: PrerequisiteId,
        lesson: Option<&str>,
        include_evidence: bool,
    ) -> Result<PrerequisiteDetail> {
        let prerequisite = self
            .repository
            .get_prerequisite(prerequisite_id)
            .await?
            .ok_or(Error::PrerequisiteNotFound(prerequisite_id))?;

        let concepts = self.repository.concepts_of(prerequisite_id).await?;
        let topics = self.repository.prerequisite_topics(prerequisite_id).await?;
        let pattern = PatternBreakdown::from_strengths(topics.iter().map(|t| t.strength));

        let mut importance = self.repository.lesson_importance(lesson).await?;
        importance.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let position = importance.iter().position(|(id, _)| *id == prerequisite_id);
        let exam_importance = position.map(|i| importance[i].1).unwrap_or(0);

        let evidence = if include_evidence {
            Some(
                self.repository
                    .evidence_questions(prerequisite_id, MAX_EVIDENCE_QUESTIONS)
                    .await?,
            )
        } else {
            None
        };

        Ok(PrerequisiteDetail {
            prerequisite,
            concepts,
            topics,
            exam_importance,
            rank: position.map(|i| i + 1),
            ranked_out_of: importance.len(),
            pattern,
            evidence,
        })
    }

    /// Graph-wide statistics; `top_n` defaults to the configured value
    pub async fn analytics(&self, top_n: Option<usize>) -> Result<GraphAnalytics> {
        let top_n = top_n.unwrap_or(self.config.analytics_top_n);

        let status_counts = self.repository.status_counts().await?;
        let count_status = |status: PrerequisiteStatus| {
            status_counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        let strength_counts = self.repository.strength_counts().await?;
        let count_strength = |strength: Strength| {
            strength_counts
                .iter()
                .find(|(s, _)| *s == strength)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        let per_topic = self.repository.prerequisite_counts_per_topic().await?;
        let average_prerequisites_per_topic = if per_topic.is_empty() {
            0.0
        } else {
            per_topic.iter().map(|(_, n)| *n).sum::<i64>() as f64 / per_topic.len() as f64
        };

        let strong_edges = count_strength(Strength::Strong);
        let medium_edges = count_strength(Strength::Medium);
        let weak_edges = count_strength(Strength::Weak);
        let active = count_status(PrerequisiteStatus::Active);
        let needs_review = count_status(PrerequisiteStatus::NeedsReview);
        let deprecated = count_status(PrerequisiteStatus::Deprecated);

        Ok(GraphAnalytics {
            total_prerequisites: active + needs_review + deprecated,
            active_prerequisites: active,
            needs_review_prerequisites: needs_review,
            deprecated_prerequisites: deprecated,
            total_edges: strong_edges + medium_edges + weak_edges,
            strong_edges,
            medium_edges,
            weak_edges,
            average_prerequisites_per_topic,
            top_prerequisites: self.repository.strong_coverage(top_n).await?,
            topics_without_strong_prerequisite: self.repository.topics_without_strong_edges().await?,
        })
    }

    /// Display names to study before a topic, strongest first
    ///
    /// Deprecated nodes are left out of the path.
    pub async fn learning_path(&self, topic_id: TopicId) -> Result<Vec<String>> {
        let items = self.topic_prerequisites(topic_id).await?;
        Ok(items
            .into_iter()
            .filter(|p| p.status != PrerequisiteStatus::Deprecated)
            .take(self.config.learning_path_limit)
            .map(|p| p.display_name)
            .collect())
    }

    /// Whether a topic lacks any STRONG prerequisite edge
    pub async fn should_block_advanced_content(&self, topic_id: TopicId) -> Result<bool> {
        let items = self.topic_prerequisites(topic_id).await?;
        Ok(!items.iter().any(|p| p.strength == Strength::Strong))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, name: &str, frequency: i64, strength: Strength) -> TopicPrerequisite {
        TopicPrerequisite {
            prerequisite_id: id,
            name: name.to_lowercase(),
            display_name: name.to_string(),
            status: PrerequisiteStatus::Active,
            subtopic_id: None,
            frequency,
            strength,
        }
    }

    #[test]
    fn test_sort_strength_then_frequency() {
        let mut items = vec![
            item(1, "A", 20, Strength::Medium),
            item(2, "B", 10, Strength::Strong),
            item(3, "C", 3, Strength::Weak),
            item(4, "D", 12, Strength::Strong),
        ];
        sort_by_strength_then_frequency(&mut items);
        let ids: Vec<i64> = items.iter().map(|i| i.prerequisite_id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_pattern_breakdown() {
        let breakdown = PatternBreakdown::from_strengths([
            Strength::Strong,
            Strength::Weak,
            Strength::Weak,
        ]);
        assert_eq!(breakdown, PatternBreakdown { strong: 1, medium: 0, weak: 2 });
    }

    #[test]
    fn test_query_validation() {
        let query = PrerequisiteQuery::default();
        assert!(query.validate().is_ok());
        assert_eq!(query.offset(), 0);

        let third = PrerequisiteQuery { page: 3, page_size: 25, ..Default::default() };
        assert_eq!(third.offset(), 50);

        let zero_page = PrerequisiteQuery { page: 0, ..Default::default() };
        assert!(zero_page.validate().is_err());

        let huge = PrerequisiteQuery { page_size: 101, ..Default::default() };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_offset_of_far_page_does_not_wrap() {
        let far = PrerequisiteQuery { page: 50_000_000, page_size: 100, ..Default::default() };
        assert!(far.validate().is_ok());
        assert_eq!(far.offset(), 4_999_999_900);

        let max = PrerequisiteQuery { page: u32::MAX, page_size: u32::MAX, ..Default::default() };
        assert!(max.offset() > 0);
    }

    #[test]
    fn test_total_pages() {
        let page: Page<()> = Page { items: vec![], total: 41, page: 1, page_size: 20 };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(PrerequisiteSort::parse("topic-count"), Some(PrerequisiteSort::TopicCount));
        assert_eq!(PrerequisiteSort::parse("Recent"), Some(PrerequisiteSort::Recent));
        assert_eq!(PrerequisiteSort::parse("random"), None);
    }
}
