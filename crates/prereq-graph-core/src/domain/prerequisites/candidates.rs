//! Merge-candidate scoring
//!
//! Advisory only: scores every other node against a chosen one by shared
//! concepts, shared topics and display-name similarity.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MergeConfig;
use crate::domain::concepts::ConceptId;
use crate::domain::curriculum::TopicId;
use crate::error::{Error, Result};

use super::entity::{PrerequisiteId, PrerequisiteStatus};
use super::repository::PrerequisiteGraphRepository;

/// What the scorer needs to know about one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateProfile {
    pub prerequisite_id: PrerequisiteId,
    pub display_name: String,
    pub status: PrerequisiteStatus,
    pub concept_ids: Vec<ConceptId>,
    /// Topics with an edge, restricted to the lesson scope when one is given
    pub topic_ids: Vec<TopicId>,
}

/// A ranked merge suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub prerequisite_id: PrerequisiteId,
    pub display_name: String,
    pub status: PrerequisiteStatus,
    pub score: u32,
    pub shared_concepts: usize,
    pub shared_topics: usize,
    pub name_similarity: f64,
    pub reasons: Vec<String>,
}

/// Case-insensitive normalized Levenshtein similarity in [0, 1]
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    (max_len - distance) as f64 / max_len as f64
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn count_shared<T: PartialEq>(left: &[T], right: &[T]) -> usize {
    left.iter().filter(|item| right.contains(item)).count()
}

/// Score `other` against `subject`; `None` when nothing contributes
pub fn score_candidate(
    subject: &CandidateProfile,
    other: &CandidateProfile,
    config: &MergeConfig,
) -> Option<MergeCandidate> {
    let shared_concepts = count_shared(&subject.concept_ids, &other.concept_ids);
    let shared_topics = count_shared(&subject.topic_ids, &other.topic_ids);

    let mut score: u32 = 0;
    let mut reasons = Vec::new();

    if shared_concepts > 0 {
        score += config.shared_concept_weight * shared_concepts as u32;
        reasons.push(plural(shared_concepts, "shared concept"));
    }
    if shared_topics > 0 {
        score += config.shared_topic_weight * shared_topics as u32;
        reasons.push(plural(shared_topics, "shared topic"));
    }

    let similarity = name_similarity(&subject.display_name, &other.display_name);
    if similarity > config.name_similarity_threshold {
        // Integer arithmetic keeps floor() exact at boundaries like 0.7 × 20
        let a = subject.display_name.to_lowercase();
        let b = other.display_name.to_lowercase();
        let max_len = a.chars().count().max(b.chars().count()) as u32;
        let matched = max_len - strsim::levenshtein(&a, &b) as u32;
        score += config.name_similarity_weight * matched / max_len;
        reasons.push(format!("name similarity {}%", (similarity * 100.0).round() as u32));
    }

    if score == 0 {
        return None;
    }

    Some(MergeCandidate {
        prerequisite_id: other.prerequisite_id,
        display_name: other.display_name.clone(),
        status: other.status,
        score,
        shared_concepts,
        shared_topics,
        name_similarity: similarity,
        reasons,
    })
}

/// Rank every profile against `subject`, best first
pub fn rank_candidates(
    subject: &CandidateProfile,
    profiles: &[CandidateProfile],
    config: &MergeConfig,
) -> Vec<MergeCandidate> {
    let mut ranked: Vec<MergeCandidate> = profiles
        .iter()
        .filter(|p| p.prerequisite_id != subject.prerequisite_id)
        .filter_map(|p| score_candidate(subject, p, config))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.prerequisite_id.cmp(&b.prerequisite_id))
    });
    ranked.truncate(config.max_candidates);
    ranked
}

/// Finds likely duplicates of a node for reviewer display
#[derive(Clone)]
pub struct MergeCandidateFinder {
    repository: Arc<dyn PrerequisiteGraphRepository>,
    config: MergeConfig,
}

impl MergeCandidateFinder {
    pub fn new(repository: Arc<dyn PrerequisiteGraphRepository>, config: MergeConfig) -> Self {
        Self { repository, config }
    }

    /// Top candidates for `prerequisite_id`, topics scoped to `lesson` if given
    pub async fn find_candidates(
        &self,
        prerequisite_id: PrerequisiteId,
        lesson: Option<&str>,
    ) -> Result<Vec<MergeCandidate>> {
        let profiles = self.repository.candidate_profiles(lesson).await?;
        let subject = profiles
            .iter()
            .find(|p| p.prerequisite_id == prerequisite_id)
            .ok_or(Error::PrerequisiteNotFound(prerequisite_id))?;

        let ranked = rank_candidates(subject, &profiles, &self.config);
        debug!(
            prerequisite_id,
            scanned = profiles.len(),
            returned = ranked.len(),
            "Scored merge candidates"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: i64, name: &str, concepts: &[i64], topics: &[i64]) -> CandidateProfile {
        CandidateProfile {
            prerequisite_id: id,
            display_name: name.to_string(),
            status: PrerequisiteStatus::Active,
            concept_ids: concepts.to_vec(),
            topic_ids: topics.to_vec(),
        }
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("Orbita", "orbita"), 1.0);
        assert!((name_similarity("abcde", "abcdx") - 0.8).abs() < f64::EPSILON);
        assert_eq!(name_similarity("", ""), 0.0);
    }

    #[test]
    fn test_documented_score_and_ranking() {
        let config = MergeConfig::default();
        let subject = profile(1, "Fissura", &[10, 11, 12], &[100, 200]);
        // 2 shared concepts, 1 shared topic, similarity 0.8
        let strong = profile(2, "Fissurx", &[10, 11], &[100]);
        let weak = profile(3, "Completely different", &[], &[200]);

        let similarity = name_similarity("Fissura", "Fissurx");
        assert!(similarity > 0.8 && similarity < 0.9);

        // Exact 0.8 similarity: 4 of 5 characters match
        let subject5 = profile(1, "abcde", &[10, 11], &[100]);
        let other5 = profile(2, "abcdx", &[10, 11], &[100]);
        let scored = score_candidate(&subject5, &other5, &config).unwrap();
        assert_eq!(scored.score, 86);
        assert_eq!(
            scored.reasons,
            vec!["2 shared concepts", "1 shared topic", "name similarity 80%"]
        );

        let ranked = rank_candidates(&subject, &[subject.clone(), weak.clone(), strong.clone()], &config);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].prerequisite_id, 2);
        assert_eq!(ranked[1].prerequisite_id, 3);
        assert_eq!(ranked[1].score, 10);
    }

    #[test]
    fn test_similarity_below_threshold_contributes_nothing() {
        let config = MergeConfig::default();
        // 7/10 = 0.7 is not strictly above the threshold
        let a = profile(1, "abcdefghij", &[], &[]);
        let b = profile(2, "abcdefgxyz", &[], &[]);
        assert!(score_candidate(&a, &b, &config).is_none());
    }

    #[test]
    fn test_zero_scores_excluded_and_limit_applied() {
        let config = MergeConfig {
            max_candidates: 2,
            ..MergeConfig::default()
        };
        let subject = profile(1, "Orbita", &[1], &[]);
        let others: Vec<CandidateProfile> = (2..6)
            .map(|id| profile(id, &format!("node {}", id), &[1], &[]))
            .chain(std::iter::once(profile(9, "unrelated", &[], &[])))
            .collect();

        let ranked = rank_candidates(&subject, &others, &config);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|c| c.score == 30));
        assert_eq!(ranked[0].prerequisite_id, 2);
    }
}
