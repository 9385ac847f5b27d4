//! Concept resolution
//!
//! Turns free-text hints into the set of currently-canonical concepts they
//! refer to, following merge redirects to a fixed point.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

use super::entity::{Concept, ConceptId, ConceptStatus, MatchKind};
use super::normalize::lookup_keys;
use super::repository::ConceptRepository;

/// Upper bound on redirect hops before a chain is treated as corrupt
const MAX_REDIRECT_HOPS: usize = 32;

/// Resolves hints and concept IDs to canonical concepts
#[derive(Clone)]
pub struct ConceptResolver {
    repository: Arc<dyn ConceptRepository>,
}

impl ConceptResolver {
    pub fn new(repository: Arc<dyn ConceptRepository>) -> Self {
        Self { repository }
    }

    /// Resolve free-text hints to canonical concepts
    ///
    /// Empty input or no matches yields an empty result. The output is
    /// deduplicated and keeps first-match order.
    pub async fn resolve(&self, hints: &[String]) -> Result<Vec<Concept>> {
        let mut keys: Vec<String> = Vec::new();
        for hint in hints {
            for key in lookup_keys(hint) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self.repository.find_by_normalized_keys(&keys).await?;

        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for hit in matches {
            let canonical = match hit.kind {
                // Direct label hits only count for live concepts
                MatchKind::Label if !hit.concept.is_resolvable() => continue,
                MatchKind::Label => hit.concept,
                MatchKind::Alias => self.follow_redirects(hit.concept).await?,
            };

            if !canonical.is_resolvable() {
                continue;
            }
            if seen.insert(canonical.id) {
                resolved.push(canonical);
            }
        }

        debug!(
            hint_count = hints.len(),
            key_count = keys.len(),
            resolved_count = resolved.len(),
            "Resolved concept hints"
        );
        Ok(resolved)
    }

    /// Resolve reviewer-supplied concept IDs to canonical concepts
    ///
    /// Every ID must exist. The result is deduplicated and sorted by ID.
    pub async fn resolve_ids(&self, ids: &[ConceptId]) -> Result<Vec<Concept>> {
        let found = self.repository.get_concepts(ids).await?;

        let mut resolved: Vec<Concept> = Vec::with_capacity(ids.len());
        for id in ids {
            let concept = found
                .iter()
                .find(|c| c.id == *id)
                .cloned()
                .ok_or(Error::ConceptNotFound(*id))?;
            let canonical = self.follow_redirects(concept).await?;
            if !resolved.iter().any(|c| c.id == canonical.id) {
                resolved.push(canonical);
            }
        }

        resolved.sort_by_key(|c| c.id);
        Ok(resolved)
    }

    /// Follow `merged_into` until a non-merged concept is reached
    ///
    /// A cycle or an overly long chain is a data-integrity bug upstream and
    /// fails with [`Error::ConceptRedirectCycle`].
    pub async fn follow_redirects(&self, concept: Concept) -> Result<Concept> {
        let start = concept.id;
        let mut visited = HashSet::from([concept.id]);
        let mut current = concept;

        while let Some(target) = merge_target(&current)? {
            if !visited.insert(target) || visited.len() > MAX_REDIRECT_HOPS {
                return Err(Error::ConceptRedirectCycle(start));
            }
            current = self
                .repository
                .get_concept(target)
                .await?
                .ok_or(Error::ConceptNotFound(target))?;
        }

        if current.id != start {
            debug!(from = start, to = current.id, "Followed concept merge redirect");
        }
        Ok(current)
    }
}

fn merge_target(concept: &Concept) -> Result<Option<ConceptId>> {
    match (concept.status, concept.merged_into) {
        (ConceptStatus::Merged, Some(target)) => Ok(Some(target)),
        (ConceptStatus::Merged, None) => Err(Error::Other(format!(
            "Concept {} is merged but has no merge target",
            concept.id
        ))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::concepts::entity::ConceptMatch;
    use async_trait::async_trait;

    /// In-memory registry used to exercise redirect edge cases that the
    /// SQLite schema would reject.
    struct FixedRegistry {
        concepts: Vec<Concept>,
        aliases: Vec<(String, ConceptId)>,
    }

    #[async_trait]
    impl ConceptRepository for FixedRegistry {
        async fn find_by_normalized_keys(&self, keys: &[String]) -> Result<Vec<ConceptMatch>> {
            let mut hits = Vec::new();
            for concept in &self.concepts {
                if keys.contains(&concept.normalized_label) {
                    hits.push(ConceptMatch {
                        concept: concept.clone(),
                        kind: MatchKind::Label,
                    });
                }
            }
            for (alias, id) in &self.aliases {
                if keys.contains(alias) {
                    if let Some(concept) = self.concepts.iter().find(|c| c.id == *id) {
                        hits.push(ConceptMatch {
                            concept: concept.clone(),
                            kind: MatchKind::Alias,
                        });
                    }
                }
            }
            Ok(hits)
        }

        async fn get_concept(&self, id: ConceptId) -> Result<Option<Concept>> {
            Ok(self.concepts.iter().find(|c| c.id == id).cloned())
        }

        async fn get_concepts(&self, ids: &[ConceptId]) -> Result<Vec<Concept>> {
            Ok(self
                .concepts
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect())
        }
    }

    fn concept(id: ConceptId, label: &str, status: ConceptStatus, merged_into: Option<ConceptId>) -> Concept {
        Concept {
            id,
            preferred_label: label.to_string(),
            normalized_label: label.to_lowercase(),
            status,
            merged_into,
        }
    }

    fn resolver(concepts: Vec<Concept>, aliases: Vec<(&str, ConceptId)>) -> ConceptResolver {
        ConceptResolver::new(Arc::new(FixedRegistry {
            concepts,
            aliases: aliases
                .into_iter()
                .map(|(a, id)| (a.to_string(), id))
                .collect(),
        }))
    }

    #[tokio::test]
    async fn test_resolve_direct_label() {
        let resolver = resolver(
            vec![concept(1, "orbita", ConceptStatus::Active, None)],
            vec![],
        );

        let resolved = resolver.resolve(&["Orbita".to_string()]).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, 1);
    }

    #[tokio::test]
    async fn test_empty_input_is_not_an_error() {
        let resolver = resolver(vec![], vec![]);
        assert!(resolver.resolve(&[]).await.unwrap().is_empty());
        assert!(resolver.resolve(&["   ".to_string()]).await.unwrap().is_empty());
        assert!(resolver.resolve(&["unknown".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merged_concept_excluded_from_direct_match() {
        let resolver = resolver(
            vec![
                concept(1, "old name", ConceptStatus::Merged, Some(2)),
                concept(2, "new name", ConceptStatus::Active, None),
            ],
            vec![],
        );

        let resolved = resolver.resolve(&["old name".to_string()]).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn test_alias_to_merged_concept_follows_redirect_chain() {
        let resolver = resolver(
            vec![
                concept(1, "a", ConceptStatus::Merged, Some(2)),
                concept(2, "b", ConceptStatus::Merged, Some(3)),
                concept(3, "c", ConceptStatus::NeedsReview, None),
            ],
            vec![("legacy term", 1)],
        );

        let resolved = resolver.resolve(&["Legacy term".to_string()]).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, 3);
    }

    #[tokio::test]
    async fn test_results_are_deduplicated() {
        let resolver = resolver(
            vec![concept(5, "orbita", ConceptStatus::Active, None)],
            vec![("goz cukuru", 5)],
        );

        let resolved = resolver
            .resolve(&["orbita".to_string(), "göz çukuru".to_string()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[tokio::test]
    async fn test_redirect_cycle_fails_loudly() {
        let resolver = resolver(
            vec![
                concept(1, "a", ConceptStatus::Merged, Some(2)),
                concept(2, "b", ConceptStatus::Merged, Some(1)),
            ],
            vec![("loop", 1)],
        );

        let err = resolver.resolve(&["loop".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::ConceptRedirectCycle(1)));
    }

    #[tokio::test]
    async fn test_resolve_ids_sorts_and_redirects() {
        let resolver = resolver(
            vec![
                concept(9, "x", ConceptStatus::Active, None),
                concept(4, "y", ConceptStatus::Merged, Some(2)),
                concept(2, "z", ConceptStatus::Active, None),
            ],
            vec![],
        );

        let resolved = resolver.resolve_ids(&[9, 4, 2]).await.unwrap();
        let ids: Vec<ConceptId> = resolved.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[tokio::test]
    async fn test_resolve_ids_missing_concept() {
        let resolver = resolver(vec![concept(1, "x", ConceptStatus::Active, None)], vec![]);
        let err = resolver.resolve_ids(&[1, 77]).await.unwrap_err();
        assert!(matches!(err, Error::ConceptNotFound(77)));
    }
}
