//! Find-or-create of prerequisite nodes by canonical key

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::concepts::{ConceptId, ConceptRepository, normalize_key};
use crate::error::{Error, Result};

use super::classifier::PrerequisiteClassifier;
use super::entity::{CanonicalKey, NewPrerequisite, Prerequisite};
use super::repository::PrerequisiteGraphRepository;

/// Derives canonical keys and converges callers onto one node per key
#[derive(Clone)]
pub struct PrerequisiteCanonicalizer {
    repository: Arc<dyn PrerequisiteGraphRepository>,
    concepts: Arc<dyn ConceptRepository>,
    classifier: PrerequisiteClassifier,
}

impl PrerequisiteCanonicalizer {
    pub fn new(
        repository: Arc<dyn PrerequisiteGraphRepository>,
        concepts: Arc<dyn ConceptRepository>,
        classifier: PrerequisiteClassifier,
    ) -> Self {
        Self {
            repository,
            concepts,
            classifier,
        }
    }

    /// Find or create the node for a concept set
    ///
    /// An existing node is returned unchanged and is not reclassified. The
    /// display label falls back to the concept labels joined with ", ".
    pub async fn find_or_create_by_concepts(
        &self,
        concept_ids: &[ConceptId],
        display_label: &str,
        concept_hints: &[String],
    ) -> Result<Prerequisite> {
        let key = CanonicalKey::for_concepts(concept_ids)?;

        if let Some(existing) = self.repository.find_by_canonical_key(&key).await? {
            debug!(prerequisite_id = existing.id, canonical_key = %key, "Prerequisite already exists");
            return Ok(existing);
        }

        let mut ids = concept_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let concepts = self.concepts.get_concepts(&ids).await?;
        if let Some(missing) = ids.iter().find(|id| !concepts.iter().any(|c| c.id == **id)) {
            return Err(Error::ConceptNotFound(*missing));
        }

        let joined_labels = concepts
            .iter()
            .map(|c| c.preferred_label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let display_name = match display_label.trim() {
            "" => joined_labels.clone(),
            label => label.to_string(),
        };
        let name = match normalize_key(&display_name) {
            name if name.is_empty() => normalize_key(&joined_labels),
            name => name,
        };

        let classification = self.classifier.classify(&display_name, concept_hints, &concepts);
        let node = NewPrerequisite {
            canonical_key: key,
            name,
            display_name,
            status: classification.status,
            review_reason: classification.review_reason,
        };

        let (prerequisite, created) = self.repository.create_if_absent(&node, &ids).await?;
        if created {
            info!(
                prerequisite_id = prerequisite.id,
                canonical_key = %prerequisite.canonical_key,
                status = %prerequisite.status,
                "Created concept-backed prerequisite"
            );
        }
        Ok(prerequisite)
    }

    /// Find or create the label-only node for a raw label
    ///
    /// Such nodes are always NEEDS_REVIEW.
    pub async fn find_or_create_by_label(&self, raw_label: &str) -> Result<Prerequisite> {
        let node = NewPrerequisite::label_only(raw_label)?;

        if let Some(existing) = self.repository.find_by_canonical_key(&node.canonical_key).await? {
            return Ok(existing);
        }

        let (prerequisite, created) = self.repository.create_if_absent(&node, &[]).await?;
        if created {
            info!(
                prerequisite_id = prerequisite.id,
                canonical_key = %prerequisite.canonical_key,
                "Created label-only prerequisite"
            );
        }
        Ok(prerequisite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::concepts::{Concept, ConceptStatus};
    use crate::domain::prerequisites::entity::{LABEL_ONLY_REASON, PrerequisiteStatus};
    use crate::infrastructure::concepts::SqliteConceptRepository;
    use crate::infrastructure::graph::SqlitePrerequisiteGraphRepository;
    use crate::storage::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    struct Fixture {
        canonicalizer: PrerequisiteCanonicalizer,
        concepts: Arc<SqliteConceptRepository>,
    }

    async fn setup() -> Fixture {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let concepts = Arc::new(SqliteConceptRepository::new(pool.clone()));
        let graph = Arc::new(SqlitePrerequisiteGraphRepository::new(pool));
        Fixture {
            canonicalizer: PrerequisiteCanonicalizer::new(
                graph,
                concepts.clone(),
                PrerequisiteClassifier::default(),
            ),
            concepts,
        }
    }

    async fn concept(fixture: &Fixture, label: &str) -> Concept {
        fixture
            .concepts
            .insert_concept(label, ConceptStatus::Active)
            .await
            .unwrap()
    }

    fn hints(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_concept_order_does_not_matter() {
        let fixture = setup().await;
        let orbita = concept(&fixture, "Orbita").await;
        let optik = concept(&fixture, "Optik sinir").await;
        let both = hints(&["Orbita", "Optik sinir"]);

        let first = fixture
            .canonicalizer
            .find_or_create_by_concepts(&[optik.id, orbita.id], "Orbita ve optik sinir", &both)
            .await
            .unwrap();
        let second = fixture
            .canonicalizer
            .find_or_create_by_concepts(&[orbita.id, optik.id], "Orbita ve optik sinir", &both)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            second.canonical_key.as_str(),
            format!("CONCEPT::{}|{}", orbita.id.min(optik.id), orbita.id.max(optik.id))
        );
    }

    #[tokio::test]
    async fn test_existing_node_is_not_reclassified() {
        let fixture = setup().await;
        let orbita = concept(&fixture, "Orbita").await;

        let first = fixture
            .canonicalizer
            .find_or_create_by_concepts(&[orbita.id], "Orbita duvarları", &hints(&["Orbita"]))
            .await
            .unwrap();
        assert_eq!(first.status, PrerequisiteStatus::Active);

        // Would be deprecated as clinical if it were a new node
        let again = fixture
            .canonicalizer
            .find_or_create_by_concepts(&[orbita.id], "Tedavi seçenekleri", &[])
            .await
            .unwrap();

        assert_eq!(again.id, first.id);
        assert_eq!(again.status, PrerequisiteStatus::Active);
        assert_eq!(again.review_reason, None);
        assert_eq!(again.display_name, "Orbita duvarları");
    }

    #[tokio::test]
    async fn test_blank_display_label_falls_back_to_concepts() {
        let fixture = setup().await;
        let orbita = concept(&fixture, "Orbita").await;

        let node = fixture
            .canonicalizer
            .find_or_create_by_concepts(&[orbita.id], "  ", &hints(&["Orbita"]))
            .await
            .unwrap();
        assert_eq!(node.display_name, "Orbita");
    }

    #[tokio::test]
    async fn test_unknown_concept_is_rejected() {
        let fixture = setup().await;
        let result = fixture
            .canonicalizer
            .find_or_create_by_concepts(&[404], "Orbita", &hints(&["Orbita"]))
            .await;
        assert!(matches!(result, Err(Error::ConceptNotFound(404))));
    }

    #[tokio::test]
    async fn test_label_only_node_is_found_again() {
        let fixture = setup().await;

        let first = fixture
            .canonicalizer
            .find_or_create_by_label("Göz hareketleri")
            .await
            .unwrap();
        let second = fixture
            .canonicalizer
            .find_or_create_by_label("Göz hareketleri")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, PrerequisiteStatus::NeedsReview);
        assert_eq!(second.review_reason.as_deref(), Some(LABEL_ONLY_REASON));
    }
}
