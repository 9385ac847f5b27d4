//! prereq-graph Core Integration Tests

use prereq_graph_core::{
    Error, PrerequisiteGraphService,
    config::Config,
    domain::hints::{HintFilter, HintStatus},
    domain::prerequisites::{
        EdgeSource, GraphEventType, LabelOnlyMergeKind, MergeTarget, PrerequisiteQuery,
        PrerequisiteStatus, Strength,
    },
    storage::{
        Database, DatabaseConfig, RegistrySnapshot, import_snapshot,
        snapshot::{AliasRecord, ConceptRecord, LessonRecord, QuestionRecord, TopicRecord},
    },
};
use serde_json::{Value, json};

const ORBITA: i64 = 1;
const OPTIK_SINIR: i64 = 2;
const KALP_KASI: i64 = 3;

fn base_snapshot() -> RegistrySnapshot {
    RegistrySnapshot {
        lessons: vec![
            LessonRecord { id: 1, name: "Anatomi".into() },
            LessonRecord { id: 2, name: "Fizyoloji".into() },
        ],
        topics: vec![
            TopicRecord { id: 10, lesson_id: 1, name: "Orbita".into() },
            TopicRecord { id: 11, lesson_id: 1, name: "Kafa tabanı".into() },
            TopicRecord { id: 20, lesson_id: 2, name: "Kalp döngüsü".into() },
        ],
        subtopics: Vec::new(),
        concepts: vec![
            concept(ORBITA, "Orbita"),
            concept(OPTIK_SINIR, "Optik sinir"),
            concept(KALP_KASI, "Kalp kası"),
            ConceptRecord {
                id: 4,
                preferred_label: "Göz çukuru".into(),
                status: Some("merged".into()),
                merged_into: Some(ORBITA),
            },
        ],
        aliases: vec![AliasRecord {
            concept_id: OPTIK_SINIR,
            alias: "nervus opticus".into(),
            is_active: true,
        }],
        questions: Vec::new(),
    }
}

fn concept(id: i64, label: &str) -> ConceptRecord {
    ConceptRecord {
        id,
        preferred_label: label.into(),
        status: None,
        merged_into: None,
    }
}

fn question(id: i64, lesson_id: i64, topic_id: i64, payload: Value) -> QuestionRecord {
    QuestionRecord {
        id,
        lesson_id,
        topic_id: Some(topic_id),
        subtopic_id: None,
        analysis_status: Some("completed".into()),
        analysis_payload: Some(payload),
    }
}

fn payload(label: &str, hints: &[&str]) -> Value {
    json!({ "prerequisites": [{ "label": label, "conceptHints": hints }] })
}

async fn setup(questions: Vec<QuestionRecord>) -> (Database, PrerequisiteGraphService) {
    let db = Database::in_memory().await.expect("Failed to create database");
    let mut snapshot = base_snapshot();
    snapshot.questions = questions;
    let result = import_snapshot(db.pool(), &snapshot)
        .await
        .expect("Failed to import snapshot");
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);

    let service = PrerequisiteGraphService::from_database(&db, &Config::default());
    (db, service)
}

/// `count` questions on one topic that all name the same prerequisite
fn repeated(first_id: i64, count: i64, topic_id: i64, label: &str, hints: &[&str]) -> Vec<QuestionRecord> {
    (first_id..first_id + count)
        .map(|id| question(id, 1, topic_id, payload(label, hints)))
        .collect()
}

#[tokio::test]
async fn test_reingesting_a_question_counts_again() {
    let (_db, service) = setup(vec![question(1, 1, 10, payload("Orbita duvarları", &["Orbita"]))]).await;

    service.ingest(1).await.unwrap();
    let report = service.ingest(1).await.unwrap();
    assert_eq!(report.candidates_linked, 1);

    let items = service.get_topic_prerequisites(10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].frequency, 2);
    assert_eq!(items[0].strength, Strength::Weak);
    assert_eq!(items[0].status, PrerequisiteStatus::Active);
}

#[tokio::test]
async fn test_alias_and_redirect_converge_on_one_node() {
    let (_db, service) = setup(vec![
        question(1, 1, 10, payload("Orbita", &["Orbita"])),
        // Merged concept redirects to Orbita
        question(2, 1, 10, payload("Orbita", &["göz çukuru"])),
        question(3, 1, 10, payload("Optik sinir seyri", &["nervus opticus"])),
    ])
    .await;

    for id in 1..=3 {
        service.ingest(id).await.unwrap();
    }

    let items = service.get_topic_prerequisites(10).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].display_name, "Orbita");
    assert_eq!(items[0].frequency, 2);
    assert_eq!(items[1].display_name, "Optik sinir seyri");
    assert_eq!(items[1].frequency, 1);
}

#[tokio::test]
async fn test_unresolved_hint_is_counted_per_topic() {
    let (_db, service) = setup(vec![
        question(1, 1, 10, payload("Lakrimal bez", &["Glandula lacrimalis"])),
        question(2, 1, 10, payload("Lakrimal bez", &["glandula  LACRIMALIS"])),
    ])
    .await;

    let report = service.ingest(1).await.unwrap();
    assert_eq!(report.candidates_unresolved, 1);
    assert!(report.edges.is_empty());

    let hints = service.list_unresolved_hints(&HintFilter::default()).await.unwrap();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].occurrence_count, 1);

    service.ingest(2).await.unwrap();
    let hints = service.list_unresolved_hints(&HintFilter::default()).await.unwrap();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].occurrence_count, 2);
    assert_eq!(hints[0].status, HintStatus::Pending);

    // No node is created for an unresolved candidate
    assert!(service.get_topic_prerequisites(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ignored_hint_stops_counting() {
    let (_db, service) = setup(vec![
        question(1, 1, 10, payload("Lakrimal bez", &["Glandula lacrimalis"])),
        question(2, 1, 10, payload("Lakrimal bez", &["Glandula lacrimalis"])),
    ])
    .await;

    service.ingest(1).await.unwrap();
    let hint = &service.list_unresolved_hints(&HintFilter::default()).await.unwrap()[0];
    service.ignore_hint(hint.id, Some("not an anatomy term")).await.unwrap();

    service.ingest(2).await.unwrap();
    let hint = service.get_unresolved_hint(hint.id).await.unwrap();
    assert_eq!(hint.status, HintStatus::Ignored);
    assert_eq!(hint.occurrence_count, 1);
    assert_eq!(hint.resolution_note.as_deref(), Some("not an anatomy term"));
}

#[tokio::test]
async fn test_clinical_label_is_deprecated_and_left_out_of_path() {
    let (_db, service) = setup(vec![
        question(1, 1, 10, payload("Tedavi seçenekleri", &["Orbita"])),
        question(2, 1, 10, payload("Optik sinir", &["Optik sinir"])),
    ])
    .await;

    service.ingest(1).await.unwrap();
    service.ingest(2).await.unwrap();

    let items = service.get_topic_prerequisites(10).await.unwrap();
    let deprecated = items
        .iter()
        .find(|p| p.display_name == "Tedavi seçenekleri")
        .expect("clinical node exists");
    assert_eq!(deprecated.status, PrerequisiteStatus::Deprecated);

    let path = service.get_learning_path_for_topic(10).await.unwrap();
    assert_eq!(path, vec!["Optik sinir".to_string()]);
}

#[tokio::test]
async fn test_label_only_node_needs_review() {
    let (_db, service) = setup(Vec::new()).await;

    let node = service
        .find_or_create_label_prerequisite("  Kafa Kemikleri ")
        .await
        .unwrap();
    assert_eq!(node.status, PrerequisiteStatus::NeedsReview);
    assert!(node.is_label_only());
    assert_eq!(node.canonical_key.as_str(), "LABEL_ONLY::kafa kemikleri");

    let again = service
        .find_or_create_label_prerequisite("kafa kemikleri")
        .await
        .unwrap();
    assert_eq!(again.id, node.id);

    let blank = service.find_or_create_label_prerequisite("   ").await;
    assert!(matches!(blank, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_strength_thresholds_and_content_gate() {
    let mut questions = repeated(1, 3, 10, "Orbita", &["Orbita"]);
    questions.extend(repeated(100, 10, 20, "Kalp kası", &["Kalp kası"]));
    let (_db, service) = setup(questions).await;

    for id in 1..=3 {
        service.ingest(id).await.unwrap();
    }
    let items = service.get_topic_prerequisites(10).await.unwrap();
    assert_eq!((items[0].frequency, items[0].strength), (3, Strength::Weak));
    assert!(service.should_block_advanced_content_generation(10).await.unwrap());

    for id in 100..104 {
        service.ingest(id).await.unwrap();
    }
    let items = service.get_topic_prerequisites(20).await.unwrap();
    assert_eq!((items[0].frequency, items[0].strength), (4, Strength::Medium));
    assert!(service.should_block_advanced_content_generation(20).await.unwrap());

    for id in 104..110 {
        service.ingest(id).await.unwrap();
    }
    let items = service.get_topic_prerequisites(20).await.unwrap();
    assert_eq!((items[0].frequency, items[0].strength), (10, Strength::Strong));
    assert!(!service.should_block_advanced_content_generation(20).await.unwrap());

    // A topic with no edges at all is gated too
    assert!(service.should_block_advanced_content_generation(11).await.unwrap());
}

#[tokio::test]
async fn test_unknown_topic_is_an_error() {
    let (_db, service) = setup(Vec::new()).await;

    let result = service.get_topic_prerequisites(999).await;
    assert!(matches!(result, Err(Error::TopicNotFound(999))));
    assert!(service.should_block_advanced_content_generation(999).await.is_err());
}

#[tokio::test]
async fn test_merge_conserves_frequency() {
    let mut questions = repeated(1, 2, 10, "Orbita", &["Orbita"]);
    questions.extend(repeated(10, 3, 10, "Optik sinir", &["Optik sinir"]));
    questions.push(question(20, 1, 11, payload("Optik sinir", &["Optik sinir"])));
    let (_db, service) = setup(questions).await;

    let report = service.process_all_analyzed_questions().await.unwrap();
    assert_eq!(report.total, 6);
    assert_eq!(report.failed, 0);

    let items = service.get_topic_prerequisites(10).await.unwrap();
    let optik = items.iter().find(|p| p.display_name == "Optik sinir").unwrap().prerequisite_id;
    let orbita = items.iter().find(|p| p.display_name == "Orbita").unwrap().prerequisite_id;

    let summary = service
        .merge_prerequisites(&[orbita, optik], MergeTarget::Id(orbita))
        .await
        .unwrap();
    assert_eq!(summary.canonical_id, orbita);
    assert_eq!(summary.removed_ids, vec![optik]);

    let items = service.get_topic_prerequisites(10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].frequency, 5);
    assert_eq!(items[0].strength, Strength::Medium);

    let topics = service.get_prerequisite_topics("Orbita").await.unwrap();
    assert_eq!(topics.len(), 2);
    assert!(topics.iter().all(|t| t.source == EdgeSource::AdminMerge));

    let detail = service.get_prerequisite_detail(orbita, None, false).await.unwrap();
    let mut concept_ids: Vec<_> = detail.concepts.iter().map(|c| c.id).collect();
    concept_ids.sort_unstable();
    assert_eq!(concept_ids, vec![ORBITA, OPTIK_SINIR]);

    let missing = service.get_prerequisite_detail(optik, None, false).await;
    assert!(matches!(missing, Err(Error::PrerequisiteNotFound(_))));

    let events = service.recent_events(Some(orbita), 10).await.unwrap();
    assert!(events.iter().any(|e| e.event_type == GraphEventType::Merged));
}

#[tokio::test]
async fn test_merge_rejects_a_single_node() {
    let (_db, service) = setup(vec![question(1, 1, 10, payload("Orbita", &["Orbita"]))]).await;
    service.ingest(1).await.unwrap();
    let id = service.get_topic_prerequisites(10).await.unwrap()[0].prerequisite_id;

    let result = service.merge_prerequisites(&[id, id], MergeTarget::Id(id)).await;
    assert!(matches!(result, Err(Error::SelfMerge(_))));
}

#[tokio::test]
async fn test_label_only_upgrade_and_merge() {
    let (_db, service) = setup(vec![question(1, 1, 10, payload("Orbita", &["Orbita"]))]).await;
    service.ingest(1).await.unwrap();
    let orbita = service.get_topic_prerequisites(10).await.unwrap()[0].prerequisite_id;

    // No node owns Kalp kası yet: upgraded in place
    let heart = service.find_or_create_label_prerequisite("Kalp kası yapısı").await.unwrap();
    let outcome = service
        .merge_label_only_prerequisite(heart.id, &[KALP_KASI], None)
        .await
        .unwrap();
    assert_eq!(outcome.kind, LabelOnlyMergeKind::Upgraded);
    let upgraded = service.get_prerequisite_detail(heart.id, None, false).await.unwrap();
    assert_eq!(upgraded.prerequisite.status, PrerequisiteStatus::Active);
    assert_eq!(upgraded.prerequisite.canonical_key.as_str(), "CONCEPT::3");

    // Orbita already owns CONCEPT::1: the label-only node folds into it
    let orbit_label = service.find_or_create_label_prerequisite("Orbita kemikleri").await.unwrap();
    let outcome = service
        .merge_label_only_prerequisite(orbit_label.id, &[ORBITA], Some("Orbita"))
        .await
        .unwrap();
    assert_eq!(outcome.kind, LabelOnlyMergeKind::Merged { target_id: orbita });

    let gone = service.get_prerequisite_detail(orbit_label.id, None, false).await;
    assert!(matches!(gone, Err(Error::PrerequisiteNotFound(_))));

    // Concept-backed nodes cannot go through the label-only path
    let result = service.merge_label_only_prerequisite(orbita, &[KALP_KASI], None).await;
    assert!(matches!(result, Err(Error::NotLabelOnly(_))));
}

#[tokio::test]
async fn test_relink_conflict_and_deprecate() {
    let (_db, service) = setup(vec![
        question(1, 1, 10, payload("Orbita", &["Orbita"])),
        question(2, 1, 10, payload("Optik sinir", &["Optik sinir"])),
    ])
    .await;
    service.ingest(1).await.unwrap();
    service.ingest(2).await.unwrap();

    let items = service.get_topic_prerequisites(10).await.unwrap();
    let optik = items.iter().find(|p| p.display_name == "Optik sinir").unwrap().prerequisite_id;

    let conflict = service.link_concepts_to_prerequisite(optik, &[ORBITA]).await;
    assert!(matches!(conflict, Err(Error::CanonicalKeyConflict { .. })));

    let relinked = service
        .link_concepts_to_prerequisite(optik, &[OPTIK_SINIR, ORBITA])
        .await
        .unwrap();
    assert_eq!(relinked.canonical_key.as_str(), "CONCEPT::1|2");

    let deprecated = service.deprecate_prerequisite(optik).await.unwrap();
    assert_eq!(deprecated.status, PrerequisiteStatus::Deprecated);
    assert_eq!(deprecated.review_reason.as_deref(), Some("deprecated by reviewer"));

    let events = service.recent_events(Some(optik), 10).await.unwrap();
    assert_eq!(events[0].event_type, GraphEventType::Deprecated);
    assert!(events.iter().any(|e| e.event_type == GraphEventType::Relinked));
}

#[tokio::test]
async fn test_listing_filters_and_analytics() {
    let mut questions = repeated(1, 10, 10, "Orbita", &["Orbita"]);
    questions.push(question(50, 2, 20, payload("Kalp kası", &["Kalp kası"])));
    let (_db, service) = setup(questions).await;
    service.process_all_analyzed_questions().await.unwrap();
    service.find_or_create_label_prerequisite("Kafa kemikleri").await.unwrap();

    let all = service.get_all_prerequisites(&PrerequisiteQuery::default()).await.unwrap();
    assert_eq!(all.total, 3);

    let anatomy = service
        .get_all_prerequisites(&PrerequisiteQuery {
            lesson: Some("anatomi".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(anatomy.total, 1);
    assert_eq!(anatomy.items[0].total_frequency, 10);

    let review = service
        .get_all_prerequisites(&PrerequisiteQuery {
            status: Some(PrerequisiteStatus::NeedsReview),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(review.total, 1);
    assert_eq!(review.items[0].prerequisite.display_name, "Kafa kemikleri");

    let analytics = service.analytics(None).await.unwrap();
    assert_eq!(analytics.total_prerequisites, 3);
    assert_eq!(analytics.needs_review_prerequisites, 1);
    assert_eq!(analytics.total_edges, 2);
    assert_eq!(analytics.strong_edges, 1);
    assert_eq!(analytics.weak_edges, 1);
    assert_eq!(analytics.top_prerequisites[0].display_name, "Orbita");
    let ungated: Vec<_> = analytics
        .topics_without_strong_prerequisite
        .iter()
        .map(|t| t.id)
        .collect();
    assert!(ungated.contains(&11));
    assert!(ungated.contains(&20));
    assert!(!ungated.contains(&10));
}

#[tokio::test]
async fn test_page_far_past_the_end_is_empty() {
    let (_db, service) = setup(vec![question(1, 1, 10, payload("Orbita", &["Orbita"]))]).await;
    service.ingest(1).await.unwrap();

    let page = service
        .get_all_prerequisites(&PrerequisiteQuery {
            page: 50_000_000,
            page_size: 100,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_one_question_counts_a_prerequisite_once() {
    let (_db, service) = setup(vec![question(
        1,
        1,
        10,
        json!({ "prerequisites": [
            { "label": "Orbita", "conceptHints": ["Orbita"] },
            // Same concept set through the merged concept's redirect
            { "label": "Orbita tekrar", "conceptHints": ["göz çukuru"] },
            { "conceptHints": ["Orbita"] },
            { "label": "Kemik yapılar", "conceptHints": [] },
        ]}),
    )])
    .await;

    let report = service.ingest(1).await.unwrap();
    assert_eq!(report.candidates_linked, 2);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.candidates_rejected, 1);
    assert_eq!(report.candidates_without_hints, 1);
    assert_eq!(report.candidates_failed, 0);

    let items = service.get_topic_prerequisites(10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].display_name, "Orbita");
    assert_eq!(items[0].frequency, 1);
}

#[tokio::test]
async fn test_concurrent_ingestion_counts_every_question() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DatabaseConfig::with_path(dir.path().join("graph.db")))
        .await
        .expect("Failed to create file database");

    let mut snapshot = base_snapshot();
    snapshot.questions = repeated(1, 8, 10, "Orbita", &["Orbita"]);
    import_snapshot(db.pool(), &snapshot).await.unwrap();

    let service = PrerequisiteGraphService::from_database(&db, &Config::default());
    let handles: Vec<_> = (1..=8)
        .map(|id| {
            let service = service.clone();
            tokio::spawn(async move { service.ingest(id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let items = service.get_topic_prerequisites(10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].frequency, 8);
    assert_eq!(items[0].strength, Strength::Medium);
    db.close().await;
}
