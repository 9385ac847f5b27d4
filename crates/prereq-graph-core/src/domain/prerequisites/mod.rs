//! Prerequisite graph domain
//!
//! Nodes are units of background knowledge; edges tie them to the exam
//! topics that need them. This module holds the pure rules (classification,
//! canonical keys, strength tiers, merge aggregation, candidate scoring) and
//! the services that apply them through [`PrerequisiteGraphRepository`].
//!
//! ## Flow
//!
//! ```text
//! hints ─► ConceptResolver ─► PrerequisiteCanonicalizer ─► GraphEdgeAccumulator
//!                                   │ (Classifier)
//!                                   ▼
//!                         prerequisites / edges ─► GraphQueryService
//!                                   ▲                MergeCandidateFinder
//!                                   └──────────────── MergeExecutor
//! ```

mod candidates;
mod canonicalizer;
mod classifier;
mod edge;
mod entity;
mod event;
mod merge;
mod query;
mod repository;

pub use candidates::{
    CandidateProfile, MergeCandidate, MergeCandidateFinder, name_similarity, rank_candidates,
    score_candidate,
};
pub use canonicalizer::PrerequisiteCanonicalizer;
pub use classifier::{
    Classification, PrerequisiteClassifier, REASON_COUNT_MISMATCH, REASON_GENERIC,
    REASON_MULTI_CONCEPT_UNCLEAR, REASON_NO_HINTS, REASON_OUTSIDE_SCOPE, REASON_TOO_SHORT,
    REASON_UNMAPPED,
};
pub use edge::GraphEdgeAccumulator;
pub use entity::{
    CONCEPT_KEY_PREFIX, CanonicalKey, DEPRECATED_BY_REVIEWER_REASON, EdgeSource,
    LABEL_ONLY_KEY_PREFIX, LABEL_ONLY_REASON, NewPrerequisite, Prerequisite, PrerequisiteId,
    PrerequisiteStatus, PrerequisiteTopicEdge, Strength,
};
pub use event::{GraphEvent, GraphEventType};
pub use merge::{
    AggregatedEdge, LabelOnlyMergeKind, LabelOnlyMergeOutcome, LabelOnlyMergeRequest,
    MergeExecutor, MergeRequest, MergeSummary, MergeTarget, aggregate_edges,
};
pub use query::{
    CoverageEntry, EvidenceQuestion, GraphAnalytics, GraphQueryService, MAX_EVIDENCE_QUESTIONS,
    MAX_PAGE_SIZE, Page, PatternBreakdown, PrerequisiteDetail, PrerequisiteQuery,
    PrerequisiteSort, PrerequisiteSummary, PrerequisiteTopic, TopicPrerequisite,
    sort_by_strength_then_frequency,
};
pub use repository::PrerequisiteGraphRepository;
