//! Ingestion of analyzed questions into the prerequisite graph

mod bulk;
mod ingestor;
mod question;

pub use bulk::{BulkIngestionFailure, BulkIngestionReport, BulkIngestionRunner};
pub use ingestor::{INGESTION_LINK_CONFIDENCE, IngestionReport, QuestionGraphIngestor, SkipReason};
pub use question::{
    AnalysisStatus, AnalyzedQuestion, AnalyzedQuestionSource, CandidatePrerequisite, ParsedPayload,
    QuestionId, RejectedCandidate, parse_payload,
};
