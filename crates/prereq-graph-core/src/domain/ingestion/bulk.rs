//! Bulk re-ingestion of every analyzed question
//!
//! Jobs run on a bounded number of concurrent workers. Each job has its own
//! timeout and retry budget, and a failed job is reported rather than
//! aborting the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::IngestionConfig;
use crate::error::{Error, Result};
use crate::util::retry_attempts;

use super::ingestor::{IngestionReport, QuestionGraphIngestor};
use super::question::{AnalyzedQuestionSource, QuestionId};

/// A job that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIngestionFailure {
    pub question_id: QuestionId,
    pub code: String,
    pub message: String,
}

/// Summary of a bulk run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIngestionReport {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub edges_touched: usize,
    pub unresolved_hints: usize,
    pub candidates_failed: usize,
    pub errors: Vec<BulkIngestionFailure>,
    pub elapsed_ms: u64,
}

impl BulkIngestionReport {
    fn absorb(&mut self, question_id: QuestionId, outcome: Result<IngestionReport>) {
        match outcome {
            Ok(report) if report.skipped.is_some() => self.skipped += 1,
            Ok(report) => {
                self.processed += 1;
                self.edges_touched += report.edges.len();
                self.unresolved_hints += report.unresolved_hints.len();
                self.candidates_failed += report.candidates_failed;
            }
            Err(e) => {
                self.failed += 1;
                self.errors.push(BulkIngestionFailure {
                    question_id,
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Re-ingests questions with bounded concurrency, timeout and retry
#[derive(Clone)]
pub struct BulkIngestionRunner {
    ingestor: QuestionGraphIngestor,
    questions: Arc<dyn AnalyzedQuestionSource>,
    config: IngestionConfig,
}

impl BulkIngestionRunner {
    pub fn new(
        ingestor: QuestionGraphIngestor,
        questions: Arc<dyn AnalyzedQuestionSource>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            ingestor,
            questions,
            config,
        }
    }

    /// Ingest every completed question that has a topic
    pub async fn run(&self) -> Result<BulkIngestionReport> {
        let ids = self.questions.list_analyzed_question_ids().await?;
        Ok(self.run_for(&ids).await)
    }

    /// Ingest the given questions
    pub async fn run_for(&self, question_ids: &[QuestionId]) -> BulkIngestionReport {
        let started = Instant::now();
        let workers = self.config.workers.max(1);
        let job_timeout = Duration::from_secs(self.config.job_timeout_secs);
        let max_attempts = self.config.max_attempts;

        info!(
            total = question_ids.len(),
            workers,
            max_attempts,
            "Starting bulk ingestion"
        );

        let outcomes: Vec<(QuestionId, Result<IngestionReport>)> = stream::iter(question_ids.iter().copied())
            .map(|question_id| {
                let ingestor = self.ingestor.clone();
                async move {
                    let outcome = retry_attempts("ingest_question", max_attempts, || {
                        let ingestor = ingestor.clone();
                        async move {
                            match tokio::time::timeout(job_timeout, ingestor.ingest(question_id)).await {
                                Ok(result) => result,
                                Err(_) => Err(Error::Timeout(format!("ingest question {}", question_id))),
                            }
                        }
                    })
                    .await;
                    (question_id, outcome)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut report = BulkIngestionReport {
            total: question_ids.len(),
            ..Default::default()
        };
        for (question_id, outcome) in outcomes {
            if let Err(e) = &outcome {
                warn!(question_id, error = %e, "Question ingestion failed");
            }
            report.absorb(question_id, outcome);
        }
        report.errors.sort_by_key(|f| f.question_id);
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            total = report.total,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            edges_touched = report.edges_touched,
            elapsed_ms = report.elapsed_ms,
            "Bulk ingestion finished"
        );
        report
    }
}
