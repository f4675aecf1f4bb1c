//! Relevance scoring of chunks against the benchmark, idempotent per
//! chunk/question pair

use crate::config::PipelineConfig;
use crate::corpus::unique_chunks;
use crate::failures::{pair_unit_id, FailureLog, FailureRecord, Stage};
use crate::report::{BatchReport, UnitFailure};
use crate::retry::RetryPolicy;
use crate::services::{RelevanceScoringService, ScoringQuery, ServiceError};
use crate::{PipelineError, Result};
use enrich_core::{Benchmark, Chunk, RelevanceAnchor, ScoreRecord, ScoreSet};
use enrich_store::{ContentStore, ContentStoreExt};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// A chunk/question pair with no stored score
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MissingPair {
    pub chunk_id: String,
    pub question_id: u32,
}

/// Scores of one chunk after a run, and what the run did
#[derive(Debug, Clone)]
pub struct ChunkScores {
    pub scores: ScoreSet,
    pub report: BatchReport,
}

/// Every pair without a stored score, in chunk then benchmark order.
/// Only reads the store.
pub async fn list_missing(
    store: &dyn ContentStore,
    chunks: &[Chunk],
    benchmark: &Benchmark,
) -> Result<Vec<MissingPair>> {
    let mut missing = Vec::new();
    for chunk in chunks {
        let scores: ScoreSet = store.read_as(&chunk.id).await?.unwrap_or_default();
        missing.extend(scores.missing(benchmark).into_iter().map(|question_id| MissingPair {
            chunk_id: chunk.id.clone(),
            question_id,
        }));
    }
    Ok(missing)
}

pub struct RelevanceScorer {
    service: Arc<dyn RelevanceScoringService>,
    store: Arc<dyn ContentStore>,
    failures: Option<FailureLog>,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl RelevanceScorer {
    pub fn new(service: Arc<dyn RelevanceScoringService>, store: Arc<dyn ContentStore>) -> Self {
        let config = PipelineConfig::default();
        Self {
            service,
            store,
            failures: None,
            retry: config.retry,
            max_concurrency: config.max_concurrency,
        }
    }

    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.retry = config.retry;
        self.max_concurrency = config.max_concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_failure_log(mut self, failures: FailureLog) -> Self {
        self.failures = Some(failures);
        self
    }

    pub async fn list_missing(
        &self,
        chunks: &[Chunk],
        benchmark: &Benchmark,
    ) -> Result<Vec<MissingPair>> {
        list_missing(self.store.as_ref(), chunks, benchmark).await
    }

    /// Score `chunk` against every benchmark question it has no score for.
    ///
    /// Each new score is merged into the stored set as soon as it arrives;
    /// scores already stored are never replaced. A failed pair is reported
    /// and the remaining questions still run.
    #[instrument(skip_all, fields(chunk_id = %chunk.id, reveal_answer = reveal_answer))]
    pub async fn score(
        &self,
        chunk: &Chunk,
        benchmark: &Benchmark,
        reveal_answer: bool,
    ) -> Result<ChunkScores> {
        let mut report = BatchReport::new("score");
        let mut scores: ScoreSet = self.store.read_as(&chunk.id).await?.unwrap_or_default();

        let missing = scores.missing(benchmark);
        report.skipped += benchmark.len() - missing.len();
        if missing.is_empty() {
            debug!("All questions already scored");
            return Ok(ChunkScores { scores, report });
        }
        debug!(missing = missing.len(), "Scoring missing questions");

        for item in missing.iter().filter_map(|id| benchmark.get(*id)) {
            let unit = pair_unit_id(&chunk.id, item.id);
            let query = ScoringQuery::from_item(item, reveal_answer);
            let query = &query;

            let outcome = self
                .retry
                .run("score", &unit, || async move {
                    let raw = self.service.score(chunk, query).await?;
                    let anchor = RelevanceAnchor::snap(raw.score).ok_or_else(|| {
                        ServiceError::Schema(format!("relevance_score {} outside [0, 1]", raw.score))
                    })?;
                    Ok::<_, ServiceError>(ScoreRecord::new(anchor, &raw.reason))
                })
                .await;

            match outcome {
                Ok(record) => {
                    let (merged, inserted) = self.merge(&chunk.id, item.id, record).await?;
                    scores = merged;
                    if inserted {
                        report.record_processed();
                    } else {
                        report.record_skipped();
                    }
                    if let Some(log) = &self.failures {
                        log.clear(&unit).await;
                    }
                }
                Err(exhausted) => {
                    let cause = exhausted.error.to_string();
                    let err = PipelineError::from_service(&unit, exhausted.error);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!(question_id = item.id, kind = err.kind(), error = %err, "Pair failed");
                    if let Some(log) = &self.failures {
                        let record = FailureRecord::new(
                            &unit,
                            Stage::Scoring,
                            err.kind(),
                            cause,
                            exhausted.attempts,
                        );
                        log.record(&record).await;
                    }
                    report.record_failure(UnitFailure::new(unit, err.kind(), err.to_string()));
                }
            }
        }

        Ok(ChunkScores { scores, report })
    }

    /// Add one score to the stored set unless it is already there. The
    /// store serializes merges on one id, so the first stored score wins.
    async fn merge(
        &self,
        chunk_id: &str,
        question_id: u32,
        record: ScoreRecord,
    ) -> Result<(ScoreSet, bool)> {
        let mut inserted = false;
        let stored = self
            .store
            .update_as(chunk_id, |current: Option<ScoreSet>| {
                let mut scores = current.unwrap_or_default();
                inserted = scores.insert_if_absent(question_id, record);
                inserted.then_some(scores)
            })
            .await?
            .unwrap_or_default();
        if !inserted {
            debug!(question_id, "Score stored by another worker, keeping theirs");
        }
        Ok((stored, inserted))
    }

    /// Score every chunk with bounded concurrency. A repeated chunk id is
    /// scored once and its other copies are rejected. Only a fatal error
    /// stops the batch.
    #[instrument(
        skip_all,
        fields(chunks = chunks.len(), questions = benchmark.len(), reveal_answer = reveal_answer)
    )]
    pub async fn score_all(
        &self,
        chunks: &[Chunk],
        benchmark: &Benchmark,
        reveal_answer: bool,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new("score");
        let (chunks, duplicates) = unique_chunks(chunks);
        for duplicate in duplicates {
            report.record_failure(duplicate);
        }

        let mut results = stream::iter(chunks)
            .map(|chunk| async move { (chunk, self.score(chunk, benchmark, reveal_answer).await) })
            .buffer_unordered(self.max_concurrency);

        while let Some((chunk, result)) = results.next().await {
            match result {
                Ok(chunk_scores) => report.absorb(chunk_scores.report),
                Err(e) if e.is_fatal() => {
                    error!(chunk_id = %chunk.id, error = %e, "Aborting scoring");
                    return Err(e);
                }
                Err(e) => {
                    warn!(chunk_id = %chunk.id, kind = e.kind(), error = %e, "Chunk failed");
                    report.record_failure(UnitFailure::new(&chunk.id, e.kind(), e.to_string()));
                }
            }
        }

        info!("{report}");
        Ok(report)
    }
}
