//! Chunk metadata extraction, idempotent per chunk id

use crate::config::PipelineConfig;
use crate::corpus::unique_chunks;
use crate::failures::{FailureLog, FailureRecord, Stage};
use crate::report::{BatchReport, UnitFailure};
use crate::retry::RetryPolicy;
use crate::services::{MetadataExtractionService, ServiceError};
use crate::{PipelineError, Result};
use enrich_core::{Chunk, ChunkMetadata};
use enrich_store::{ContentStore, ContentStoreExt};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Metadata was already stored, no service call made
    Skipped,
    Stored(ChunkMetadata),
}

pub struct ChunkMetadataExtractor {
    service: Arc<dyn MetadataExtractionService>,
    store: Arc<dyn ContentStore>,
    failures: Option<FailureLog>,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl ChunkMetadataExtractor {
    pub fn new(service: Arc<dyn MetadataExtractionService>, store: Arc<dyn ContentStore>) -> Self {
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

    /// Extract and store metadata for one chunk unless it is already stored.
    ///
    /// A payload that never fits the schema yields
    /// [`PipelineError::SchemaValidation`] and nothing is written.
    #[instrument(skip_all, fields(chunk_id = %chunk.id))]
    pub async fn extract(&self, chunk: &Chunk) -> Result<Extraction> {
        if self.store.exists(&chunk.id).await? {
            debug!("Metadata already stored");
            return Ok(Extraction::Skipped);
        }

        let outcome = self
            .retry
            .run("extract_metadata", &chunk.id, || async move {
                let fields = self.service.extract_metadata(chunk).await?;
                ChunkMetadata::from_fields(chunk.id.clone(), fields)
                    .map_err(|e| ServiceError::Schema(e.to_string()))
            })
            .await;

        let metadata = match outcome {
            Ok(metadata) => metadata,
            Err(exhausted) => {
                let cause = exhausted.error.to_string();
                let err = PipelineError::from_service(&chunk.id, exhausted.error);
                if !err.is_fatal() {
                    if let Some(log) = &self.failures {
                        let record = FailureRecord::new(
                            &chunk.id,
                            Stage::Metadata,
                            err.kind(),
                            cause,
                            exhausted.attempts,
                        );
                        log.record(&record).await;
                    }
                }
                return Err(err);
            }
        };

        if !self.store.create_as(&chunk.id, &metadata).await? {
            info!("Metadata stored by another worker, keeping theirs");
            return Ok(Extraction::Skipped);
        }
        if let Some(log) = &self.failures {
            log.clear(&chunk.id).await;
        }

        debug!(
            topics = metadata.fields.topic_tags.len(),
            roles = metadata.fields.role_annotations.len(),
            "Metadata stored"
        );
        Ok(Extraction::Stored(metadata))
    }

    /// Run [`extract`](Self::extract) over every chunk with bounded
    /// concurrency. A repeated chunk id is extracted once. Per-chunk
    /// failures are reported and the batch carries on; only a fatal error
    /// stops it.
    #[instrument(skip_all, fields(chunks = chunks.len(), concurrency = self.max_concurrency))]
    pub async fn extract_all(&self, chunks: &[Chunk]) -> Result<BatchReport> {
        let mut report = BatchReport::new("extract-metadata");
        let (chunks, duplicates) = unique_chunks(chunks);
        for duplicate in duplicates {
            report.record_failure(duplicate);
        }

        let mut results = stream::iter(chunks)
            .map(|chunk| async move { (chunk, self.extract(chunk).await) })
            .buffer_unordered(self.max_concurrency);

        while let Some((chunk, result)) = results.next().await {
            match result {
                Ok(Extraction::Stored(_)) => report.record_processed(),
                Ok(Extraction::Skipped) => report.record_skipped(),
                Err(e) if e.is_fatal() => {
                    error!(chunk_id = %chunk.id, error = %e, "Aborting metadata extraction");
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
