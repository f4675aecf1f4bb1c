//! Cleaning stage: frequency filtering followed by enrichment

use crate::enricher::DocumentEnricher;
use crate::frequency::ParagraphFrequencyIndex;
use crate::report::{BatchReport, UnitFailure};
use crate::{PipelineError, Result};
use enrich_core::RawDocument;
use enrich_store::{ContentStore, ContentStoreExt};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

pub struct CleanStage {
    index: ParagraphFrequencyIndex,
    enricher: DocumentEnricher,
}

impl CleanStage {
    pub fn new(index: ParagraphFrequencyIndex, enricher: DocumentEnricher) -> Self {
        Self { index, enricher }
    }

    /// Count the whole corpus, then filter and enrich each document and
    /// write it under its `doc_id`. Output is rewritten on every run. A
    /// document that cannot be enriched or written is reported and the
    /// rest of the batch still runs.
    #[instrument(skip_all, fields(documents = documents.len(), threshold = self.index.threshold()))]
    pub async fn run(&self, documents: &[RawDocument], output: &dyn ContentStore) -> Result<BatchReport> {
        let mut report = BatchReport::new("clean");

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(documents.len());
        for doc in documents {
            if seen.insert(doc.doc_id.as_str()) {
                unique.push(doc);
            } else {
                report.record_skipped();
            }
        }

        let table = ParagraphFrequencyIndex::build(unique.iter().copied());
        let repeated = table.repeated(self.index.threshold());
        info!(
            distinct_paragraphs = table.len(),
            boilerplate = repeated.len(),
            "Frequency table complete"
        );

        for raw in unique {
            let cleaned = self.index.filter(raw, &table);
            match self.enricher.enrich(raw, cleaned) {
                Ok(doc) => match output.write_as(&doc.doc_id, &doc).await {
                    Ok(()) => report.record_processed(),
                    Err(e) => {
                        let e = PipelineError::from(e);
                        warn!(doc_id = %doc.doc_id, kind = e.kind(), error = %e, "Write failed");
                        report.record_failure(UnitFailure::new(&doc.doc_id, e.kind(), e.to_string()));
                    }
                },
                Err(e) => {
                    warn!(doc_id = %raw.doc_id, kind = e.kind(), error = %e, "Document excluded");
                    report.record_failure(UnitFailure::new(&raw.doc_id, e.kind(), e.to_string()));
                }
            }
        }

        info!("{report}");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoilerplateRules;
    use enrich_core::Document;
    use enrich_store::{JsonDirStore, MemoryStore};

    fn raw(i: usize, paragraphs: &[&str]) -> RawDocument {
        RawDocument::new(
            format!("doc {i}").as_bytes(),
            format!("doc{i}.txt"),
            paragraphs.join("\n"),
            paragraphs.iter().map(|p| p.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_clean_removes_boilerplate_and_is_repeatable() {
        let mut docs: Vec<RawDocument> = (0..5)
            .map(|i| raw(i, &["Subscribe to our newsletter", &format!("Story number {i} about research.")]))
            .collect();
        docs.push(raw(9, &["Subscribe to our newsletter"]));
        docs.push(docs[0].clone());

        let stage = CleanStage::new(
            ParagraphFrequencyIndex::new(5, BoilerplateRules::default()),
            DocumentEnricher::heuristic(),
        );
        let store = MemoryStore::new();
        let report = stage.run(&docs, &store).await.unwrap();

        assert_eq!(report.processed, 6);
        assert_eq!(report.skipped, 1);

        let first = store.snapshot().await;
        let doc: Document = serde_json::from_value(first[&docs[0].doc_id].clone()).unwrap();
        assert_eq!(doc.paragraphs_cleaned, vec!["Story number 0 about research."]);
        let empty: Document = serde_json::from_value(first[&docs[5].doc_id].clone()).unwrap();
        assert!(!empty.has_content());

        stage.run(&docs, &store).await.unwrap();
        assert_eq!(store.snapshot().await, first);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        let docs = vec![raw(0, &["First story."]), raw(1, &["Second story."])];
        // A directory at the target path makes the final rename fail
        std::fs::create_dir(store.path_for(&docs[0].doc_id)).unwrap();

        let stage = CleanStage::new(
            ParagraphFrequencyIndex::new(5, BoilerplateRules::none()),
            DocumentEnricher::heuristic(),
        );
        let report = stage.run(&docs, &store).await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failed[0].unit_id, docs[0].doc_id);
        assert_eq!(report.failed[0].kind, "store");
        assert!(store.exists(&docs[1].doc_id).await.unwrap());
    }
}
