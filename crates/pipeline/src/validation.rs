//! Validation stage: only documents with retained content go downstream

use crate::report::{BatchReport, UnitFailure};
use crate::{PipelineError, Result};
use enrich_core::Document;
use enrich_store::{ContentStore, ContentStoreExt};
use tracing::{info, instrument, warn};

const NO_CONTENT: &str = "no paragraphs retained after cleaning";

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationFilter;

impl ValidationFilter {
    /// True iff at least one cleaned paragraph remains
    pub fn keep(document: &Document) -> bool {
        document.has_content()
    }

    /// Copy kept documents to `output`. Excluded documents are logged and
    /// any stale copy in `output` is removed. A store failure is reported
    /// for that document and the batch carries on.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn run(documents: &[Document], output: &dyn ContentStore) -> Result<BatchReport> {
        let mut report = BatchReport::new("validate");

        for doc in documents {
            let stored = if Self::keep(doc) {
                output.write_as(&doc.doc_id, doc).await.map(|()| true)
            } else {
                warn!(doc_id = %doc.doc_id, kind = "document", "Excluded: {NO_CONTENT}");
                output.remove(&doc.doc_id).await.map(|_| false)
            };

            match stored {
                Ok(true) => report.record_processed(),
                Ok(false) => {
                    report.record_failure(UnitFailure::new(&doc.doc_id, "document", NO_CONTENT))
                }
                Err(e) => {
                    let e = PipelineError::from(e);
                    warn!(doc_id = %doc.doc_id, kind = e.kind(), error = %e, "Store failed");
                    report.record_failure(UnitFailure::new(&doc.doc_id, e.kind(), e.to_string()));
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
    use enrich_core::RawDocument;
    use enrich_store::{JsonDirStore, MemoryStore};
    use serde_json::json;

    fn document(name: &str, cleaned: &[&str]) -> Document {
        let raw = RawDocument::new(name.as_bytes(), name, "", Vec::new());
        Document::from_raw(&raw, cleaned.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_keep() {
        assert!(ValidationFilter::keep(&document("a", &["content"])));
        assert!(!ValidationFilter::keep(&document("b", &[])));
    }

    #[tokio::test]
    async fn test_run_excludes_and_clears_stale_output() {
        let kept = document("a", &["content"]);
        let dropped = document("b", &[]);
        let store = MemoryStore::new();
        store.write(&dropped.doc_id, &json!({"stale": true})).await.unwrap();

        let report = ValidationFilter::run(&[kept.clone(), dropped.clone()], &store)
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed_count(), 1);
        assert!(store.exists(&kept.doc_id).await.unwrap());
        assert!(!store.exists(&dropped.doc_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failures_are_reported_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        let blocked = document("a", &["content"]);
        let stuck = document("b", &[]);
        let fine = document("c", &["more content"]);
        // Directories at the target paths make both rename and remove fail
        std::fs::create_dir(store.path_for(&blocked.doc_id)).unwrap();
        std::fs::create_dir(store.path_for(&stuck.doc_id)).unwrap();

        let report = ValidationFilter::run(&[blocked.clone(), stuck.clone(), fine.clone()], &store)
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        let kinds: Vec<_> = report.failed.iter().map(|f| (f.unit_id.as_str(), f.kind.as_str())).collect();
        assert_eq!(
            kinds,
            vec![(blocked.doc_id.as_str(), "store"), (stuck.doc_id.as_str(), "store")]
        );
        assert!(store.exists(&fine.doc_id).await.unwrap());
    }
}
