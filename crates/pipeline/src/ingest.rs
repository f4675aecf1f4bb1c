//! Raw ingestion of already-extracted text files

use crate::corpus::{list_files, relative_path};
use crate::report::{BatchReport, UnitFailure};
use crate::Result;
use enrich_core::RawDocument;
use enrich_store::{ContentStore, ContentStoreExt};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument, warn};

pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Trim every line and drop the empty ones
pub fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Blank-line separated blocks. Text with at most one block is split into
/// one paragraph per line instead.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    if blocks.len() <= 1 {
        return text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
    }
    blocks
}

/// Build a raw document from file bytes. The id is the hash of the bytes.
pub fn raw_document_from_bytes(
    bytes: &[u8],
    filename: &str,
    source_path: &str,
) -> std::result::Result<RawDocument, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {e}"))?;
    let text = text.trim_start_matches('\u{feff}');
    Ok(RawDocument::new(bytes, filename, normalize_lines(text), split_paragraphs(text))
        .with_source_path(source_path))
}

/// Convert every text file under `input_dir` into a raw document artifact.
/// Files with identical bytes collapse onto one id.
#[instrument(skip(output))]
pub async fn ingest_corpus(input_dir: &Path, output: &dyn ContentStore) -> Result<BatchReport> {
    let mut report = BatchReport::new("ingest");
    let mut seen = HashSet::new();

    for path in list_files(input_dir, TEXT_EXTENSIONS, true)? {
        let rel = relative_path(input_dir, &path);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let doc = match std::fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| raw_document_from_bytes(&bytes, &filename, &rel))
        {
            Ok(doc) => doc,
            Err(cause) => {
                warn!(file = %rel, error = %cause, "Skipping file");
                report.record_failure(UnitFailure::new(rel, "document", cause));
                continue;
            }
        };

        if !seen.insert(doc.doc_id.clone()) {
            info!(file = %rel, doc_id = %doc.doc_id, "Duplicate content, skipping");
            report.record_skipped();
            continue;
        }

        output.write_as(&doc.doc_id, &doc).await?;
        report.record_processed();
    }

    info!("{report}");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrich_store::MemoryStore;

    #[test]
    fn test_blank_line_blocks() {
        let text = "  Title  \n\nFirst line\nsecond line\n\n\n Last ";
        assert_eq!(
            split_paragraphs(text),
            vec!["Title", "First line\nsecond line", "Last"]
        );
    }

    #[test]
    fn test_single_block_falls_back_to_lines() {
        let text = "One\n  Two  \nThree";
        assert_eq!(split_paragraphs(text), vec!["One", "Two", "Three"]);
        assert_eq!(normalize_lines("  a \n\n b"), "a\nb");
    }

    #[test]
    fn test_doc_id_is_hash_of_bytes() {
        let a = raw_document_from_bytes(b"Same text", "a.txt", "a.txt").unwrap();
        let b = raw_document_from_bytes(b"Same text", "b.txt", "x/b.txt").unwrap();
        assert_eq!(a.doc_id, b.doc_id);
        assert!(raw_document_from_bytes(&[0xff, 0xfe, 0x00], "bad.txt", "bad.txt").is_err());
    }

    #[tokio::test]
    async fn test_ingest_collapses_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("2022")).unwrap();
        std::fs::write(dir.path().join("2022/a.txt"), "Hello\n\nWorld").unwrap();
        std::fs::write(dir.path().join("b.md"), "Hello\n\nWorld").unwrap();
        std::fs::write(dir.path().join("c.txt"), "Other").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let store = MemoryStore::new();
        let report = ingest_corpus(dir.path(), &store).await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 1);
        let stored = store.snapshot().await;
        let first = stored.values().find(|v| v["filename"] == "a.txt").unwrap();
        assert_eq!(first["source_path"], "2022/a.txt");
        assert_eq!(first["paragraphs"], serde_json::json!(["Hello", "World"]));
    }
}
