//! Loading stage inputs from directory trees of JSON files

use crate::report::UnitFailure;
use crate::{PipelineError, Result};
use enrich_core::{Chunk, Document, RawDocument};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Items that parsed, plus the files that did not
#[derive(Debug)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub rejected: Vec<UnitFailure>,
}

impl<T> Loaded<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fail with a configuration error unless `dir` is an existing directory
pub fn require_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(format!(
            "input directory {} does not exist",
            dir.display()
        )))
    }
}

/// Files under `dir` with one of `extensions`, sorted by path.
/// Dotfiles and dot-directories are skipped.
pub fn list_files(dir: &Path, extensions: &[&str], recursive: bool) -> Result<Vec<PathBuf>> {
    require_dir(dir)?;
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    for entry in walker {
        let entry = entry.map_err(|e| PipelineError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)));
        if matches {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Path relative to `root` with forward slashes
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn load_tree<T, F>(dir: &Path, recursive: bool, mut parse: F) -> Result<Loaded<T>>
where
    F: FnMut(&str, &str) -> std::result::Result<T, String>,
{
    let mut loaded = Loaded {
        items: Vec::new(),
        rejected: Vec::new(),
    };

    for path in list_files(dir, &["json"], recursive)? {
        let rel = relative_path(dir, &path);
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| parse(&rel, content.trim_start_matches('\u{feff}')));

        match parsed {
            Ok(item) => loaded.items.push(item),
            Err(cause) => {
                warn!(file = %rel, error = %cause, "Skipping unreadable input");
                loaded.rejected.push(UnitFailure::new(rel, "input", cause));
            }
        }
    }

    debug!(
        dir = %dir.display(),
        loaded = loaded.items.len(),
        rejected = loaded.rejected.len(),
        "Loaded inputs"
    );
    Ok(loaded)
}

fn parse_json<T: DeserializeOwned>(content: &str) -> std::result::Result<T, String> {
    serde_json::from_str(content).map_err(|e| e.to_string())
}

/// Raw documents from a tree of JSON files. Documents without a recorded
/// source path get their path relative to `dir`.
pub fn load_raw_documents(dir: &Path) -> Result<Loaded<RawDocument>> {
    load_tree(dir, true, |rel, content| {
        let mut doc: RawDocument = parse_json(content)?;
        if doc.source_path.is_none() {
            doc.source_path = Some(rel.to_string());
        }
        Ok(doc)
    })
}

/// Enriched documents from a tree of JSON files
pub fn load_documents(dir: &Path) -> Result<Loaded<Document>> {
    load_tree(dir, true, |_, content| parse_json(content))
}

/// Chunk files directly inside `dir`. A file whose chunk id was already
/// loaded from an earlier file is rejected.
pub fn load_chunks(dir: &Path) -> Result<Loaded<Chunk>> {
    let mut first_seen: HashMap<String, String> = HashMap::new();
    load_tree(dir, false, |rel, content| {
        let chunk = Chunk::from_json(content).map_err(|e| e.to_string())?;
        if let Some(first) = first_seen.get(&chunk.id) {
            return Err(format!("duplicate chunk id {}, already loaded from {first}", chunk.id));
        }
        first_seen.insert(chunk.id.clone(), rel.to_string());
        Ok(chunk)
    })
}

/// First copy of every chunk id, in order, plus a rejection for each
/// repeated copy
pub fn unique_chunks(chunks: &[Chunk]) -> (Vec<&Chunk>, Vec<UnitFailure>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(chunks.len());
    let mut duplicates = Vec::new();

    for chunk in chunks {
        if seen.insert(chunk.id.as_str()) {
            unique.push(chunk);
        } else {
            warn!(chunk_id = %chunk.id, "Duplicate chunk id, keeping the first copy");
            duplicates.push(UnitFailure::new(&chunk.id, "input", "duplicate chunk id"));
        }
    }
    (unique, duplicates)
}

/// Stage output name for a chunk directory: its name without a `_chunk` suffix
pub fn chunk_set_name(chunk_dir: &Path) -> String {
    let name = chunk_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix("_chunk").unwrap_or(&name).to_string()
}
