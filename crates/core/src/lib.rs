//! Core domain types for the corpus enrichment pipeline
//!
//! This crate defines the data structures every stage reads and writes:
//! documents before and after cleaning, the benchmark question set, chunks
//! with their LLM-derived metadata, and relevance score records.

pub mod benchmark;
pub mod chunk;
pub mod document;
pub mod error;
pub mod score;

pub use benchmark::{Benchmark, QaItem};
pub use chunk::{
    Chunk, ChunkMetadata, EntityGroups, EventDate, MetadataFields, NumericFact, RoleAnnotation,
    MAX_SUMMARY_WORDS,
};
pub use document::{doc_id_for, Document, Language, NamedEntity, PathDate, RawDocument, TextStats};
pub use error::{CoreError, Result};
pub use score::{RelevanceAnchor, ScoreRecord, ScoreSet};
