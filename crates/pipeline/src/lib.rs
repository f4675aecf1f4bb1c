//! Enrichment stages for the corpus pipeline
//!
//! This crate contains the stages, in data-flow order:
//! - Ingest: plain-text files to raw documents
//! - Clean: corpus-wide boilerplate removal, then per-document NLP enrichment
//! - Validate: drop documents with no retained content
//! - Metadata: structured metadata per chunk via an LLM, once per chunk id
//! - Scoring: chunk relevance against the benchmark, once per pair

pub mod clean;
pub mod config;
pub mod corpus;
pub mod enricher;
pub mod error;
pub mod failures;
pub mod frequency;
pub mod ingest;
pub mod llm;
pub mod metadata;
pub mod nlp;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod scorer;
pub mod services;
pub mod validation;

pub use clean::CleanStage;
pub use config::{BoilerplateRules, LlmSettings, PipelineConfig, API_KEY_VAR};
pub use enricher::DocumentEnricher;
pub use error::{PipelineError, Result};
pub use failures::{FailureLog, FailureRecord, Stage};
pub use frequency::{FrequencyTable, ParagraphFrequencyIndex, DEFAULT_THRESHOLD};
pub use ingest::ingest_corpus;
pub use llm::OpenAiClient;
pub use metadata::{ChunkMetadataExtractor, Extraction};
pub use report::{BatchReport, UnitFailure};
pub use retry::RetryPolicy;
pub use scorer::{list_missing, ChunkScores, MissingPair, RelevanceScorer};
pub use services::{
    MetadataExtractionService, RawScore, RelevanceScoringService, ScoringQuery, ServiceError,
};
pub use validation::ValidationFilter;
