//! LLM capability interfaces
//!
//! The extractor and scorer only see these traits. The HTTP client in
//! [`crate::llm`] implements both; tests substitute deterministic doubles.

use async_trait::async_trait;
use enrich_core::{Chunk, MetadataFields, QaItem};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single service call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("credential rejected: {0}")]
    Unauthorized(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("response does not match schema: {0}")]
    Schema(String),
}

impl ServiceError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Transient(_) | ServiceError::Timeout(_) | ServiceError::Schema(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Transient(_) => "transient",
            ServiceError::Timeout(_) => "timeout",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Rejected(_) => "rejected",
            ServiceError::Schema(_) => "schema",
        }
    }
}

/// Produce structured metadata for one chunk
#[async_trait]
pub trait MetadataExtractionService: Send + Sync {
    async fn extract_metadata(&self, chunk: &Chunk) -> Result<MetadataFields, ServiceError>;
}

/// The question as shown to the scoring service.
///
/// Answers, and the notes that describe them, are only present when the
/// caller asked to reveal them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringQuery {
    pub question_id: u32,
    pub question: String,
    pub question_de: Option<String>,
    pub answer: Option<String>,
    pub answer_de: Option<String>,
    pub notes: Option<String>,
}

impl ScoringQuery {
    pub fn from_item(item: &QaItem, reveal_answer: bool) -> Self {
        Self {
            question_id: item.id,
            question: item.question.clone(),
            question_de: item.question_de.clone(),
            answer: reveal_answer.then(|| item.answer.clone()),
            answer_de: if reveal_answer { item.answer_de.clone() } else { None },
            notes: if reveal_answer { item.notes.clone() } else { None },
        }
    }
}

/// Unsnapped score as returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct RawScore {
    pub score: f64,
    pub reason: String,
}

impl RawScore {
    pub fn new(score: f64, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }
}

/// Score one chunk against one question on the five-point rubric
#[async_trait]
pub trait RelevanceScoringService: Send + Sync {
    async fn score(&self, chunk: &Chunk, query: &ScoringQuery) -> Result<RawScore, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blind_query_withholds_answers() {
        let mut item = QaItem::new(4, "Who founded it?", "Escher");
        item.answer_de = Some("Escher".into());
        item.notes = Some("answer should name Alfred Escher".into());

        let blind = ScoringQuery::from_item(&item, false);
        assert_eq!(blind.answer, None);
        assert_eq!(blind.answer_de, None);
        assert_eq!(blind.notes, None);

        let open = ScoringQuery::from_item(&item, true);
        assert_eq!(open.answer.as_deref(), Some("Escher"));
        assert_eq!(open.answer_de.as_deref(), Some("Escher"));
        assert_eq!(open.notes.as_deref(), Some("answer should name Alfred Escher"));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ServiceError::Transient("503".into()).is_retryable());
        assert!(ServiceError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ServiceError::Schema("missing key".into()).is_retryable());
        assert!(!ServiceError::Unauthorized("401".into()).is_retryable());
        assert!(!ServiceError::Rejected("400".into()).is_retryable());
    }
}
