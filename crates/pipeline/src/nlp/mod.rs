//! NLP capability interfaces and the heuristic implementations shipped with
//! the pipeline
//!
//! Each capability is a single-method contract. Output depends on the
//! implementation behind it; swapping an implementation may change results
//! for the same text.

pub mod entities;
pub mod keywords;
pub mod language;
pub mod summary;

pub use entities::CapitalizedSpanRecognizer;
pub use keywords::StatisticalKeywordExtractor;
pub use language::StopwordLanguageDetector;
pub use summary::LeadSummarizer;

use enrich_core::{Language, NamedEntity};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{capability} failed: {reason}")]
pub struct NlpError {
    pub capability: &'static str,
    pub reason: String,
}

impl NlpError {
    pub fn new(capability: &'static str, reason: impl Into<String>) -> Self {
        Self {
            capability,
            reason: reason.into(),
        }
    }
}

pub type NlpResult<T> = std::result::Result<T, NlpError>;

/// Language guess with the detector's confidence in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub language: Language,
    pub confidence: f64,
}

pub trait LanguageDetector: Send + Sync {
    /// `None` when the text carries no usable signal
    fn detect(&self, text: &str) -> NlpResult<Option<Detection>>;
}

pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str, language: Language) -> NlpResult<Vec<NamedEntity>>;
}

pub trait KeywordExtractor: Send + Sync {
    /// At most `top_k` keywords, best first
    fn extract(&self, text: &str, language: Language, top_k: usize) -> NlpResult<Vec<String>>;
}

pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str, language: Language) -> NlpResult<String>;
}

/// Lower-cased alphabetic tokens
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_non_letters() {
        let tokens: Vec<String> = tokenize("ETH-Rat, 2024: Präsident!").collect();
        assert_eq!(tokens, vec!["eth", "rat", "präsident"]);
    }
}
