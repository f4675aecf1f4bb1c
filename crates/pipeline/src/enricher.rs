//! Per-document NLP enrichment

use crate::nlp::{
    CapitalizedSpanRecognizer, EntityRecognizer, KeywordExtractor, LanguageDetector,
    LeadSummarizer, NlpError, StatisticalKeywordExtractor, StopwordLanguageDetector, Summarizer,
};
use crate::{PipelineError, Result};
use enrich_core::{Document, Language, NamedEntity, RawDocument};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Detections below this confidence are reported as `unknown`
pub const DEFAULT_MIN_LANGUAGE_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_TOP_KEYWORDS: usize = 10;

/// Fills language, entities, keywords, summary and text statistics of a
/// cleaned document by delegating to the NLP capabilities
#[derive(Clone)]
pub struct DocumentEnricher {
    detector: Arc<dyn LanguageDetector>,
    recognizer: Arc<dyn EntityRecognizer>,
    keywords: Arc<dyn KeywordExtractor>,
    summarizer: Arc<dyn Summarizer>,
    min_confidence: f64,
    top_k: usize,
}

impl DocumentEnricher {
    pub fn new(
        detector: Arc<dyn LanguageDetector>,
        recognizer: Arc<dyn EntityRecognizer>,
        keywords: Arc<dyn KeywordExtractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            detector,
            recognizer,
            keywords,
            summarizer,
            min_confidence: DEFAULT_MIN_LANGUAGE_CONFIDENCE,
            top_k: DEFAULT_TOP_KEYWORDS,
        }
    }

    /// Enricher backed by the built-in heuristic capabilities
    pub fn heuristic() -> Self {
        Self::new(
            Arc::new(StopwordLanguageDetector::new()),
            Arc::new(CapitalizedSpanRecognizer::new()),
            Arc::new(StatisticalKeywordExtractor::new()),
            Arc::new(LeadSummarizer::new()),
        )
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Build the enriched record for `raw` from its cleaned paragraphs.
    ///
    /// A capability failure is a per-document error; the caller excludes
    /// the document.
    #[instrument(skip_all, fields(doc_id = %raw.doc_id))]
    pub fn enrich(&self, raw: &RawDocument, paragraphs_cleaned: Vec<String>) -> Result<Document> {
        let mut doc = Document::from_raw(raw, paragraphs_cleaned);
        if doc.main_content.trim().is_empty() {
            debug!("No content left after cleaning, skipping NLP");
            return Ok(doc);
        }

        let doc_error = |e: NlpError| PipelineError::Document {
            doc_id: raw.doc_id.clone(),
            reason: e.to_string(),
        };
        let text = doc.main_content.as_str();

        let language = match self.detector.detect(text).map_err(doc_error)? {
            Some(d) if d.confidence >= self.min_confidence => d.language,
            Some(d) => {
                debug!(
                    guess = %d.language,
                    confidence = d.confidence,
                    "Language confidence below threshold"
                );
                Language::Unknown
            }
            None => Language::Unknown,
        };

        let mut seen = HashSet::new();
        let named_entities: Vec<NamedEntity> = self
            .recognizer
            .recognize(text, language)
            .map_err(doc_error)?
            .into_iter()
            .filter(|e| seen.insert(e.clone()))
            .collect();

        let mut keywords = self
            .keywords
            .extract(text, language, self.top_k)
            .map_err(doc_error)?;
        keywords.truncate(self.top_k);

        let summary = self.summarizer.summarize(text, language).map_err(doc_error)?;

        doc.language = language;
        doc.named_entities = named_entities;
        doc.keywords = keywords;
        doc.summary = summary;
        Ok(doc)
    }
}
