//! Common test utilities: deterministic LLM doubles and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use enrich_core::{Benchmark, Chunk, EntityGroups, MetadataFields, QaItem};
use enrich_pipeline::{
    MetadataExtractionService, RawScore, RelevanceScoringService, RetryPolicy, ScoringQuery,
    ServiceError,
};
use std::collections::HashSet;
use std::sync::Mutex;

/// Retries without waiting
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, 0, 0)
}

/// `n` chunks with ids `chunk_01` .. in sorted order
pub fn chunks(n: usize) -> Vec<Chunk> {
    (1..=n)
        .map(|i| {
            Chunk::new(
                format!("chunk_{i:02}"),
                format!("Paragraph {i} of the annual report on the observatory."),
            )
        })
        .collect()
}

/// `n` questions with ids 1..=n
pub fn benchmark(n: u32) -> Benchmark {
    Benchmark::from_items(
        (1..=n)
            .map(|id| QaItem::new(id, format!("Question number {id}?"), format!("Answer {id}")))
            .collect(),
    )
    .expect("valid benchmark")
}

/// Metadata service that derives fields from the chunk text and counts calls.
/// Chunks listed in `malformed` always get a schema error.
#[derive(Default)]
pub struct CountingMetadataService {
    calls: Mutex<Vec<String>>,
    malformed: HashSet<String>,
}

impl CountingMetadataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_malformed(ids: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            malformed: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Distinct chunk ids the service was asked about, sorted
    pub fn called_ids(&self) -> Vec<String> {
        let mut ids = self.calls.lock().unwrap().clone();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[async_trait]
impl MetadataExtractionService for CountingMetadataService {
    async fn extract_metadata(&self, chunk: &Chunk) -> Result<MetadataFields, ServiceError> {
        self.calls.lock().unwrap().push(chunk.id.clone());
        if self.malformed.contains(&chunk.id) {
            return Err(ServiceError::Schema("missing key `entities`".into()));
        }

        Ok(MetadataFields {
            chunk_summary: chunk.text.clone(),
            entities: EntityGroups {
                person: vec![],
                org: vec!["Observatory".into()],
                location: vec![],
            },
            topic_tags: vec!["Annual Report".into()],
            event_dates: vec![],
            role_annotations: vec![],
            numeric_facts: vec![],
            department: vec![],
            document_type: "Report".into(),
            content_year: Some(2023),
            content_month: None,
            initiative: vec![],
            grant_type: vec![],
        })
    }
}

const QUESTION_STOPWORDS: &[&str] = &[
    "what", "when", "where", "which", "does", "much", "many", "have", "with", "from", "that",
    "this", "there", "their",
];

/// Scores by how many question content words appear in the chunk: all of
/// them is an exact answer, none is unrelated. Records what it was shown.
#[derive(Default)]
pub struct KeywordScorer {
    calls: Mutex<Vec<(String, u32)>>,
    answers_seen: Mutex<usize>,
}

impl KeywordScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn answers_seen(&self) -> usize {
        *self.answers_seen.lock().unwrap()
    }

    /// Chunk ids the service was asked about, sorted and de-duplicated
    pub fn called_chunks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn content_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() >= 4 && !QUESTION_STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[async_trait]
impl RelevanceScoringService for KeywordScorer {
    async fn score(&self, chunk: &Chunk, query: &ScoringQuery) -> Result<RawScore, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((chunk.id.clone(), query.question_id));
        if query.answer.is_some() {
            *self.answers_seen.lock().unwrap() += 1;
        }

        let chunk_words: HashSet<String> = content_words(&chunk.text).into_iter().collect();
        let wanted = content_words(&query.question);
        if wanted.is_empty() {
            return Ok(RawScore::new(0.0, "question has no content words"));
        }
        let hits = wanted.iter().filter(|w| chunk_words.contains(*w)).count();
        let ratio = hits as f64 / wanted.len() as f64;

        Ok(RawScore::new(ratio, format!("{hits} of {} question terms present", wanted.len())))
    }
}

/// Scores every pair 0.5 and signs the reason with its tag, yielding to the
/// runtime first so concurrent scorers interleave
pub struct TaggedScorer {
    pub tag: String,
}

impl TaggedScorer {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

#[async_trait]
impl RelevanceScoringService for TaggedScorer {
    async fn score(&self, _chunk: &Chunk, _query: &ScoringQuery) -> Result<RawScore, ServiceError> {
        tokio::task::yield_now().await;
        Ok(RawScore::new(0.5, self.tag.clone()))
    }
}
