//! Document types - raw extraction output and the cleaned, enriched record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Derive a document id from raw content bytes.
///
/// Identical bytes always yield the same id, so reruns over the same corpus
/// land on the same artifacts.
pub fn doc_id_for(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A document as produced by text extraction, before cleaning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDocument {
    /// Content hash of the raw bytes
    pub doc_id: String,

    /// Original file name
    pub filename: String,

    /// Full extracted text
    pub raw_text: String,

    /// Ordered paragraphs split from `raw_text`
    #[serde(default)]
    pub paragraphs: Vec<String>,

    /// Path of the source file relative to the corpus root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl RawDocument {
    /// Create a raw document, deriving its id from `raw_bytes`
    pub fn new(
        raw_bytes: &[u8],
        filename: impl Into<String>,
        raw_text: impl Into<String>,
        paragraphs: Vec<String>,
    ) -> Self {
        Self {
            doc_id: doc_id_for(raw_bytes),
            filename: filename.into(),
            raw_text: raw_text.into(),
            paragraphs,
            source_path: None,
        }
    }

    /// Builder pattern: set the relative source path
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Detected document language
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    De,
    Fr,
    It,
    #[default]
    Unknown,
}

impl Language {
    /// ISO 639-1 code, or `unknown`
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
            Language::Fr => "fr",
            Language::It => "it",
            Language::Unknown => "unknown",
        }
    }

    /// The languages a detector may report
    pub fn supported() -> [Language; 4] {
        [Language::En, Language::De, Language::Fr, Language::It]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named entity as reported by the recognizer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NamedEntity {
    pub text: String,
    pub label: String,
}

impl NamedEntity {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Counts computed directly from the cleaned text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TextStats {
    pub char_count: usize,
    pub word_count: usize,
    pub paragraph_count: usize,
}

impl TextStats {
    /// Compute stats for cleaned paragraphs joined by newlines
    pub fn compute(paragraphs: &[String]) -> Self {
        let text = paragraphs.join("\n");
        Self {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            paragraph_count: paragraphs.len(),
        }
    }
}

/// Publication date inferred from `YYYY/MM` path segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathDate {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
}

impl PathDate {
    /// Scan path segments for a four-digit year, optionally followed by a
    /// two-digit month. The month defaults to January.
    pub fn from_path(path: &str) -> Option<Self> {
        let mut year: Option<i32> = None;
        let mut month: Option<u32> = None;

        for part in path.split(['/', '\\']) {
            if part.len() == 4 && part.chars().all(|c| c.is_ascii_digit()) {
                year = part.parse().ok();
            } else if part.len() == 2 && part.chars().all(|c| c.is_ascii_digit()) && year.is_some() {
                if let Ok(m) = part.parse::<u32>() {
                    if (1..=12).contains(&m) {
                        month = Some(m);
                    }
                }
            }
        }

        let year = year?;
        let month = month.unwrap_or(1);
        let date = NaiveDate::from_ymd_opt(year, month, 1)?;
        Some(Self { date, year, month })
    }
}

/// A cleaned and enriched document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub doc_id: String,
    pub filename: String,
    pub language: Language,

    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,

    /// Retained paragraphs joined by newlines
    pub main_content: String,

    pub paragraphs_original: Vec<String>,

    /// Ordered subsequence of `paragraphs_original` that survived cleaning
    pub paragraphs_cleaned: Vec<String>,

    #[serde(default)]
    pub named_entities: Vec<NamedEntity>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub summary: String,

    pub text_stats: TextStats,
}

impl Document {
    /// Start an enriched record from a raw document and its cleaned paragraphs.
    /// NLP fields are left empty for the enricher to fill in.
    pub fn from_raw(raw: &RawDocument, paragraphs_cleaned: Vec<String>) -> Self {
        let path_date = raw.source_path.as_deref().and_then(PathDate::from_path);
        Self {
            doc_id: raw.doc_id.clone(),
            filename: raw.filename.clone(),
            language: Language::Unknown,
            date: path_date.map(|d| d.date),
            year: path_date.map(|d| d.year),
            month: path_date.map(|d| d.month),
            main_content: paragraphs_cleaned.join("\n"),
            text_stats: TextStats::compute(&paragraphs_cleaned),
            paragraphs_original: raw.paragraphs.clone(),
            paragraphs_cleaned,
            named_entities: Vec::new(),
            keywords: Vec::new(),
            summary: String::new(),
        }
    }

    /// True when at least one paragraph survived cleaning
    pub fn has_content(&self) -> bool {
        !self.paragraphs_cleaned.is_empty()
    }
}
