//! Corpus-wide boilerplate detection by paragraph repetition
//!
//! Cleaning is two-phase. [`ParagraphFrequencyIndex::build`] visits every
//! document once and is the only way to obtain a [`FrequencyTable`], so
//! [`ParagraphFrequencyIndex::filter`] cannot run before the whole corpus
//! has been counted.

use crate::config::BoilerplateRules;
use enrich_core::RawDocument;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

pub const DEFAULT_THRESHOLD: usize = 5;

/// Case-folded paragraph with whitespace runs collapsed to single spaces
pub fn normalize_paragraph(paragraph: &str) -> String {
    paragraph
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Number of distinct documents containing each normalized paragraph
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    counts: HashMap<String, usize>,
    documents: usize,
}

impl FrequencyTable {
    /// Document frequency of a paragraph (normalized before lookup)
    pub fn frequency(&self, paragraph: &str) -> usize {
        self.counts
            .get(&normalize_paragraph(paragraph))
            .copied()
            .unwrap_or(0)
    }

    /// Documents counted
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Distinct normalized paragraphs
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Paragraphs at or above `threshold`, most frequent first
    pub fn repeated(&self, threshold: usize) -> Vec<(&str, usize)> {
        let mut repeated: Vec<(&str, usize)> = self
            .counts
            .iter()
            .filter(|(_, count)| **count >= threshold)
            .map(|(p, count)| (p.as_str(), *count))
            .collect();
        repeated.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        repeated
    }
}

#[derive(Debug, Clone)]
pub struct ParagraphFrequencyIndex {
    threshold: usize,
    rules: BoilerplateRules,
}

impl Default for ParagraphFrequencyIndex {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, BoilerplateRules::default())
    }
}

impl ParagraphFrequencyIndex {
    /// `threshold` below one is raised to one
    pub fn new(threshold: usize, rules: BoilerplateRules) -> Self {
        Self {
            threshold: threshold.max(1),
            rules,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn rules(&self) -> &BoilerplateRules {
        &self.rules
    }

    /// Phase one: count paragraphs across the entire corpus
    #[instrument(skip_all)]
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a RawDocument>) -> FrequencyTable {
        let mut table = FrequencyTable::default();

        for doc in documents {
            let distinct: HashSet<String> = doc
                .paragraphs
                .iter()
                .map(|p| normalize_paragraph(p))
                .filter(|p| !p.is_empty())
                .collect();
            for paragraph in distinct {
                *table.counts.entry(paragraph).or_insert(0) += 1;
            }
            table.documents += 1;
        }

        debug!(
            documents = table.documents,
            distinct_paragraphs = table.counts.len(),
            "Built paragraph frequency table"
        );
        table
    }

    /// Phase two: the ordered subsequence of paragraphs that are neither
    /// matched by a rule nor repeated in `threshold` or more documents
    pub fn filter(&self, document: &RawDocument, table: &FrequencyTable) -> Vec<String> {
        document
            .paragraphs
            .iter()
            .filter(|p| !p.trim().is_empty())
            .filter(|p| !self.rules.matches(p))
            .filter(|p| table.frequency(p) < self.threshold)
            .cloned()
            .collect()
    }
}
