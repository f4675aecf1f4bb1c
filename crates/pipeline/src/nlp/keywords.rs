//! Frequency-based keyphrase scoring

use super::language::stopwords;
use super::{tokenize, KeywordExtractor, NlpResult};
use enrich_core::Language;
use std::collections::HashMap;

const MIN_TOKEN_CHARS: usize = 3;

/// Scores unigrams and bigrams of content words by frequency, weighting
/// bigrams double. Ties go to the phrase that appears first. A unigram is
/// dropped when it is already part of a selected bigram.
#[derive(Debug, Clone, Default)]
pub struct StatisticalKeywordExtractor;

impl StatisticalKeywordExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
struct Candidate {
    words: usize,
    count: usize,
    first_seen: usize,
}

impl KeywordExtractor for StatisticalKeywordExtractor {
    fn extract(&self, text: &str, language: Language, top_k: usize) -> NlpResult<Vec<String>> {
        let stop = stopwords(language);
        let mut candidates: HashMap<String, Candidate> = HashMap::new();
        let mut position = 0;

        // Phrases do not cross sentence boundaries
        for sentence in text.split(['.', '!', '?', '\n', ';', ':']) {
            let mut previous: Option<String> = None;
            for token in tokenize(sentence) {
                let content = token.chars().count() >= MIN_TOKEN_CHARS && !stop.contains(&token.as_str());
                if !content {
                    previous = None;
                    continue;
                }

                let mut phrases = vec![(token.clone(), 1)];
                if let Some(prev) = previous.take() {
                    phrases.push((format!("{prev} {token}"), 2));
                }
                for (phrase, words) in phrases {
                    let entry = candidates.entry(phrase).or_insert(Candidate {
                        words,
                        count: 0,
                        first_seen: position,
                    });
                    entry.count += 1;
                }
                position += 1;
                previous = Some(token);
            }
        }

        let mut ranked: Vec<(String, Candidate)> = candidates
            .into_iter()
            .filter(|(_, c)| c.words == 1 || c.count >= 2)
            .collect();
        ranked.sort_by(|(pa, a), (pb, b)| {
            (b.count * b.words)
                .cmp(&(a.count * a.words))
                .then(a.first_seen.cmp(&b.first_seen))
                .then(b.words.cmp(&a.words))
                .then(pa.cmp(pb))
        });

        let mut selected: Vec<String> = Vec::new();
        for (phrase, candidate) in ranked {
            if selected.len() >= top_k {
                break;
            }
            let covered = candidate.words == 1
                && selected
                    .iter()
                    .any(|s| s.split(' ').any(|word| word == phrase));
            if !covered {
                selected.push(phrase);
            }
        }

        Ok(selected)
    }
}
