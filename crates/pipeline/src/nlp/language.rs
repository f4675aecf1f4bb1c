//! Stopword-profile language detection over en/de/fr/it

use super::{tokenize, Detection, LanguageDetector, NlpResult};
use enrich_core::Language;
use std::collections::HashSet;

const EN: &[&str] = &[
    "the", "and", "of", "to", "in", "is", "that", "for", "it", "with", "as", "was", "on", "are",
    "by", "this", "be", "at", "from", "or", "an", "have", "has", "which", "not", "were", "their",
    "its", "also", "been", "will", "can", "they", "we", "our", "into", "about", "who", "he", "she",
];

const DE: &[&str] = &[
    "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "einer", "den", "dem", "des",
    "mit", "sich", "auf", "für", "von", "zu", "im", "auch", "es", "werden", "wird", "sind", "bei",
    "nach", "aus", "wie", "über", "oder", "noch", "wurde", "durch", "als", "sie", "wir", "unsere",
    "zum", "zur", "hat",
];

const FR: &[&str] = &[
    "le", "la", "les", "et", "est", "des", "une", "un", "du", "dans", "que", "pour", "qui", "pas",
    "sur", "par", "au", "aux", "avec", "ce", "cette", "sont", "ont", "plus", "ses", "leur", "été",
    "mais", "ou", "nous", "vous", "elle", "être", "fait", "comme",
];

const IT: &[&str] = &[
    "il", "lo", "gli", "di", "del", "della", "che", "per", "non", "una", "uno", "con", "nel",
    "nella", "sono", "alla", "al", "dei", "delle", "anche", "più", "come", "ma", "questo",
    "questa", "ha", "hanno", "stato", "essere", "è", "degli", "sul",
];

/// Function words used for both detection and keyword filtering
pub(crate) fn stopwords(language: Language) -> &'static [&'static str] {
    match language {
        Language::En | Language::Unknown => EN,
        Language::De => DE,
        Language::Fr => FR,
        Language::It => IT,
    }
}

/// Picks the language whose function words cover the most tokens.
/// Confidence is that language's share of all function-word hits.
#[derive(Debug, Clone)]
pub struct StopwordLanguageDetector {
    profiles: Vec<(Language, HashSet<&'static str>)>,
}

impl Default for StopwordLanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StopwordLanguageDetector {
    pub fn new() -> Self {
        let profiles = Language::supported()
            .into_iter()
            .map(|lang| (lang, stopwords(lang).iter().copied().collect()))
            .collect();
        Self { profiles }
    }
}

impl LanguageDetector for StopwordLanguageDetector {
    fn detect(&self, text: &str) -> NlpResult<Option<Detection>> {
        let mut hits = vec![0usize; self.profiles.len()];

        for token in tokenize(text) {
            for (i, (_, words)) in self.profiles.iter().enumerate() {
                if words.contains(token.as_str()) {
                    hits[i] += 1;
                }
            }
        }

        let total: usize = hits.iter().sum();
        let mut best: Option<(usize, usize)> = None;
        for (i, count) in hits.iter().copied().enumerate() {
            if count > best.map_or(0, |(_, c)| c) {
                best = Some((i, count));
            }
        }

        Ok(best.map(|(i, count)| Detection {
            language: self.profiles[i].0,
            confidence: count as f64 / total as f64,
        }))
    }
}
