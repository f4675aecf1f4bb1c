//! Capitalized-span entity recognition

use super::{EntityRecognizer, NlpResult};
use enrich_core::{Language, NamedEntity};
use std::collections::HashSet;

/// Lower-case words allowed inside a name ("University of Zurich")
const CONNECTORS: &[&str] = &["of", "von", "de", "di", "du", "für", "della", "del"];

const ORG_MARKERS: &[&str] = &[
    "eth", "epfl", "university", "universität", "université", "università", "institute",
    "institut", "istituto", "school", "schule", "hochschule", "board", "rat", "foundation",
    "stiftung", "fondation", "ag", "gmbh", "sa", "department", "departement", "office", "council",
    "commission", "kommission", "center", "centre", "zentrum", "lab", "laboratory",
];

/// Capitalized words that start sentences or headings more often than names
const COMMON_WORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "When", "Where", "What", "Which", "While", "With",
    "From", "After", "Before", "During", "In", "On", "At", "For", "And", "But", "Also", "Some",
    "Many", "Most", "Other", "Each", "Every", "All", "Our", "Their", "His", "Her", "Its", "New",
    "Der", "Die", "Das", "Ein", "Eine", "Le", "La", "Les", "Il", "Lo", "Una", "Un", "Im", "Am",
];

/// Labels runs of capitalized words: acronyms and spans containing an
/// organisation marker become `ORG`, two- or three-word spans become
/// `PERSON`, anything else `MISC`. Single capitalized words are skipped for
/// German, where every noun is capitalized.
#[derive(Debug, Clone, Default)]
pub struct CapitalizedSpanRecognizer;

impl CapitalizedSpanRecognizer {
    pub fn new() -> Self {
        Self
    }
}

fn strip_punct(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn is_capitalized(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.is_uppercase() && word.chars().count() >= 2,
        None => false,
    }
}

fn is_acronym(word: &str) -> bool {
    word.chars().count() >= 2 && word.chars().all(|c| c.is_uppercase() || c.is_ascii_digit())
}

fn ends_clause(word: &str) -> bool {
    word.ends_with([',', '.', ';', ':', '!', '?', ')'])
}

fn label(span: &[&str]) -> &'static str {
    let org = span.iter().any(|w| {
        is_acronym(w) || ORG_MARKERS.contains(&w.to_lowercase().as_str())
    });
    if org {
        "ORG"
    } else if (2..=3).contains(&span.len()) && span.iter().all(|w| is_capitalized(w)) {
        "PERSON"
    } else {
        "MISC"
    }
}

impl EntityRecognizer for CapitalizedSpanRecognizer {
    fn recognize(&self, text: &str, language: Language) -> NlpResult<Vec<NamedEntity>> {
        let mut entities = Vec::new();
        let mut seen = HashSet::new();

        for line in text.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            let mut i = 0;

            while i < words.len() {
                let clean = strip_punct(words[i]);
                let sentence_start =
                    i == 0 || (ends_clause(words[i - 1]) && !words[i - 1].ends_with(','));
                if !is_capitalized(clean) || COMMON_WORDS.contains(&clean) {
                    i += 1;
                    continue;
                }

                let mut span = vec![clean];
                let mut j = i;
                while !ends_clause(words[j]) && j + 1 < words.len() {
                    let next = strip_punct(words[j + 1]);
                    if is_capitalized(next) {
                        span.push(next);
                        j += 1;
                    } else if CONNECTORS.contains(&next)
                        && j + 2 < words.len()
                        && is_capitalized(strip_punct(words[j + 2]))
                    {
                        span.push(next);
                        span.push(strip_punct(words[j + 2]));
                        j += 2;
                    } else {
                        break;
                    }
                }
                i = j + 1;

                let single = span.len() == 1;
                let acronym = single && is_acronym(span[0]);
                if single && !acronym && (sentence_start || language == Language::De) {
                    continue;
                }

                let text = span.join(" ");
                if seen.insert(text.clone()) {
                    entities.push(NamedEntity::new(text, label(&span)));
                }
            }
        }

        Ok(entities)
    }
}
