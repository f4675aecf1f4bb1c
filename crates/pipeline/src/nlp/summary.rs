//! Lead-based extractive summaries

use super::{NlpResult, Summarizer};
use enrich_core::Language;

pub const DEFAULT_MAX_BULLETS: usize = 3;
pub const DEFAULT_MAX_SENTENCES: usize = 2;
pub const DEFAULT_MAX_CHARS: usize = 600;

/// First bullet lines when the text has any, otherwise the first sentences
#[derive(Debug, Clone)]
pub struct LeadSummarizer {
    max_bullets: usize,
    max_sentences: usize,
    max_chars: usize,
}

impl Default for LeadSummarizer {
    fn default() -> Self {
        Self {
            max_bullets: DEFAULT_MAX_BULLETS,
            max_sentences: DEFAULT_MAX_SENTENCES,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl LeadSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

/// Split after `.`, `!` or `?` when followed by whitespace
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some((_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    let sentence = text[start..end].trim();
                    if !sentence.is_empty() {
                        out.push(sentence);
                    }
                    start = end;
                }
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

impl Summarizer for LeadSummarizer {
    fn summarize(&self, text: &str, _language: Language) -> NlpResult<String> {
        let bullets: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('-'))
            .take(self.max_bullets)
            .collect();

        let summary = if bullets.is_empty() {
            let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
            sentences(&flat)
                .into_iter()
                .take(self.max_sentences)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            bullets.join("\n")
        };

        Ok(summary.chars().take(self.max_chars).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summarize(text: &str) -> String {
        LeadSummarizer::new().summarize(text, Language::En).unwrap()
    }

    #[test]
    fn test_bullets_win() {
        let text = "Intro line.\n- first\n- second\nmiddle\n- third\n- fourth";
        assert_eq!(summarize(text), "- first\n- second\n- third");
    }

    #[test]
    fn test_first_two_sentences() {
        let text = "The observatory opened in 1855. It was designed by Semper.\nIt closed later.";
        assert_eq!(
            summarize(text),
            "The observatory opened in 1855. It was designed by Semper."
        );
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let text = "Funding rose to 2.5 million francs. Staff grew. More followed.";
        assert_eq!(summarize(text), "Funding rose to 2.5 million francs. Staff grew.");
    }

    #[test]
    fn test_clipped_to_char_bound() {
        let summary = LeadSummarizer::new()
            .with_max_chars(10)
            .summarize("A very long opening sentence without end", Language::En)
            .unwrap();
        assert_eq!(summary.chars().count(), 10);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(summarize(""), "");
    }
}
