//! The fixed benchmark question set every chunk is scored against

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One benchmark question with its reference answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaItem {
    /// 1-based question id
    pub id: u32,
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// German rendering of the question, when the benchmark is bilingual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_de: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_de: Option<String>,
}

impl QaItem {
    pub fn new(id: u32, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id,
            question: question.into(),
            answer: answer.into(),
            notes: None,
            question_de: None,
            answer_de: None,
        }
    }

    /// Builder pattern: set notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Immutable, ordered benchmark set.
///
/// Items keep file order; ids are unique and start at 1.
#[derive(Debug, Clone)]
pub struct Benchmark {
    items: Vec<QaItem>,
}

impl Benchmark {
    /// Build a benchmark from items, rejecting empty sets, zero ids and duplicates
    pub fn from_items(items: Vec<QaItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(CoreError::Benchmark("benchmark contains no questions".into()));
        }

        let mut seen = HashSet::new();
        for item in &items {
            if item.id == 0 {
                return Err(CoreError::Benchmark(format!(
                    "question ids are 1-indexed, found id 0 ({:?})",
                    item.question
                )));
            }
            if !seen.insert(item.id) {
                return Err(CoreError::Benchmark(format!("duplicate question id {}", item.id)));
            }
        }

        Ok(Self { items })
    }

    /// Parse a JSON array of QA items
    pub fn from_json(json: &str) -> Result<Self> {
        let items: Vec<QaItem> = serde_json::from_str(json)?;
        Self::from_items(items)
    }

    /// Load the benchmark file once
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QaItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[QaItem] {
        &self.items
    }

    /// Question ids in benchmark order
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.items.iter().map(|item| item.id)
    }

    pub fn get(&self, id: u32) -> Option<&QaItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_keeps_order() {
        let json = r#"[
            {"id": 2, "question": "Second?", "answer": "b"},
            {"id": 1, "question": "First?", "answer": "a", "notes": "score 1.0 only if exact"}
        ]"#;
        let benchmark = Benchmark::from_json(json).unwrap();

        assert_eq!(benchmark.len(), 2);
        assert_eq!(benchmark.ids().collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(
            benchmark.get(1).and_then(|q| q.notes.as_deref()),
            Some("score 1.0 only if exact")
        );
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let items = vec![QaItem::new(1, "a?", "a"), QaItem::new(1, "b?", "b")];
        assert!(matches!(Benchmark::from_items(items), Err(CoreError::Benchmark(_))));
    }

    #[test]
    fn test_rejects_zero_id_and_empty() {
        assert!(Benchmark::from_items(vec![QaItem::new(0, "a?", "a")]).is_err());
        assert!(Benchmark::from_items(Vec::new()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.json");
        std::fs::write(&path, r#"[{"id": 1, "question": "Q?", "answer": "A", "question_de": "F?"}]"#)
            .unwrap();

        let benchmark = Benchmark::load(&path).unwrap();
        assert_eq!(benchmark.items()[0].question_de.as_deref(), Some("F?"));
    }
}
