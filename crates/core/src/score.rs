//! Relevance scores of chunks against benchmark questions

use crate::Benchmark;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Longest justification kept per score
const MAX_REASON_CHARS: usize = 200;

/// The five-point relevance rubric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelevanceAnchor {
    /// 0.0 - unrelated
    Unrelated,
    /// 0.2 - tangential
    Tangential,
    /// 0.5 - partial answer
    Partial,
    /// 0.8 - answer present verbatim but not exact
    Verbatim,
    /// 1.0 - exact answer
    Exact,
}

impl RelevanceAnchor {
    pub const ALL: [RelevanceAnchor; 5] = [
        RelevanceAnchor::Unrelated,
        RelevanceAnchor::Tangential,
        RelevanceAnchor::Partial,
        RelevanceAnchor::Verbatim,
        RelevanceAnchor::Exact,
    ];

    pub fn value(&self) -> f64 {
        match self {
            RelevanceAnchor::Unrelated => 0.0,
            RelevanceAnchor::Tangential => 0.2,
            RelevanceAnchor::Partial => 0.5,
            RelevanceAnchor::Verbatim => 0.8,
            RelevanceAnchor::Exact => 1.0,
        }
    }

    /// Snap a raw score to the nearest anchor. Scores outside `[0, 1]` and
    /// NaN have no anchor.
    pub fn snap(raw: f64) -> Option<Self> {
        if !(0.0..=1.0).contains(&raw) {
            return None;
        }
        Self::ALL.into_iter().min_by(|a, b| {
            let da = (a.value() - raw).abs();
            let db = (b.value() - raw).abs();
            da.total_cmp(&db)
        })
    }

    /// Exact match against an anchor value, as read back from storage
    pub fn from_value(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|anchor| (anchor.value() - value).abs() < 1e-9)
    }
}

impl Serialize for RelevanceAnchor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for RelevanceAnchor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        RelevanceAnchor::from_value(value).ok_or_else(|| {
            serde::de::Error::custom(format!("{value} is not one of 0.0, 0.2, 0.5, 0.8, 1.0"))
        })
    }
}

/// Score of one chunk against one question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub relevance_score: RelevanceAnchor,
    pub relevance_reason: String,
}

impl ScoreRecord {
    pub fn new(anchor: RelevanceAnchor, reason: impl AsRef<str>) -> Self {
        let reason = reason.as_ref().trim();
        Self {
            relevance_score: anchor,
            relevance_reason: reason.chars().take(MAX_REASON_CHARS).collect(),
        }
    }
}

/// All scores recorded for one chunk, keyed by question id.
///
/// Serialises as a JSON object keyed by the question id string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct ScoreSet(BTreeMap<u32, ScoreRecord>);

impl ScoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, question_id: u32) -> bool {
        self.0.contains_key(&question_id)
    }

    pub fn get(&self, question_id: u32) -> Option<&ScoreRecord> {
        self.0.get(&question_id)
    }

    /// Insert unless a score already exists. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, question_id: u32, record: ScoreRecord) -> bool {
        use std::collections::btree_map::Entry;
        match self.0.entry(question_id) {
            Entry::Vacant(e) => {
                e.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Fold `other` in without overwriting anything already present
    pub fn merge_missing(&mut self, other: ScoreSet) {
        for (question_id, record) in other.0 {
            self.insert_if_absent(question_id, record);
        }
    }

    /// Benchmark question ids that have no score yet, in benchmark order
    pub fn missing(&self, benchmark: &Benchmark) -> Vec<u32> {
        benchmark.ids().filter(|id| !self.contains(*id)).collect()
    }

    pub fn is_complete(&self, benchmark: &Benchmark) -> bool {
        benchmark.ids().all(|id| self.contains(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &ScoreRecord)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
