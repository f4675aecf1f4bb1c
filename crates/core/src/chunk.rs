//! Chunk types - the unit of LLM enrichment and relevance scoring

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Upper bound on `chunk_summary` after normalisation
pub const MAX_SUMMARY_WORDS: usize = 30;

/// A bounded span of document text produced by the upstream chunker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
}

/// On-disk chunk shape; some chunkers nest the key under `metadata`
#[derive(Deserialize)]
struct ChunkFile {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    metadata: Option<ChunkFileMetadata>,
}

#[derive(Deserialize)]
struct ChunkFileMetadata {
    #[serde(default)]
    chunk_id: Option<String>,
    #[serde(default)]
    doc_id: Option<String>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            doc_id: None,
        }
    }

    /// Parse a chunk file. `metadata.chunk_id` wins over a top-level `id`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ChunkFile = serde_json::from_str(json)?;
        let (meta_id, doc_id) = match file.metadata {
            Some(meta) => (meta.chunk_id, meta.doc_id),
            None => (None, None),
        };
        let id = meta_id
            .or(file.id)
            .filter(|id| !id.trim().is_empty())
            .ok_or(CoreError::MissingChunkId)?;

        Ok(Self {
            id,
            text: file.text,
            doc_id,
        })
    }
}

/// Categorised entity mentions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EntityGroups {
    pub person: Vec<String>,
    pub org: Vec<String>,
    pub location: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDate {
    pub label: String,
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

/// Who held which role, and since when
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleAnnotation {
    pub person: String,
    pub role: String,
    #[serde(alias = "from")]
    pub from_year: Option<i32>,
    #[serde(alias = "to")]
    pub to_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericFact {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub year: Option<i32>,
}

/// Everything the metadata service returns for one chunk.
///
/// String and list keys are required; a payload missing one is rejected
/// rather than filled with defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataFields {
    pub chunk_summary: String,
    pub entities: EntityGroups,
    pub topic_tags: Vec<String>,
    pub event_dates: Vec<EventDate>,
    pub role_annotations: Vec<RoleAnnotation>,
    pub numeric_facts: Vec<NumericFact>,
    pub department: Vec<String>,
    pub document_type: String,
    pub content_year: Option<i32>,
    pub content_month: Option<u32>,
    pub initiative: Vec<String>,
    pub grant_type: Vec<String>,
}

impl MetadataFields {
    /// Range checks serde cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(month) = self.content_month {
            if !(1..=12).contains(&month) {
                return Err(CoreError::Validation(format!("content_month out of range: {month}")));
            }
        }
        for event in &self.event_dates {
            if let Some(month) = event.month {
                if !(1..=12).contains(&month) {
                    return Err(CoreError::Validation(format!(
                        "event {:?} has month {month}",
                        event.label
                    )));
                }
            }
            if let Some(day) = event.day {
                if !(1..=31).contains(&day) {
                    return Err(CoreError::Validation(format!(
                        "event {:?} has day {day}",
                        event.label
                    )));
                }
            }
        }
        if let Some(fact) = self.numeric_facts.iter().find(|f| !f.value.is_finite()) {
            return Err(CoreError::Validation(format!(
                "numeric fact {:?} is not a finite number",
                fact.name
            )));
        }
        Ok(())
    }

    /// Canonical form: every string lower-cased, string lists de-duplicated
    /// in order, summary whitespace collapsed and clipped to
    /// [`MAX_SUMMARY_WORDS`].
    pub fn normalized(self) -> Result<Self> {
        let lowered = deep_lower(serde_json::to_value(self)?);
        let mut fields: MetadataFields = serde_json::from_value(lowered)?;
        fields.chunk_summary = fields
            .chunk_summary
            .split_whitespace()
            .take(MAX_SUMMARY_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(fields)
    }
}

/// Stored metadata artifact for one chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub id: String,
    #[serde(flatten)]
    pub fields: MetadataFields,
}

impl ChunkMetadata {
    /// Validate and normalise service output for `chunk_id`
    pub fn from_fields(chunk_id: impl Into<String>, fields: MetadataFields) -> Result<Self> {
        fields.validate()?;
        Ok(Self {
            id: chunk_id.into(),
            fields: fields.normalized()?,
        })
    }
}

fn deep_lower(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::Array(items) => {
            let lowered: Vec<Value> = items.into_iter().map(deep_lower).collect();
            if lowered.iter().all(Value::is_string) {
                let mut seen = HashSet::new();
                Value::Array(
                    lowered
                        .into_iter()
                        .filter(|v| seen.insert(v.as_str().unwrap_or_default().to_string()))
                        .collect(),
                )
            } else {
                Value::Array(lowered)
            }
        }
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, deep_lower(v))).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> MetadataFields {
        MetadataFields {
            chunk_summary: "The  ETH Board appointed   a new President.".into(),
            entities: EntityGroups {
                person: vec!["Joël Mesot".into(), "joël mesot".into()],
                org: vec!["ETH Zurich".into()],
                location: vec![],
            },
            topic_tags: vec!["Leadership".into(), "leadership".into()],
            event_dates: vec![EventDate {
                label: "Appointment".into(),
                year: 2019,
                month: Some(1),
                day: None,
            }],
            role_annotations: vec![RoleAnnotation {
                person: "Joël Mesot".into(),
                role: "President".into(),
                from_year: Some(2019),
                to_year: None,
            }],
            numeric_facts: vec![],
            department: vec![],
            document_type: "News".into(),
            content_year: Some(2019),
            content_month: Some(1),
            initiative: vec![],
            grant_type: vec![],
        }
    }

    #[test]
    fn test_normalization_lowercases_and_dedups() {
        let meta = ChunkMetadata::from_fields("c1", sample_fields()).unwrap();

        assert_eq!(meta.id, "c1");
        assert_eq!(meta.fields.chunk_summary, "the eth board appointed a new president.");
        assert_eq!(meta.fields.entities.person, vec!["joël mesot"]);
        assert_eq!(meta.fields.topic_tags, vec!["leadership"]);
        assert_eq!(meta.fields.role_annotations[0].role, "president");
        assert_eq!(meta.fields.document_type, "news");
    }

    #[test]
    fn test_summary_is_clipped() {
        let mut fields = sample_fields();
        fields.chunk_summary = vec!["word"; 45].join(" ");
        let meta = ChunkMetadata::from_fields("c1", fields).unwrap();
        assert_eq!(meta.fields.chunk_summary.split_whitespace().count(), MAX_SUMMARY_WORDS);
    }

    #[test]
    fn test_validate_rejects_bad_month() {
        let mut fields = sample_fields();
        fields.content_month = Some(13);
        assert!(ChunkMetadata::from_fields("c1", fields).is_err());
    }

    #[test]
    fn test_missing_key_fails_to_parse() {
        let json = r#"{"chunk_summary": "x", "entities": {"person": [], "org": [], "location": []}}"#;
        assert!(serde_json::from_str::<MetadataFields>(json).is_err());
    }

    #[test]
    fn test_role_annotation_accepts_from_alias() {
        let json = r#"{"person": "a", "role": "rector", "from": 2020, "to": null}"#;
        let role: RoleAnnotation = serde_json::from_str(json).unwrap();
        assert_eq!(role.from_year, Some(2020));
    }

    #[test]
    fn test_chunk_from_nested_metadata() {
        let json = r#"{"id": "outer", "text": "body", "metadata": {"chunk_id": "inner", "doc_id": "d1"}}"#;
        let chunk = Chunk::from_json(json).unwrap();
        assert_eq!(chunk.id, "inner");
        assert_eq!(chunk.doc_id.as_deref(), Some("d1"));

        let plain = Chunk::from_json(r#"{"id": "c7", "text": "body"}"#).unwrap();
        assert_eq!(plain.id, "c7");

        assert!(matches!(
            Chunk::from_json(r#"{"text": "body"}"#),
            Err(CoreError::MissingChunkId)
        ));
    }
}
