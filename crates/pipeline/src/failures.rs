//! Persistent record of units that failed after retries
//!
//! Failures live in their own store so a later run can see what is left to
//! resolve. A successful retry removes the record.

use crate::Result;
use chrono::{DateTime, Utc};
use enrich_store::{ContentStore, ContentStoreExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    Scoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub unit_id: String,
    pub stage: Stage,
    pub kind: String,
    pub cause: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        unit_id: impl Into<String>,
        stage: Stage,
        kind: impl Into<String>,
        cause: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            stage,
            kind: kind.into(),
            cause: cause.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

/// Store id of a chunk/question scoring unit
pub fn pair_unit_id(chunk_id: &str, question_id: u32) -> String {
    format!("{chunk_id}__q{question_id}")
}

#[derive(Clone)]
pub struct FailureLog {
    store: Arc<dyn ContentStore>,
}

impl FailureLog {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Record a failure. Logging problems are reported but never fail the unit.
    pub async fn record(&self, record: &FailureRecord) {
        if let Err(e) = self.store.write_as(&record.unit_id, record).await {
            warn!(unit = %record.unit_id, error = %e, "Could not record failure");
        }
    }

    /// Drop the record of a unit that has now succeeded
    pub async fn clear(&self, unit_id: &str) {
        if let Err(e) = self.store.remove(unit_id).await {
            warn!(unit = %unit_id, error = %e, "Could not clear failure record");
        }
    }

    pub async fn get(&self, unit_id: &str) -> Result<Option<FailureRecord>> {
        Ok(self.store.read_as(unit_id).await?)
    }

    /// Every outstanding failure, ordered by unit id
    pub async fn list(&self) -> Result<Vec<FailureRecord>> {
        let mut records = Vec::new();
        for id in self.store.list_ids().await? {
            if let Some(record) = self.store.read_as(&id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrich_store::MemoryStore;

    #[tokio::test]
    async fn test_record_then_clear() {
        let log = FailureLog::new(Arc::new(MemoryStore::new()));
        let unit = pair_unit_id("c1", 7);
        assert_eq!(unit, "c1__q7");

        log.record(&FailureRecord::new(&unit, Stage::Scoring, "timeout", "timed out", 4))
            .await;
        let stored = log.get(&unit).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::Scoring);
        assert_eq!(stored.attempts, 4);
        assert_eq!(log.list().await.unwrap().len(), 1);

        log.clear(&unit).await;
        assert!(log.list().await.unwrap().is_empty());
    }
}
