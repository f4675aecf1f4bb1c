//! Pipeline error types

use crate::services::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Fatal: missing credential, missing input path, bad settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The document is excluded from downstream output
    #[error("Document {doc_id}: {reason}")]
    Document { doc_id: String, reason: String },

    /// A chunk or chunk/question pair failed after retries
    #[error("Service call for {unit} failed: {cause}")]
    Service { unit: String, cause: String },

    /// The service answered, but not in the expected shape
    #[error("Schema validation failed for {unit}: {reason}")]
    SchemaValidation { unit: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] enrich_store::StoreError),

    #[error("{0}")]
    Core(#[from] enrich_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Classify the last error of a unit that ran out of attempts. A
    /// rejected credential fails every unit alike, so it is fatal.
    pub fn from_service(unit: impl Into<String>, error: ServiceError) -> Self {
        match error {
            ServiceError::Unauthorized(cause) => {
                PipelineError::Configuration(format!("LLM service rejected the credential: {cause}"))
            }
            ServiceError::Schema(reason) => PipelineError::SchemaValidation {
                unit: unit.into(),
                reason,
            },
            other => PipelineError::Service {
                unit: unit.into(),
                cause: other.to_string(),
            },
        }
    }

    /// Fatal errors abort a batch; everything else is scoped to one unit
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Configuration(_))
    }

    /// Short failure kind used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Document { .. } => "document",
            PipelineError::Service { .. } => "service",
            PipelineError::SchemaValidation { .. } => "schema",
            PipelineError::Store(_) => "store",
            PipelineError::Core(_) => "core",
            PipelineError::Io(_) => "io",
            PipelineError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_service_error_classification() {
        let schema = PipelineError::from_service("c1", ServiceError::Schema("missing key".into()));
        assert!(matches!(schema, PipelineError::SchemaValidation { .. }));
        assert_eq!(schema.kind(), "schema");
        assert!(!schema.is_fatal());

        let timeout = PipelineError::from_service("c1__q2", ServiceError::Timeout(Duration::from_secs(60)));
        assert_eq!(timeout.kind(), "service");
        assert!(timeout.to_string().contains("c1__q2"));

        assert!(PipelineError::from_service("c1", ServiceError::Unauthorized("401".into())).is_fatal());
    }
}
