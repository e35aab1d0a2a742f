use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::intake::domain::{ApplicationId, JobId, ScoringHints};

/// Everything the scoring collaborator gets to see about one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRequest {
    pub application_id: ApplicationId,
    pub job: JobContext,
    pub candidate: CandidateContext,
    pub documents: Vec<DocumentExcerpt>,
    #[serde(default, skip_serializing_if = "ScoringHints::is_empty")]
    pub hints: ScoringHints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    pub job_id: JobId,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateContext {
    pub name: String,
    pub application_status: String,
}

/// Extracted text of one completed document, possibly shortened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExcerpt {
    pub document_type: String,
    pub text: String,
    pub truncated: bool,
}

impl DocumentExcerpt {
    pub fn new(document_type: &str, text: &str, max_chars: usize) -> Self {
        let truncated = text.chars().count() > max_chars;
        let text = if truncated {
            text.chars().take(max_chars).collect()
        } else {
            text.to_string()
        };
        Self {
            document_type: document_type.to_string(),
            text,
            truncated,
        }
    }
}

/// Raw answer from the collaborator. Either field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSuggestion {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Language-model collaborator that rates an application against its job.
#[async_trait]
pub trait ScoringModel: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ModelSuggestion, ScoringModelError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringModelError {
    #[error("scoring model is not configured")]
    NotConfigured,
    #[error("scoring request failed: {0}")]
    Transport(String),
    #[error("scoring model returned HTTP {0}")]
    Status(u16),
    #[error("scoring model response could not be parsed: {0}")]
    InvalidResponse(String),
}

/// Stand-in used when no scoring endpoint is configured; every call fails softly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledScoringModel;

#[async_trait]
impl ScoringModel for DisabledScoringModel {
    async fn score(&self, _request: &ScoringRequest) -> Result<ModelSuggestion, ScoringModelError> {
        Err(ScoringModelError::NotConfigured)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_on_char_boundaries() {
        let excerpt = DocumentExcerpt::new("cv", "héllo wörld", 4);
        assert_eq!(excerpt.text, "héll");
        assert!(excerpt.truncated);

        let excerpt = DocumentExcerpt::new("cv", "short", 10);
        assert_eq!(excerpt.text, "short");
        assert!(!excerpt.truncated);
    }

    #[test]
    fn request_serializes_camel_case_without_empty_hints() {
        let request = ScoringRequest {
            application_id: ApplicationId::from("app-1"),
            job: JobContext {
                job_id: JobId::from("job-1"),
                title: "Barista".to_string(),
                description: "Morning shifts".to_string(),
            },
            candidate: CandidateContext {
                name: "Ada".to_string(),
                application_status: "submitted".to_string(),
            },
            documents: Vec::new(),
            hints: ScoringHints::default(),
        };

        let value = serde_json::to_value(&request).expect("serializes");
        assert_eq!(value["applicationId"], "app-1");
        assert_eq!(value["job"]["jobId"], "job-1");
        assert!(value.get("hints").is_none());
    }
}
