//! Scoring boundary: gathers context for an application, asks the model for a rating and
//! writes the answer back onto the application's review row.
//!
//! Nothing here returns an error to callers. Every failure becomes
//! [`ScoringResult::Failure`], which callers treat as "no suggestion available".

mod http;
mod model;

pub use http::HttpScoringModel;
pub use model::{
    CandidateContext, DisabledScoringModel, DocumentExcerpt, JobContext, ModelSuggestion,
    ScoringModel, ScoringModelError, ScoringRequest,
};

use std::sync::Arc;

use chrono::Utc;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{info, warn};

use super::domain::{ApplicationId, DocumentStatus, ScoringHints};
use super::repository::{
    ApplicationDirectory, DocumentRepository, RepositoryError, ReviewRepository,
};

/// Rating and justification stored as the AI suggestion for an application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub rating: f64,
    pub summary: String,
}

/// Tagged outcome of a scoring pass.
///
/// Serializes as `{"success": true, "suggestion": {...}}` or
/// `{"success": false, "reason": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringResult {
    Success { suggestion: Suggestion },
    Failure { reason: String },
}

impl ScoringResult {
    pub fn suggestion(&self) -> Option<&Suggestion> {
        match self {
            ScoringResult::Success { suggestion } => Some(suggestion),
            ScoringResult::Failure { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScoringResult::Success { .. })
    }
}

impl Serialize for ScoringResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScoringResult", 2)?;
        match self {
            ScoringResult::Success { suggestion } => {
                state.serialize_field("success", &true)?;
                state.serialize_field("suggestion", suggestion)?;
            }
            ScoringResult::Failure { reason } => {
                state.serialize_field("success", &false)?;
                state.serialize_field("reason", reason)?;
            }
        }
        state.end()
    }
}

#[derive(Debug, thiserror::Error)]
enum ScoringFailure {
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("job for application {0} not found")]
    JobNotFound(ApplicationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Model(#[from] ScoringModelError),
    #[error("scoring model returned no usable rating")]
    NoRating,
}

pub struct ScoringEngine {
    directory: Arc<dyn ApplicationDirectory>,
    documents: Arc<dyn DocumentRepository>,
    reviews: Arc<dyn ReviewRepository>,
    model: Arc<dyn ScoringModel>,
    max_context_chars: usize,
}

impl ScoringEngine {
    pub fn new(
        directory: Arc<dyn ApplicationDirectory>,
        documents: Arc<dyn DocumentRepository>,
        reviews: Arc<dyn ReviewRepository>,
        model: Arc<dyn ScoringModel>,
        max_context_chars: usize,
    ) -> Self {
        Self {
            directory,
            documents,
            reviews,
            model,
            max_context_chars,
        }
    }

    pub async fn suggest(&self, application_id: &ApplicationId, hints: ScoringHints) -> ScoringResult {
        match self.try_suggest(application_id, hints.normalized()).await {
            Ok(suggestion) => {
                info!(
                    %application_id,
                    rating = suggestion.rating,
                    model = self.model.name(),
                    "ai suggestion stored"
                );
                ScoringResult::Success { suggestion }
            }
            Err(failure) => {
                warn!(%application_id, model = self.model.name(), error = %failure, "no ai suggestion");
                ScoringResult::Failure {
                    reason: failure.to_string(),
                }
            }
        }
    }

    fn request_for(
        &self,
        application_id: &ApplicationId,
        hints: ScoringHints,
    ) -> Result<ScoringRequest, ScoringFailure> {
        let application = self
            .directory
            .application(application_id)?
            .ok_or_else(|| ScoringFailure::ApplicationNotFound(application_id.clone()))?;
        let job = self
            .directory
            .job(&application.job_id)?
            .ok_or_else(|| ScoringFailure::JobNotFound(application_id.clone()))?;

        let documents = self
            .documents
            .for_application(application_id)?
            .into_iter()
            .filter(|document| document.status == DocumentStatus::Completed)
            .filter_map(|document| {
                document.extracted_text.as_deref().map(|text| {
                    DocumentExcerpt::new(&document.document_type, text, self.max_context_chars)
                })
            })
            .collect();

        Ok(ScoringRequest {
            application_id: application.id,
            job: JobContext {
                job_id: job.id,
                title: job.title,
                description: job.description,
            },
            candidate: CandidateContext {
                name: application.applicant_name,
                application_status: application.status,
            },
            documents,
            hints,
        })
    }

    async fn try_suggest(
        &self,
        application_id: &ApplicationId,
        hints: ScoringHints,
    ) -> Result<Suggestion, ScoringFailure> {
        let request = self.request_for(application_id, hints)?;
        let answer = self.model.score(&request).await?;

        let rating = answer
            .rating
            .filter(|rating| rating.is_finite())
            .ok_or(ScoringFailure::NoRating)?;
        let summary = answer.summary.unwrap_or_default().trim().to_string();

        self.reviews
            .upsert_ai_suggestion(application_id, rating, &summary, Utc::now())?;

        Ok(Suggestion { rating, summary })
    }
}
