use std::sync::Arc;

use tracing::warn;

use crate::config::{PipelineConfig, ScoringConfig};

use super::domain::{
    ApplicationDocument, ApplicationId, BusinessId, DocumentId, JobId, JobPosting, ScoringHints,
};
use super::extraction::{ExtractionError, ExtractionOutcome, ExtractionWorker};
use super::progress::{ProgressError, ProgressSummary, ReviewProgressTracker, ReviewQueue};
use super::ranking::{CandidateRanker, RankingRequest, Recommendation};
use super::registry::{DocumentRegistry, Registration, ResetError};
use super::repository::{
    ApplicationDirectory, DocumentRepository, ProgressRepository, RepositoryError,
    ReviewRepository,
};
use super::scoring::{ScoringEngine, ScoringModel, ScoringResult};
use super::storage::ObjectStore;

/// Collaborators the pipeline is assembled from.
#[derive(Clone)]
pub struct PipelineDeps {
    pub documents: Arc<dyn DocumentRepository>,
    pub directory: Arc<dyn ApplicationDirectory>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub store: Arc<dyn ObjectStore>,
    pub model: Arc<dyn ScoringModel>,
}

/// Entry points of the intake and review pipeline, with ownership and secret checks applied.
pub struct ReviewPipeline {
    directory: Arc<dyn ApplicationDirectory>,
    registry: Arc<DocumentRegistry>,
    worker: ExtractionWorker,
    scoring: Arc<ScoringEngine>,
    tracker: ReviewProgressTracker,
    ranker: CandidateRanker,
    processing_secret: Option<String>,
}

impl ReviewPipeline {
    pub fn new(deps: PipelineDeps, pipeline: &PipelineConfig, scoring: &ScoringConfig) -> Self {
        let registry = Arc::new(DocumentRegistry::new(
            deps.documents.clone(),
            pipeline.failed_documents,
        ));
        let engine = Arc::new(ScoringEngine::new(
            deps.directory.clone(),
            deps.documents.clone(),
            deps.reviews.clone(),
            deps.model.clone(),
            scoring.max_context_chars,
        ));
        let worker = ExtractionWorker::new(
            registry.clone(),
            deps.store.clone(),
            engine.clone(),
            pipeline.claim_attempts,
        );
        let tracker = ReviewProgressTracker::new(
            deps.directory.clone(),
            deps.reviews.clone(),
            deps.progress.clone(),
        );
        let ranker = CandidateRanker::new(
            deps.directory.clone(),
            engine.clone(),
            pipeline.ranking_concurrency,
        );

        Self {
            directory: deps.directory,
            registry,
            worker,
            scoring: engine,
            tracker,
            ranker,
            processing_secret: pipeline.processing_secret.clone(),
        }
    }

    pub fn register_document(
        &self,
        application_id: &ApplicationId,
        resume_url: Option<&str>,
        document_type: Option<&str>,
    ) -> Result<Registration, PipelineError> {
        if self.directory.application(application_id)?.is_none() {
            return Err(PipelineError::NotFound(format!(
                "application {application_id}"
            )));
        }
        Ok(self
            .registry
            .register_document(application_id, resume_url, document_type)?)
    }

    pub async fn process_next(
        &self,
        secret: Option<&str>,
    ) -> Result<ExtractionOutcome, PipelineError> {
        self.check_secret(secret)?;
        Ok(self.worker.process_next().await?)
    }

    pub fn reset_document(
        &self,
        secret: Option<&str>,
        document_id: &DocumentId,
    ) -> Result<ApplicationDocument, PipelineError> {
        self.check_secret(secret)?;
        self.registry
            .reset_failed(document_id)
            .map_err(|err| match err {
                ResetError::NotFound => PipelineError::NotFound(format!("document {document_id}")),
                ResetError::Repository(err) => PipelineError::Repository(err),
                other => PipelineError::Conflict(other.to_string()),
            })
    }

    pub fn review_queue(
        &self,
        job_id: &JobId,
        business_id: &BusinessId,
    ) -> Result<ReviewQueue, PipelineError> {
        self.authorize(job_id, business_id)?;
        Ok(self.tracker.get_queue(job_id, business_id)?)
    }

    pub fn record_review(
        &self,
        job_id: &JobId,
        business_id: &BusinessId,
        application_id: &ApplicationId,
        rating: Option<f64>,
    ) -> Result<ProgressSummary, PipelineError> {
        self.authorize(job_id, business_id)?;
        Ok(self
            .tracker
            .record_review(job_id, business_id, application_id, rating)?)
    }

    pub async fn recommend(
        &self,
        job_id: &JobId,
        business_id: &BusinessId,
        request: RankingRequest,
    ) -> Result<Vec<Recommendation>, PipelineError> {
        self.authorize(job_id, business_id)?;
        Ok(self.ranker.rank(job_id, request).await?)
    }

    /// Scores one application on demand. Scoring failures come back as a
    /// [`ScoringResult::Failure`], not as an error.
    pub async fn suggest(
        &self,
        application_id: &ApplicationId,
        business_id: &BusinessId,
        hints: ScoringHints,
    ) -> Result<ScoringResult, PipelineError> {
        let application = self
            .directory
            .application(application_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("application {application_id}")))?;
        self.authorize(&application.job_id, business_id)?;
        Ok(self.scoring.suggest(application_id, hints).await)
    }

    fn authorize(&self, job_id: &JobId, business_id: &BusinessId) -> Result<JobPosting, PipelineError> {
        let job = self
            .directory
            .job(job_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;
        if &job.business_id != business_id {
            warn!(%job_id, %business_id, "business does not own job");
            return Err(PipelineError::Forbidden);
        }
        Ok(job)
    }

    fn check_secret(&self, provided: Option<&str>) -> Result<(), PipelineError> {
        match &self.processing_secret {
            Some(expected) if provided != Some(expected.as_str()) => {
                Err(PipelineError::Unauthorized)
            }
            _ => Ok(()),
        }
    }
}

/// Error raised by the pipeline facade.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("job is not owned by the requesting business")]
    Forbidden,
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl From<ProgressError> for PipelineError {
    fn from(value: ProgressError) -> Self {
        match value {
            ProgressError::Repository(err) => Self::Repository(err),
            other => Self::Invalid(other.to_string()),
        }
    }
}
