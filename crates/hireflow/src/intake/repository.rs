use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationDocument, ApplicationId, ApplicationReview, ApplicationSummary, BusinessId,
    BusinessReviewProgress, DocumentDraft, DocumentId, DocumentStatus, ExtractedMetadata, JobId,
    JobPosting, StatusUpdate,
};

/// Persistence for uploaded documents and their processing state.
pub trait DocumentRepository: Send + Sync {
    /// Inserts or updates the row keyed by `(application_id, storage_bucket, storage_path)`.
    /// An existing row keeps its id and `created_at` and is reset to `pending`, unless a worker
    /// currently holds it in `processing`.
    fn upsert(
        &self,
        draft: DocumentDraft,
        at: DateTime<Utc>,
    ) -> Result<ApplicationDocument, RepositoryError>;

    /// Oldest `pending` row by `created_at`.
    fn next_pending(&self) -> Result<Option<ApplicationDocument>, RepositoryError>;

    /// Conditional `pending -> processing` for one row. Returns `None` when the row is no
    /// longer pending, i.e. another caller claimed it first.
    fn claim(
        &self,
        id: &DocumentId,
        metadata: ExtractedMetadata,
        at: DateTime<Utc>,
    ) -> Result<Option<ApplicationDocument>, RepositoryError>;

    /// Applies a status write, merging `update.metadata` into the stored map.
    /// Fails with [`RepositoryError::InvalidTransition`] when the row is not in `expected`.
    fn update_status(
        &self,
        id: &DocumentId,
        expected: DocumentStatus,
        update: StatusUpdate,
    ) -> Result<ApplicationDocument, RepositoryError>;

    fn fetch(&self, id: &DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError>;

    /// All documents of an application, oldest first.
    fn for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError>;
}

/// Read-only view of jobs and applications owned by other subsystems.
pub trait ApplicationDirectory: Send + Sync {
    fn job(&self, job_id: &JobId) -> Result<Option<JobPosting>, RepositoryError>;
    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationSummary>, RepositoryError>;
    /// Applications for a job in no particular order.
    fn applications_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<ApplicationSummary>, RepositoryError>;
}

/// Review rows written by two independent actors. Each method only touches its own columns.
pub trait ReviewRepository: Send + Sync {
    fn upsert_ai_suggestion(
        &self,
        application_id: &ApplicationId,
        ai_rating: f64,
        ai_summary: &str,
        at: DateTime<Utc>,
    ) -> Result<ApplicationReview, RepositoryError>;

    fn upsert_manual_rating(
        &self,
        application_id: &ApplicationId,
        rating: f64,
        at: DateTime<Utc>,
    ) -> Result<ApplicationReview, RepositoryError>;

    fn fetch(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationReview>, RepositoryError>;
}

/// Per `(job, business)` review cursor.
pub trait ProgressRepository: Send + Sync {
    fn fetch(
        &self,
        job_id: &JobId,
        business_id: &BusinessId,
    ) -> Result<Option<BusinessReviewProgress>, RepositoryError>;

    fn upsert(
        &self,
        progress: BusinessReviewProgress,
    ) -> Result<BusinessReviewProgress, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("document is {actual}, expected {expected}")]
    InvalidTransition {
        expected: DocumentStatus,
        actual: DocumentStatus,
    },
    #[error("cannot move a document from {from} to {to}")]
    DisallowedTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
