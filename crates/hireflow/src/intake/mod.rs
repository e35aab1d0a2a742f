//! Document intake and AI-assisted review.
//!
//! Uploaded application documents are registered against their storage location, drained one at
//! a time by the extraction worker, and scored against the job they were submitted for. Businesses
//! walk each job's applications through a resumable review queue and can ask for a ranked
//! shortlist built from the same scoring boundary.

pub mod domain;
pub mod extraction;
pub mod location;
pub mod memory;
pub mod progress;
pub mod ranking;
pub mod registry;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod storage;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationDocument, ApplicationId, ApplicationReview, ApplicationSummary, BusinessId,
    BusinessReviewProgress, DocumentId, DocumentStatus, ExtractedMetadata, JobId, JobPosting,
    ScoringHints,
};
pub use extraction::{ExtractionError, ExtractionMethod, ExtractionOutcome, ExtractionWorker};
pub use location::StorageLocation;
pub use memory::{
    MemoryApplicationDirectory, MemoryDocumentRepository, MemoryObjectStore,
    MemoryProgressRepository, MemoryReviewRepository,
};
pub use progress::{ProgressSummary, QueueEntry, ReviewProgressTracker, ReviewQueue};
pub use ranking::{CandidateRanker, RankingRequest, Recommendation};
pub use registry::{DocumentRegistry, Registration};
pub use repository::{
    ApplicationDirectory, DocumentRepository, ProgressRepository, RepositoryError,
    ReviewRepository,
};
pub use router::intake_router;
pub use scoring::{
    DisabledScoringModel, HttpScoringModel, ModelSuggestion, ScoringEngine, ScoringModel,
    ScoringModelError, ScoringRequest, ScoringResult, Suggestion,
};
pub use service::{PipelineDeps, PipelineError, ReviewPipeline};
pub use storage::{HttpObjectStore, ObjectStore, StorageError};
