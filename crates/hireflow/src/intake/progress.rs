use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{
    ApplicationId, ApplicationSummary, BusinessId, BusinessReviewProgress, JobId,
};
use super::repository::{
    ApplicationDirectory, ProgressRepository, RepositoryError, ReviewRepository,
};

/// One application in a job's review queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// 1-based position in creation order.
    pub position: usize,
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub applicant_email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub rating: Option<f64>,
    pub ai_rating: Option<f64>,
    pub ai_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_applications: usize,
    pub reviewed_count: usize,
    pub last_reviewed_application_id: Option<ApplicationId>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_application_id: Option<ApplicationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewQueue {
    pub queue: Vec<QueueEntry>,
    pub summary: ProgressSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("application {0} does not belong to this job")]
    ApplicationNotInJob(ApplicationId),
    #[error("rating must be a finite number")]
    InvalidRating,
}

/// Applications of a job ordered by creation time, ties broken by id.
///
/// Later arrivals always sort after existing entries, so a stored resume pointer stays valid.
pub fn ordered_queue(mut applications: Vec<ApplicationSummary>) -> Vec<ApplicationSummary> {
    applications.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    applications
}

/// Index of the last reviewed application, or `None` when unset or no longer in the queue.
pub fn last_reviewed_index(
    queue: &[ApplicationSummary],
    last_reviewed: Option<&ApplicationId>,
) -> Option<usize> {
    let last_reviewed = last_reviewed?;
    queue.iter().position(|application| &application.id == last_reviewed)
}

/// Application following the resume pointer, or the first one when nothing was reviewed.
pub fn next_to_review<'a>(
    queue: &'a [ApplicationSummary],
    last_reviewed: Option<&ApplicationId>,
) -> Option<&'a ApplicationSummary> {
    match last_reviewed_index(queue, last_reviewed) {
        Some(index) => queue.get(index + 1),
        None => queue.first(),
    }
}

pub struct ReviewProgressTracker {
    directory: Arc<dyn ApplicationDirectory>,
    reviews: Arc<dyn ReviewRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ReviewProgressTracker {
    pub fn new(
        directory: Arc<dyn ApplicationDirectory>,
        reviews: Arc<dyn ReviewRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            directory,
            reviews,
            progress,
        }
    }

    pub fn get_queue(
        &self,
        job_id: &JobId,
        business_id: &BusinessId,
    ) -> Result<ReviewQueue, ProgressError> {
        let applications = ordered_queue(self.directory.applications_for_job(job_id)?);
        let stored = self.progress.fetch(job_id, business_id)?;

        let mut queue = Vec::with_capacity(applications.len());
        for (index, application) in applications.iter().enumerate() {
            let review = self.reviews.fetch(&application.id)?;
            queue.push(QueueEntry {
                position: index + 1,
                application_id: application.id.clone(),
                applicant_name: application.applicant_name.clone(),
                applicant_email: application.applicant_email.clone(),
                status: application.status.clone(),
                created_at: application.created_at,
                reviewed_at: application.reviewed_at,
                reviewed_by: application.reviewed_by.clone(),
                rating: review.as_ref().and_then(|review| review.rating),
                ai_rating: review.as_ref().and_then(|review| review.ai_rating),
                ai_summary: review.and_then(|review| review.ai_summary),
            });
        }

        let summary = summarize(&applications, stored.as_ref());
        Ok(ReviewQueue { queue, summary })
    }

    /// Records that `business_id` reviewed `application_id`, optionally with a manual rating.
    ///
    /// The resume pointer only moves forward; revisiting an earlier application leaves it where
    /// it is.
    pub fn record_review(
        &self,
        job_id: &JobId,
        business_id: &BusinessId,
        application_id: &ApplicationId,
        rating: Option<f64>,
    ) -> Result<ProgressSummary, ProgressError> {
        if rating.is_some_and(|rating| !rating.is_finite()) {
            return Err(ProgressError::InvalidRating);
        }

        let applications = ordered_queue(self.directory.applications_for_job(job_id)?);
        let reviewed_index = last_reviewed_index(&applications, Some(application_id))
            .ok_or_else(|| ProgressError::ApplicationNotInJob(application_id.clone()))?;

        let now = Utc::now();
        if let Some(rating) = rating {
            self.reviews
                .upsert_manual_rating(application_id, rating, now)?;
        }

        let stored = self.progress.fetch(job_id, business_id)?;
        let current_index = stored.as_ref().and_then(|progress| {
            last_reviewed_index(&applications, progress.last_reviewed_application_id.as_ref())
        });

        let (last_reviewed_application_id, pointer_index) = match current_index {
            Some(current) if current >= reviewed_index => (
                applications[current].id.clone(),
                current,
            ),
            _ => (application_id.clone(), reviewed_index),
        };

        let total_applications = applications.len();
        let previous_count = stored
            .as_ref()
            .map(|progress| progress.reviewed_count)
            .unwrap_or(0);
        let reviewed_count = previous_count
            .max(pointer_index + 1)
            .min(total_applications);

        let saved = self.progress.upsert(BusinessReviewProgress {
            job_id: job_id.clone(),
            business_id: business_id.clone(),
            last_reviewed_application_id: Some(last_reviewed_application_id),
            reviewed_count,
            total_applications,
            updated_at: now,
        })?;

        info!(
            %job_id,
            %business_id,
            %application_id,
            reviewed_count,
            total_applications,
            "review progress recorded"
        );
        Ok(summarize(&applications, Some(&saved)))
    }
}

fn summarize(
    applications: &[ApplicationSummary],
    stored: Option<&BusinessReviewProgress>,
) -> ProgressSummary {
    let last_reviewed = stored.and_then(|progress| progress.last_reviewed_application_id.as_ref());
    let reviewed_count = match stored {
        Some(progress) => progress.reviewed_count,
        None => last_reviewed_index(applications, last_reviewed).map_or(0, |index| index + 1),
    };

    ProgressSummary {
        total_applications: applications.len(),
        reviewed_count,
        last_reviewed_application_id: last_reviewed.cloned(),
        last_reviewed_at: stored
            .filter(|progress| progress.last_reviewed_application_id.is_some())
            .map(|progress| progress.updated_at),
        next_application_id: next_to_review(applications, last_reviewed)
            .map(|application| application.id.clone()),
    }
}
