use std::cmp::Ordering;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ApplicationId, JobId, ScoringHints};
use super::progress::ordered_queue;
use super::repository::{ApplicationDirectory, RepositoryError};
use super::scoring::{ScoringEngine, ScoringResult};

pub const DEFAULT_SHORTLIST: usize = 3;
pub const MAX_SHORTLIST: usize = 20;

/// Requested shortlist size clamped to `1..=20`, defaulting to three.
pub fn shortlist_size(requested: Option<i64>) -> usize {
    match requested {
        Some(count) => count.clamp(1, MAX_SHORTLIST as i64) as usize,
        None => DEFAULT_SHORTLIST,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RankingRequest {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub hints: ScoringHints,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub application_id: ApplicationId,
    pub name: String,
    pub email: String,
    pub rating: f64,
    pub summary: String,
}

/// Orders by rating, highest first. Equal ratings keep their input order.
pub fn shortlist(mut scored: Vec<Recommendation>, count: usize) -> Vec<Recommendation> {
    scored.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal));
    scored.truncate(count);
    scored
}

/// Scores every application of a job and keeps the best rated ones.
pub struct CandidateRanker {
    directory: Arc<dyn ApplicationDirectory>,
    scoring: Arc<ScoringEngine>,
    concurrency: usize,
}

impl CandidateRanker {
    pub fn new(
        directory: Arc<dyn ApplicationDirectory>,
        scoring: Arc<ScoringEngine>,
        concurrency: usize,
    ) -> Self {
        Self {
            directory,
            scoring,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn rank(
        &self,
        job_id: &JobId,
        request: RankingRequest,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        let count = shortlist_size(request.count);
        let hints = request.hints.normalized();
        let applications = ordered_queue(self.directory.applications_for_job(job_id)?);
        if applications.is_empty() {
            info!(%job_id, "no applications to rank");
            return Ok(Vec::new());
        }

        let total = applications.len();
        let scoring = &self.scoring;
        let hints = &hints;
        let scored: Vec<Recommendation> = stream::iter(applications)
            .map(|application| async move {
                let result = scoring.suggest(&application.id, hints.clone()).await;
                match result {
                    ScoringResult::Success { suggestion } => Some(Recommendation {
                        application_id: application.id,
                        name: application.applicant_name,
                        email: application.applicant_email,
                        rating: suggestion.rating,
                        summary: suggestion.summary,
                    }),
                    ScoringResult::Failure { .. } => None,
                }
            })
            .buffered(self.concurrency)
            .filter_map(|recommendation| async move { recommendation })
            .collect()
            .await;

        let rated = scored.len();
        let recommendations = shortlist(scored, count);
        info!(
            %job_id,
            total,
            rated,
            returned = recommendations.len(),
            "candidate shortlist ranked"
        );
        Ok(recommendations)
    }
}
