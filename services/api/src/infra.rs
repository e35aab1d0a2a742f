use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use hireflow::config::AppConfig;
use hireflow::error::AppError;
use hireflow::intake::{
    ApplicationId, ApplicationSummary, BusinessId, DisabledScoringModel, HttpObjectStore,
    HttpScoringModel, JobId, JobPosting, MemoryApplicationDirectory, MemoryDocumentRepository,
    MemoryObjectStore, MemoryProgressRepository, MemoryReviewRepository, ModelSuggestion,
    ObjectStore, PipelineDeps, Registration, ReviewPipeline, ScoringModel, ScoringModelError,
    ScoringRequest,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) const DEMO_BUCKET: &str = "resumes";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process stand-in for the scoring model: rates by how much of the job posting's
/// vocabulary shows up in the candidate's documents, on a 0-10 scale.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct KeywordScoringModel;

fn vocabulary(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl ScoringModel for KeywordScoringModel {
    async fn score(&self, request: &ScoringRequest) -> Result<ModelSuggestion, ScoringModelError> {
        if request.documents.is_empty() {
            return Ok(ModelSuggestion {
                rating: None,
                summary: Some("no extracted documents to assess".to_string()),
            });
        }

        let wanted = vocabulary(&format!("{} {}", request.job.title, request.job.description));
        let offered: BTreeSet<String> = request
            .documents
            .iter()
            .flat_map(|document| vocabulary(&document.text))
            .collect();
        let matched: Vec<&String> = wanted.intersection(&offered).collect();

        let rating = if wanted.is_empty() {
            0.0
        } else {
            (matched.len() as f64 / wanted.len() as f64 * 100.0).round() / 10.0
        };
        let summary = if matched.is_empty() {
            "No overlap with the job posting".to_string()
        } else {
            let words: Vec<&str> = matched.iter().map(|word| word.as_str()).collect();
            format!("Mentions {}", words.join(", "))
        };

        Ok(ModelSuggestion {
            rating: Some(rating),
            summary: Some(summary),
        })
    }

    fn name(&self) -> &str {
        "keyword-overlap"
    }
}

/// Handles kept alongside the assembled pipeline so callers can seed the in-memory tables.
#[derive(Clone, Default)]
pub(crate) struct MemoryTables {
    pub(crate) documents: MemoryDocumentRepository,
    pub(crate) directory: MemoryApplicationDirectory,
    pub(crate) reviews: MemoryReviewRepository,
    pub(crate) progress: MemoryProgressRepository,
    pub(crate) objects: MemoryObjectStore,
}

impl MemoryTables {
    pub(crate) fn deps(&self, store: Arc<dyn ObjectStore>, model: Arc<dyn ScoringModel>) -> PipelineDeps {
        PipelineDeps {
            documents: Arc::new(self.documents.clone()),
            directory: Arc::new(self.directory.clone()),
            reviews: Arc::new(self.reviews.clone()),
            progress: Arc::new(self.progress.clone()),
            store,
            model,
        }
    }
}

/// Assembles the pipeline from configuration. Object storage and the scoring model are
/// remote when configured; the tables are always in-memory.
pub(crate) fn build_pipeline(
    config: &AppConfig,
    tables: &MemoryTables,
    seed_demo: bool,
) -> Result<Arc<ReviewPipeline>, AppError> {
    let store: Arc<dyn ObjectStore> = match HttpObjectStore::from_config(&config.storage)? {
        Some(store) => Arc::new(store),
        None => {
            info!("no object storage configured, using the in-memory store");
            Arc::new(tables.objects.clone())
        }
    };

    let model: Arc<dyn ScoringModel> = match HttpScoringModel::from_config(&config.scoring)? {
        Some(model) => Arc::new(model),
        None if seed_demo => {
            info!("no scoring endpoint configured, demo data is scored by keyword overlap");
            Arc::new(KeywordScoringModel)
        }
        None => {
            warn!("no scoring endpoint configured, ai suggestions are disabled");
            Arc::new(DisabledScoringModel)
        }
    };

    Ok(Arc::new(ReviewPipeline::new(
        tables.deps(store, model),
        &config.pipeline,
        &config.scoring,
    )))
}

pub(crate) fn demo_job_id() -> JobId {
    JobId::from("job-line-cook")
}

pub(crate) fn demo_business_id() -> BusinessId {
    BusinessId::from("biz-harbor-diner")
}

/// Id, name and resume text of each demo applicant, in application order.
pub(crate) const DEMO_APPLICANTS: &[(&str, &str, &str)] = &[
    (
        "app-avery",
        "Avery Stone",
        "Line cook for four years at a busy brunch diner. Grill and flat-top station, \
         weekend rush service, prep lists and food safety certified.",
    ),
    (
        "app-blake",
        "Blake Rivera",
        "Barista and cashier. Opened and closed the cafe, handled the register and \
         customer service.",
    ),
    (
        "app-casey",
        "Casey Nguyen",
        "Prep cook moving to the line. Knife work, station setup, grill rotation on \
         weekend shifts.",
    ),
    (
        "app-devon",
        "Devon Clarke",
        "Server with two years of fine dining experience and wine service.",
    ),
];

pub(crate) fn demo_resume_path(application_id: &str) -> String {
    format!("{application_id}/resume.txt")
}

pub(crate) fn demo_resume_url(application_id: &str) -> String {
    format!(
        "https://demo.supabase.co/storage/v1/object/public/{DEMO_BUCKET}/{}",
        demo_resume_path(application_id)
    )
}

/// Loads one job with four applicants and stores their resumes in the in-memory object store.
pub(crate) fn seed_demo_data(tables: &MemoryTables) -> Result<(), AppError> {
    tables
        .directory
        .add_job(JobPosting {
            id: demo_job_id(),
            business_id: demo_business_id(),
            title: "Line Cook".to_string(),
            description: "Grill and flat-top station for weekend brunch service. Prep, \
                          station setup and food safety required."
                .to_string(),
        })
        .map_err(|err| AppError::Pipeline(err.into()))?;

    let opened = Utc
        .with_ymd_and_hms(2025, 5, 5, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    for (index, (id, name, resume)) in DEMO_APPLICANTS.iter().enumerate() {
        tables
            .directory
            .add_application(ApplicationSummary {
                id: ApplicationId::from(*id),
                job_id: demo_job_id(),
                applicant_name: name.to_string(),
                applicant_email: format!("{}@example.com", id.trim_start_matches("app-")),
                status: "submitted".to_string(),
                created_at: opened + Duration::hours(index as i64),
                reviewed_at: None,
                reviewed_by: None,
            })
            .map_err(|err| AppError::Pipeline(err.into()))?;
        tables
            .objects
            .put(DEMO_BUCKET, &demo_resume_path(id), resume.as_bytes());
    }

    info!(
        job_id = %demo_job_id(),
        applications = DEMO_APPLICANTS.len(),
        "demo data seeded"
    );
    Ok(())
}

/// Registers every demo resume so the extraction worker has pending work.
pub(crate) fn register_demo_documents(pipeline: &ReviewPipeline) -> Result<usize, AppError> {
    let mut registered = 0;
    for (id, _, _) in DEMO_APPLICANTS {
        let registration = pipeline.register_document(
            &ApplicationId::from(*id),
            Some(&demo_resume_url(id)),
            Some("cv"),
        )?;
        if matches!(registration, Registration::Registered(_)) {
            registered += 1;
        }
    }
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireflow::intake::scoring::{CandidateContext, DocumentExcerpt, JobContext};
    use hireflow::intake::ScoringHints;

    fn request(documents: &[&str]) -> ScoringRequest {
        ScoringRequest {
            application_id: ApplicationId::from("app-1"),
            job: JobContext {
                job_id: demo_job_id(),
                title: "Line Cook".to_string(),
                description: "Grill station".to_string(),
            },
            candidate: CandidateContext {
                name: "Avery".to_string(),
                application_status: "submitted".to_string(),
            },
            documents: documents
                .iter()
                .map(|text| DocumentExcerpt::new("cv", text, 1_000))
                .collect(),
            hints: ScoringHints::default(),
        }
    }

    #[tokio::test]
    async fn keyword_model_rates_vocabulary_overlap() {
        let model = KeywordScoringModel;

        let full = model
            .score(&request(&["Line cook on the grill station"]))
            .await
            .expect("scores");
        let none = model
            .score(&request(&["Barista"]))
            .await
            .expect("scores");

        assert_eq!(full.rating, Some(10.0));
        assert_eq!(none.rating, Some(0.0));
        assert_eq!(none.summary.as_deref(), Some("No overlap with the job posting"));
    }

    #[tokio::test]
    async fn keyword_model_declines_without_documents() {
        let answer = KeywordScoringModel
            .score(&request(&[]))
            .await
            .expect("scores");

        assert_eq!(answer.rating, None);
    }

    #[test]
    fn demo_seed_registers_every_resume() {
        let tables = MemoryTables::default();
        seed_demo_data(&tables).expect("seed");
        let pipeline = ReviewPipeline::new(
            tables.deps(Arc::new(tables.objects.clone()), Arc::new(KeywordScoringModel)),
            &Default::default(),
            &Default::default(),
        );

        let registered = register_demo_documents(&pipeline).expect("register");

        assert_eq!(registered, DEMO_APPLICANTS.len());
        assert_eq!(
            tables.documents.all().expect("documents").len(),
            DEMO_APPLICANTS.len()
        );
    }
}
