use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::{FailedDocumentPolicy, PipelineConfig, ScoringConfig};
use crate::intake::domain::{
    ApplicationDocument, ApplicationId, ApplicationSummary, BusinessId, DocumentId,
    DocumentStatus, ExtractedMetadata, JobId, JobPosting,
};
use crate::intake::memory::{
    MemoryApplicationDirectory, MemoryDocumentRepository, MemoryObjectStore,
    MemoryProgressRepository, MemoryReviewRepository,
};
use crate::intake::registry::DocumentRegistry;
use crate::intake::scoring::{
    ModelSuggestion, ScoringEngine, ScoringModel, ScoringModelError, ScoringRequest,
};
use crate::intake::service::{PipelineDeps, ReviewPipeline};

pub(super) const BUCKET: &str = "resumes";

pub(super) fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

pub(super) fn job_id() -> JobId {
    JobId::from("job-1")
}

pub(super) fn owner() -> BusinessId {
    BusinessId::from("biz-1")
}

pub(super) fn job() -> JobPosting {
    JobPosting {
        id: job_id(),
        business_id: owner(),
        title: "Line Cook".to_string(),
        description: "Prep and grill station, weekend shifts".to_string(),
    }
}

pub(super) fn application(id: &str, minutes: i64) -> ApplicationSummary {
    ApplicationSummary {
        id: ApplicationId::from(id),
        job_id: job_id(),
        applicant_name: format!("Applicant {id}"),
        applicant_email: format!("{id}@example.com"),
        status: "submitted".to_string(),
        created_at: at(minutes),
        reviewed_at: None,
        reviewed_by: None,
    }
}

pub(super) fn public_url(path: &str) -> String {
    format!("https://abc.supabase.co/storage/v1/object/public/{BUCKET}/{path}")
}

pub(super) fn pending_document(id: &str, application_id: &str, path: &str, minutes: i64) -> ApplicationDocument {
    ApplicationDocument {
        id: DocumentId::from(id),
        application_id: ApplicationId::from(application_id),
        storage_bucket: BUCKET.to_string(),
        storage_path: path.to_string(),
        document_type: "cv".to_string(),
        status: DocumentStatus::Pending,
        extracted_text: None,
        extracted_metadata: ExtractedMetadata::new(),
        extracted_at: None,
        created_at: at(minutes),
        updated_at: at(minutes),
    }
}

/// Scoring model answering from a per-application script. Unscripted applications fail.
#[derive(Default)]
pub(super) struct ScriptedModel {
    answers: Mutex<HashMap<ApplicationId, ModelSuggestion>>,
    requests: Mutex<Vec<ScoringRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub(super) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(super) fn answer(&self, application_id: &str, rating: Option<f64>, summary: &str) {
        self.answers.lock().expect("script mutex poisoned").insert(
            ApplicationId::from(application_id),
            ModelSuggestion {
                rating,
                summary: Some(summary.to_string()),
            },
        );
    }

    pub(super) fn requests(&self) -> Vec<ScoringRequest> {
        self.requests.lock().expect("request mutex poisoned").clone()
    }

    pub(super) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringModel for ScriptedModel {
    async fn score(&self, request: &ScoringRequest) -> Result<ModelSuggestion, ScoringModelError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.requests
            .lock()
            .expect("request mutex poisoned")
            .push(request.clone());
        self.answers
            .lock()
            .expect("script mutex poisoned")
            .get(&request.application_id)
            .cloned()
            .ok_or_else(|| ScoringModelError::Transport("model unreachable".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub(super) struct Harness {
    pub(super) documents: MemoryDocumentRepository,
    pub(super) directory: MemoryApplicationDirectory,
    pub(super) reviews: MemoryReviewRepository,
    pub(super) progress: MemoryProgressRepository,
    pub(super) store: MemoryObjectStore,
    pub(super) model: Arc<ScriptedModel>,
    pub(super) pipeline_config: PipelineConfig,
    pub(super) scoring_config: ScoringConfig,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::with_model(ScriptedModel::default())
    }

    pub(super) fn with_model(model: ScriptedModel) -> Self {
        let harness = Self {
            documents: MemoryDocumentRepository::default(),
            directory: MemoryApplicationDirectory::default(),
            reviews: MemoryReviewRepository::default(),
            progress: MemoryProgressRepository::default(),
            store: MemoryObjectStore::default(),
            model: Arc::new(model),
            pipeline_config: PipelineConfig::default(),
            scoring_config: ScoringConfig::default(),
        };
        harness.directory.add_job(job()).expect("job stored");
        harness
    }

    pub(super) fn add_application(&self, id: &str, minutes: i64) {
        self.directory
            .add_application(application(id, minutes))
            .expect("application stored");
    }

    pub(super) fn deps(&self) -> PipelineDeps {
        PipelineDeps {
            documents: Arc::new(self.documents.clone()),
            directory: Arc::new(self.directory.clone()),
            reviews: Arc::new(self.reviews.clone()),
            progress: Arc::new(self.progress.clone()),
            store: Arc::new(self.store.clone()),
            model: self.model.clone(),
        }
    }

    pub(super) fn pipeline(&self) -> ReviewPipeline {
        ReviewPipeline::new(self.deps(), &self.pipeline_config, &self.scoring_config)
    }

    pub(super) fn registry(&self, policy: FailedDocumentPolicy) -> DocumentRegistry {
        DocumentRegistry::new(Arc::new(self.documents.clone()), policy)
    }

    pub(super) fn scoring_engine(&self) -> ScoringEngine {
        ScoringEngine::new(
            Arc::new(self.directory.clone()),
            Arc::new(self.documents.clone()),
            Arc::new(self.reviews.clone()),
            self.model.clone(),
            self.scoring_config.max_context_chars,
        )
    }

    pub(super) fn document(&self, id: &DocumentId) -> ApplicationDocument {
        self.documents
            .all()
            .expect("documents readable")
            .into_iter()
            .find(|document| &document.id == id)
            .expect("document present")
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
