//! End-to-end scenarios for document intake and review, driven through the public pipeline
//! facade and the HTTP router with in-memory collaborators.

mod common {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use hireflow::config::{PipelineConfig, ScoringConfig};
    use hireflow::intake::{
        ApplicationId, ApplicationSummary, BusinessId, JobId, JobPosting,
        MemoryApplicationDirectory, MemoryDocumentRepository, MemoryObjectStore,
        MemoryProgressRepository, MemoryReviewRepository, ModelSuggestion, PipelineDeps,
        ReviewPipeline, ScoringModel, ScoringModelError, ScoringRequest,
    };

    /// Rates by how many job title words appear in the candidate's documents.
    pub(super) struct KeywordModel;

    #[async_trait]
    impl ScoringModel for KeywordModel {
        async fn score(
            &self,
            request: &ScoringRequest,
        ) -> Result<ModelSuggestion, ScoringModelError> {
            if request.documents.is_empty() {
                return Ok(ModelSuggestion {
                    rating: None,
                    summary: Some("no documents to assess".to_string()),
                });
            }
            let text = request
                .documents
                .iter()
                .map(|document| document.text.to_lowercase())
                .collect::<Vec<_>>()
                .join(" ");
            let hits = request
                .job
                .title
                .split_whitespace()
                .filter(|word| text.contains(&word.to_lowercase()))
                .count();
            Ok(ModelSuggestion {
                rating: Some(hits as f64 * 5.0),
                summary: Some(format!("{hits} title keywords matched")),
            })
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    pub(super) struct World {
        pub(super) documents: MemoryDocumentRepository,
        pub(super) store: MemoryObjectStore,
        pub(super) pipeline: Arc<ReviewPipeline>,
    }

    pub(super) fn job_id() -> JobId {
        JobId::from("job-grill")
    }

    pub(super) fn owner() -> BusinessId {
        BusinessId::from("biz-diner")
    }

    pub(super) fn resume_url(path: &str) -> String {
        format!("https://project.supabase.co/storage/v1/object/public/resumes/{path}")
    }

    pub(super) fn world(applicants: &[&str]) -> World {
        let directory = MemoryApplicationDirectory::default();
        directory
            .add_job(JobPosting {
                id: job_id(),
                business_id: owner(),
                title: "Grill Cook".to_string(),
                description: "Flat-top and char-grill, evening service".to_string(),
            })
            .expect("job");
        for (index, name) in applicants.iter().enumerate() {
            directory
                .add_application(ApplicationSummary {
                    id: ApplicationId::from(*name),
                    job_id: job_id(),
                    applicant_name: name.to_string(),
                    applicant_email: format!("{name}@example.com"),
                    status: "submitted".to_string(),
                    created_at: Utc.with_ymd_and_hms(2025, 4, 1, 8, index as u32, 0).unwrap(),
                    reviewed_at: None,
                    reviewed_by: None,
                })
                .expect("application");
        }

        let documents = MemoryDocumentRepository::default();
        let store = MemoryObjectStore::default();
        let deps = PipelineDeps {
            documents: Arc::new(documents.clone()),
            directory: Arc::new(directory),
            reviews: Arc::new(MemoryReviewRepository::default()),
            progress: Arc::new(MemoryProgressRepository::default()),
            store: Arc::new(store.clone()),
            model: Arc::new(KeywordModel),
        };
        let pipeline = Arc::new(ReviewPipeline::new(
            deps,
            &PipelineConfig::default(),
            &ScoringConfig::default(),
        ));

        World {
            documents,
            store,
            pipeline,
        }
    }
}

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use hireflow::intake::router::BUSINESS_ID_HEADER;
use hireflow::intake::{
    intake_router, ApplicationId, DocumentStatus, ExtractionOutcome, RankingRequest, Registration,
};

async fn call(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(BUSINESS_ID_HEADER, "biz-diner")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn uploaded_resumes_flow_into_a_ranked_shortlist() {
    let world = world(&["ana", "ben", "cy"]);
    let resumes = [
        ("ana", "Grill cook at a steakhouse"),
        ("ben", "Barista and cashier"),
        ("cy", "Line cook, some grill work"),
    ];
    for (name, text) in resumes {
        let path = format!("{name}/resume.txt");
        world.store.put("resumes", &path, text);
        let registration = world
            .pipeline
            .register_document(
                &ApplicationId::from(name),
                Some(&resume_url(&path)),
                None,
            )
            .expect("register");
        assert!(matches!(registration, Registration::Registered(_)));
    }

    let mut processed = 0;
    loop {
        match world.pipeline.process_next(None).await.expect("process") {
            ExtractionOutcome::Processed { .. } => processed += 1,
            ExtractionOutcome::Idle => break,
        }
    }
    assert_eq!(processed, 3);
    assert!(world
        .documents
        .all()
        .expect("documents")
        .iter()
        .all(|document| document.status == DocumentStatus::Completed));

    let queue = world
        .pipeline
        .review_queue(&job_id(), &owner())
        .expect("queue");
    let ai_ratings: Vec<_> = queue.queue.iter().map(|entry| entry.ai_rating).collect();
    assert_eq!(ai_ratings, [Some(10.0), Some(0.0), Some(10.0)]);

    let shortlist = world
        .pipeline
        .recommend(
            &job_id(),
            &owner(),
            RankingRequest {
                count: Some(2),
                ..RankingRequest::default()
            },
        )
        .await
        .expect("recommend");
    let names: Vec<_> = shortlist.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["ana", "cy"]);
}

#[tokio::test]
async fn review_progress_resumes_over_http() {
    let world = world(&["ana", "ben", "cy"]);
    let router = intake_router(world.pipeline.clone());

    let (status, summary) = call(
        router.clone(),
        post(
            "/api/v1/jobs/job-grill/review-progress",
            json!({ "applicationId": "ana", "rating": 3.5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["nextApplicationId"], json!("ben"));

    let (status, queue) = call(
        router,
        Request::get("/api/v1/jobs/job-grill/review-progress")
            .header(BUSINESS_ID_HEADER, "biz-diner")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue["summary"]["reviewedCount"], json!(1));
    assert_eq!(queue["summary"]["totalApplications"], json!(3));
    assert_eq!(queue["queue"][0]["rating"], json!(3.5));
}

#[tokio::test]
async fn failed_downloads_can_be_retried_after_an_operator_reset() {
    let world = world(&["ana"]);
    let router = intake_router(world.pipeline.clone());
    let (_, registered) = call(
        router.clone(),
        post(
            "/api/v1/documents",
            json!({ "applicationId": "ana", "resumeUrl": resume_url("ana/cv.txt") }),
        ),
    )
    .await;
    let document_id = registered["documentId"]
        .as_str()
        .expect("document id")
        .to_string();

    let (status, _) = call(
        router.clone(),
        Request::post("/api/v1/documents/process")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    world.store.put("resumes", "ana/cv.txt", "Grill cook");
    let (status, reset) = call(
        router.clone(),
        Request::post(format!("/api/v1/documents/{document_id}/reset"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["status"], json!("pending"));

    let (status, processed) = call(
        router,
        Request::post("/api/v1/documents/process")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(processed["status"], json!("processed"));
    assert_eq!(processed["documentId"], json!(document_id));
}

#[tokio::test]
async fn applications_without_documents_are_not_recommended() {
    let world = world(&["ana", "ben"]);
    world.store.put("resumes", "ben/cv.md", "Grill and fryer cook");
    world
        .pipeline
        .register_document(&ApplicationId::from("ben"), Some(&resume_url("ben/cv.md")), None)
        .expect("register");
    world.pipeline.process_next(None).await.expect("process");

    let (status, body) = call(
        intake_router(world.pipeline.clone()),
        post("/api/v1/jobs/job-grill/recommendations", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let recommendations = body["recommendations"].as_array().expect("array");
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0]["applicationId"], json!("ben"));
    assert_eq!(recommendations[0]["rating"], json!(10.0));
}
