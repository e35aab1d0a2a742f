use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use super::domain::{ApplicationId, BusinessId, DocumentId, JobId, ScoringHints};
use super::extraction::ExtractionOutcome;
use super::ranking::RankingRequest;
use super::registry::Registration;
use super::service::{PipelineError, ReviewPipeline};

pub const PROCESSING_SECRET_HEADER: &str = "x-processing-secret";
pub const BUSINESS_ID_HEADER: &str = "x-business-id";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDocumentRequest {
    pub application_id: ApplicationId,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReviewRequest {
    pub application_id: ApplicationId,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionRequest {
    #[serde(default)]
    pub hints: ScoringHints,
}

/// Router builder exposing the intake, review-progress and ranking endpoints.
pub fn intake_router(pipeline: Arc<ReviewPipeline>) -> Router {
    Router::new()
        .route("/api/v1/documents", post(register_handler))
        .route("/api/v1/documents/process", post(process_handler))
        .route("/api/v1/documents/:document_id/reset", post(reset_handler))
        .route(
            "/api/v1/jobs/:job_id/review-progress",
            get(progress_handler).post(record_review_handler),
        )
        .route(
            "/api/v1/jobs/:job_id/recommendations",
            post(recommendations_handler),
        )
        .route(
            "/api/v1/applications/:application_id/suggestion",
            post(suggestion_handler),
        )
        .with_state(pipeline)
}

fn error_response(error: PipelineError) -> Response {
    let status = match &error {
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::Forbidden => StatusCode::FORBIDDEN,
        PipelineError::Unauthorized => StatusCode::UNAUTHORIZED,
        PipelineError::Conflict(_) => StatusCode::CONFLICT,
        PipelineError::Invalid(_) => StatusCode::BAD_REQUEST,
        PipelineError::Repository(_) | PipelineError::Extraction(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

/// An empty body means "all defaults"; anything else must be valid JSON for `T`.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, PipelineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| PipelineError::Invalid(format!("malformed request body: {err}")))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn business_identity(headers: &HeaderMap) -> Result<BusinessId, PipelineError> {
    header(headers, BUSINESS_ID_HEADER)
        .map(BusinessId::from)
        .ok_or(PipelineError::Unauthorized)
}

pub(crate) async fn register_handler(
    State(pipeline): State<Arc<ReviewPipeline>>,
    Json(request): Json<RegisterDocumentRequest>,
) -> Response {
    match pipeline.register_document(
        &request.application_id,
        request.resume_url.as_deref(),
        request.document_type.as_deref(),
    ) {
        Ok(Registration::Registered(document)) => (
            StatusCode::OK,
            Json(json!({
                "registered": true,
                "documentId": document.id,
                "status": document.status,
            })),
        )
            .into_response(),
        Ok(Registration::Skipped) => {
            (StatusCode::OK, Json(json!({ "registered": false }))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn process_handler(
    State(pipeline): State<Arc<ReviewPipeline>>,
    headers: HeaderMap,
) -> Response {
    match pipeline
        .process_next(header(&headers, PROCESSING_SECRET_HEADER))
        .await
    {
        Ok(ExtractionOutcome::Idle) => (
            StatusCode::OK,
            Json(json!({ "status": "idle", "message": "no pending documents" })),
        )
            .into_response(),
        Ok(ExtractionOutcome::Processed { document, method }) => (
            StatusCode::OK,
            Json(json!({
                "status": "processed",
                "documentId": document.id,
                "extractionMethod": method,
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reset_handler(
    State(pipeline): State<Arc<ReviewPipeline>>,
    Path(document_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let document_id = DocumentId(document_id);
    match pipeline.reset_document(header(&headers, PROCESSING_SECRET_HEADER), &document_id) {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn progress_handler(
    State(pipeline): State<Arc<ReviewPipeline>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let result = business_identity(&headers)
        .and_then(|business_id| pipeline.review_queue(&JobId(job_id), &business_id));
    match result {
        Ok(queue) => (StatusCode::OK, Json(queue)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn record_review_handler(
    State(pipeline): State<Arc<ReviewPipeline>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RecordReviewRequest>,
) -> Response {
    let result = business_identity(&headers).and_then(|business_id| {
        pipeline.record_review(
            &JobId(job_id),
            &business_id,
            &request.application_id,
            request.rating,
        )
    });
    match result {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recommendations_handler(
    State(pipeline): State<Arc<ReviewPipeline>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let business_id = match business_identity(&headers) {
        Ok(business_id) => business_id,
        Err(error) => return error_response(error),
    };
    let request: RankingRequest = match optional_body(&body) {
        Ok(request) => request,
        Err(error) => return error_response(error),
    };

    match pipeline
        .recommend(&JobId(job_id), &business_id, request)
        .await
    {
        Ok(recommendations) => (
            StatusCode::OK,
            Json(json!({ "recommendations": recommendations })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn suggestion_handler(
    State(pipeline): State<Arc<ReviewPipeline>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let business_id = match business_identity(&headers) {
        Ok(business_id) => business_id,
        Err(error) => return error_response(error),
    };
    let request: SuggestionRequest = match optional_body(&body) {
        Ok(request) => request,
        Err(error) => return error_response(error),
    };

    match pipeline
        .suggest(&ApplicationId(application_id), &business_id, request.hints)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}
