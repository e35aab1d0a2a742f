use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::domain::{
    ApplicationDocument, DocumentId, DocumentStatus, ExtractedMetadata, ScoringHints, StatusUpdate,
};
use super::location::file_extension;
use super::registry::DocumentRegistry;
use super::repository::RepositoryError;
use super::scoring::{ScoringEngine, ScoringResult};
use super::storage::{ObjectStore, StorageError};

const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "log"];

/// How the text of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PlainText,
    /// Placeholder text; a dedicated PDF extractor may overwrite it later.
    PdfStub,
    BinaryStub,
}

impl ExtractionMethod {
    pub fn for_extension(extension: Option<&str>) -> Self {
        match extension {
            Some(ext) if PLAIN_TEXT_EXTENSIONS.contains(&ext) => Self::PlainText,
            Some("pdf") => Self::PdfStub,
            _ => Self::BinaryStub,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::PlainText => "plain_text",
            ExtractionMethod::PdfStub => "pdf_stub",
            ExtractionMethod::BinaryStub => "binary_stub",
        }
    }
}

/// Text derived from a downloaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub method: ExtractionMethod,
    pub extension: Option<String>,
    pub byte_size: usize,
}

/// Classifies by file extension and derives text. Only plain-text formats are decoded.
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<Extraction, String> {
    let extension = file_extension(file_name);
    let method = ExtractionMethod::for_extension(extension.as_deref());

    let text = match method {
        ExtractionMethod::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|err| format!("{file_name} is not valid UTF-8: {err}"))?,
        ExtractionMethod::PdfStub => format!(
            "[PDF document {file_name}: {} bytes stored, text extraction pending]",
            bytes.len()
        ),
        ExtractionMethod::BinaryStub => format!(
            "[{} document {file_name}: {} bytes stored, text extraction not supported]",
            extension.as_deref().unwrap_or("unknown"),
            bytes.len()
        ),
    };

    Ok(Extraction {
        text,
        method,
        extension,
        byte_size: bytes.len(),
    })
}

/// Result of one worker invocation that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// No pending document could be claimed.
    Idle,
    Processed {
        document: ApplicationDocument,
        method: ExtractionMethod,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Registry(#[from] RepositoryError),
    #[error("download failed for document {document_id}: {source}")]
    Download {
        document_id: DocumentId,
        #[source]
        source: StorageError,
    },
    #[error("text extraction failed for document {document_id}: {reason}")]
    Decode {
        document_id: DocumentId,
        reason: String,
    },
}

impl ExtractionError {
    fn failure_reason(&self) -> String {
        match self {
            ExtractionError::Download { source, .. } => format!("download failed: {source}"),
            ExtractionError::Decode { reason, .. } => format!("decode failed: {reason}"),
            ExtractionError::Registry(err) => err.to_string(),
        }
    }
}

/// Single-shot consumer of the pending document queue.
///
/// Each call claims at most one document. Cadence comes from whoever invokes it.
pub struct ExtractionWorker {
    registry: Arc<DocumentRegistry>,
    store: Arc<dyn ObjectStore>,
    scoring: Arc<ScoringEngine>,
    claim_attempts: usize,
}

impl ExtractionWorker {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        store: Arc<dyn ObjectStore>,
        scoring: Arc<ScoringEngine>,
        claim_attempts: usize,
    ) -> Self {
        Self {
            registry,
            store,
            scoring,
            claim_attempts: claim_attempts.max(1),
        }
    }

    pub async fn process_next(&self) -> Result<ExtractionOutcome, ExtractionError> {
        for _ in 0..self.claim_attempts {
            let Some(candidate) = self.registry.fetch_next_pending()? else {
                debug!("no pending documents");
                return Ok(ExtractionOutcome::Idle);
            };

            match self.registry.claim(&candidate.id)? {
                Some(document) => return self.process(document).await,
                None => debug!(document_id = %candidate.id, "document claimed elsewhere"),
            }
        }

        warn!(
            attempts = self.claim_attempts,
            "gave up claiming after repeated contention"
        );
        Ok(ExtractionOutcome::Idle)
    }

    async fn process(
        &self,
        document: ApplicationDocument,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        info!(
            document_id = %document.id,
            application_id = %document.application_id,
            "extracting document"
        );

        let extraction = match self.extract(&document).await {
            Ok(extraction) => extraction,
            Err(err) => {
                self.mark_failed(&document, &err);
                return Err(err);
            }
        };

        let now = Utc::now();
        let mut metadata = ExtractedMetadata::new()
            .with(
                ExtractedMetadata::EXTRACTION_METHOD,
                extraction.method.label(),
            )
            .with_timestamp(ExtractedMetadata::PROCESSING_COMPLETED_AT, now);
        if let Some(extension) = &extraction.extension {
            metadata.insert(ExtractedMetadata::FILE_EXTENSION, extension.as_str());
        }
        metadata.insert(ExtractedMetadata::BYTE_SIZE, extraction.byte_size);

        let completed = self.registry.mark_status(
            &document.id,
            DocumentStatus::Processing,
            StatusUpdate::new(DocumentStatus::Completed, metadata, now)
                .with_text(extraction.text, now),
        )?;
        info!(
            document_id = %completed.id,
            method = extraction.method.label(),
            "document extraction completed"
        );

        match self
            .scoring
            .suggest(&completed.application_id, ScoringHints::default())
            .await
        {
            ScoringResult::Success { suggestion } => info!(
                application_id = %completed.application_id,
                rating = suggestion.rating,
                "scoring refreshed after extraction"
            ),
            ScoringResult::Failure { reason } => warn!(
                application_id = %completed.application_id,
                %reason,
                "scoring after extraction failed; document stays completed"
            ),
        }

        Ok(ExtractionOutcome::Processed {
            document: completed,
            method: extraction.method,
        })
    }

    async fn extract(&self, document: &ApplicationDocument) -> Result<Extraction, ExtractionError> {
        let bytes = self
            .store
            .download(&document.storage_bucket, &document.storage_path)
            .await
            .map_err(|source| ExtractionError::Download {
                document_id: document.id.clone(),
                source,
            })?;

        extract_text(document.file_name(), &bytes).map_err(|reason| ExtractionError::Decode {
            document_id: document.id.clone(),
            reason,
        })
    }

    fn mark_failed(&self, document: &ApplicationDocument, err: &ExtractionError) {
        let now = Utc::now();
        let metadata = ExtractedMetadata::new()
            .with(ExtractedMetadata::FAILURE_REASON, err.failure_reason())
            .with_timestamp(ExtractedMetadata::FAILED_AT, now);

        match self.registry.mark_status(
            &document.id,
            DocumentStatus::Processing,
            StatusUpdate::new(DocumentStatus::Failed, metadata, now),
        ) {
            Ok(_) => error!(document_id = %document.id, error = %err, "document extraction failed"),
            Err(write_err) => error!(
                document_id = %document.id,
                error = %err,
                %write_err,
                "document extraction failed and the failure could not be recorded"
            ),
        }
    }
}
