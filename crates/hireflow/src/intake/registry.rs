use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::FailedDocumentPolicy;

use super::domain::{
    ApplicationDocument, ApplicationId, DocumentDraft, DocumentId, DocumentStatus,
    ExtractedMetadata, StatusUpdate,
};
use super::location::StorageLocation;
use super::repository::{DocumentRepository, RepositoryError};

const DEFAULT_DOCUMENT_TYPE: &str = "cv";

/// Outcome of registering an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Registered(ApplicationDocument),
    /// The URL was absent or not a public object URL; nothing was written.
    Skipped,
}

/// Front door to the document table: registration, work claiming and status writes.
pub struct DocumentRegistry {
    documents: Arc<dyn DocumentRepository>,
    failed_documents: FailedDocumentPolicy,
}

impl DocumentRegistry {
    pub fn new(documents: Arc<dyn DocumentRepository>, failed_documents: FailedDocumentPolicy) -> Self {
        Self {
            documents,
            failed_documents,
        }
    }

    pub fn register_document(
        &self,
        application_id: &ApplicationId,
        public_url: Option<&str>,
        document_type: Option<&str>,
    ) -> Result<Registration, RepositoryError> {
        let Some(url) = public_url.map(str::trim).filter(|url| !url.is_empty()) else {
            info!(%application_id, "no document url supplied, skipping registration");
            return Ok(Registration::Skipped);
        };

        let Some(location) = StorageLocation::from_public_url(url) else {
            warn!(%application_id, url, "document url is not a public object url, skipping");
            return Ok(Registration::Skipped);
        };

        let document_type = document_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_TYPE);

        let draft = DocumentDraft {
            application_id: application_id.clone(),
            storage_bucket: location.bucket,
            storage_path: location.path,
            document_type: document_type.to_string(),
        };

        let document = self.documents.upsert(draft, Utc::now())?;
        info!(
            document_id = %document.id,
            %application_id,
            bucket = %document.storage_bucket,
            path = %document.storage_path,
            "document registered for extraction"
        );
        Ok(Registration::Registered(document))
    }

    /// Oldest pending document, if any.
    pub fn fetch_next_pending(&self) -> Result<Option<ApplicationDocument>, RepositoryError> {
        self.documents.next_pending()
    }

    /// Moves a pending document to `processing` unless another caller got there first.
    pub fn claim(&self, id: &DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError> {
        let now = Utc::now();
        let metadata =
            ExtractedMetadata::new().with_timestamp(ExtractedMetadata::PROCESSING_STARTED_AT, now);
        self.documents.claim(id, metadata, now)
    }

    /// Applies a forward status move, merging `metadata` into the stored map.
    pub fn mark_status(
        &self,
        id: &DocumentId,
        from: DocumentStatus,
        update: StatusUpdate,
    ) -> Result<ApplicationDocument, RepositoryError> {
        if !from.can_advance_to(update.status) {
            return Err(RepositoryError::DisallowedTransition {
                from,
                to: update.status,
            });
        }
        self.documents.update_status(id, from, update)
    }

    /// Operator action moving a failed document back to `pending`.
    pub fn reset_failed(&self, id: &DocumentId) -> Result<ApplicationDocument, ResetError> {
        if self.failed_documents == FailedDocumentPolicy::Terminal {
            return Err(ResetError::Disabled);
        }

        let document = self.documents.fetch(id)?.ok_or(ResetError::NotFound)?;
        if document.status != DocumentStatus::Failed {
            return Err(ResetError::NotFailed(document.status));
        }

        let now = Utc::now();
        let resets = document
            .extracted_metadata
            .get(ExtractedMetadata::RESET_COUNT)
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        let metadata = ExtractedMetadata::new()
            .with_timestamp(ExtractedMetadata::RESET_AT, now)
            .with(ExtractedMetadata::RESET_COUNT, resets + 1);

        let document = self
            .documents
            .update_status(
                id,
                DocumentStatus::Failed,
                StatusUpdate::new(DocumentStatus::Pending, metadata, now),
            )
            .map_err(|err| match err {
                RepositoryError::InvalidTransition { actual, .. } => ResetError::NotFailed(actual),
                other => ResetError::Repository(other),
            })?;

        info!(document_id = %id, resets = resets + 1, "failed document reset to pending");
        Ok(document)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("failed documents are terminal under the configured policy")]
    Disabled,
    #[error("document not found")]
    NotFound,
    #[error("document is {0}, only failed documents can be reset")]
    NotFailed(DocumentStatus),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
