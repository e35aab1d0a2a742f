//! In-process collaborators used by the service binary, the demo and the tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationDocument, ApplicationId, ApplicationReview, ApplicationSummary, BusinessId,
    BusinessReviewProgress, DocumentDraft, DocumentId, DocumentStatus, ExtractedMetadata, JobId,
    JobPosting, StatusUpdate,
};
use super::repository::{
    ApplicationDirectory, DocumentRepository, ProgressRepository, RepositoryError,
    ReviewRepository,
};
use super::storage::{ObjectStore, StorageError};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default)]
struct DocumentTable {
    rows: HashMap<DocumentId, (u64, ApplicationDocument)>,
    sequence: u64,
}

impl DocumentTable {
    fn store(&mut self, document: ApplicationDocument) {
        self.sequence += 1;
        let sequence = self.sequence;
        self.rows.insert(document.id.clone(), (sequence, document));
    }

    fn ordered(&self) -> Vec<&(u64, ApplicationDocument)> {
        let mut rows: Vec<_> = self.rows.values().collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            a.created_at.cmp(&b.created_at).then(seq_a.cmp(seq_b))
        });
        rows
    }
}

/// Document table with the uniqueness and conditional-update semantics of the real schema.
/// Rows created in the same instant keep insertion order.
#[derive(Default, Clone)]
pub struct MemoryDocumentRepository {
    table: Arc<Mutex<DocumentTable>>,
}

impl MemoryDocumentRepository {
    /// Stores a row verbatim, bypassing the upsert key.
    pub fn seed(&self, document: ApplicationDocument) -> Result<(), RepositoryError> {
        lock(&self.table)?.store(document);
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<ApplicationDocument>, RepositoryError> {
        let table = lock(&self.table)?;
        Ok(table
            .ordered()
            .into_iter()
            .map(|(_, document)| document.clone())
            .collect())
    }
}

impl DocumentRepository for MemoryDocumentRepository {
    fn upsert(
        &self,
        draft: DocumentDraft,
        at: DateTime<Utc>,
    ) -> Result<ApplicationDocument, RepositoryError> {
        let mut table = lock(&self.table)?;
        let existing = table.rows.values_mut().find(|(_, row)| {
            row.application_id == draft.application_id
                && row.storage_bucket == draft.storage_bucket
                && row.storage_path == draft.storage_path
        });

        if let Some((_, row)) = existing {
            row.document_type = draft.document_type;
            // A claimed row stays with its worker; only idle rows are queued again.
            if row.status != DocumentStatus::Processing {
                row.status = DocumentStatus::Pending;
            }
            row.updated_at = at;
            return Ok(row.clone());
        }

        let document = ApplicationDocument {
            id: DocumentId::generate(),
            application_id: draft.application_id,
            storage_bucket: draft.storage_bucket,
            storage_path: draft.storage_path,
            document_type: draft.document_type,
            status: DocumentStatus::Pending,
            extracted_text: None,
            extracted_metadata: ExtractedMetadata::new(),
            extracted_at: None,
            created_at: at,
            updated_at: at,
        };
        table.store(document.clone());
        Ok(document)
    }

    fn next_pending(&self) -> Result<Option<ApplicationDocument>, RepositoryError> {
        let table = lock(&self.table)?;
        Ok(table
            .ordered()
            .into_iter()
            .map(|(_, document)| document)
            .find(|document| document.status == DocumentStatus::Pending)
            .cloned())
    }

    fn claim(
        &self,
        id: &DocumentId,
        metadata: ExtractedMetadata,
        at: DateTime<Utc>,
    ) -> Result<Option<ApplicationDocument>, RepositoryError> {
        let mut table = lock(&self.table)?;
        match table.rows.get_mut(id) {
            Some((_, row)) if row.status == DocumentStatus::Pending => {
                row.status = DocumentStatus::Processing;
                row.extracted_metadata.merge(metadata);
                row.updated_at = at;
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    fn update_status(
        &self,
        id: &DocumentId,
        expected: DocumentStatus,
        update: StatusUpdate,
    ) -> Result<ApplicationDocument, RepositoryError> {
        let mut table = lock(&self.table)?;
        let (_, row) = table.rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if row.status != expected {
            return Err(RepositoryError::InvalidTransition {
                expected,
                actual: row.status,
            });
        }

        row.status = update.status;
        row.extracted_metadata.merge(update.metadata);
        if let Some(text) = update.extracted_text {
            row.extracted_text = Some(text);
        }
        if let Some(extracted_at) = update.extracted_at {
            row.extracted_at = Some(extracted_at);
        }
        row.updated_at = update.updated_at;
        Ok(row.clone())
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError> {
        let table = lock(&self.table)?;
        Ok(table.rows.get(id).map(|(_, document)| document.clone()))
    }

    fn for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError> {
        let table = lock(&self.table)?;
        Ok(table
            .ordered()
            .into_iter()
            .map(|(_, document)| document)
            .filter(|document| &document.application_id == application_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct Directory {
    jobs: HashMap<JobId, JobPosting>,
    applications: HashMap<ApplicationId, ApplicationSummary>,
}

/// Jobs and applications normally served by the listings and applications subsystems.
#[derive(Default, Clone)]
pub struct MemoryApplicationDirectory {
    inner: Arc<Mutex<Directory>>,
}

impl MemoryApplicationDirectory {
    pub fn add_job(&self, job: JobPosting) -> Result<(), RepositoryError> {
        lock(&self.inner)?.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn add_application(&self, application: ApplicationSummary) -> Result<(), RepositoryError> {
        lock(&self.inner)?
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }
}

impl ApplicationDirectory for MemoryApplicationDirectory {
    fn job(&self, job_id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        Ok(lock(&self.inner)?.jobs.get(job_id).cloned())
    }

    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationSummary>, RepositoryError> {
        Ok(lock(&self.inner)?.applications.get(id).cloned())
    }

    fn applications_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<ApplicationSummary>, RepositoryError> {
        Ok(lock(&self.inner)?
            .applications
            .values()
            .filter(|application| &application.job_id == job_id)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct MemoryReviewRepository {
    rows: Arc<Mutex<HashMap<ApplicationId, ApplicationReview>>>,
}

impl MemoryReviewRepository {
    fn merge<F>(
        &self,
        application_id: &ApplicationId,
        at: DateTime<Utc>,
        apply: F,
    ) -> Result<ApplicationReview, RepositoryError>
    where
        F: FnOnce(&mut ApplicationReview),
    {
        let mut rows = lock(&self.rows)?;
        let row = rows
            .entry(application_id.clone())
            .or_insert_with(|| ApplicationReview {
                application_id: application_id.clone(),
                rating: None,
                ai_rating: None,
                ai_summary: None,
                updated_at: at,
            });
        apply(row);
        row.updated_at = at;
        Ok(row.clone())
    }
}

impl ReviewRepository for MemoryReviewRepository {
    fn upsert_ai_suggestion(
        &self,
        application_id: &ApplicationId,
        ai_rating: f64,
        ai_summary: &str,
        at: DateTime<Utc>,
    ) -> Result<ApplicationReview, RepositoryError> {
        self.merge(application_id, at, |row| {
            row.ai_rating = Some(ai_rating);
            row.ai_summary = Some(ai_summary.to_string());
        })
    }

    fn upsert_manual_rating(
        &self,
        application_id: &ApplicationId,
        rating: f64,
        at: DateTime<Utc>,
    ) -> Result<ApplicationReview, RepositoryError> {
        self.merge(application_id, at, |row| row.rating = Some(rating))
    }

    fn fetch(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationReview>, RepositoryError> {
        Ok(lock(&self.rows)?.get(application_id).cloned())
    }
}

#[derive(Default, Clone)]
pub struct MemoryProgressRepository {
    rows: Arc<Mutex<HashMap<(JobId, BusinessId), BusinessReviewProgress>>>,
}

impl ProgressRepository for MemoryProgressRepository {
    fn fetch(
        &self,
        job_id: &JobId,
        business_id: &BusinessId,
    ) -> Result<Option<BusinessReviewProgress>, RepositoryError> {
        Ok(lock(&self.rows)?
            .get(&(job_id.clone(), business_id.clone()))
            .cloned())
    }

    fn upsert(
        &self,
        progress: BusinessReviewProgress,
    ) -> Result<BusinessReviewProgress, RepositoryError> {
        let key = (progress.job_id.clone(), progress.business_id.clone());
        lock(&self.rows)?.insert(key, progress.clone());
        Ok(progress)
    }
}

/// Bucket/path keyed blobs. Missing objects surface as [`StorageError::NotFound`].
#[derive(Default, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn put(&self, bucket: &str, path: &str, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert((bucket.to_string(), path.to_string()), bytes.into());
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Transport("in-memory store poisoned".to_string()))?;
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(path: &str) -> DocumentDraft {
        DocumentDraft {
            application_id: ApplicationId::from("app-1"),
            storage_bucket: "resumes".to_string(),
            storage_path: path.to_string(),
            document_type: "cv".to_string(),
        }
    }

    #[test]
    fn claim_only_succeeds_once() {
        let repository = MemoryDocumentRepository::default();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let document = repository.upsert(draft("a.txt"), at).expect("upsert");

        let first = repository
            .claim(&document.id, ExtractedMetadata::new(), at)
            .expect("claim");
        let second = repository
            .claim(&document.id, ExtractedMetadata::new(), at)
            .expect("claim");

        assert_eq!(first.map(|row| row.status), Some(DocumentStatus::Processing));
        assert!(second.is_none());
    }

    #[test]
    fn update_status_rejects_unexpected_state() {
        let repository = MemoryDocumentRepository::default();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let document = repository.upsert(draft("a.txt"), at).expect("upsert");

        let result = repository.update_status(
            &document.id,
            DocumentStatus::Processing,
            StatusUpdate::new(DocumentStatus::Completed, ExtractedMetadata::new(), at),
        );

        assert!(matches!(
            result,
            Err(RepositoryError::InvalidTransition {
                expected: DocumentStatus::Processing,
                actual: DocumentStatus::Pending,
            })
        ));
    }

    #[test]
    fn review_writers_do_not_clobber_each_other() {
        let reviews = MemoryReviewRepository::default();
        let id = ApplicationId::from("app-1");
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();

        reviews.upsert_manual_rating(&id, 4.0, at).expect("manual");
        reviews
            .upsert_ai_suggestion(&id, 7.5, "strong backend experience", at)
            .expect("ai");
        let row = reviews.upsert_manual_rating(&id, 5.0, at).expect("manual");

        assert_eq!(row.rating, Some(5.0));
        assert_eq!(row.ai_rating, Some(7.5));
        assert_eq!(row.ai_summary.as_deref(), Some("strong backend experience"));
    }

    #[tokio::test]
    async fn object_store_reports_missing_objects() {
        let store = MemoryObjectStore::default();
        store.put("resumes", "a.txt", "hello");

        assert_eq!(
            store.download("resumes", "a.txt").await.expect("present"),
            b"hello".to_vec()
        );
        assert!(matches!(
            store.download("resumes", "b.txt").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
