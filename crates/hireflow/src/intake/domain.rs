use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of an uploaded application document.
    DocumentId
);
string_id!(
    /// Identifier of a job seeker's application.
    ApplicationId
);
string_id!(JobId);
string_id!(BusinessId);

impl DocumentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Processing state of an [`ApplicationDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    /// Forward moves the extraction worker is allowed to make.
    pub fn can_advance_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Pending, DocumentStatus::Processing)
                | (DocumentStatus::Processing, DocumentStatus::Completed)
                | (DocumentStatus::Processing, DocumentStatus::Failed)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Open key/value annotations attached to a document during extraction.
///
/// Updates are always merged into the existing map; keys are never dropped by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedMetadata(BTreeMap<String, Value>);

impl ExtractedMetadata {
    pub const EXTRACTION_METHOD: &'static str = "extraction_method";
    pub const PROCESSING_STARTED_AT: &'static str = "processing_started_at";
    pub const PROCESSING_COMPLETED_AT: &'static str = "processing_completed_at";
    pub const FAILURE_REASON: &'static str = "failure_reason";
    pub const FAILED_AT: &'static str = "failed_at";
    pub const FILE_EXTENSION: &'static str = "file_extension";
    pub const BYTE_SIZE: &'static str = "byte_size";
    pub const RESET_AT: &'static str = "reset_at";
    pub const RESET_COUNT: &'static str = "reset_count";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_timestamp(self, key: &str, at: DateTime<Utc>) -> Self {
        self.with(key, at.to_rfc3339())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn merge(&mut self, other: ExtractedMetadata) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// One uploaded file attached to an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    pub storage_bucket: String,
    pub storage_path: String,
    pub document_type: String,
    pub status: DocumentStatus,
    pub extracted_text: Option<String>,
    pub extracted_metadata: ExtractedMetadata,
    pub extracted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationDocument {
    /// File name portion of the storage path.
    pub fn file_name(&self) -> &str {
        self.storage_path
            .rsplit('/')
            .next()
            .unwrap_or(self.storage_path.as_str())
    }
}

/// Columns supplied when a document is registered; the registry upserts on
/// `(application_id, storage_bucket, storage_path)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDraft {
    pub application_id: ApplicationId,
    pub storage_bucket: String,
    pub storage_path: String,
    pub document_type: String,
}

/// Status write applied by the extraction worker or an operator.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: DocumentStatus,
    pub metadata: ExtractedMetadata,
    pub extracted_text: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(status: DocumentStatus, metadata: ExtractedMetadata, at: DateTime<Utc>) -> Self {
        Self {
            status,
            metadata,
            extracted_text: None,
            extracted_at: None,
            updated_at: at,
        }
    }

    pub fn with_text(mut self, text: String, extracted_at: DateTime<Utc>) -> Self {
        self.extracted_text = Some(text);
        self.extracted_at = Some(extracted_at);
        self
    }
}

/// Job posting as seen by this pipeline; owned by the listings subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub business_id: BusinessId,
    pub title: String,
    pub description: String,
}

/// Application as seen by this pipeline; owned by the applications subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub applicant_name: String,
    pub applicant_email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

/// Human and model assessments of one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationReview {
    pub application_id: ApplicationId,
    pub rating: Option<f64>,
    pub ai_rating: Option<f64>,
    pub ai_summary: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Resume cursor of a business working through a job's applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessReviewProgress {
    pub job_id: JobId,
    pub business_id: BusinessId,
    pub last_reviewed_application_id: Option<ApplicationId>,
    pub reviewed_count: usize,
    pub total_applications: usize,
    pub updated_at: DateTime<Utc>,
}

/// Optional preferences forwarded to the scoring model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethnicity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl ScoringHints {
    /// Drops blank values and the `any` wildcard, which both mean "no preference".
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty() && !raw.eq_ignore_ascii_case("any"))
        }

        Self {
            age: keep(self.age),
            ethnicity: keep(self.ethnicity),
            gender: keep(self.gender),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.ethnicity.is_none() && self.gender.is_none()
    }
}
