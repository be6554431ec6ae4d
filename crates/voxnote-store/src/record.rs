use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use voxnote_core::ids::RecordingId;

use crate::error::StoreError;

/// A stored transcription and its (optional) summary.
///
/// Columns other than `id` and `transcription` are optional so rows written
/// by other clients of a shared table still load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: RecordingId,
    pub transcription: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields supplied when creating a record; id and timestamps are assigned by
/// the store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewRecording {
    pub transcription: String,
    pub summary: Option<String>,
    pub duration_seconds: Option<f64>,
    pub file_name: Option<String>,
}

/// Persistence for recordings, keyed by [`RecordingId`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn insert(&self, new: NewRecording) -> Result<Recording, StoreError>;

    /// Fails with [`StoreError::NotFound`] for an unknown id.
    async fn get(&self, id: &RecordingId) -> Result<Recording, StoreError>;

    /// Replace the summary (possibly with null) and return the updated row.
    async fn update_summary(
        &self,
        id: &RecordingId,
        summary: Option<&str>,
    ) -> Result<Recording, StoreError>;
}
