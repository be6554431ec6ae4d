use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::instrument;

use voxnote_core::ids::RecordingId;

use crate::database::Database;
use crate::error::StoreError;
use crate::record::{NewRecording, RecordStore, Recording};

const SELECT_COLUMNS: &str =
    "SELECT id, transcription, summary, duration_seconds, file_name, created_at, updated_at FROM recordings";

/// Recordings in a local SQLite file.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Database,
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("timestamp {raw:?}: {e}")))
}

/// Raw column values, converted once the row borrow ends.
struct RawRow {
    id: String,
    transcription: String,
    summary: Option<String>,
    duration_seconds: Option<f64>,
    file_name: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            transcription: row.get(1)?,
            summary: row.get(2)?,
            duration_seconds: row.get(3)?,
            file_name: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_recording(self) -> Result<Recording, StoreError> {
        Ok(Recording {
            id: RecordingId::from_raw(self.id),
            transcription: self.transcription,
            summary: self.summary,
            duration_seconds: self.duration_seconds,
            file_name: self.file_name,
            created_at: Some(parse_time(&self.created_at)?),
            updated_at: Some(parse_time(&self.updated_at)?),
        })
    }
}

fn fetch(conn: &Connection, id: &RecordingId) -> Result<Recording, StoreError> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
        [id.as_str()],
        RawRow::from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("recording {id}")))?
    .into_recording()
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, new), fields(chars = new.transcription.len()))]
    pub fn insert_blocking(&self, new: NewRecording) -> Result<Recording, StoreError> {
        let id = RecordingId::new();
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO recordings (id, transcription, summary, duration_seconds, file_name, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.as_str(),
                    new.transcription,
                    new.summary,
                    new.duration_seconds,
                    new.file_name,
                    now
                ],
            )?;
            fetch(conn, &id)
        })
    }

    #[instrument(skip(self), fields(recording_id = %id))]
    pub fn get_blocking(&self, id: &RecordingId) -> Result<Recording, StoreError> {
        self.db.with_conn(|conn| fetch(conn, id))
    }

    #[instrument(skip(self, summary), fields(recording_id = %id))]
    pub fn update_summary_blocking(
        &self,
        id: &RecordingId,
        summary: Option<&str>,
    ) -> Result<Recording, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE recordings SET summary = ?1, updated_at = ?2 WHERE id = ?3",
                params![summary, now, id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("recording {id}")));
            }
            fetch(conn, id)
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(SqliteRecordStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StoreError::Database(format!("blocking task: {e}")))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, new: NewRecording) -> Result<Recording, StoreError> {
        self.blocking(move |s| s.insert_blocking(new)).await
    }

    async fn get(&self, id: &RecordingId) -> Result<Recording, StoreError> {
        let id = id.clone();
        self.blocking(move |s| s.get_blocking(&id)).await
    }

    async fn update_summary(
        &self,
        id: &RecordingId,
        summary: Option<&str>,
    ) -> Result<Recording, StoreError> {
        let id = id.clone();
        let summary = summary.map(str::to_owned);
        self.blocking(move |s| s.update_summary_blocking(&id, summary.as_deref()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteRecordStore {
        SqliteRecordStore::new(Database::in_memory().unwrap())
    }

    fn sample() -> NewRecording {
        NewRecording {
            transcription: "we discussed the launch plan".into(),
            summary: Some("Launch plan.".into()),
            duration_seconds: Some(12.5),
            file_name: Some("memo.wav".into()),
        }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let s = store();
        let created = s.insert(sample()).await.unwrap();
        let loaded = s.get(&created.id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.summary.as_deref(), Some("Launch plan."));
        assert_eq!(loaded.duration_seconds, Some(12.5));
        assert!(loaded.created_at.is_some());
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let err = store().get(&RecordingId::from_raw("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_then_get_returns_new_summary() {
        let s = store();
        let created = s.insert(sample()).await.unwrap();
        let updated = s
            .update_summary(&created.id, Some("Revised summary."))
            .await
            .unwrap();
        assert_eq!(updated.summary.as_deref(), Some("Revised summary."));
        assert!(updated.updated_at >= created.updated_at);

        let loaded = s.get(&created.id).await.unwrap();
        assert_eq!(loaded.summary.as_deref(), Some("Revised summary."));
        assert_eq!(loaded.transcription, created.transcription);
    }

    #[tokio::test]
    async fn update_to_null_clears_summary() {
        let s = store();
        let created = s.insert(sample()).await.unwrap();
        let updated = s.update_summary(&created.id, None).await.unwrap();
        assert_eq!(updated.summary, None);
    }

    #[tokio::test]
    async fn update_unknown_is_not_found() {
        let err = store()
            .update_summary(&RecordingId::from_raw("missing"), Some("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn backend_name() {
        assert_eq!(store().backend(), "sqlite");
    }
}
