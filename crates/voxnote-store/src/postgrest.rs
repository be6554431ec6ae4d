use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, instrument};

use voxnote_core::ids::RecordingId;
use voxnote_core::security::ApiToken;

use crate::error::StoreError;
use crate::record::{NewRecording, RecordStore, Recording};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Columns sent on insert. Only those the shared table is known to have.
#[derive(Serialize)]
struct InsertRow<'a> {
    transcription: &'a str,
    summary: Option<&'a str>,
}

#[derive(Serialize)]
struct SummaryPatch<'a> {
    summary: Option<&'a str>,
}

/// Recordings table behind a PostgREST API (Supabase `/rest/v1`).
pub struct PostgrestRecordStore {
    client: Client,
    table_url: String,
    key: ApiToken,
}

impl PostgrestRecordStore {
    pub fn new(base_url: &str, key: ApiToken, table: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Transport(format!("build client: {e}")))?;
        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/{table}", base_url.trim_end_matches('/')),
            key,
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", self.key.expose())
            .bearer_auth(self.key.expose())
    }

    fn by_id(&self, req: RequestBuilder, id: &RecordingId) -> RequestBuilder {
        req.query(&[("id", format!("eq.{id}"))])
    }

    /// Read a row array, failing on non-2xx statuses.
    async fn rows(response: Response) -> Result<Vec<Recording>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn first(rows: Vec<Recording>, id: &RecordingId) -> Result<Recording, StoreError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("recording {id}")))
    }
}

#[async_trait]
impl RecordStore for PostgrestRecordStore {
    fn backend(&self) -> &'static str {
        "postgrest"
    }

    #[instrument(skip_all)]
    async fn insert(&self, new: NewRecording) -> Result<Recording, StoreError> {
        let row = InsertRow {
            transcription: &new.transcription,
            summary: new.summary.as_deref(),
        };
        let response = self
            .authed(self.client.post(&self.table_url))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let created = Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Serialization("insert returned no rows".into()))?;
        debug!(recording_id = %created.id, "recording inserted");
        Ok(created)
    }

    #[instrument(skip(self), fields(recording_id = %id))]
    async fn get(&self, id: &RecordingId) -> Result<Recording, StoreError> {
        let req = self.by_id(self.client.get(&self.table_url), id);
        let response = self.authed(req).query(&[("select", "*")]).send().await?;
        Self::first(Self::rows(response).await?, id)
    }

    #[instrument(skip(self, summary), fields(recording_id = %id))]
    async fn update_summary(
        &self,
        id: &RecordingId,
        summary: Option<&str>,
    ) -> Result<Recording, StoreError> {
        let req = self.by_id(self.client.patch(&self.table_url), id);
        let response = self
            .authed(req)
            .header("Prefer", "return=representation")
            .json(&SummaryPatch { summary })
            .send()
            .await?;
        Self::first(Self::rows(response).await?, id)
    }
}
