use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use voxnote_core::ids::RecordingId;
use voxnote_core::text::preview;
use voxnote_store::NewRecording;

use crate::error::ApiError;
use crate::server::AppState;

/// Multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

pub const DEFAULT_TEST_TEXT: &str =
    "This is a test transcription to check if the summarization service is working correctly.";

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub success: bool,
    pub transcription: String,
    pub summary: Option<String>,
    /// Seconds of decoded audio.
    pub duration: f64,
    pub recording_id: Option<RecordingId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegenerateResponse {
    pub success: bool,
    pub summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TestSummaryRequest {
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub summarizer: bool,
    pub summary_attempts: u64,
}

struct Upload {
    bytes: Bytes,
    mime_type: String,
    file_name: Option<String>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("Upload too large: {}", e.body_text()))
    } else {
        ApiError::BadRequest(format!("Failed to read multipart: {}", e.body_text()))
    }
}

async fn read_audio_field(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    loop {
        let field = multipart.next_field().await.map_err(multipart_error)?;
        let Some(field) = field else {
            return Err(ApiError::BadRequest("No file uploaded".into()));
        };
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            bytes,
            mime_type,
            file_name,
        });
    }
}

/// `POST /transcribe`
#[instrument(skip_all)]
pub async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let upload = read_audio_field(&mut multipart).await?;
    info!(
        file_name = upload.file_name.as_deref().unwrap_or("-"),
        mime_type = %upload.mime_type,
        bytes = upload.bytes.len(),
        "upload received"
    );

    let result = state
        .transcriber
        .transcribe(&upload.bytes, &upload.mime_type)
        .await
        .map_err(|e| ApiError::Internal(format!("Transcription failed: {e}")))?;
    debug!(preview = %preview(&result.text, 100), "transcript");

    let summary = match &state.summarizer {
        None => {
            warn!("summarizer not configured, skipping summary");
            None
        }
        Some(_) if result.text.trim().is_empty() => {
            warn!("empty transcription, skipping summary");
            None
        }
        Some(summarizer) => summarizer.summarize(&result.text).await,
    };

    let new = NewRecording {
        transcription: result.text.clone(),
        summary: summary.clone(),
        duration_seconds: Some(result.duration_seconds),
        file_name: upload.file_name,
    };
    let recording_id = match state.store.insert(new).await {
        Ok(rec) => Some(rec.id),
        Err(e) => {
            warn!(error = %e, backend = state.store.backend(), "failed to persist recording");
            None
        }
    };

    Ok(Json(TranscribeResponse {
        success: true,
        transcription: result.text,
        summary,
        duration: result.duration_seconds,
        recording_id,
    }))
}

/// `POST /regenerate-summary/{recording_id}`
#[instrument(skip_all)]
pub async fn regenerate_summary(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> Result<Json<RegenerateResponse>, ApiError> {
    let id = RecordingId::from_raw(recording_id);
    let recording = state.store.get(&id).await?;

    let Some(summarizer) = &state.summarizer else {
        return Err(ApiError::Internal("Summarizer not available".into()));
    };

    let summary = summarizer.summarize(&recording.transcription).await;
    let updated = state.store.update_summary(&id, summary.as_deref()).await?;
    info!(recording_id = %id, has_summary = updated.summary.is_some(), "summary regenerated");

    Ok(Json(RegenerateResponse {
        success: true,
        summary: updated.summary,
    }))
}

/// `POST /test-summary`
///
/// Always answers 200; problems are reported in the body.
pub async fn test_summary(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        TestSummaryRequest::default()
    } else {
        match serde_json::from_slice::<TestSummaryRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                return Json(serde_json::json!({ "success": false, "error": e.to_string() }));
            }
        }
    };
    let text = request.text.unwrap_or_else(|| DEFAULT_TEST_TEXT.to_string());
    debug!(preview = %preview(&text, 100), "test summary");

    let Some(summarizer) = &state.summarizer else {
        return Json(serde_json::json!({
            "success": false,
            "error": "Summarizer not initialized",
        }));
    };

    let summary = summarizer.summarize(&text).await;
    Json(serde_json::json!({
        "success": true,
        "original_text": text,
        "summary": summary,
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        summarizer: state.summarizer.is_some(),
        summary_attempts: state
            .summarizer
            .as_ref()
            .map_or(0, |s| s.total_attempts()),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use voxnote_core::summary::Summarizer;
    use voxnote_store::{Database, RecordStore, SqliteRecordStore};
    use voxnote_summarizer::mock::StaticSummarizer;

    use super::*;
    use crate::server::build_router;

    struct NoTranscriber;

    #[async_trait::async_trait]
    impl voxnote_core::Transcriber for NoTranscriber {
        async fn transcribe(
            &self,
            _audio: &[u8],
            _mime_type: &str,
        ) -> Result<voxnote_core::TranscriptionResult, voxnote_core::TranscriptionError> {
            Err(voxnote_core::TranscriptionError::Inference("unused".into()))
        }
    }

    fn state(summarizer: Option<Arc<dyn Summarizer>>) -> (AppState, SqliteRecordStore) {
        let store = SqliteRecordStore::new(Database::in_memory().unwrap());
        let state = AppState {
            transcriber: Arc::new(NoTranscriber),
            summarizer,
            store: Arc::new(store.clone()),
        };
        (state, store)
    }

    async fn post(state: AppState, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = build_router(state, usize::MAX)
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_summary_uses_default_text() {
        let (state, _) = state(Some(Arc::new(StaticSummarizer::new(Some("A test.")))));
        let (status, body) = post(state, "/test-summary", "{}").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["original_text"], DEFAULT_TEST_TEXT);
        assert_eq!(body["summary"], "A test.");
    }

    #[tokio::test]
    async fn test_summary_without_summarizer() {
        let (state, _) = state(None);
        let (status, body) = post(state, "/test-summary", r#"{"text":"hello"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Summarizer not initialized");
    }

    #[tokio::test]
    async fn test_summary_malformed_json_is_reported_in_body() {
        let (state, _) = state(Some(Arc::new(StaticSummarizer::new(Some("x")))));
        let (status, body) = post(state, "/test-summary", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn regenerate_unknown_recording_is_404() {
        let (state, _) = state(Some(Arc::new(StaticSummarizer::new(Some("x")))));
        let (status, body) = post(state, "/regenerate-summary/missing", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Recording not found");
    }

    #[tokio::test]
    async fn regenerate_without_summarizer_is_500() {
        let (state, store) = state(None);
        let rec = store
            .insert(NewRecording {
                transcription: "notes from the call".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let (status, body) = post(state, &format!("/regenerate-summary/{}", rec.id), "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Summarizer not available");
    }

    #[tokio::test]
    async fn regenerate_writes_summary_back() {
        let (state, store) = state(Some(Arc::new(StaticSummarizer::new(Some("Call notes.")))));
        let rec = store
            .insert(NewRecording {
                transcription: "notes from the call".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let (status, body) = post(state, &format!("/regenerate-summary/{}", rec.id), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["summary"], "Call notes.");
        let stored = store.get(&rec.id).await.unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Call notes."));
    }

    #[tokio::test]
    async fn regenerate_failure_clears_summary() {
        let (state, store) = state(Some(Arc::new(StaticSummarizer::new(None))));
        let rec = store
            .insert(NewRecording {
                transcription: "notes from the call".into(),
                summary: Some("old".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let (status, body) = post(state, &format!("/regenerate-summary/{}", rec.id), "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["summary"].is_null());
        assert_eq!(store.get(&rec.id).await.unwrap().summary, None);
    }

    #[tokio::test]
    async fn health_reports_summarizer_state() {
        let summarizer: Arc<dyn Summarizer> = Arc::new(StaticSummarizer::new(Some("s")));
        summarizer.summarize("one").await;
        let (state, _) = state(Some(summarizer));
        let response = build_router(state, usize::MAX)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.status, "healthy");
        assert!(health.summarizer);
        assert_eq!(health.summary_attempts, 1);
    }
}
