use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use voxnote_core::errors::SummaryError;
use voxnote_core::security::ApiToken;
use voxnote_core::summary::{SummaryBackend, SummaryRequest};
use voxnote_core::text::preview;

pub const DEFAULT_API_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-cnn";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One element of the inference API's success payload.
#[derive(Debug, Deserialize)]
struct SummaryItem {
    summary_text: Option<String>,
}

/// Hugging Face hosted inference client for a summarization model.
pub struct HuggingFaceBackend {
    client: Client,
    api_url: String,
    token: ApiToken,
    request_timeout: Duration,
}

impl HuggingFaceBackend {
    pub fn new(
        api_url: impl Into<String>,
        token: ApiToken,
        request_timeout: Duration,
    ) -> Result<Self, SummaryError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .build()
            .map_err(|e| SummaryError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            token,
            request_timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn transport_error(&self, err: reqwest::Error) -> SummaryError {
        if err.is_timeout() {
            SummaryError::Timeout(self.request_timeout)
        } else {
            SummaryError::Network(err.to_string())
        }
    }
}

/// Extract the trimmed `summary_text` of the first result. Later elements
/// are not inspected.
fn parse_summary(body: &str) -> Result<String, SummaryError> {
    let items: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| SummaryError::MalformedResponse(e.to_string()))?;
    let Some(first) = items.into_iter().next() else {
        return Err(SummaryError::EmptySummary);
    };
    let item: SummaryItem =
        serde_json::from_value(first).map_err(|e| SummaryError::MalformedResponse(e.to_string()))?;
    item.summary_text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(SummaryError::EmptySummary)
}

#[async_trait]
impl SummaryBackend for HuggingFaceBackend {
    fn name(&self) -> &str {
        "huggingface"
    }

    #[instrument(skip_all, fields(url = %self.api_url))]
    async fn send(&self, request: &SummaryRequest) -> Result<String, SummaryError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.token.expose())
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status = status.as_u16(), preview = %preview(&body, 200), "summarization response");

        if status != StatusCode::OK {
            return Err(SummaryError::from_status(status.as_u16(), body));
        }
        parse_summary(&body)
    }
}
