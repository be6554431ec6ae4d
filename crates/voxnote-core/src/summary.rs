use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::SummaryError;

/// Generation parameters sent with every summarization request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryParameters {
    pub max_length: u32,
    pub min_length: u32,
    pub do_sample: bool,
}

impl Default for SummaryParameters {
    fn default() -> Self {
        Self {
            max_length: 130,
            min_length: 30,
            do_sample: false,
        }
    }
}

/// Body of a summarization call. Built once per `summarize` invocation and
/// reused unchanged for every attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryRequest {
    pub inputs: String,
    pub parameters: SummaryParameters,
}

impl SummaryRequest {
    pub fn new(inputs: impl Into<String>, parameters: SummaryParameters) -> Self {
        Self {
            inputs: inputs.into(),
            parameters,
        }
    }
}

/// One HTTP exchange with a summarization endpoint. No retries.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the trimmed, non-empty summary text on success.
    async fn send(&self, request: &SummaryRequest) -> Result<String, SummaryError>;
}

/// Best-effort summarization as seen by callers.
///
/// `None` means no usable summary could be produced; it is not an error.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Option<String>;

    /// Cumulative number of backend calls made through this summarizer.
    fn total_attempts(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let req = SummaryRequest::new("hello there", SummaryParameters::default());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "inputs": "hello there",
                "parameters": {"max_length": 130, "min_length": 30, "do_sample": false}
            })
        );
    }

    struct Fixed(Option<String>);

    #[async_trait]
    impl Summarizer for Fixed {
        async fn summarize(&self, _text: &str) -> Option<String> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn default_attempt_counter_is_zero() {
        let s = Fixed(Some("short".into()));
        assert_eq!(s.summarize("long text").await.as_deref(), Some("short"));
        assert_eq!(s.total_attempts(), 0);
    }
}
