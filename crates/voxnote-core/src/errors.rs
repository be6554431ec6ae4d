use std::fmt;
use std::time::Duration;

/// Failure of a single exchange with the summarization endpoint.
///
/// None of these escape the resilient client: each one is classified into an
/// [`AttemptOutcome`] and the retry loop decides whether to wait, move on, or
/// give up.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SummaryError {
    // Transient, retried after a backoff
    #[error("model is loading")]
    ModelLoading,
    #[error("rate limited")]
    RateLimited,

    // Hard, retried immediately
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("response carried no summary text")]
    EmptySummary,

    // Transport
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl SummaryError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            503 => Self::ModelLoading,
            429 => Self::RateLimited,
            _ => Self::Http { status, body },
        }
    }

    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::ModelLoading => AttemptOutcome::TransientBusy,
            Self::RateLimited => AttemptOutcome::RateLimited,
            Self::Http { .. } | Self::MalformedResponse(_) | Self::EmptySummary => {
                AttemptOutcome::HardError
            }
            Self::Network(_) | Self::Timeout(_) => AttemptOutcome::TransportError,
        }
    }

    /// HTTP status carried by the error, if the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ModelLoading => Some(503),
            Self::RateLimited => Some(429),
            Self::Http { status, .. } => Some(*status),
            Self::MalformedResponse(_) | Self::EmptySummary => Some(200),
            Self::Network(_) | Self::Timeout(_) => None,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ModelLoading => "model_loading",
            Self::RateLimited => "rate_limited",
            Self::Http { .. } => "http_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::EmptySummary => "empty_summary",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// How one attempt in the retry loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TransientBusy,
    RateLimited,
    HardError,
    TransportError,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TransientBusy => "transient_busy",
            Self::RateLimited => "rate_limited",
            Self::HardError => "hard_error",
            Self::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
