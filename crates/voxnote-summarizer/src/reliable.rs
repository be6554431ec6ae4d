use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use voxnote_core::errors::{AttemptOutcome, SummaryError};
use voxnote_core::security::ApiToken;
use voxnote_core::summary::{SummaryBackend, SummaryParameters, SummaryRequest, Summarizer};
use voxnote_core::text::preview;

use crate::huggingface::HuggingFaceBackend;
use crate::preprocess::clean;

/// Retry limits and fixed backoff delays for the summarization call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Wait after a 503 (model warming up).
    pub model_loading_delay: Duration,
    /// Wait after a 429.
    pub rate_limit_delay: Duration,
    /// Wait after a connection failure or timeout.
    pub transport_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout: Duration::from_secs(30),
            model_loading_delay: Duration::from_secs(10),
            rate_limit_delay: Duration::from_secs(60),
            transport_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, if the outcome calls for one.
    fn backoff(&self, outcome: AttemptOutcome) -> Option<Duration> {
        match outcome {
            AttemptOutcome::TransientBusy => Some(self.model_loading_delay),
            AttemptOutcome::RateLimited => Some(self.rate_limit_delay),
            AttemptOutcome::TransportError => Some(self.transport_delay),
            AttemptOutcome::Success | AttemptOutcome::HardError => None,
        }
    }
}

/// Per-call loop state; never shared between invocations.
#[derive(Debug)]
struct RetryState {
    attempt_index: u32,
    last_outcome: Option<AttemptOutcome>,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt_index: 0,
            last_outcome: None,
        }
    }
}

/// Wraps a [`SummaryBackend`] with text cleanup and a bounded retry loop.
///
/// Every attempt, whichever way it ends, uses one of `max_retries` slots.
/// 503 and 429 always wait their fixed delay, even after the final attempt.
/// Transport failures wait a shorter delay unless no attempt is left. Hard
/// failures (other statuses, unusable payloads) move straight on. Once the
/// slots run out the result is `None`.
pub struct ResilientSummarizer<B: SummaryBackend> {
    backend: B,
    policy: RetryPolicy,
    parameters: SummaryParameters,
    total_attempts: AtomicU64,
}

impl<B: SummaryBackend> ResilientSummarizer<B> {
    pub fn new(backend: B, policy: RetryPolicy, parameters: SummaryParameters) -> Self {
        Self {
            backend,
            policy,
            parameters,
            total_attempts: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(backend: B) -> Self {
        Self::new(backend, RetryPolicy::default(), SummaryParameters::default())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Summarize with an explicit attempt budget instead of the policy's.
    pub async fn summarize_with_retries(&self, text: &str, max_retries: u32) -> Option<String> {
        if text.trim().is_empty() {
            debug!("empty transcript, skipping summarization");
            return None;
        }

        let cleaned = clean(text);
        info!(
            words = cleaned.word_count(),
            preview = %preview(cleaned.as_str(), 100),
            backend = self.backend.name(),
            "requesting summary"
        );
        let request = SummaryRequest::new(cleaned.into_inner(), self.parameters.clone());
        let mut state = RetryState::new();

        for attempt in 0..max_retries {
            state.attempt_index = attempt;
            self.total_attempts.fetch_add(1, Ordering::Relaxed);
            let is_last = attempt + 1 == max_retries;

            let err = match self.backend.send(&request).await {
                Ok(summary) => {
                    info!(
                        attempt = attempt + 1,
                        preview = %preview(&summary, 50),
                        "summary generated"
                    );
                    return Some(summary);
                }
                Err(e) => e,
            };

            let outcome = err.outcome();
            state.last_outcome = Some(outcome);
            let delay = match outcome {
                AttemptOutcome::TransportError if is_last => None,
                _ => self.policy.backoff(outcome),
            };

            match outcome {
                AttemptOutcome::HardError => error!(
                    attempt = attempt + 1,
                    max_retries,
                    status = ?err.status(),
                    kind = err.error_kind(),
                    error = %err,
                    "summarization attempt failed"
                ),
                _ => warn!(
                    attempt = attempt + 1,
                    max_retries,
                    status = ?err.status(),
                    kind = err.error_kind(),
                    delay_ms = delay.map(|d| d.as_millis() as u64),
                    "summarization attempt failed, retrying"
                ),
            }

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            attempts = max_retries,
            last_attempt = state.attempt_index + 1,
            last_outcome = state.last_outcome.map(|o| o.as_str()),
            "summarization gave up"
        );
        None
    }
}

impl ResilientSummarizer<HuggingFaceBackend> {
    /// Hugging Face backend whose per-request timeout is the policy's.
    pub fn huggingface(
        api_url: impl Into<String>,
        token: ApiToken,
        policy: RetryPolicy,
        parameters: SummaryParameters,
    ) -> Result<Self, SummaryError> {
        let backend = HuggingFaceBackend::new(api_url, token, policy.request_timeout)?;
        Ok(Self::new(backend, policy, parameters))
    }
}

#[async_trait]
impl<B: SummaryBackend> Summarizer for ResilientSummarizer<B> {
    async fn summarize(&self, text: &str) -> Option<String> {
        self.summarize_with_retries(text, self.policy.max_retries)
            .await
    }

    fn total_attempts(&self) -> u64 {
        self.total_attempts.load(Ordering::Relaxed)
    }
}
