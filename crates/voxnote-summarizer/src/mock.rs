use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use voxnote_core::errors::SummaryError;
use voxnote_core::summary::{SummaryBackend, SummaryRequest, Summarizer};

/// Pre-programmed outcomes for deterministic tests without network calls.
pub enum MockResponse {
    Summary(String),
    Error(SummaryError),
    /// Wait, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn summary(text: &str) -> Self {
        Self::Summary(text.to_string())
    }

    pub fn status(status: u16) -> Self {
        Self::Error(SummaryError::from_status(status, String::new()))
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Backend that replays scripted responses in order and records each call.
pub struct MockBackend {
    responses: Mutex<VecDeque<MockResponse>>,
    call_count: AtomicUsize,
    calls: Mutex<Vec<(Instant, SummaryRequest)>>,
}

impl MockBackend {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Tokio instants of every call, in order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(at, _)| *at).collect()
    }

    pub fn requests(&self) -> Vec<SummaryRequest> {
        self.calls.lock().iter().map(|(_, req)| req.clone()).collect()
    }
}

#[async_trait]
impl SummaryBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: &SummaryRequest) -> Result<String, SummaryError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().push((Instant::now(), request.clone()));

        let Some(mut response) = self.responses.lock().pop_front() else {
            return Err(SummaryError::Network(format!(
                "MockBackend: no response configured for call {idx}"
            )));
        };

        loop {
            match response {
                MockResponse::Summary(text) => return Ok(text),
                MockResponse::Error(e) => return Err(e),
                MockResponse::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
            }
        }
    }
}

/// Summarizer returning a fixed answer, for callers of the `Summarizer` seam.
pub struct StaticSummarizer {
    answer: Option<String>,
    calls: AtomicUsize,
}

impl StaticSummarizer {
    pub fn new(answer: Option<&str>) -> Self {
        Self {
            answer: answer.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Summarizer for StaticSummarizer {
    async fn summarize(&self, text: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if text.trim().is_empty() {
            return None;
        }
        self.answer.clone()
    }

    fn total_attempts(&self) -> u64 {
        self.call_count() as u64
    }
}
