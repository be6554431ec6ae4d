use std::time::Duration;

use voxnote_core::security::ApiToken;
use voxnote_core::summary::{SummaryParameters, Summarizer};
use voxnote_summarizer::{HuggingFaceBackend, ResilientSummarizer, RetryPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        request_timeout: Duration::from_secs(2),
        model_loading_delay: Duration::from_millis(20),
        rate_limit_delay: Duration::from_millis(20),
        transport_delay: Duration::from_millis(5),
    }
}

fn summarizer(server: &MockServer) -> ResilientSummarizer<HuggingFaceBackend> {
    ResilientSummarizer::huggingface(
        format!("{}/models/facebook/bart-large-cnn", server.uri()),
        ApiToken::new("hf_test"),
        fast_policy(),
        SummaryParameters::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn warmup_then_success_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/facebook/bart-large-cnn"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": "Model facebook/bart-large-cnn is currently loading"
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/facebook/bart-large-cnn"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"summary_text": " The meeting covered the budget. "}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let s = summarizer(&server);
    let summary = s
        .summarize("um so the meeting covered the budget and uh the roadmap")
        .await;
    assert_eq!(summary.as_deref(), Some("The meeting covered the budget."));
    assert_eq!(s.total_attempts(), 3);
}

#[tokio::test]
async fn persistent_rate_limit_gives_none_after_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let s = summarizer(&server);
    assert_eq!(s.summarize("some transcript text").await, None);
}

#[tokio::test]
async fn empty_array_consumes_each_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(3)
        .mount(&server)
        .await;

    let s = summarizer(&server);
    assert_eq!(s.summarize("some transcript text").await, None);
}

#[tokio::test]
async fn empty_input_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let s = summarizer(&server);
    assert_eq!(s.summarize("   ").await, None);
}
