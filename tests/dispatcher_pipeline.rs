//! End-to-end dispatcher behavior against a deterministic pipeline stub.
//!
//! The stub replaces the external LLM call chain so these tests exercise
//! the real gate-then-forward path without network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use testsmith::bot::{Dispatcher, Outcome};
use testsmith::llm::LlmError;
use testsmith::pipeline::{
    GenerationRequest, GenerationResult, PipelineError, TestPipeline,
};

/// Deterministic stand-in for the staged LLM pipeline.
struct StubPipeline {
    calls: AtomicUsize,
    fail: bool,
}

impl StubPipeline {
    fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TestPipeline for StubPipeline {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Llm(LlmError::NetworkError(
                "stubbed outage".to_string(),
            )));
        }
        Ok(GenerationResult {
            tests: format!("# tests for {}\ndef test_ok():\n    assert True", request.source_name),
            analysis: "stub analysis".to_string(),
            validation: "valid".to_string(),
        })
    }
}

const WINDOW: Duration = Duration::from_secs(60);

#[tokio::test]
async fn admitted_submissions_run_exactly_one_pipeline_call_each() {
    let stub = Arc::new(StubPipeline::succeeding());
    let dispatcher = Dispatcher::new(stub.clone(), WINDOW, 5);

    for i in 0..5 {
        let outcome = dispatcher.submit(42, format!("x = {i}")).await;
        match outcome {
            Outcome::Completed { tests } => assert!(tests.contains("def test_ok")),
            other => panic!("submission {i} should complete, got {other:?}"),
        }
    }
    assert_eq!(stub.calls(), 5);
}

#[tokio::test]
async fn sixth_submission_is_rejected_without_a_pipeline_call() {
    let stub = Arc::new(StubPipeline::succeeding());
    let dispatcher = Dispatcher::new(stub.clone(), WINDOW, 5);

    for _ in 0..5 {
        dispatcher.submit(7, "x = 1".to_string()).await;
    }
    let outcome = dispatcher.submit(7, "x = 6".to_string()).await;

    match outcome {
        Outcome::RateLimited { retry_after } => {
            assert!(retry_after <= WINDOW, "retry_after must fit in the window");
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
    assert_eq!(stub.calls(), 5, "rejected submission must not reach pipeline");
}

#[tokio::test]
async fn users_have_independent_quotas() {
    let stub = Arc::new(StubPipeline::succeeding());
    let dispatcher = Dispatcher::new(stub.clone(), WINDOW, 2);

    for _ in 0..2 {
        dispatcher.submit(111, "a = 1".to_string()).await;
    }
    assert!(matches!(
        dispatcher.submit(111, "a = 2".to_string()).await,
        Outcome::RateLimited { .. }
    ));

    // User B is unaffected by user A's exhausted quota.
    assert!(matches!(
        dispatcher.submit(222, "b = 1".to_string()).await,
        Outcome::Completed { .. }
    ));
    assert_eq!(dispatcher.used(222).await, 1);
}

#[tokio::test]
async fn failed_pipeline_call_is_surfaced_and_consumes_a_slot() {
    let stub = Arc::new(StubPipeline::failing());
    let dispatcher = Dispatcher::new(stub.clone(), WINDOW, 1);

    let outcome = dispatcher.submit(9, "x = 1".to_string()).await;
    match outcome {
        Outcome::Failed(PipelineError::Llm(_)) => {}
        other => panic!("expected pipeline failure, got {other:?}"),
    }
    assert_eq!(stub.calls(), 1);

    // The failed attempt consumed the only slot.
    assert!(matches!(
        dispatcher.submit(9, "x = 2".to_string()).await,
        Outcome::RateLimited { .. }
    ));
    assert_eq!(stub.calls(), 1);
}
