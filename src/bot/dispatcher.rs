//! Rate-limited request dispatcher for chat-originated submissions.
//!
//! Gates inbound code submissions per user with a sliding window and
//! forwards admitted ones to the pipeline. The window state is the only
//! shared mutable state in the bot; it sits behind a mutex that is held
//! for the counter check only, never across the pipeline call.

use crate::pipeline::{GenerationRequest, PipelineError, TestPipeline};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Per-user sliding-window request accounting.
///
/// Entries older than the window are discarded lazily on each call; there
/// is no background sweeper. Memory stays bounded because only admitted
/// requests are recorded and per-user counts cannot exceed the limit.
pub struct SlidingWindow {
    window: Duration,
    limit: usize,
    requests: HashMap<i64, Vec<Instant>>,
}

impl SlidingWindow {
    /// Create a window with the given length and per-user admission limit
    #[must_use]
    pub fn new(window: Duration, limit: usize) -> Self {
        Self {
            window,
            limit,
            requests: HashMap::new(),
        }
    }

    /// Try to admit a request for `user_id` at time `now`.
    ///
    /// On admission the attempt is recorded and `Ok(())` returned. On
    /// rejection nothing is recorded and the returned duration says how
    /// long until the oldest blocking entry leaves the window.
    ///
    /// # Errors
    ///
    /// Returns the retry-after duration when the user is over the limit.
    pub fn try_acquire(&mut self, user_id: i64, now: Instant) -> Result<(), Duration> {
        if self.limit == 0 {
            return Err(self.window);
        }

        let entries = self.requests.entry(user_id).or_default();
        entries.retain(|&t| now.duration_since(t) < self.window);

        if entries.len() >= self.limit {
            // The earliest of the last `limit` entries is the one that has
            // to expire before a new slot frees up.
            let blocking = entries[entries.len() - self.limit];
            let retry_after = (blocking + self.window).saturating_duration_since(now);
            return Err(retry_after);
        }

        entries.push(now);
        Ok(())
    }

    /// Number of in-window records for `user_id` as of `now`
    #[must_use]
    pub fn used(&self, user_id: i64, now: Instant) -> usize {
        self.requests.get(&user_id).map_or(0, |entries| {
            entries
                .iter()
                .filter(|&&t| now.duration_since(t) < self.window)
                .count()
        })
    }

    /// Configured per-user admission limit
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}

/// Result of one submission through the dispatcher
#[derive(Debug)]
pub enum Outcome {
    /// Pipeline ran and produced test code
    Completed {
        /// The generated tests
        tests: String,
    },
    /// Rejected before the pipeline was invoked
    RateLimited {
        /// How long until a slot frees up
        retry_after: Duration,
    },
    /// Pipeline was invoked and failed; the slot is still consumed
    Failed(PipelineError),
}

/// Gates per-user submissions and forwards admitted ones to the pipeline.
pub struct Dispatcher {
    limiter: Mutex<SlidingWindow>,
    pipeline: Arc<dyn TestPipeline>,
}

impl Dispatcher {
    /// Create a dispatcher over a pipeline with the given window parameters
    #[must_use]
    pub fn new(pipeline: Arc<dyn TestPipeline>, window: Duration, limit: usize) -> Self {
        Self {
            limiter: Mutex::new(SlidingWindow::new(window, limit)),
            pipeline,
        }
    }

    /// Submit one code sample on behalf of `user_id`.
    ///
    /// The rate-limit check runs under the lock; the pipeline call (which
    /// may block for tens of seconds) runs after the lock is released.
    /// Failed pipeline calls consume a slot exactly like successful ones.
    pub async fn submit(&self, user_id: i64, code: String) -> Outcome {
        {
            let mut limiter = self.limiter.lock().await;
            if let Err(retry_after) = limiter.try_acquire(user_id, Instant::now()) {
                info!(
                    user_id,
                    retry_after_secs = retry_after.as_secs(),
                    "Submission rate-limited"
                );
                return Outcome::RateLimited { retry_after };
            }
        }

        let request =
            GenerationRequest::for_source(code, format!("telegram submission (user {user_id})"));

        match self.pipeline.generate(&request).await {
            Ok(result) => {
                debug!(user_id, tests_chars = result.tests.len(), "Submission completed");
                Outcome::Completed {
                    tests: result.tests,
                }
            }
            Err(e) => {
                warn!(user_id, error = %e, "Pipeline failed for submission");
                Outcome::Failed(e)
            }
        }
    }

    /// In-window request count for `user_id` (for the /status command)
    pub async fn used(&self, user_id: i64) -> usize {
        self.limiter.lock().await.used(user_id, Instant::now())
    }

    /// Configured per-user admission limit
    pub async fn limit(&self) -> usize {
        self.limiter.lock().await.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::pipeline::{GenerationResult, MockTestPipeline};

    const W: Duration = Duration::from_secs(60);

    fn ok_result() -> GenerationResult {
        GenerationResult {
            tests: "def test_ok():\n    assert True".to_string(),
            analysis: String::new(),
            validation: String::new(),
        }
    }

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let mut window = SlidingWindow::new(W, 5);
        let t0 = Instant::now();

        for i in 0..5u64 {
            assert!(
                window.try_acquire(42, t0 + Duration::from_secs(i * 2)).is_ok(),
                "submission {i} within limit must be admitted"
            );
        }
        assert!(window.try_acquire(42, t0 + Duration::from_secs(11)).is_err());
        assert_eq!(window.used(42, t0 + Duration::from_secs(11)), 5);
    }

    #[test]
    fn test_retry_after_matches_oldest_blocking_entry() {
        // L=5, W=60s: five submissions within 10 seconds, sixth at t=11.
        let mut window = SlidingWindow::new(W, 5);
        let t0 = Instant::now();

        for i in 0..5u64 {
            window
                .try_acquire(7, t0 + Duration::from_secs(i * 2))
                .expect("within limit");
        }

        let retry_after = window
            .try_acquire(7, t0 + Duration::from_secs(11))
            .expect_err("sixth submission rejected");
        // Oldest entry at t0 expires at t0+60; 60 - 11 = 49.
        assert_eq!(retry_after, Duration::from_secs(49));
    }

    #[test]
    fn test_counter_decays_after_window() {
        let mut window = SlidingWindow::new(W, 5);
        let t0 = Instant::now();

        for _ in 0..5 {
            window.try_acquire(7, t0).expect("within limit");
        }
        assert!(window.try_acquire(7, t0 + Duration::from_secs(30)).is_err());

        // At t=61 the five t0 entries have left the window.
        assert!(window.try_acquire(7, t0 + Duration::from_secs(61)).is_ok());
        assert_eq!(window.used(7, t0 + Duration::from_secs(61)), 1);
    }

    #[test]
    fn test_rejected_attempts_are_not_recorded() {
        let mut window = SlidingWindow::new(W, 2);
        let t0 = Instant::now();

        window.try_acquire(1, t0).expect("first");
        window.try_acquire(1, t0).expect("second");

        // Hammering while blocked must not push the retry horizon out.
        let first_retry = window
            .try_acquire(1, t0 + Duration::from_secs(10))
            .expect_err("blocked");
        let second_retry = window
            .try_acquire(1, t0 + Duration::from_secs(20))
            .expect_err("still blocked");
        assert!(second_retry < first_retry);
        assert_eq!(window.used(1, t0 + Duration::from_secs(20)), 2);
    }

    #[test]
    fn test_users_are_limited_independently() {
        let mut window = SlidingWindow::new(W, 3);
        let t0 = Instant::now();

        for _ in 0..3 {
            window.try_acquire(111, t0).expect("user A within limit");
        }
        assert!(window.try_acquire(111, t0).is_err());

        // Exhausting user A's quota does not affect user B.
        assert!(window.try_acquire(222, t0).is_ok());
        assert_eq!(window.used(222, t0), 1);
    }

    #[tokio::test]
    async fn test_admitted_submission_invokes_pipeline_once() {
        let mut pipeline = MockTestPipeline::new();
        pipeline
            .expect_generate()
            .times(1)
            .withf(|req| req.source.contains("def add"))
            .returning(|_| Ok(ok_result()));

        let dispatcher = Dispatcher::new(Arc::new(pipeline), W, 5);
        let outcome = dispatcher
            .submit(42, "def add(a, b):\n    return a + b".to_string())
            .await;

        assert!(matches!(outcome, Outcome::Completed { .. }));
        assert_eq!(dispatcher.used(42).await, 1);
    }

    #[tokio::test]
    async fn test_failed_pipeline_call_still_consumes_a_slot() {
        let mut pipeline = MockTestPipeline::new();
        pipeline
            .expect_generate()
            .times(1)
            .returning(|_| Err(PipelineError::Llm(LlmError::ApiError("503".to_string()))));

        let dispatcher = Dispatcher::new(Arc::new(pipeline), W, 1);
        let outcome = dispatcher.submit(42, "def f(): pass".to_string()).await;
        assert!(matches!(outcome, Outcome::Failed(_)));

        // The slot is consumed: the next submission is rejected without
        // reaching the pipeline (times(1) above would trip otherwise).
        let outcome = dispatcher.submit(42, "def g(): pass".to_string()).await;
        assert!(matches!(outcome, Outcome::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_submission_never_reaches_pipeline() {
        let mut pipeline = MockTestPipeline::new();
        pipeline
            .expect_generate()
            .times(2)
            .returning(|_| Ok(ok_result()));

        let dispatcher = Dispatcher::new(Arc::new(pipeline), W, 2);
        for _ in 0..2 {
            let outcome = dispatcher.submit(9, "x = 1".to_string()).await;
            assert!(matches!(outcome, Outcome::Completed { .. }));
        }

        let outcome = dispatcher.submit(9, "x = 2".to_string()).await;
        assert!(matches!(outcome, Outcome::RateLimited { .. }));
    }
}
