//! RecordingExecutor: answers from a closure and records every call.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    execution::{ExecutionRequest, ExecutionResult, ExitStatus},
    traits::CodeExecutor,
};

type AnswerFn = dyn Fn(&ExecutionRequest) -> (String, String, ExitStatus) + Send + Sync;

/// A [`CodeExecutor`] that never leaves the process.
pub struct RecordingExecutor {
    answer: Box<AnswerFn>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl RecordingExecutor {
    /// Answer each request with `(stdout, stderr, status)` from `answer`.
    #[must_use]
    pub fn new<F>(answer: F) -> Self
    where
        F: Fn(&ExecutionRequest) -> (String, String, ExitStatus) + Send + Sync + 'static,
    {
        Self {
            answer: Box::new(answer),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always succeed with `stdout`.
    #[must_use]
    pub fn printing(stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        Self::new(move |_| (stdout.clone(), String::new(), ExitStatus::Ok))
    }

    /// Sleep this long before answering; longer than the timeout yields `Timeout`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `execute` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CodeExecutor for RecordingExecutor {
    async fn execute(&self, request: &ExecutionRequest, timeout: Duration) -> ExecutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.delay > timeout {
            tokio::time::sleep(timeout).await;
            return ExecutionResult::timed_out(
                request.request_id(),
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            );
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let (stdout, stderr, status) = (self.answer)(request);
        ExecutionResult::completed(
            request.request_id(),
            stdout,
            stderr,
            status,
            u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
        )
    }
}
