// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation tracker: drives one remote analysis from submission to a
// terminal state.
//
// Lifecycle: Submitted -> Running -> {Succeeded, Failed, Cancelled}.
// Polls for one operation are strictly sequential. Cancellation and the
// wall-clock deadline are observed while waiting between polls; a poll that
// is already in flight always completes first.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, watch};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, instrument, warn};

use lesewerk_core::config::TrackerConfig;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::result::AnalysisResult;
use lesewerk_core::types::{
    AnalysisRequest, OperationHandle, OperationId, OperationState, OutputOption, RawPayload,
    RawStatus, RemoteStatus,
};
use lesewerk_document::Normalizer;

use crate::retry::{RetryDecision, should_retry};
use crate::transport::Transport;

/// One in-flight or completed remote analysis job.
///
/// Owned by the tracker that submitted it; dropped once the caller has the
/// result or the operation has failed.
#[derive(Debug)]
pub struct Operation {
    handle: OperationHandle,
    state: OperationState,
    submitted_at: DateTime<Utc>,
    last_polled_at: Option<DateTime<Utc>>,
    poll_interval_hint: Option<Duration>,
    deadline: Instant,
    polls: u32,
}

impl Operation {
    fn new(handle: OperationHandle, timeout: Duration) -> Self {
        Self {
            poll_interval_hint: handle.retry_after,
            handle,
            state: OperationState::Submitted,
            submitted_at: Utc::now(),
            last_polled_at: None,
            deadline: Instant::now() + timeout,
            polls: 0,
        }
    }

    pub fn id(&self) -> &OperationId {
        &self.handle.id
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn last_polled_at(&self) -> Option<DateTime<Utc>> {
        self.last_polled_at
    }

    /// Latest poll interval suggested by the service.
    pub fn poll_interval_hint(&self) -> Option<Duration> {
        self.poll_interval_hint
    }

    pub fn poll_count(&self) -> u32 {
        self.polls
    }

    fn transition(&mut self, next: OperationState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(LesewerkError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if self.state != next {
            debug!(operation_id = %self.handle.id, from = %self.state, to = %next, "state change");
        }
        self.state = next;
        Ok(())
    }

    /// Move to a terminal state and attach context to `err`.
    fn fail(&mut self, next: OperationState, err: LesewerkError) -> LesewerkError {
        if let Err(invalid) = self.transition(next) {
            warn!(error = %invalid, "operation already terminal");
        }
        err.in_operation(&self.handle.id, self.state)
    }

    fn context(&self, err: LesewerkError) -> LesewerkError {
        err.in_operation(&self.handle.id, self.state)
    }
}

/// Everything a successful run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub operation_id: OperationId,
    pub result: AnalysisResult,
    /// Present only when `OutputOption::SearchablePdf` was requested.
    pub searchable_pdf: Option<Vec<u8>>,
}

/// Cloneable handle that cancels the tracker it came from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request cancellation. Takes effect before the next poll.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Drives one operation through its lifecycle.
pub struct OperationTracker {
    transport: Arc<dyn Transport>,
    config: TrackerConfig,
    cancel: Arc<watch::Sender<bool>>,
}

enum Wake {
    Poll,
    Cancelled,
    Deadline,
}

impl OperationTracker {
    pub fn new(transport: Arc<dyn Transport>, config: TrackerConfig) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            transport,
            config,
            cancel: Arc::new(sender),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Handle for cancelling this tracker from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: Arc::clone(&self.cancel),
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Submit the request. Errors here carry no operation context because
    /// no operation exists yet.
    #[instrument(skip(self, request), fields(model = %request.model(), transport = self.transport.name()))]
    pub async fn submit(&self, request: &AnalysisRequest) -> Result<Operation> {
        if self.is_cancelled() {
            return Err(LesewerkError::Cancelled);
        }
        let handle = self.transport.submit(request).await?;
        info!(operation_id = %handle.id, "operation submitted");
        Ok(Operation::new(handle, self.config.timeout))
    }

    /// Poll until the operation is terminal and return its raw payload.
    #[instrument(skip(self, op), fields(operation_id = %op.id()))]
    pub async fn drive(&self, op: &mut Operation) -> Result<RawPayload> {
        if op.state.is_terminal() {
            return Err(op.context(LesewerkError::InvalidTransition {
                from: op.state,
                to: OperationState::Running,
            }));
        }

        let mut cancel_rx = self.cancel.subscribe();
        let mut wait = self.clamp(op.poll_interval_hint);
        let mut failures: u32 = 0;

        loop {
            match self.wait(wait, op.deadline, &mut cancel_rx).await {
                Wake::Poll => {}
                Wake::Cancelled => return Err(self.abandon(op).await),
                Wake::Deadline => return Err(self.timed_out(op)),
            }

            let polled = self.transport.poll(&op.handle).await;
            op.polls += 1;
            op.last_polled_at = Some(Utc::now());

            match polled {
                Ok(status) => {
                    failures = 0;
                    if let Some(hint) = status.retry_after {
                        op.poll_interval_hint = Some(hint);
                    }
                    if let Some(payload) = self.apply_status(op, status).await? {
                        return Ok(payload);
                    }
                    wait = self.clamp(op.poll_interval_hint);
                }
                Err(err) => match should_retry(&err, failures, &self.config.retry) {
                    RetryDecision::RetryAfter(delay) => {
                        failures += 1;
                        warn!(attempt = failures, error = %err, "poll failed, retrying");
                        wait = delay;
                    }
                    RetryDecision::GiveUp(_) | RetryDecision::Exhausted => {
                        return Err(op.fail(OperationState::Failed, err));
                    }
                },
            }

            if Instant::now() >= op.deadline {
                return Err(self.timed_out(op));
            }
        }
    }

    /// Submit, drive, normalize, and fetch requested artifacts.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let mut op = self.submit(request).await?;
        let payload = self.drive(&mut op).await?;

        let result = Normalizer::new(op.handle.model.clone())
            .normalize(&payload)
            .map_err(|e| op.context(e))?;

        let searchable_pdf = if request.wants(OutputOption::SearchablePdf) {
            let handle = &op.handle;
            let pdf = self
                .retrying("searchable pdf", op.deadline, || {
                    self.transport.fetch_searchable_pdf(handle)
                })
                .await
                .map_err(|e| op.context(e))?;
            Some(pdf)
        } else {
            None
        };

        info!(
            operation_id = %op.id(),
            pages = result.pages.len(),
            polls = op.polls,
            "analysis complete"
        );
        Ok(AnalysisOutcome {
            operation_id: op.id().clone(),
            result,
            searchable_pdf,
        })
    }

    /// Apply one poll result. Returns the payload once the job succeeded.
    async fn apply_status(&self, op: &mut Operation, status: RawStatus) -> Result<Option<RawPayload>> {
        match status.status {
            // Still queued: stay in Submitted.
            RemoteStatus::NotStarted => Ok(None),
            RemoteStatus::Running => {
                op.transition(OperationState::Running)
                    .map_err(|e| op.context(e))?;
                Ok(None)
            }
            RemoteStatus::Succeeded => {
                op.transition(OperationState::Succeeded)
                    .map_err(|e| op.context(e))?;
                let handle = &op.handle;
                let payload = self
                    .retrying("result", op.deadline, || self.transport.fetch_result(handle))
                    .await
                    .map_err(|e| op.context(e))?;
                Ok(Some(payload))
            }
            RemoteStatus::Failed | RemoteStatus::Canceled => {
                let (code, message) = match status.error {
                    Some(remote) => (remote.code, remote.message),
                    None => (
                        format!("{:?}", status.status),
                        "the service ended the job without details".to_owned(),
                    ),
                };
                warn!(%code, %message, "remote analysis failed");
                Err(op.fail(
                    OperationState::Failed,
                    LesewerkError::AnalysisFailed { code, message },
                ))
            }
        }
    }

    async fn wait(
        &self,
        delay: Duration,
        deadline: Instant,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Wake {
        if *cancel_rx.borrow_and_update() {
            return Wake::Cancelled;
        }
        tokio::select! {
            biased;
            _ = cancelled(cancel_rx) => Wake::Cancelled,
            _ = sleep_until(deadline) => Wake::Deadline,
            _ = sleep(delay) => Wake::Poll,
        }
    }

    async fn abandon(&self, op: &mut Operation) -> LesewerkError {
        info!(operation_id = %op.id(), "operation cancelled by caller");
        if let Err(err) = self.transport.cancel(&op.handle).await {
            warn!(error = %err, "remote cancel notification failed");
        }
        op.fail(OperationState::Cancelled, LesewerkError::Cancelled)
    }

    fn timed_out(&self, op: &mut Operation) -> LesewerkError {
        warn!(operation_id = %op.id(), timeout_secs = self.config.timeout.as_secs(), "operation timed out");
        op.fail(OperationState::Failed, LesewerkError::Timeout(self.config.timeout))
    }

    fn clamp(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.config.poll_interval)
            .min(self.config.max_poll_interval)
    }

    /// Retry an idempotent fetch on transient failures. Backoff waits end
    /// early on cancellation or at the operation deadline.
    async fn retrying<T, F, Fut>(&self, what: &str, deadline: Instant, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut cancel_rx = self.cancel.subscribe();
        let mut attempt = 0;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let delay = match should_retry(&err, attempt, &self.config.retry) {
                RetryDecision::RetryAfter(delay) => delay,
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            };
            attempt += 1;
            warn!(what, attempt, error = %err, "fetch failed, retrying");
            match self.wait(delay, deadline, &mut cancel_rx).await {
                Wake::Poll => {}
                Wake::Cancelled => return Err(LesewerkError::Cancelled),
                Wake::Deadline => {
                    warn!(what, timeout_secs = self.config.timeout.as_secs(), "gave up fetching at deadline");
                    return Err(LesewerkError::Timeout(self.config.timeout));
                }
            }
        }
    }
}

/// Resolves once the flag is set; pending forever if every sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Run independent requests concurrently over one shared transport.
///
/// Each request gets its own tracker; at most `concurrency` run at once.
/// Results are returned in input order.
pub async fn run_batch(
    transport: Arc<dyn Transport>,
    config: TrackerConfig,
    requests: Vec<AnalysisRequest>,
    concurrency: usize,
) -> Vec<Result<AnalysisOutcome>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = requests.len();
    info!(total, concurrency, "starting batch");

    let mut tasks = Vec::with_capacity(total);
    for request in requests {
        let semaphore = Arc::clone(&semaphore);
        let tracker = OperationTracker::new(Arc::clone(&transport), config.clone());
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| LesewerkError::Cancelled)?;
            tracker.run(&request).await
        }));
    }

    let mut results = Vec::with_capacity(total);
    for (index, task) in tasks.into_iter().enumerate() {
        let result = match task.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => {
                warn!(index, error = %join_err, "batch task aborted");
                Err(LesewerkError::Cancelled)
            }
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(total, failed, "batch finished");
    results
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use lesewerk_core::config::RetryConfig;
    use lesewerk_core::error::ErrorKind;
    use lesewerk_core::types::ModelSelector;

    use super::*;
    use crate::scripted::{PollStep, ScriptedTransport};

    const PDF: &[u8] = b"%PDF-1.7\n";

    fn payload() -> serde_json::Value {
        json!({
            "modelId": "prebuilt-read",
            "content": "Hello",
            "pages": [{"pageNumber": 1, "width": 8.5, "height": 11.0, "unit": "inch",
                       "words": [{"content": "Hello", "confidence": 0.99, "span": {"offset": 0, "length": 5}}]}]
        })
    }

    fn config() -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(5),
            retry: RetryConfig {
                max_retries: 5,
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(2),
            },
            timeout: Duration::from_secs(60),
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(ModelSelector::PlainText, PDF.to_vec()).unwrap()
    }

    fn tracker(transport: &Arc<ScriptedTransport>) -> OperationTracker {
        OperationTracker::new(transport.clone(), config())
    }

    #[tokio::test(start_paused = true)]
    async fn notstarted_keeps_submitted_until_running() {
        let transport = Arc::new(ScriptedTransport::new(payload()).with_script(vec![
            PollStep::status(RemoteStatus::NotStarted),
            PollStep::status(RemoteStatus::Running),
            PollStep::status(RemoteStatus::Succeeded),
        ]));
        let tracker = tracker(&transport);
        let mut op = tracker.submit(&request()).await.unwrap();
        assert_eq!(op.state(), OperationState::Submitted);

        let payload = tracker.drive(&mut op).await.unwrap();
        assert_eq!(op.state(), OperationState::Succeeded);
        assert_eq!(op.poll_count(), 3);
        assert!(op.last_polled_at().is_some());
        assert_eq!(payload.as_value()["content"], "Hello");
    }

    #[tokio::test(start_paused = true)]
    async fn service_hint_sets_first_poll_delay() {
        let transport = Arc::new(
            ScriptedTransport::new(payload()).with_retry_after(Duration::from_secs(3)),
        );
        let tracker = tracker(&transport);
        let start = Instant::now();
        tracker.run(&request()).await.unwrap();
        assert_eq!(transport.poll_times()[0] - start, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_is_analysis_failed() {
        let transport = Arc::new(
            ScriptedTransport::new(payload())
                .with_script(vec![PollStep::failed("InvalidContent", "The file is corrupted.")]),
        );
        let err = tracker(&transport).run(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AnalysisFailed);
        assert_eq!(err.last_state(), Some(OperationState::Failed));
        assert_eq!(err.operation_id().map(|id| id.as_str()), Some("op-1"));
        assert_eq!(transport.counts().fetches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drive_refuses_terminal_operation() {
        let transport = Arc::new(ScriptedTransport::new(payload()));
        let tracker = tracker(&transport);
        let mut op = tracker.submit(&request()).await.unwrap();
        tracker.drive(&mut op).await.unwrap();

        let err = tracker.drive(&mut op).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(transport.counts().polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_submit_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new(payload()));
        let tracker = tracker(&transport);
        tracker.cancel_handle().cancel();
        let err = tracker.run(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.operation_id().is_none());
        assert_eq!(transport.counts().submits, 0);
    }

    fn slow_backoff() -> TrackerConfig {
        TrackerConfig {
            retry: RetryConfig {
                max_retries: 5,
                base_delay: Duration::from_secs(30),
                max_delay: Duration::from_secs(30),
            },
            ..config()
        }
    }

    async fn unavailable() -> Result<()> {
        Err(LesewerkError::Transport("HTTP 503".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_backoff_stops_at_deadline() {
        let tracker = OperationTracker::new(Arc::new(ScriptedTransport::new(payload())), slow_backoff());
        let start = Instant::now();

        let err = tracker
            .retrying("result", start + Duration::from_secs(2), unavailable)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(Instant::now() - start, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_backoff_stops_on_cancel() {
        let tracker = OperationTracker::new(Arc::new(ScriptedTransport::new(payload())), slow_backoff());
        let cancel = tracker.cancel_handle();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });
        let start = Instant::now();

        let err = tracker
            .retrying("searchable pdf", start + Duration::from_secs(60), unavailable)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(Instant::now() - start, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_interval_is_clamped() {
        let transport = Arc::new(
            ScriptedTransport::new(payload()).with_retry_after(Duration::from_secs(600)),
        );
        let tracker = tracker(&transport);
        let start = Instant::now();
        tracker.run(&request()).await.unwrap();
        assert_eq!(transport.poll_times()[0] - start, Duration::from_secs(5));
    }

    #[test]
    fn cancel_handle_reports_state() {
        let transport: Arc<dyn Transport> = Arc::new(ScriptedTransport::new(payload()));
        let tracker = OperationTracker::new(transport, config());
        let handle = tracker.cancel_handle();
        assert!(!handle.is_cancelled());
        handle.clone().cancel();
        assert!(handle.is_cancelled());
    }
}
