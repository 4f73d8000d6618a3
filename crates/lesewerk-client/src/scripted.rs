// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory transport that replays a fixed poll script.
//
// Used by the tracker tests and by callers who want to exercise the client
// without network access. Every operation submitted gets its own copy of the
// script, so one instance can serve a whole batch.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{
    AnalysisRequest, OperationHandle, OperationId, RawPayload, RawStatus, RemoteError,
    RemoteStatus,
};

use crate::transport::Transport;

/// One scripted poll response.
#[derive(Debug, Clone)]
pub enum PollStep {
    Status(RawStatus),
    /// Network-level failure (`LesewerkError::Transport`).
    TransportFailure(String),
    /// HTTP 429 on the status call, with the service's wait hint.
    Throttled(Duration),
    /// The service no longer knows the operation.
    NotFound,
}

impl PollStep {
    pub fn status(status: RemoteStatus) -> Self {
        Self::Status(RawStatus::new(status))
    }

    pub fn failed(code: &str, message: &str) -> Self {
        Self::Status(RawStatus {
            status: RemoteStatus::Failed,
            retry_after: None,
            error: Some(RemoteError {
                code: code.to_owned(),
                message: message.to_owned(),
            }),
        })
    }
}

/// Submit behaviour for a scripted transport.
#[derive(Debug, Clone)]
pub enum SubmitStep {
    Accept,
    RejectDocument(String),
    RejectCredentials(String),
    Quota(String),
}

/// Counters of what a scripted transport has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallCounts {
    pub submits: usize,
    pub polls: usize,
    pub fetches: usize,
    pub cancels: usize,
    pub pdf_fetches: usize,
}

/// Transport replaying a poll script, then `idle_status` forever.
pub struct ScriptedTransport {
    payload: Value,
    script: Vec<PollStep>,
    idle_status: RemoteStatus,
    submit_script: Mutex<VecDeque<SubmitStep>>,
    retry_after: Option<Duration>,
    poll_latency: Duration,
    pdf: Option<Vec<u8>>,
    remaining: Mutex<HashMap<String, VecDeque<PollStep>>>,
    finished: Mutex<HashSet<String>>,
    poll_times: Mutex<Vec<Instant>>,
    in_flight: Mutex<HashSet<String>>,
    overlapping_polls: AtomicUsize,
    next_id: AtomicUsize,
    submits: AtomicUsize,
    polls: AtomicUsize,
    fetches: AtomicUsize,
    cancels: AtomicUsize,
    pdf_fetches: AtomicUsize,
}

impl ScriptedTransport {
    /// A transport whose operations succeed on the first poll with `payload`.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            script: vec![PollStep::status(RemoteStatus::Succeeded)],
            idle_status: RemoteStatus::Running,
            submit_script: Mutex::new(VecDeque::new()),
            retry_after: None,
            poll_latency: Duration::ZERO,
            pdf: None,
            remaining: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashSet::new()),
            poll_times: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            overlapping_polls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            pdf_fetches: AtomicUsize::new(0),
        }
    }

    /// Replace the poll script. Once exhausted, polls report `idle_status`.
    pub fn with_script(mut self, script: Vec<PollStep>) -> Self {
        self.script = script;
        self
    }

    pub fn with_idle_status(mut self, status: RemoteStatus) -> Self {
        self.idle_status = status;
        self
    }

    /// Queue submit outcomes; submits past the queue are accepted.
    pub fn with_submits(self, steps: Vec<SubmitStep>) -> Self {
        *lock(&self.submit_script) = steps.into();
        self
    }

    /// `Retry-After` hint returned on submit.
    pub fn with_retry_after(mut self, hint: Duration) -> Self {
        self.retry_after = Some(hint);
        self
    }

    /// Simulated duration of each poll request.
    pub fn with_poll_latency(mut self, latency: Duration) -> Self {
        self.poll_latency = latency;
        self
    }

    pub fn with_searchable_pdf(mut self, pdf: Vec<u8>) -> Self {
        self.pdf = Some(pdf);
        self
    }

    pub fn counts(&self) -> CallCounts {
        CallCounts {
            submits: self.submits.load(Ordering::SeqCst),
            polls: self.polls.load(Ordering::SeqCst),
            fetches: self.fetches.load(Ordering::SeqCst),
            cancels: self.cancels.load(Ordering::SeqCst),
            pdf_fetches: self.pdf_fetches.load(Ordering::SeqCst),
        }
    }

    /// When each poll started, in order.
    pub fn poll_times(&self) -> Vec<Instant> {
        lock(&self.poll_times).clone()
    }

    /// Number of polls that started while another poll of the same
    /// operation was in flight.
    pub fn overlapping_polls(&self) -> usize {
        self.overlapping_polls.load(Ordering::SeqCst)
    }

    fn next_step(&self, id: &OperationId) -> Result<PollStep> {
        let mut remaining = lock(&self.remaining);
        let script = remaining
            .get_mut(id.as_str())
            .ok_or_else(|| LesewerkError::OperationNotFound(id.to_string()))?;
        Ok(script
            .pop_front()
            .unwrap_or_else(|| PollStep::status(self.idle_status)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, request: &AnalysisRequest) -> Result<OperationHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let step = lock(&self.submit_script)
            .pop_front()
            .unwrap_or(SubmitStep::Accept);
        match step {
            SubmitStep::Accept => {}
            SubmitStep::RejectDocument(msg) => return Err(LesewerkError::InvalidDocument(msg)),
            SubmitStep::RejectCredentials(msg) => return Err(LesewerkError::Authentication(msg)),
            SubmitStep::Quota(message) => {
                return Err(LesewerkError::QuotaExceeded {
                    message,
                    retry_after: Some(Duration::from_secs(1)),
                });
            }
        }

        let id = format!("op-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.remaining).insert(id.clone(), self.script.clone().into());
        debug!(operation_id = %id, model = %request.model(), "scripted submit");
        Ok(OperationHandle {
            id: OperationId::new(id.clone()),
            model: request.model().clone(),
            status_url: format!("scripted://analyzeResults/{id}"),
            retry_after: self.retry_after,
        })
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<RawStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        lock(&self.poll_times).push(Instant::now());
        if !lock(&self.in_flight).insert(handle.id.to_string()) {
            self.overlapping_polls.fetch_add(1, Ordering::SeqCst);
        }
        if !self.poll_latency.is_zero() {
            tokio::time::sleep(self.poll_latency).await;
        }
        let step = self.next_step(&handle.id);
        lock(&self.in_flight).remove(handle.id.as_str());

        match step? {
            PollStep::Status(status) => {
                if status.status == RemoteStatus::Succeeded {
                    lock(&self.finished).insert(handle.id.to_string());
                }
                Ok(status)
            }
            PollStep::TransportFailure(msg) => Err(LesewerkError::Transport(msg)),
            PollStep::Throttled(wait) => Err(LesewerkError::Throttled {
                message: "too many requests".into(),
                retry_after: Some(wait),
            }),
            PollStep::NotFound => Err(LesewerkError::OperationNotFound(handle.id.to_string())),
        }
    }

    async fn fetch_result(&self, handle: &OperationHandle) -> Result<RawPayload> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !lock(&self.finished).contains(handle.id.as_str()) {
            return Err(LesewerkError::ResultNotReady(handle.id.to_string()));
        }
        Ok(RawPayload::new(self.payload.clone()))
    }

    async fn cancel(&self, _handle: &OperationHandle) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_searchable_pdf(&self, handle: &OperationHandle) -> Result<Vec<u8>> {
        self.pdf_fetches.fetch_add(1, Ordering::SeqCst);
        match &self.pdf {
            Some(pdf) => Ok(pdf.clone()),
            None => Err(LesewerkError::Unsupported(format!(
                "no searchable PDF scripted for {}",
                handle.id
            ))),
        }
    }
}
