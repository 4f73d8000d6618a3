// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structured error reports for callers and the presentation layer.
//
// Every error is mapped to its kind, the operation context it was raised
// in, a plain-English message, and a concrete suggestion.

use serde::Serialize;

use crate::error::{ErrorKind, LesewerkError};
use crate::types::{OperationId, OperationState};

/// Severity of an error from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Network blip or gateway error. Retrying later may work.
    Transient,
    /// Caller must do something (fix credentials, wait for quota).
    ActionRequired,
    /// Retrying the same request will not help.
    Permanent,
}

/// Everything a caller needs to report a failure without re-deriving it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub operation_id: Option<OperationId>,
    pub last_state: Option<OperationState>,
    /// Plain-English summary.
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    /// Technical detail from the underlying error.
    pub detail: String,
    pub retriable: bool,
    pub severity: Severity,
}

impl ErrorReport {
    pub fn from_error(err: &LesewerkError) -> Self {
        let (message, suggestion, severity) = describe(err.root());
        Self {
            kind: err.kind(),
            operation_id: err.operation_id().cloned(),
            last_state: err.last_state(),
            message: message.into(),
            suggestion,
            detail: err.root().to_string(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(id) = &self.operation_id {
            write!(f, " (operation {id}")?;
            if let Some(state) = self.last_state {
                write!(f, ", last state {state}")?;
            }
            write!(f, ")")?;
        }
        write!(f, "\n  detail: {}\n  suggestion: {}", self.detail, self.suggestion)
    }
}

fn describe(err: &LesewerkError) -> (&'static str, String, Severity) {
    match err {
        LesewerkError::Authentication(_) => (
            "The service rejected the credentials.",
            "Check AZ_DOCINT_KEY and that AZ_DOCINT_ENDPOINT points at the same resource.".into(),
            Severity::ActionRequired,
        ),

        LesewerkError::QuotaExceeded { retry_after, .. } => (
            "The service's rate or quota limit was reached.",
            match retry_after {
                Some(wait) => format!("Wait about {} seconds, then try again.", wait.as_secs().max(1)),
                None => "Wait a moment, or move to a higher pricing tier.".into(),
            },
            Severity::ActionRequired,
        ),

        LesewerkError::InvalidDocument(_) => (
            "This document can't be analyzed.",
            "Make sure the file is a readable PDF, image, or Office document within the size limit."
                .into(),
            Severity::Permanent,
        ),

        LesewerkError::Transport(_) => (
            "The service could not be reached.",
            "Check your network connection and the endpoint URL, then try again.".into(),
            Severity::Transient,
        ),

        LesewerkError::Throttled { .. } => (
            "The service kept rate limiting status checks.",
            "Wait a minute, or lower --concurrency so fewer documents are polled at once.".into(),
            Severity::Transient,
        ),

        LesewerkError::OperationNotFound(_) => (
            "The service no longer knows about this analysis.",
            "Results expire after 24 hours. Submit the document again.".into(),
            Severity::Permanent,
        ),

        LesewerkError::ResultNotReady(_) => (
            "The result was requested before the analysis finished.",
            "Wait for the operation to succeed before fetching its result.".into(),
            Severity::Permanent,
        ),

        LesewerkError::AnalysisFailed { code, .. } => (
            "The service could not analyze this document.",
            format!("The service reported '{code}'. Try a clearer scan or a different model."),
            Severity::Permanent,
        ),

        LesewerkError::Timeout(limit) => (
            "The analysis took too long.",
            format!(
                "It did not finish within {} seconds. Try a smaller page range or raise LESEWERK_TIMEOUT_SECS.",
                limit.as_secs()
            ),
            Severity::Transient,
        ),

        LesewerkError::Cancelled => (
            "The analysis was cancelled.",
            "Nothing to do; submit again if you still need the result.".into(),
            Severity::Permanent,
        ),

        LesewerkError::InvalidTransition { .. } => (
            "The client tracked the operation incorrectly.",
            "This is a bug in the client. Please report it with the detail below.".into(),
            Severity::Permanent,
        ),

        LesewerkError::MalformedPayload(_) => (
            "The service returned a result this client does not understand.",
            "The service API may have changed. Check the configured API version.".into(),
            Severity::Permanent,
        ),

        LesewerkError::Config(_) => (
            "The client is not configured correctly.",
            "Set AZ_DOCINT_ENDPOINT and AZ_DOCINT_KEY in the environment or a .env file.".into(),
            Severity::ActionRequired,
        ),

        LesewerkError::Unsupported(_) => (
            "That feature isn't available here.",
            "Use the HTTP transport for derived artifacts such as searchable PDFs.".into(),
            Severity::Permanent,
        ),

        LesewerkError::Io(io_err) => (
            "A file could not be read or written.",
            match io_err.kind() {
                std::io::ErrorKind::NotFound => "Check that the file path exists.".into(),
                std::io::ErrorKind::PermissionDenied => {
                    "Check the file permissions.".into()
                }
                _ => "Check the path and free disk space.".into(),
            },
            Severity::ActionRequired,
        ),

        LesewerkError::Serialization(_) => (
            "Data could not be converted to or from JSON.",
            "Check the config file syntax.".into(),
            Severity::Permanent,
        ),

        // callers pass root(); kept for exhaustiveness
        LesewerkError::Operation { source, .. } => describe(source),
    }
}
