// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Lesewerk.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OperationId, OperationState};

/// Top-level error type for all Lesewerk operations.
#[derive(Debug, Error)]
pub enum LesewerkError {
    // -- Remote service errors --
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        /// Service-suggested wait before trying again, when provided.
        retry_after: Option<Duration>,
    },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// A status or result call was rate limited. Reported as a transport
    /// failure; only a rejected submit is a quota problem.
    #[error("throttled: {message}")]
    Throttled {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("result not ready for operation {0}")]
    ResultNotReady(String),

    #[error("remote analysis failed ({code}): {message}")]
    AnalysisFailed { code: String, message: String },

    // -- Lifecycle errors --
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled by caller")]
    Cancelled,

    #[error("invalid operation transition {from} -> {to}")]
    InvalidTransition {
        from: OperationState,
        to: OperationState,
    },

    // -- Payload errors --
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    // -- Local errors --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not supported by this transport: {0}")]
    Unsupported(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Context --
    #[error("operation {operation_id} ({state}): {source}")]
    Operation {
        operation_id: OperationId,
        state: OperationState,
        #[source]
        source: Box<LesewerkError>,
    },
}

/// Flat discriminant of [`LesewerkError`], looking through the
/// [`LesewerkError::Operation`] context wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Authentication,
    QuotaExceeded,
    InvalidDocument,
    Transport,
    OperationNotFound,
    ResultNotReady,
    AnalysisFailed,
    Timeout,
    Cancelled,
    InvalidTransition,
    MalformedPayload,
    Config,
    Unsupported,
    Io,
    Serialization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl LesewerkError {
    /// Attach operation context to an error raised after submission.
    ///
    /// Errors that already carry context are returned unchanged so the
    /// innermost (earliest) operation id and state win.
    pub fn in_operation(self, operation_id: &OperationId, state: OperationState) -> Self {
        match self {
            already @ Self::Operation { .. } => already,
            other => Self::Operation {
                operation_id: operation_id.clone(),
                state,
                source: Box::new(other),
            },
        }
    }

    /// The error without its operation context.
    pub fn root(&self) -> &LesewerkError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::InvalidDocument(_) => ErrorKind::InvalidDocument,
            Self::Transport(_) | Self::Throttled { .. } => ErrorKind::Transport,
            Self::OperationNotFound(_) => ErrorKind::OperationNotFound,
            Self::ResultNotReady(_) => ErrorKind::ResultNotReady,
            Self::AnalysisFailed { .. } => ErrorKind::AnalysisFailed,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::MalformedPayload(_) => ErrorKind::MalformedPayload,
            Self::Config(_) => ErrorKind::Config,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
            // root() never returns the wrapper
            Self::Operation { source, .. } => source.kind(),
        }
    }

    /// Operation id, if the error was raised after submission.
    pub fn operation_id(&self) -> Option<&OperationId> {
        match self {
            Self::Operation { operation_id, .. } => Some(operation_id),
            _ => None,
        }
    }

    /// Last known lifecycle state, if the error was raised after submission.
    pub fn last_state(&self) -> Option<OperationState> {
        match self {
            Self::Operation { state, .. } => Some(*state),
            _ => None,
        }
    }

    /// Wait the service asked for, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.root() {
            Self::QuotaExceeded { retry_after, .. } | Self::Throttled { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LesewerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_looks_through_context() {
        let err = LesewerkError::Timeout(Duration::from_secs(300))
            .in_operation(&OperationId::new("op-1"), OperationState::Failed);
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.operation_id().map(|id| id.as_str()), Some("op-1"));
        assert_eq!(err.last_state(), Some(OperationState::Failed));
    }

    #[test]
    fn context_is_not_stacked() {
        let inner = LesewerkError::Transport("connection reset".into())
            .in_operation(&OperationId::new("first"), OperationState::Running);
        let outer = inner.in_operation(&OperationId::new("second"), OperationState::Failed);
        assert_eq!(outer.operation_id().map(|id| id.as_str()), Some("first"));
        assert_eq!(outer.last_state(), Some(OperationState::Running));
    }

    #[test]
    fn display_includes_operation_and_state() {
        let err = LesewerkError::MalformedPayload("pages missing".into())
            .in_operation(&OperationId::new("abc"), OperationState::Succeeded);
        let text = err.to_string();
        assert!(text.contains("abc"));
        assert!(text.contains("Succeeded"));
        assert!(text.contains("pages missing"));
    }

    #[test]
    fn throttling_counts_as_transport_failure() {
        let err = LesewerkError::Throttled {
            message: "429".into(),
            retry_after: Some(Duration::from_secs(2)),
        }
        .in_operation(&OperationId::new("op-9"), OperationState::Running);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn bare_error_has_no_context() {
        let err = LesewerkError::InvalidDocument("empty payload".into());
        assert_eq!(err.kind(), ErrorKind::InvalidDocument);
        assert!(err.operation_id().is_none());
        assert!(err.last_state().is_none());
    }
}
