// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backoff policy for status polls and result fetches.
//
// Only transient errors are retried. Credentials, quota and configuration
// problems go back to the caller untouched.

use std::io;
use std::time::Duration;

use lesewerk_core::config::RetryConfig;
use lesewerk_core::error::LesewerkError;
use lesewerk_core::types::ErrorClass;
use tracing::{debug, warn};

/// What to do after a failed poll or fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try the same call again.
    RetryAfter(Duration),
    /// Retrying cannot help; the class says why.
    GiveUp(ErrorClass),
    /// Transient, but the per-call budget is spent.
    Exhausted,
}

/// Sort an error into the retry classes, looking through operation context.
pub fn classify_error(err: &LesewerkError) -> ErrorClass {
    use LesewerkError as E;

    match err {
        E::Operation { source, .. } => classify_error(source),

        // Connection resets, 5xx and 408 from the service, and 429 on
        // status or result calls.
        E::Transport(_) | E::Throttled { .. } => ErrorClass::Transient,

        E::Authentication(_) | E::QuotaExceeded { .. } | E::Config(_) => ErrorClass::UserAction,

        E::Io(io_err) => io_class(io_err.kind()),

        E::InvalidDocument(_)
        | E::OperationNotFound(_)
        | E::ResultNotReady(_)
        | E::AnalysisFailed { .. }
        | E::Timeout(_)
        | E::Cancelled
        | E::InvalidTransition { .. }
        | E::MalformedPayload(_)
        | E::Unsupported(_)
        | E::Serialization(_) => ErrorClass::Permanent,
    }
}

fn io_class(kind: io::ErrorKind) -> ErrorClass {
    match kind {
        io::ErrorKind::TimedOut
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::Interrupted => ErrorClass::Transient,
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => ErrorClass::UserAction,
        _ => ErrorClass::Permanent,
    }
}

/// Decide the next step after `err`.
///
/// `attempt` counts the failures already retried for the current call, so a
/// cap of 5 tolerates five consecutive failures and surfaces the sixth. A
/// throttled call waits as long as the service asked instead of backing off.
pub fn should_retry(err: &LesewerkError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    let class = classify_error(err);
    if class != ErrorClass::Transient {
        debug!(error = %err, ?class, "not retrying");
        return RetryDecision::GiveUp(class);
    }
    if attempt >= config.max_retries {
        warn!(attempt, max_retries = config.max_retries, error = %err, "retries exhausted");
        return RetryDecision::Exhausted;
    }
    let delay = err
        .retry_after()
        .unwrap_or_else(|| compute_delay(attempt, config));
    debug!(attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");
    RetryDecision::RetryAfter(delay)
}

/// Backoff for the given attempt: `min(base * 2^attempt + jitter, max_delay)`
/// with `jitter` in `[0, base)`.
pub fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let cap = config.max_delay.as_millis() as u64;
    let doubled = base.saturating_mul(1u64 << attempt.min(10));
    Duration::from_millis(doubled.saturating_add(jitter(base, attempt)).min(cap))
}

/// Deterministic spread in `[0, base)` so concurrent trackers do not poll in
/// lockstep.
fn jitter(base: u64, attempt: u32) -> u64 {
    let hash = (u64::from(attempt) + 1).wrapping_mul(6364136223846793005);
    (hash >> 33) % base.max(1)
}

#[cfg(test)]
mod tests {
    use lesewerk_core::types::{OperationId, OperationState};

    use super::*;

    fn policy(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(4),
        }
    }

    #[test]
    fn classes_follow_the_error_taxonomy() {
        let cases = [
            (LesewerkError::Transport("HTTP 503".into()), ErrorClass::Transient),
            (LesewerkError::Authentication("bad key".into()), ErrorClass::UserAction),
            (
                LesewerkError::QuotaExceeded {
                    message: "429".into(),
                    retry_after: None,
                },
                ErrorClass::UserAction,
            ),
            (LesewerkError::MalformedPayload("no pages".into()), ErrorClass::Permanent),
            (LesewerkError::OperationNotFound("op".into()), ErrorClass::Permanent),
            (
                LesewerkError::Io(io::Error::from(io::ErrorKind::ConnectionReset)),
                ErrorClass::Transient,
            ),
        ];
        for (err, class) in &cases {
            assert_eq!(classify_error(err), *class, "{err}");
        }
    }

    #[test]
    fn context_wrapper_keeps_the_inner_class() {
        let err = LesewerkError::Transport("reset".into())
            .in_operation(&OperationId::new("op-7"), OperationState::Running);
        assert_eq!(classify_error(&err), ErrorClass::Transient);
    }

    #[test]
    fn transient_errors_retry_until_the_cap() {
        let err = LesewerkError::Transport("connection refused".into());
        let config = policy(3);
        for attempt in 0..3 {
            assert!(matches!(
                should_retry(&err, attempt, &config),
                RetryDecision::RetryAfter(_)
            ));
        }
        assert_eq!(should_retry(&err, 3, &config), RetryDecision::Exhausted);
    }

    #[test]
    fn throttled_calls_wait_as_asked() {
        let config = policy(5);
        let throttled = LesewerkError::Throttled {
            message: "429".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(classify_error(&throttled), ErrorClass::Transient);
        assert_eq!(
            should_retry(&throttled, 1, &config),
            RetryDecision::RetryAfter(Duration::from_secs(3))
        );

        let no_hint = LesewerkError::Throttled {
            message: "429".into(),
            retry_after: None,
        };
        assert_eq!(
            should_retry(&no_hint, 2, &config),
            RetryDecision::RetryAfter(compute_delay(2, &config))
        );
        assert_eq!(should_retry(&no_hint, 5, &config), RetryDecision::Exhausted);
    }

    #[test]
    fn non_transient_errors_give_up_immediately() {
        let config = policy(5);
        assert_eq!(
            should_retry(&LesewerkError::InvalidDocument("corrupt".into()), 0, &config),
            RetryDecision::GiveUp(ErrorClass::Permanent)
        );
        assert_eq!(
            should_retry(&LesewerkError::Authentication("401".into()), 0, &config),
            RetryDecision::GiveUp(ErrorClass::UserAction)
        );
    }

    #[test]
    fn backoff_doubles_and_stays_within_bounds() {
        let config = policy(5);
        let delays: Vec<Duration> = (0..4).map(|a| compute_delay(a, &config)).collect();
        assert!(delays.windows(2).all(|w| w[1] > w[0]));
        assert!(delays[0] >= config.base_delay);
        assert!(delays[0] < config.base_delay * 2);
        assert_eq!(compute_delay(20, &config), config.max_delay);
    }
}
