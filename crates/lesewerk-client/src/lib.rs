// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk Client: transport to the document analysis service, retry
// policy, and the operation tracker that turns submit/poll/fetch into a
// single `run()` call.

pub mod http;
pub mod retry;
pub mod scripted;
pub mod tracker;
pub mod transport;

pub use http::HttpTransport;
pub use scripted::ScriptedTransport;
pub use tracker::{AnalysisOutcome, CancelHandle, Operation, OperationTracker, run_batch};
pub use transport::Transport;
