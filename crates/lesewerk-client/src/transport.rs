// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport seam between the operation tracker and the remote service.

use async_trait::async_trait;

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{AnalysisRequest, OperationHandle, RawPayload, RawStatus};

/// The network operations the remote analysis service exposes.
///
/// Implementations interpret status codes and headers but never the payload
/// content; that is the normalizer's job. One instance is shared by every
/// tracker in a batch, so implementations must be safe for concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs (e.g. `"http"`).
    fn name(&self) -> &str;

    /// Send the document and model selector. One outbound request.
    ///
    /// Fails with `Authentication`, `QuotaExceeded`, `InvalidDocument` or
    /// `Transport`.
    async fn submit(&self, request: &AnalysisRequest) -> Result<OperationHandle>;

    /// Fetch the current status of the job.
    ///
    /// Fails with `Transport` (or `Throttled`, its rate-limited form) or
    /// `OperationNotFound`.
    async fn poll(&self, handle: &OperationHandle) -> Result<RawStatus>;

    /// Retrieve the final payload of a terminal job.
    ///
    /// Fails with `ResultNotReady` if the job has not finished.
    async fn fetch_result(&self, handle: &OperationHandle) -> Result<RawPayload>;

    /// Tell the service the caller no longer wants this job.
    ///
    /// Best effort: the remote job may keep running.
    async fn cancel(&self, _handle: &OperationHandle) -> Result<()> {
        Ok(())
    }

    /// Retrieve the text-overlaid PDF produced for `OutputOption::SearchablePdf`.
    async fn fetch_searchable_pdf(&self, _handle: &OperationHandle) -> Result<Vec<u8>> {
        Err(LesewerkError::Unsupported(format!(
            "{} transport cannot fetch searchable PDFs",
            self.name()
        )))
    }
}
