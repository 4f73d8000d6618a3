// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk Document: result normalization for the Lesewerk client.
//
// Maps the service's model-dependent `analyzeResult` payloads (read, layout,
// general form, specialized schemas) into the single `AnalysisResult` model
// from `lesewerk-core`, rejecting payloads that break the format contract.

pub mod normalize;
pub mod raw;

pub use normalize::{Normalizer, normalize};
