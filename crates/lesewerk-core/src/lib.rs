// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk Core: types, result model, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod report;
pub mod result;
pub mod types;

pub use config::{ClientConfig, RetryConfig, TrackerConfig};
pub use error::{ErrorKind, LesewerkError, Result};
pub use result::*;
pub use types::*;
