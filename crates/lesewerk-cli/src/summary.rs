// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Totals across a batch run.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use lesewerk_core::result::AnalysisResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    /// Documents with at least one handwritten style span.
    pub handwritten: usize,
    /// Code points across all successful results.
    pub total_chars: usize,
    pub total_pages: usize,
}

impl BatchSummary {
    pub fn record(&mut self, result: &AnalysisResult) {
        self.processed += 1;
        if result.has_handwriting() {
            self.handwritten += 1;
        }
        self.total_chars += result.text_len();
        self.total_pages += result.pages.len();
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch summary")?;
        writeln!(f, "  Processed: {}", self.processed)?;
        writeln!(f, "  Failed: {}", self.failed)?;
        writeln!(f, "  With handwriting: {}", self.handwritten)?;
        writeln!(f, "  Total characters: {}", self.total_chars)?;
        write!(f, "  Total pages: {}", self.total_pages)
    }
}
