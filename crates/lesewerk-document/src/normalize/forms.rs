// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key-value pairs from general form analysis.

use lesewerk_core::error::Result;
use lesewerk_core::result::{KeyValuePair, SpannedText};

use super::{SpanCheck, confidence, malformed};
use crate::raw::{RawDocumentElement, RawKeyValuePair};

/// The service reports one confidence per pair; it is applied to both sides.
pub(super) fn key_value_pairs(
    raw: Vec<RawKeyValuePair>,
    check: &SpanCheck,
) -> Result<Vec<KeyValuePair>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, pair)| {
            let at = || format!("keyValuePairs[{i}]");
            let score = confidence(pair.confidence, at)?;
            let key = pair
                .key
                .ok_or_else(|| malformed(format!("{}: key is missing", at())))?;
            let key = spanned(key, || format!("keyValuePairs[{i}].key"), check)?;
            let value = pair
                .value
                .map(|value| spanned(value, || format!("keyValuePairs[{i}].value"), check))
                .transpose()?;
            Ok(KeyValuePair {
                key,
                value_confidence: value.as_ref().map(|_| score),
                value,
                key_confidence: score,
            })
        })
        .collect()
}

fn spanned(
    raw: RawDocumentElement,
    at: impl Fn() -> String,
    check: &SpanCheck,
) -> Result<SpannedText> {
    Ok(SpannedText {
        span: check.covering(&raw.spans, at)?,
        content: raw.content,
    })
}
