// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Normalizer entry point and the validation helpers shared by the layout,
// form, and field converters.
//
// A payload that contradicts the format contract (span past the end of the
// content, cell outside its table, polygon with the wrong arity) is a
// protocol mismatch and fails with `MalformedPayload`. Missing optional data
// is not an error.

mod fields;
mod forms;
mod layout;

use serde::Deserialize;
use tracing::{debug, instrument};

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::result::{AnalysisResult, BoundingPolygon, TextSpan};
use lesewerk_core::types::{ModelSelector, RawPayload};

use crate::raw::{RawAnalyzeResult, RawSpan};

/// Offsets are requested in this unit; anything else breaks span checks.
pub const STRING_INDEX_TYPE: &str = "unicodeCodePoint";

/// Converts raw payloads for one model selector.
#[derive(Debug, Clone)]
pub struct Normalizer {
    model: ModelSelector,
}

impl Normalizer {
    pub fn new(model: ModelSelector) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModelSelector {
        &self.model
    }

    /// Build the unified result from one terminal payload.
    ///
    /// Pure: the same payload always yields an equal result.
    #[instrument(skip_all, fields(model = %self.model))]
    pub fn normalize(&self, payload: &RawPayload) -> Result<AnalysisResult> {
        let value = payload.as_value();
        if !value.is_object() {
            return Err(malformed("analyzeResult is not a JSON object"));
        }
        let raw = RawAnalyzeResult::deserialize(value)
            .map_err(|e| malformed(format!("analyzeResult: {e}")))?;

        if let Some(index_type) = raw.string_index_type.as_deref() {
            if index_type != STRING_INDEX_TYPE {
                return Err(malformed(format!(
                    "offsets use '{index_type}', expected '{STRING_INDEX_TYPE}'"
                )));
            }
        }

        let full_text = raw
            .content
            .ok_or_else(|| malformed("analyzeResult.content is missing"))?;
        let check = SpanCheck::new(&full_text);

        let pages = layout::pages(raw.pages.unwrap_or_default(), &check)?;
        let detected_languages = layout::languages(raw.languages, &check)?;
        let detected_styles = layout::styles(raw.styles, &check)?;

        let tables = if self.model.supports_tables() {
            layout::tables(raw.tables)?
        } else {
            Vec::new()
        };
        let key_value_pairs = if self.model.supports_key_value_pairs() {
            forms::key_value_pairs(raw.key_value_pairs, &check)?
        } else {
            Vec::new()
        };
        let documents = if self.model.supports_fields() {
            fields::documents(raw.documents)?
        } else {
            Vec::new()
        };

        let model_id = raw
            .model_id
            .unwrap_or_else(|| self.model.model_id().to_owned());

        debug!(
            pages = pages.len(),
            tables = tables.len(),
            key_value_pairs = key_value_pairs.len(),
            documents = documents.len(),
            chars = check.text_len,
            "payload normalized"
        );

        Ok(AnalysisResult {
            model_id,
            full_text,
            pages,
            tables,
            key_value_pairs,
            documents,
            detected_languages,
            detected_styles,
        })
    }
}

/// Convenience wrapper around [`Normalizer::normalize`].
pub fn normalize(model: &ModelSelector, payload: &RawPayload) -> Result<AnalysisResult> {
    Normalizer::new(model.clone()).normalize(payload)
}

pub(crate) fn malformed(detail: impl Into<String>) -> LesewerkError {
    LesewerkError::MalformedPayload(detail.into())
}

/// Validates spans against the code point length of the content.
pub(crate) struct SpanCheck {
    text_len: usize,
}

impl SpanCheck {
    fn new(full_text: &str) -> Self {
        Self {
            text_len: full_text.chars().count(),
        }
    }

    pub(crate) fn span(&self, raw: RawSpan, at: impl Fn() -> String) -> Result<TextSpan> {
        let span = TextSpan::new(raw.offset, raw.length);
        if !span.fits(self.text_len) {
            return Err(malformed(format!(
                "{}: span {}+{} exceeds content length {}",
                at(),
                raw.offset,
                raw.length,
                self.text_len
            )));
        }
        Ok(span)
    }

    pub(crate) fn spans(&self, raw: &[RawSpan], at: impl Fn() -> String) -> Result<Vec<TextSpan>> {
        raw.iter().map(|s| self.span(*s, &at)).collect()
    }

    /// Validate every span and merge them into one covering span.
    pub(crate) fn covering(&self, raw: &[RawSpan], at: impl Fn() -> String) -> Result<TextSpan> {
        let spans = self.spans(raw, &at)?;
        TextSpan::covering(&spans).ok_or_else(|| malformed(format!("{}: no text span", at())))
    }
}

pub(crate) fn confidence(value: f32, at: impl Fn() -> String) -> Result<f32> {
    if !(0.0..=1.0).contains(&value) {
        return Err(malformed(format!("{}: confidence {value} outside [0, 1]", at())));
    }
    Ok(value)
}

/// An absent or empty polygon is `None`; anything but 8 values is malformed.
pub(crate) fn polygon(
    raw: Option<&Vec<f64>>,
    at: impl Fn() -> String,
) -> Result<Option<BoundingPolygon>> {
    match raw {
        None => Ok(None),
        Some(coords) if coords.is_empty() => Ok(None),
        Some(coords) => BoundingPolygon::from_slice(coords).map(Some).ok_or_else(|| {
            malformed(format!(
                "{}: polygon has {} coordinates, expected 8",
                at(),
                coords.len()
            ))
        }),
    }
}
