// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified analysis result model.
//
// Every model selector produces this one shape. Built once by the
// normalizer from a terminal payload and never mutated afterwards.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Half-open range `[offset, offset + length)` into
/// [`AnalysisResult::full_text`], counted in Unicode code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    pub offset: usize,
    pub length: usize,
}

impl TextSpan {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Whether the span lies within a text of `text_len` code points.
    pub fn fits(&self, text_len: usize) -> bool {
        self.offset
            .checked_add(self.length)
            .is_some_and(|end| end <= text_len)
    }

    /// The referenced text, or `None` if the span runs past the end.
    pub fn slice<'a>(&self, full_text: &'a str) -> Option<&'a str> {
        let mut indices = full_text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(full_text.len()));
        let start = indices.nth(self.offset)?;
        let end = if self.length == 0 {
            start
        } else {
            indices.nth(self.length - 1)?
        };
        full_text.get(start..end)
    }

    /// Smallest span covering every span in `spans`.
    pub fn covering(spans: &[TextSpan]) -> Option<TextSpan> {
        let start = spans.iter().map(|s| s.offset).min()?;
        let end = spans.iter().map(TextSpan::end).max()?;
        Some(TextSpan::new(start, end - start))
    }
}

/// Four corner points, flattened as `[x1, y1, x2, y2, x3, y3, x4, y4]`,
/// clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingPolygon(pub [f64; 8]);

impl BoundingPolygon {
    /// Build from a flat coordinate list; `None` unless exactly 8 values.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        let array: [f64; 8] = coords.try_into().ok()?;
        Some(Self(array))
    }

    pub fn coords(&self) -> &[f64; 8] {
        &self.0
    }

    /// Corner points as `(x, y)` pairs.
    pub fn points(&self) -> [(f64, f64); 4] {
        let c = &self.0;
        [(c[0], c[1]), (c[2], c[3]), (c[4], c[5]), (c[6], c[7])]
    }
}

/// Unit for page dimensions and polygon coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthUnit {
    /// Images.
    Pixel,
    /// PDF and office documents.
    Inch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub polygon: Option<BoundingPolygon>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub confidence: f32,
    pub polygon: Option<BoundingPolygon>,
    pub span: TextSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionState {
    Selected,
    Unselected,
}

/// A detected checkbox or radio button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionMark {
    pub state: SelectionState,
    pub confidence: f32,
    pub polygon: Option<BoundingPolygon>,
    pub span: Option<TextSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based.
    pub page_number: u32,
    /// Zero for formats without physical pages (Office, HTML).
    pub width: f64,
    pub height: f64,
    /// Absent for formats without physical pages.
    pub unit: Option<LengthUnit>,
    /// Clockwise text rotation in degrees, `(-180, 180]`.
    pub rotation_angle: f64,
    pub lines: Vec<Line>,
    pub words: Vec<Word>,
    pub selection_marks: Vec<SelectionMark>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// Column header (or the stub head above row headers).
    Header,
    RowHeader,
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row_index: usize,
    pub column_index: usize,
    pub row_span: usize,
    pub column_span: usize,
    pub kind: CellKind,
    pub text: String,
    /// Page the cell appears on, when the service reports it.
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<TableCell>,
    /// Pages the table spans.
    pub page_numbers: Vec<u32>,
}

impl Table {
    /// Cell anchored at `(row, column)`.
    pub fn cell(&self, row: usize, column: usize) -> Option<&TableCell> {
        self.cells
            .iter()
            .find(|c| c.row_index == row && c.column_index == column)
    }

    /// Anchored cells grouped by row, each row ordered by column.
    pub fn rows(&self) -> Vec<Vec<&TableCell>> {
        let mut rows: Vec<Vec<&TableCell>> = vec![Vec::new(); self.row_count];
        for cell in &self.cells {
            if let Some(row) = rows.get_mut(cell.row_index) {
                row.push(cell);
            }
        }
        for row in &mut rows {
            row.sort_by_key(|c| c.column_index);
        }
        rows
    }
}

/// Text plus the span it occupies in the full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpannedText {
    pub content: String,
    pub span: TextSpan,
}

/// A form label and its (possibly missing) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: SpannedText,
    pub value: Option<SpannedText>,
    pub key_confidence: f32,
    pub value_confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLanguage {
    /// BCP-47 tag, e.g. `en`, `zh-Hans`.
    pub locale: String,
    pub confidence: f32,
    pub spans: Vec<TextSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedStyle {
    pub is_handwritten: bool,
    pub confidence: f32,
    pub spans: Vec<TextSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyValue {
    pub amount: f64,
    /// ISO 4217 code, e.g. `USD`.
    pub code: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValue {
    pub house_number: Option<String>,
    pub road: Option<String>,
    pub street_address: Option<String>,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country_region: Option<String>,
}

/// Typed value of a specialized field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Number(f64),
    Integer(i64),
    Currency(CurrencyValue),
    PhoneNumber(String),
    Address(AddressValue),
    CountryRegion(String),
    Boolean(bool),
    SelectionMark(SelectionState),
    Array(Vec<Field>),
    Object(BTreeMap<String, Field>),
}

/// One extracted field, possibly nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub value: FieldValue,
    /// Text as it appears in the document.
    pub content: Option<String>,
    pub confidence: Option<f32>,
}

impl Field {
    pub fn as_array(&self) -> Option<&[Field]> {
        match &self.value {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Field>> {
        match &self.value {
            FieldValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Follow a `/`-separated path through objects and array indices,
    /// e.g. `Items/0/Description`.
    pub fn get(&self, path: &str) -> Option<&Field> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |field, segment| match &field.value {
                FieldValue::Object(map) => map.get(segment),
                FieldValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }
}

/// One document found by a specialized model (a photo may hold several
/// receipts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// E.g. `receipt.retailMeal`, `idDocument.driverLicense`.
    pub doc_type: String,
    pub confidence: Option<f32>,
    pub fields: BTreeMap<String, Field>,
}

/// The normalized output of one completed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub model_id: String,
    /// Whole document text in reading order.
    pub full_text: String,
    pub pages: Vec<Page>,
    pub tables: Vec<Table>,
    /// Only populated for the general-form selector.
    pub key_value_pairs: Vec<KeyValuePair>,
    /// Only populated for specialized selectors.
    pub documents: Vec<ExtractedDocument>,
    pub detected_languages: Vec<DetectedLanguage>,
    pub detected_styles: Vec<DetectedStyle>,
}

impl AnalysisResult {
    /// Fields of the first extracted document.
    pub fn specialized_fields(&self) -> Option<&BTreeMap<String, Field>> {
        self.documents.first().map(|doc| &doc.fields)
    }

    pub fn has_handwriting(&self) -> bool {
        self.detected_styles.iter().any(|s| s.is_handwritten)
    }

    /// Text covered by handwritten style spans.
    pub fn handwritten_samples(&self) -> Vec<&str> {
        self.detected_styles
            .iter()
            .filter(|s| s.is_handwritten)
            .flat_map(|s| s.spans.iter())
            .filter_map(|span| span.slice(&self.full_text))
            .collect()
    }

    /// Length of [`Self::full_text`] in code points, the unit spans use.
    pub fn text_len(&self) -> usize {
        self.full_text.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.pages.iter().map(|p| p.words.len()).sum()
    }
}
