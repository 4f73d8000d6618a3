// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wire shapes of the service's `analyzeResult` object.
//
// Everything is optional here; which parts are required depends on the
// model selector and is enforced during normalization, not deserialization.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawSpan {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBoundingRegion {
    pub page_number: Option<u32>,
    #[serde(default)]
    pub polygon: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalyzeResult {
    pub api_version: Option<String>,
    pub model_id: Option<String>,
    pub string_index_type: Option<String>,
    pub content: Option<String>,
    pub pages: Option<Vec<RawPage>>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub key_value_pairs: Vec<RawKeyValuePair>,
    #[serde(default)]
    pub languages: Vec<RawLanguage>,
    #[serde(default)]
    pub styles: Vec<RawStyle>,
    #[serde(default)]
    pub documents: Vec<RawDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    pub page_number: u32,
    pub angle: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub unit: Option<String>,
    #[serde(default)]
    pub words: Vec<RawWord>,
    #[serde(default)]
    pub lines: Vec<RawLine>,
    #[serde(default)]
    pub selection_marks: Vec<RawSelectionMark>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWord {
    pub content: String,
    #[serde(default)]
    pub polygon: Option<Vec<f64>>,
    pub confidence: f32,
    pub span: RawSpan,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLine {
    pub content: String,
    #[serde(default)]
    pub polygon: Option<Vec<f64>>,
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSelectionMark {
    pub state: String,
    #[serde(default)]
    pub polygon: Option<Vec<f64>>,
    pub confidence: f32,
    pub span: Option<RawSpan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTable {
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<RawTableCell>,
    #[serde(default)]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTableCell {
    pub kind: Option<String>,
    pub row_index: usize,
    pub column_index: usize,
    pub row_span: Option<usize>,
    pub column_span: Option<usize>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawKeyValuePair {
    pub key: Option<RawDocumentElement>,
    pub value: Option<RawDocumentElement>,
    pub confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocumentElement {
    pub content: String,
    #[serde(default)]
    pub spans: Vec<RawSpan>,
    #[serde(default)]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLanguage {
    pub locale: String,
    pub confidence: f32,
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStyle {
    pub is_handwritten: Option<bool>,
    pub confidence: f32,
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub doc_type: String,
    pub confidence: Option<f32>,
    #[serde(default)]
    pub fields: BTreeMap<String, RawField>,
}

/// One node of the field tree. `type` names which `value*` member is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawField {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value_string: Option<String>,
    pub value_date: Option<String>,
    pub value_time: Option<String>,
    pub value_phone_number: Option<String>,
    pub value_number: Option<f64>,
    pub value_integer: Option<i64>,
    pub value_selection_mark: Option<String>,
    pub value_signature: Option<String>,
    pub value_country_region: Option<String>,
    pub value_boolean: Option<bool>,
    pub value_currency: Option<RawCurrency>,
    pub value_address: Option<RawAddress>,
    pub value_array: Option<Vec<RawField>>,
    pub value_object: Option<BTreeMap<String, RawField>>,
    pub value_selection_group: Option<Vec<String>>,
    pub content: Option<String>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCurrency {
    pub amount: f64,
    pub currency_symbol: Option<String>,
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAddress {
    pub house_number: Option<String>,
    pub road: Option<String>,
    pub street_address: Option<String>,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country_region: Option<String>,
}
