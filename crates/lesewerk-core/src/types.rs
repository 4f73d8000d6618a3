// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: analysis requests, model selectors, and the remote
// operation lifecycle.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LesewerkError, Result};

/// Largest document the service accepts on paid tiers.
pub const MAX_DOCUMENT_BYTES: usize = 500 * 1024 * 1024;

/// Industry-specific prebuilt schemas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecializedModel {
    Invoice,
    Receipt,
    IdDocument,
    /// US bank statements only.
    BankStatementUs,
    CreditCard,
    /// Any other prebuilt or custom model id.
    Other(String),
}

impl SpecializedModel {
    pub fn model_id(&self) -> &str {
        match self {
            Self::Invoice => "prebuilt-invoice",
            Self::Receipt => "prebuilt-receipt",
            Self::IdDocument => "prebuilt-idDocument",
            Self::BankStatementUs => "prebuilt-bankStatement.us",
            Self::CreditCard => "prebuilt-creditCard",
            Self::Other(id) => id,
        }
    }
}

/// Which remote analysis profile to run on a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelSelector {
    /// OCR only: text, lines, words, languages, handwriting styles.
    PlainText,
    /// Layout: everything in `PlainText` plus tables and selection marks.
    Structure,
    /// Layout with key-value pair extraction enabled.
    GeneralForm,
    /// Industry schema producing typed fields.
    Specialized(SpecializedModel),
}

impl ModelSelector {
    /// Remote model id.
    pub fn model_id(&self) -> &str {
        match self {
            Self::PlainText => "prebuilt-read",
            Self::Structure | Self::GeneralForm => "prebuilt-layout",
            Self::Specialized(model) => model.model_id(),
        }
    }

    /// Optional analysis features the remote must enable for this selector.
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Self::GeneralForm => &["keyValuePairs"],
            _ => &[],
        }
    }

    pub fn supports_tables(&self) -> bool {
        !matches!(self, Self::PlainText)
    }

    pub fn supports_key_value_pairs(&self) -> bool {
        matches!(self, Self::GeneralForm)
    }

    pub fn supports_fields(&self) -> bool {
        matches!(self, Self::Specialized(_))
    }

    /// Map a remote model id back to a selector.
    ///
    /// `prebuilt-document` is the retired general-document model; it maps to
    /// [`ModelSelector::GeneralForm`].
    pub fn from_model_id(id: &str) -> Self {
        match id {
            "prebuilt-read" => Self::PlainText,
            "prebuilt-layout" => Self::Structure,
            "prebuilt-document" => Self::GeneralForm,
            "prebuilt-invoice" => Self::Specialized(SpecializedModel::Invoice),
            "prebuilt-receipt" => Self::Specialized(SpecializedModel::Receipt),
            "prebuilt-idDocument" => Self::Specialized(SpecializedModel::IdDocument),
            "prebuilt-bankStatement.us" => Self::Specialized(SpecializedModel::BankStatementUs),
            "prebuilt-creditCard" => Self::Specialized(SpecializedModel::CreditCard),
            other => Self::Specialized(SpecializedModel::Other(other.to_owned())),
        }
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.model_id())?;
        for feature in self.features() {
            write!(f, "+{feature}")?;
        }
        Ok(())
    }
}

impl FromStr for ModelSelector {
    type Err = LesewerkError;

    /// Accepts short names (`read`, `layout`, `general`, `invoice`, ...),
    /// `prebuilt-*` ids, and `custom:<model-id>`.
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        let selector = match name.to_ascii_lowercase().as_str() {
            "read" | "plain-text" | "text" => Self::PlainText,
            "layout" | "structure" => Self::Structure,
            "general" | "general-form" | "document" => Self::GeneralForm,
            "invoice" => Self::Specialized(SpecializedModel::Invoice),
            "receipt" => Self::Specialized(SpecializedModel::Receipt),
            "id-document" | "id" => Self::Specialized(SpecializedModel::IdDocument),
            "bank-statement" => Self::Specialized(SpecializedModel::BankStatementUs),
            "credit-card" => Self::Specialized(SpecializedModel::CreditCard),
            _ if name.starts_with("prebuilt-") => Self::from_model_id(name),
            _ => match name.strip_prefix("custom:") {
                Some(id) if !id.is_empty() => {
                    Self::Specialized(SpecializedModel::Other(id.to_owned()))
                }
                _ => {
                    return Err(LesewerkError::Config(format!(
                        "unknown model '{name}' (expected read, layout, general, invoice, \
                         receipt, id-document, bank-statement, credit-card, prebuilt-* or custom:<id>)"
                    )));
                }
            },
        };
        Ok(selector)
    }
}

/// Optional artifacts the remote can derive from the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputOption {
    /// Input document with an invisible text layer (searchable PDF).
    SearchablePdf,
}

impl OutputOption {
    /// Value of the remote `output` query parameter.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::SearchablePdf => "pdf",
        }
    }
}

/// Supported input document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    Jpeg,
    Png,
    Tiff,
    Bmp,
    Heif,
    Docx,
    Xlsx,
    Pptx,
    Html,
}

impl DocumentType {
    /// MIME type string for the request Content-Type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
            Self::Heif => "image/heif",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Html => "text/html",
        }
    }

    /// Infer document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            "heif" | "heic" => Some(Self::Heif),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pptx" => Some(Self::Pptx),
            "htm" | "html" => Some(Self::Html),
            _ => None,
        }
    }

    /// Sniff the document type from its leading bytes.
    ///
    /// Office Open XML files are ZIP containers; the extension hint picks
    /// between them and `Docx` is assumed without one.
    pub fn from_magic(bytes: &[u8], extension_hint: Option<&str>) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            return Some(Self::Tiff);
        }
        if bytes.starts_with(b"BM") && bytes.len() > 14 {
            return Some(Self::Bmp);
        }
        if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
            let brand = &bytes[8..12];
            if [b"heic", b"heix", b"mif1", b"msf1", b"heif"]
                .iter()
                .any(|b| brand == *b)
            {
                return Some(Self::Heif);
            }
        }
        if bytes.starts_with(b"PK\x03\x04") {
            return match extension_hint.and_then(Self::from_extension) {
                Some(office @ (Self::Docx | Self::Xlsx | Self::Pptx)) => Some(office),
                _ => Some(Self::Docx),
            };
        }
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).to_ascii_lowercase();
        let head = head.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("<!doctype html") || head.starts_with("<html") {
            return Some(Self::Html);
        }
        None
    }
}

/// One document submission. Immutable once built.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    model: ModelSelector,
    document: Vec<u8>,
    document_type: DocumentType,
    output: BTreeSet<OutputOption>,
    locale: Option<String>,
    pages: Option<String>,
}

impl AnalysisRequest {
    /// Build a request, sniffing the document type from the payload.
    ///
    /// Fails with [`LesewerkError::InvalidDocument`] for an empty, oversized,
    /// or unrecognised payload, so nothing is ever sent for such input.
    pub fn new(model: ModelSelector, document: Vec<u8>) -> Result<Self> {
        Self::with_extension_hint(model, document, None)
    }

    /// Like [`AnalysisRequest::new`], using a file extension to disambiguate
    /// container formats.
    pub fn with_extension_hint(
        model: ModelSelector,
        document: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<Self> {
        if document.is_empty() {
            return Err(LesewerkError::InvalidDocument("document is empty".into()));
        }
        if document.len() > MAX_DOCUMENT_BYTES {
            return Err(LesewerkError::InvalidDocument(format!(
                "document is {} bytes, limit is {MAX_DOCUMENT_BYTES}",
                document.len()
            )));
        }
        let document_type = DocumentType::from_magic(&document, extension).ok_or_else(|| {
            LesewerkError::InvalidDocument("unrecognised or corrupt document format".into())
        })?;

        Ok(Self {
            model,
            document,
            document_type,
            output: BTreeSet::new(),
            locale: None,
            pages: None,
        })
    }

    /// Request an additional derived artifact.
    pub fn with_output(mut self, option: OutputOption) -> Self {
        self.output.insert(option);
        self
    }

    /// Locale hint for text recognition (e.g. `en-US`).
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Restrict analysis to a page selection such as `1-3,5`.
    pub fn with_pages(mut self, pages: impl Into<String>) -> Self {
        self.pages = Some(pages.into());
        self
    }

    pub fn model(&self) -> &ModelSelector {
        &self.model
    }

    pub fn document(&self) -> &[u8] {
        &self.document
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn output(&self) -> &BTreeSet<OutputOption> {
        &self.output
    }

    pub fn wants(&self, option: OutputOption) -> bool {
        self.output.contains(&option)
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn pages(&self) -> Option<&str> {
        self.pages.as_deref()
    }

    /// SHA-256 of the document bytes as lowercase hex, for logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.document);
        hex::encode(hasher.finalize())
    }
}

/// Opaque id the remote service assigns to an analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `Transport::submit` returns: enough to poll and fetch later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub id: OperationId,
    pub model: ModelSelector,
    /// Transport-specific status location (a URL for HTTP).
    pub status_url: String,
    /// Initial poll interval suggested by the service.
    pub retry_after: Option<Duration>,
}

/// Local lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    /// Accepted by the service, not yet seen running.
    Submitted,
    /// At least one poll reported the job in progress.
    Running,
    Succeeded,
    Failed,
    /// Caller gave up on the operation.
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Terminal states have no outgoing transitions; `Running` never returns
    /// to `Submitted`.
    pub fn can_transition_to(&self, next: OperationState) -> bool {
        match self {
            Self::Submitted => true,
            Self::Running => next != Self::Submitted,
            Self::Succeeded | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Job status as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Error detail the service attaches to a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

/// One poll response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatus {
    pub status: RemoteStatus,
    /// Service hint for the next poll.
    pub retry_after: Option<Duration>,
    pub error: Option<RemoteError>,
}

impl RawStatus {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            retry_after: None,
            error: None,
        }
    }
}

/// Final service payload, uninterpreted. Its shape depends on the model.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload(serde_json::Value);

impl RawPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip or gateway error. Safe to retry automatically.
    Transient,
    /// Caller must act (fix credentials, wait for quota, fix config).
    UserAction,
    /// Bad input, protocol mismatch or remote failure.
    Permanent,
}
