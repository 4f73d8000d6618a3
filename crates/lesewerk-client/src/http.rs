// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP transport for the Azure AI Document Intelligence REST API.
//
// Operations used (api-version 2024-11-30):
//   - Analyze document     POST   documentModels/{model}:analyze
//   - Get analyze result   GET    documentModels/{model}/analyzeResults/{id}
//   - Get result PDF       GET    documentModels/{model}/analyzeResults/{id}/pdf
//   - Delete result        DELETE documentModels/{model}/analyzeResults/{id}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use lesewerk_core::config::ClientConfig;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{
    AnalysisRequest, OperationHandle, OperationId, OutputOption, RawPayload, RawStatus,
    RemoteError, RemoteStatus,
};

use crate::transport::Transport;

const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const REQUEST_ID_HEADER: &str = "x-ms-client-request-id";
const OPERATION_LOCATION: &str = "operation-location";
const RETRY_AFTER_MS: &str = "retry-after-ms";

/// Which call produced an HTTP error; the same status means different things
/// on submit and on poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Submit,
    Poll,
    Fetch,
    Cancel,
}

/// Transport over HTTPS with API-key authentication.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Build a transport from validated configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| LesewerkError::Transport(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_owned(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(API_KEY_HEADER, &self.api_key)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(model = %request.model(), bytes = request.document().len()))]
    async fn submit(&self, request: &AnalysisRequest) -> Result<OperationHandle> {
        let url = analyze_url(&self.base_url, &self.api_version, request)?;
        debug!(fingerprint = %request.fingerprint(), mime = request.document_type().mime_type(), "submitting document");

        let response = self
            .authorized(self.client.post(url))
            .header(CONTENT_TYPE, request.document_type().mime_type())
            .body(request.document().to_vec())
            .send()
            .await
            .map_err(|e| network_error("submit", e))?;

        let status = response.status();
        let headers = response.headers().clone();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "analyze request rejected");
            return Err(error_for_status(status, &body, parse_retry_after(&headers), Phase::Submit));
        }

        let location = headers
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                LesewerkError::MalformedPayload("202 response without Operation-Location".into())
            })?;
        let id = parse_operation_location(location).ok_or_else(|| {
            LesewerkError::MalformedPayload(format!("unrecognised Operation-Location '{location}'"))
        })?;

        info!(operation_id = %id, "analysis accepted");
        Ok(OperationHandle {
            id,
            model: request.model().clone(),
            status_url: location.to_owned(),
            retry_after: parse_retry_after(&headers),
        })
    }

    #[instrument(skip(self, handle), fields(operation_id = %handle.id))]
    async fn poll(&self, handle: &OperationHandle) -> Result<RawStatus> {
        let (body, headers) = self.get_status(handle, Phase::Poll).await?;
        let parsed: StatusBody = serde_json::from_slice(&body)
            .map_err(|e| LesewerkError::MalformedPayload(format!("status response: {e}")))?;

        debug!(status = ?parsed.status, "polled");
        Ok(RawStatus {
            status: parsed.status,
            retry_after: parse_retry_after(&headers),
            error: parsed.error.map(ServiceError::into_remote),
        })
    }

    #[instrument(skip(self, handle), fields(operation_id = %handle.id))]
    async fn fetch_result(&self, handle: &OperationHandle) -> Result<RawPayload> {
        let (body, _) = self.get_status(handle, Phase::Fetch).await?;
        let parsed: ResultBody = serde_json::from_slice(&body)
            .map_err(|e| LesewerkError::MalformedPayload(format!("result response: {e}")))?;

        if parsed.status != RemoteStatus::Succeeded {
            return Err(LesewerkError::ResultNotReady(handle.id.to_string()));
        }
        let result = parsed.analyze_result.ok_or_else(|| {
            LesewerkError::MalformedPayload("succeeded operation without analyzeResult".into())
        })?;
        debug!(bytes = body.len(), "fetched result");
        Ok(RawPayload::new(result))
    }

    #[instrument(skip(self, handle), fields(operation_id = %handle.id))]
    async fn cancel(&self, handle: &OperationHandle) -> Result<()> {
        let response = self
            .authorized(self.client.delete(&handle.status_url))
            .send()
            .await
            .map_err(|e| network_error("cancel", e))?;
        let status = response.status();
        // The service refuses to delete a running job; the caller stops
        // waiting either way.
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
            debug!(status = status.as_u16(), "cancel notification sent");
            return Ok(());
        }
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body, parse_retry_after(&headers), Phase::Cancel))
    }

    #[instrument(skip(self, handle), fields(operation_id = %handle.id))]
    async fn fetch_searchable_pdf(&self, handle: &OperationHandle) -> Result<Vec<u8>> {
        let url = artifact_url(&handle.status_url, OutputOption::SearchablePdf.wire_name())?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| network_error("fetch pdf", e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body, parse_retry_after(&headers), Phase::Fetch));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| network_error("fetch pdf", e))?;
        info!(bytes = bytes.len(), "searchable PDF downloaded");
        Ok(bytes.to_vec())
    }
}

impl HttpTransport {
    async fn get_status(
        &self,
        handle: &OperationHandle,
        phase: Phase,
    ) -> Result<(Vec<u8>, HeaderMap)> {
        let response = self
            .authorized(self.client.get(&handle.status_url))
            .send()
            .await
            .map_err(|e| network_error("get result", e))?;

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body, parse_retry_after(&headers), phase));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| network_error("read result body", e))?;
        Ok((body.to_vec(), headers))
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: RemoteStatus,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultBody {
    status: RemoteStatus,
    analyze_result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ServiceError {
    fn into_remote(self) -> RemoteError {
        RemoteError {
            code: self.code,
            message: self.message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ServiceError,
}

/// Build the analyze URL for `request`.
pub fn analyze_url(base_url: &str, api_version: &str, request: &AnalysisRequest) -> Result<Url> {
    let model = request.model();
    let raw = format!(
        "{base_url}/documentintelligence/documentModels/{}:analyze",
        model.model_id()
    );
    let mut url = Url::parse(&raw)
        .map_err(|e| LesewerkError::Config(format!("invalid endpoint '{base_url}': {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("api-version", api_version);
        query.append_pair("stringIndexType", "unicodeCodePoint");
        if !model.features().is_empty() {
            query.append_pair("features", &model.features().join(","));
        }
        let outputs: Vec<&str> = request.output().iter().map(|o| o.wire_name()).collect();
        if !outputs.is_empty() {
            query.append_pair("output", &outputs.join(","));
        }
        if let Some(locale) = request.locale() {
            query.append_pair("locale", locale);
        }
        if let Some(pages) = request.pages() {
            query.append_pair("pages", pages);
        }
    }
    Ok(url)
}

/// Extract the result id from an `Operation-Location` header.
pub fn parse_operation_location(location: &str) -> Option<OperationId> {
    let (_, rest) = location.split_once("/analyzeResults/")?;
    let id = rest.split(['?', '/']).next()?;
    if id.is_empty() {
        None
    } else {
        Some(OperationId::new(id))
    }
}

/// Append `/{suffix}` to the path of a status URL, keeping its query.
pub fn artifact_url(status_url: &str, suffix: &str) -> Result<Url> {
    let mut url = Url::parse(status_url)
        .map_err(|e| LesewerkError::MalformedPayload(format!("invalid status URL: {e}")))?;
    let path = format!("{}/{suffix}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

/// Poll interval hint from `retry-after-ms` or `Retry-After` (seconds).
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ms) = header_str(headers, RETRY_AFTER_MS).and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_millis(ms));
    }
    header_str(headers, RETRY_AFTER.as_str())
        .and_then(|v| v.parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Map a non-success HTTP status to the error taxonomy.
pub fn error_for_status(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
    phase: Phase,
) -> LesewerkError {
    let detail = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => {
            format!("{} ({})", envelope.error.message, envelope.error.code)
        }
        _ if body.trim().is_empty() => status.to_string(),
        _ => format!("{status}: {}", truncate(body.trim(), 200)),
    };

    match status.as_u16() {
        401 | 403 => LesewerkError::Authentication(detail),
        429 if phase == Phase::Submit => LesewerkError::QuotaExceeded {
            message: detail,
            retry_after,
        },
        429 => LesewerkError::Throttled {
            message: detail,
            retry_after,
        },
        400 | 413 | 415 if phase == Phase::Submit => LesewerkError::InvalidDocument(detail),
        404 if phase == Phase::Submit => {
            LesewerkError::Config(format!("model or endpoint not found: {detail}"))
        }
        404 => LesewerkError::OperationNotFound(detail),
        _ => LesewerkError::Transport(format!("HTTP {}: {detail}", status.as_u16())),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn network_error(action: &str, err: reqwest::Error) -> LesewerkError {
    if err.is_timeout() {
        LesewerkError::Transport(format!("{action}: request timed out"))
    } else {
        LesewerkError::Transport(format!("{action}: {err}"))
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use lesewerk_core::error::ErrorKind;
    use lesewerk_core::types::{ErrorClass, ModelSelector, SpecializedModel};

    use crate::retry::classify_error;

    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";
    const BASE: &str = "https://lesewerk-test.cognitiveservices.azure.com";
    const LOCATION: &str = "https://lesewerk-test.cognitiveservices.azure.com/documentintelligence/documentModels/prebuilt-read/analyzeResults/3b31320d-8bab-4f88-b19c-2322a7f11034?api-version=2024-11-30";

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn analyze_url_carries_model_and_options() {
        let request = AnalysisRequest::new(ModelSelector::GeneralForm, PDF.to_vec())
            .unwrap()
            .with_output(OutputOption::SearchablePdf)
            .with_locale("de-DE")
            .with_pages("1-3,5");
        let url = analyze_url(BASE, "2024-11-30", &request).unwrap();

        assert_eq!(
            url.path(),
            "/documentintelligence/documentModels/prebuilt-layout:analyze"
        );
        assert_eq!(query(&url, "api-version").as_deref(), Some("2024-11-30"));
        assert_eq!(query(&url, "stringIndexType").as_deref(), Some("unicodeCodePoint"));
        assert_eq!(query(&url, "features").as_deref(), Some("keyValuePairs"));
        assert_eq!(query(&url, "output").as_deref(), Some("pdf"));
        assert_eq!(query(&url, "locale").as_deref(), Some("de-DE"));
        assert_eq!(query(&url, "pages").as_deref(), Some("1-3,5"));
    }

    #[test]
    fn plain_request_has_no_optional_parameters() {
        let model = ModelSelector::Specialized(SpecializedModel::Receipt);
        let request = AnalysisRequest::new(model, PDF.to_vec()).unwrap();
        let url = analyze_url(BASE, "2024-11-30", &request).unwrap();
        assert!(url.path().ends_with("prebuilt-receipt:analyze"));
        assert!(query(&url, "features").is_none());
        assert!(query(&url, "output").is_none());
    }

    #[test]
    fn operation_location_yields_result_id() {
        let id = parse_operation_location(LOCATION).unwrap();
        assert_eq!(id.as_str(), "3b31320d-8bab-4f88-b19c-2322a7f11034");
        assert!(parse_operation_location("https://example.com/operations/1").is_none());
        assert!(parse_operation_location("https://x/analyzeResults/?a=b").is_none());
    }

    #[test]
    fn pdf_url_extends_status_path() {
        let url = artifact_url(LOCATION, "pdf").unwrap();
        assert!(url.path().ends_with("3b31320d-8bab-4f88-b19c-2322a7f11034/pdf"));
        assert_eq!(query(&url, "api-version").as_deref(), Some("2024-11-30"));
    }

    #[test]
    fn retry_after_prefers_milliseconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER_MS, HeaderValue::from_static("750"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(750)));

        let mut bad = HeaderMap::new();
        bad.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&bad), None);
        for value in ["1e30", "-1", "inf", "NaN"] {
            bad.insert(RETRY_AFTER, HeaderValue::from_static(value));
            assert_eq!(parse_retry_after(&bad), None, "{value}");
        }
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let body = r#"{"error":{"code":"InvalidRequest","message":"Invalid request."}}"#;
        let kind = |code: u16, phase| {
            error_for_status(StatusCode::from_u16(code).unwrap(), body, None, phase).kind()
        };
        assert_eq!(kind(401, Phase::Submit), ErrorKind::Authentication);
        assert_eq!(kind(403, Phase::Poll), ErrorKind::Authentication);
        assert_eq!(kind(429, Phase::Submit), ErrorKind::QuotaExceeded);
        assert_eq!(kind(429, Phase::Poll), ErrorKind::Transport);
        assert_eq!(kind(429, Phase::Fetch), ErrorKind::Transport);
        assert_eq!(kind(400, Phase::Submit), ErrorKind::InvalidDocument);
        assert_eq!(kind(415, Phase::Submit), ErrorKind::InvalidDocument);
        assert_eq!(kind(413, Phase::Submit), ErrorKind::InvalidDocument);
        assert_eq!(kind(404, Phase::Poll), ErrorKind::OperationNotFound);
        assert_eq!(kind(404, Phase::Submit), ErrorKind::Config);
        assert_eq!(kind(500, Phase::Poll), ErrorKind::Transport);
        assert_eq!(kind(503, Phase::Submit), ErrorKind::Transport);
        assert_eq!(kind(408, Phase::Poll), ErrorKind::Transport);
    }

    #[test]
    fn error_message_comes_from_service_envelope() {
        let body = r#"{"error":{"code":"401","message":"Access denied due to invalid subscription key."}}"#;
        let err = error_for_status(StatusCode::UNAUTHORIZED, body, None, Phase::Submit);
        assert!(err.to_string().contains("invalid subscription key"));

        let quota = error_for_status(
            StatusCode::TOO_MANY_REQUESTS,
            "",
            Some(Duration::from_secs(7)),
            Phase::Submit,
        );
        assert!(matches!(
            quota,
            LesewerkError::QuotaExceeded { retry_after: Some(d), .. } if d == Duration::from_secs(7)
        ));

        let throttled = error_for_status(
            StatusCode::TOO_MANY_REQUESTS,
            "",
            Some(Duration::from_secs(1)),
            Phase::Poll,
        );
        assert_eq!(classify_error(&throttled), ErrorClass::Transient);
        assert_eq!(throttled.retry_after(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn transport_rejects_missing_credentials() {
        let err = HttpTransport::new(&ClientConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
