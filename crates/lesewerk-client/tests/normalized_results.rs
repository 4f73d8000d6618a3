// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end runs over the scripted transport: submit, poll, fetch,
// normalize, and derived artifacts, with payloads shaped like real service
// responses.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use lesewerk_client::scripted::PollStep;
use lesewerk_client::{OperationTracker, ScriptedTransport};
use lesewerk_core::config::TrackerConfig;
use lesewerk_core::error::ErrorKind;
use lesewerk_core::result::{CellKind, FieldValue, SelectionState};
use lesewerk_core::types::{
    AnalysisRequest, ModelSelector, OperationState, OutputOption, RemoteStatus, SpecializedModel,
};

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

fn poly() -> Value {
    json!([0.5, 0.5, 3.0, 0.5, 3.0, 0.8, 0.5, 0.8])
}

/// Layout result for a one-page order form with a table and a checkbox.
fn layout_payload(model_id: &str) -> Value {
    let content = "Order form\nName Qty\nPen 2\n:selected: Express\nSigned Ana";
    json!({
        "apiVersion": "2024-11-30",
        "modelId": model_id,
        "stringIndexType": "unicodeCodePoint",
        "content": content,
        "pages": [{
            "pageNumber": 1,
            "angle": 0.12,
            "width": 8.5,
            "height": 11.0,
            "unit": "inch",
            "words": [
                {"content": "Order", "polygon": poly(), "confidence": 0.99, "span": {"offset": 0, "length": 5}},
                {"content": "form", "polygon": poly(), "confidence": 0.98, "span": {"offset": 6, "length": 4}},
                {"content": "Signed", "polygon": poly(), "confidence": 0.71, "span": {"offset": 45, "length": 6}},
                {"content": "Ana", "polygon": poly(), "confidence": 0.64, "span": {"offset": 52, "length": 3}}
            ],
            "lines": [
                {"content": "Order form", "polygon": poly(), "spans": [{"offset": 0, "length": 10}]},
                {"content": "Signed Ana", "polygon": poly(), "spans": [{"offset": 45, "length": 10}]}
            ],
            "selectionMarks": [
                {"state": "selected", "polygon": poly(), "confidence": 0.93, "span": {"offset": 26, "length": 10}}
            ]
        }],
        "tables": [{
            "rowCount": 2,
            "columnCount": 2,
            "cells": [
                {"kind": "columnHeader", "rowIndex": 0, "columnIndex": 0, "content": "Name", "boundingRegions": [{"pageNumber": 1, "polygon": poly()}]},
                {"kind": "columnHeader", "rowIndex": 0, "columnIndex": 1, "content": "Qty", "boundingRegions": [{"pageNumber": 1, "polygon": poly()}]},
                {"rowIndex": 1, "columnIndex": 0, "content": "Pen", "boundingRegions": [{"pageNumber": 1, "polygon": poly()}]},
                {"rowIndex": 1, "columnIndex": 1, "content": "2", "boundingRegions": [{"pageNumber": 1, "polygon": poly()}]}
            ],
            "boundingRegions": [{"pageNumber": 1, "polygon": poly()}]
        }],
        "keyValuePairs": [
            {"key": {"content": "Name", "spans": [{"offset": 11, "length": 4}]},
             "value": {"content": "Pen", "spans": [{"offset": 20, "length": 3}]},
             "confidence": 0.81},
            {"key": {"content": "Signed", "spans": [{"offset": 45, "length": 6}]},
             "confidence": 0.44}
        ],
        "languages": [{"locale": "en", "confidence": 0.9, "spans": [{"offset": 0, "length": 55}]}],
        "styles": [{"isHandwritten": true, "confidence": 0.88, "spans": [{"offset": 45, "length": 10}]}]
    })
}

fn credit_card_payload() -> Value {
    json!({
        "apiVersion": "2024-11-30",
        "modelId": "prebuilt-creditCard",
        "stringIndexType": "unicodeCodePoint",
        "content": "CONTOSO BANK\n4000 1234 5678 9010\nVALID THRU 01/29\nCHRIS SMITH",
        "pages": [{"pageNumber": 1, "angle": 0.0, "width": 1280.0, "height": 808.0, "unit": "pixel",
                   "lines": [{"content": "CONTOSO BANK", "polygon": poly(), "spans": [{"offset": 0, "length": 12}]}]}],
        "documents": [{
            "docType": "creditCard",
            "confidence": 0.995,
            "fields": {
                "CardHolderName": {"type": "string", "valueString": "CHRIS SMITH", "content": "CHRIS SMITH", "confidence": 0.97},
                "CardNumber": {"type": "string", "valueString": "4000123456789010", "content": "4000 1234 5678 9010", "confidence": 0.99},
                "ExpirationDate": {"type": "string", "valueString": "01/29", "content": "01/29", "confidence": 0.99},
                "IssuingBank": {"type": "string", "content": "CONTOSO BANK", "confidence": 0.9},
                "PaymentNetwork": {"type": "string"}
            }
        }]
    })
}

fn tracker(transport: &Arc<ScriptedTransport>) -> OperationTracker {
    OperationTracker::new(
        transport.clone(),
        TrackerConfig {
            poll_interval: Duration::from_millis(500),
            ..TrackerConfig::default()
        },
    )
}

fn request(model: ModelSelector) -> AnalysisRequest {
    AnalysisRequest::new(model, JPEG.to_vec()).expect("valid jpeg request")
}

#[tokio::test(start_paused = true)]
async fn layout_run_populates_tables_but_not_forms() {
    let transport = Arc::new(
        ScriptedTransport::new(layout_payload("prebuilt-layout")).with_script(vec![
            PollStep::status(RemoteStatus::Running),
            PollStep::status(RemoteStatus::Succeeded),
        ]),
    );
    let outcome = tracker(&transport)
        .run(&request(ModelSelector::Structure))
        .await
        .expect("layout run");

    let result = &outcome.result;
    assert_eq!(outcome.operation_id.as_str(), "op-1");
    assert_eq!(result.pages.len(), 1);
    assert_eq!(result.tables.len(), 1);
    assert_eq!(result.tables[0].cell(0, 1).map(|c| c.kind), Some(CellKind::Header));
    assert_eq!(result.tables[0].cell(1, 0).map(|c| c.text.as_str()), Some("Pen"));
    assert_eq!(
        result.pages[0].selection_marks[0].state,
        SelectionState::Selected
    );
    assert!(result.key_value_pairs.is_empty());
    assert!(result.documents.is_empty());
    assert_eq!(result.handwritten_samples(), vec!["Signed Ana"]);
    assert!(outcome.searchable_pdf.is_none());
}

#[tokio::test(start_paused = true)]
async fn general_form_run_keeps_keys_without_values() {
    let transport = Arc::new(ScriptedTransport::new(layout_payload("prebuilt-layout")));
    let outcome = tracker(&transport)
        .run(&request(ModelSelector::GeneralForm))
        .await
        .expect("general form run");

    let pairs = &outcome.result.key_value_pairs;
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].key.content, "Name");
    assert_eq!(pairs[0].value.as_ref().map(|v| v.content.as_str()), Some("Pen"));
    assert_eq!(pairs[0].value_confidence, Some(0.81));
    assert_eq!(pairs[1].key.content, "Signed");
    assert!(pairs[1].value.is_none());
    assert!(outcome.result.specialized_fields().is_none());
}

#[tokio::test(start_paused = true)]
async fn specialized_run_omits_empty_fields() {
    let transport = Arc::new(ScriptedTransport::new(credit_card_payload()));
    let outcome = tracker(&transport)
        .run(&request(ModelSelector::Specialized(SpecializedModel::CreditCard)))
        .await
        .expect("credit card run");

    let fields = outcome.result.specialized_fields().expect("fields");
    assert_eq!(
        fields["CardNumber"].value,
        FieldValue::String("4000123456789010".into())
    );
    assert_eq!(
        fields["IssuingBank"].value,
        FieldValue::String("CONTOSO BANK".into())
    );
    assert!(!fields.contains_key("PaymentNetwork"));
    assert!(outcome.result.key_value_pairs.is_empty());
    assert!(outcome.result.tables.is_empty());
}

#[tokio::test(start_paused = true)]
async fn searchable_pdf_is_fetched_only_when_requested() {
    let pdf = b"%PDF-1.7 searchable".to_vec();
    let transport = Arc::new(
        ScriptedTransport::new(layout_payload("prebuilt-read")).with_searchable_pdf(pdf.clone()),
    );

    let plain = tracker(&transport)
        .run(&request(ModelSelector::PlainText))
        .await
        .expect("plain run");
    assert!(plain.searchable_pdf.is_none());
    assert_eq!(transport.counts().pdf_fetches, 0);

    let with_pdf = tracker(&transport)
        .run(&request(ModelSelector::PlainText).with_output(OutputOption::SearchablePdf))
        .await
        .expect("pdf run");
    assert_eq!(with_pdf.searchable_pdf, Some(pdf));
    assert_eq!(transport.counts().pdf_fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_cell_fails_with_operation_context() {
    let mut payload = layout_payload("prebuilt-layout");
    payload["tables"][0]["cells"][3]["rowIndex"] = json!(2);
    let transport = Arc::new(ScriptedTransport::new(payload));

    let err = tracker(&transport)
        .run(&request(ModelSelector::Structure))
        .await
        .expect_err("malformed table");
    assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    assert_eq!(err.last_state(), Some(OperationState::Succeeded));
    assert_eq!(err.operation_id().map(|id| id.as_str()), Some("op-1"));
}

#[tokio::test(start_paused = true)]
async fn same_payload_normalizes_identically_across_runs() {
    let transport = Arc::new(ScriptedTransport::new(layout_payload("prebuilt-layout")));
    let first = tracker(&transport)
        .run(&request(ModelSelector::Structure))
        .await
        .expect("first run");
    let second = tracker(&transport)
        .run(&request(ModelSelector::Structure))
        .await
        .expect("second run");
    assert_eq!(first.result, second.result);
    assert_ne!(first.operation_id, second.operation_id);
}
