// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for result normalization in the lesewerk-document crate.
// Measures a synthetic multi-page layout payload, which is the largest shape
// the normalizer sees in practice.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

use lesewerk_core::{ModelSelector, RawPayload};
use lesewerk_document::Normalizer;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Ten pages of forty lines, two words per line, plus one 20x4 table.
fn layout_payload() -> Value {
    let poly = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let mut content = String::new();
    let mut pages = Vec::new();

    for page_number in 1..=10 {
        let mut lines = Vec::new();
        let mut words = Vec::new();
        for _ in 0..40 {
            let offset = content.chars().count();
            content.push_str("lorem ipsum\n");
            lines.push(json!({"content": "lorem ipsum", "polygon": poly, "spans": [{"offset": offset, "length": 11}]}));
            words.push(json!({"content": "lorem", "polygon": poly, "confidence": 0.99, "span": {"offset": offset, "length": 5}}));
            words.push(json!({"content": "ipsum", "polygon": poly, "confidence": 0.98, "span": {"offset": offset + 6, "length": 5}}));
        }
        pages.push(json!({
            "pageNumber": page_number, "angle": 0.0, "width": 8.5, "height": 11.0, "unit": "inch",
            "lines": lines, "words": words
        }));
    }

    let cells: Vec<Value> = (0..20)
        .flat_map(|row| {
            (0..4).map(move |column| {
                json!({"rowIndex": row, "columnIndex": column, "content": "42",
                       "kind": if row == 0 { "columnHeader" } else { "content" }})
            })
        })
        .collect();

    json!({
        "modelId": "prebuilt-layout",
        "stringIndexType": "unicodeCodePoint",
        "content": content,
        "pages": pages,
        "tables": [{"rowCount": 20, "columnCount": 4, "cells": cells}]
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_normalize_layout(c: &mut Criterion) {
    let payload = RawPayload::new(layout_payload());
    let normalizer = Normalizer::new(ModelSelector::Structure);

    c.bench_function("normalize layout (10 pages)", |b| {
        b.iter(|| {
            let result = normalizer.normalize(black_box(&payload));
            black_box(result.map(|r| r.word_count()).unwrap_or(0));
        });
    });
}

criterion_group!(benches, bench_normalize_layout);
criterion_main!(benches);
