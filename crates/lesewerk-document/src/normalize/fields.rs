// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Documents and field trees from specialized models.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use lesewerk_core::error::Result;
use lesewerk_core::result::{
    AddressValue, CurrencyValue, ExtractedDocument, Field, FieldValue, SelectionState,
};

use super::layout::selection_state;
use super::{confidence, malformed};
use crate::raw::{RawAddress, RawDocument, RawField};

pub(super) fn documents(raw: Vec<RawDocument>) -> Result<Vec<ExtractedDocument>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, doc)| {
            let path = format!("documents[{i}]");
            let doc_confidence = doc
                .confidence
                .map(|c| confidence(c, || path.clone()))
                .transpose()?;
            Ok(ExtractedDocument {
                doc_type: doc.doc_type,
                confidence: doc_confidence,
                fields: field_map(doc.fields, &format!("{path}.fields"))?,
            })
        })
        .collect()
}

fn field_map(raw: BTreeMap<String, RawField>, path: &str) -> Result<BTreeMap<String, Field>> {
    let mut fields = BTreeMap::new();
    for (name, raw_field) in raw {
        if let Some(field) = field(raw_field, &format!("{path}.{name}"))? {
            fields.insert(name, field);
        }
    }
    Ok(fields)
}

/// Convert one node. `None` when the node carries neither a typed value
/// nor any text.
fn field(raw: RawField, path: &str) -> Result<Option<Field>> {
    let field_confidence = raw
        .confidence
        .map(|c| confidence(c, || path.to_owned()))
        .transpose()?;
    let content = raw.content.clone();

    let value = match typed_value(raw, path)? {
        Some(value) => value,
        None => match &content {
            Some(text) => FieldValue::String(text.clone()),
            None => return Ok(None),
        },
    };

    Ok(Some(Field {
        value,
        content,
        confidence: field_confidence,
    }))
}

fn typed_value(raw: RawField, path: &str) -> Result<Option<FieldValue>> {
    let kind = raw.kind.as_deref().unwrap_or("string");
    let value = match kind {
        "string" => raw.value_string.map(FieldValue::String),
        "phoneNumber" => raw.value_phone_number.map(FieldValue::PhoneNumber),
        "countryRegion" => raw.value_country_region.map(FieldValue::CountryRegion),
        "signature" => raw.value_signature.map(FieldValue::String),
        "number" => raw.value_number.map(FieldValue::Number),
        "integer" => raw.value_integer.map(FieldValue::Integer),
        "boolean" => raw.value_boolean.map(FieldValue::Boolean),
        "date" => raw
            .value_date
            .map(|text| parse_date(&text, path))
            .transpose()?
            .map(FieldValue::Date),
        "time" => raw
            .value_time
            .map(|text| parse_time(&text, path))
            .transpose()?
            .map(FieldValue::Time),
        "selectionMark" => raw
            .value_selection_mark
            .map(|state| mark(&state, path))
            .transpose()?
            .map(FieldValue::SelectionMark),
        "currency" => raw.value_currency.map(|c| {
            FieldValue::Currency(CurrencyValue {
                amount: c.amount,
                code: c.currency_code,
                symbol: c.currency_symbol,
            })
        }),
        "address" => raw.value_address.map(|a| FieldValue::Address(address(a))),
        "selectionGroup" => raw.value_selection_group.map(|options| {
            FieldValue::Array(
                options
                    .into_iter()
                    .map(|option| Field {
                        content: Some(option.clone()),
                        value: FieldValue::String(option),
                        confidence: None,
                    })
                    .collect(),
            )
        }),
        "array" => match raw.value_array {
            Some(items) => {
                let mut converted = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    if let Some(f) = field(item, &format!("{path}[{i}]"))? {
                        converted.push(f);
                    }
                }
                Some(FieldValue::Array(converted))
            }
            None => None,
        },
        "object" => match raw.value_object {
            Some(map) => Some(FieldValue::Object(field_map(map, path)?)),
            None => None,
        },
        // Field types newer than this client degrade to their text.
        _ => None,
    };
    Ok(value)
}

fn parse_date(text: &str, path: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| malformed(format!("{path}: invalid date '{text}'")))
}

fn parse_time(text: &str, path: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| malformed(format!("{path}: invalid time '{text}'")))
}

fn mark(state: &str, path: &str) -> Result<SelectionState> {
    selection_state(state)
        .ok_or_else(|| malformed(format!("{path}: unknown selection state '{state}'")))
}

fn address(raw: RawAddress) -> AddressValue {
    AddressValue {
        house_number: raw.house_number,
        road: raw.road,
        street_address: raw.street_address,
        unit: raw.unit,
        city: raw.city,
        state: raw.state,
        postal_code: raw.postal_code,
        country_region: raw.country_region,
    }
}
