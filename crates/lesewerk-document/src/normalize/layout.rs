// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pages, tables, languages and styles.

use lesewerk_core::error::Result;
use lesewerk_core::result::{
    CellKind, DetectedLanguage, DetectedStyle, LengthUnit, Line, Page, SelectionMark,
    SelectionState, Table, TableCell, Word,
};

use super::{SpanCheck, confidence, malformed, polygon};
use crate::raw::{RawBoundingRegion, RawPage, RawTable, RawTableCell};

pub(super) fn pages(raw: Vec<RawPage>, check: &SpanCheck) -> Result<Vec<Page>> {
    if raw.is_empty() {
        return Err(malformed("analyzeResult.pages is empty"));
    }
    raw.into_iter()
        .enumerate()
        .map(|(i, page)| page_from_raw(i, page, check))
        .collect()
}

fn page_from_raw(index: usize, raw: RawPage, check: &SpanCheck) -> Result<Page> {
    if raw.page_number == 0 {
        return Err(malformed(format!("pages[{index}]: pageNumber must be 1-based")));
    }
    let unit = raw
        .unit
        .as_deref()
        .map(|unit| {
            length_unit(unit)
                .ok_or_else(|| malformed(format!("pages[{index}]: unknown unit '{unit}'")))
        })
        .transpose()?;

    let lines = raw
        .lines
        .iter()
        .enumerate()
        .map(|(j, line)| {
            let at = || format!("pages[{index}].lines[{j}]");
            Ok(Line {
                text: line.content.clone(),
                polygon: polygon(line.polygon.as_ref(), at)?,
                span: check.covering(&line.spans, at)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let words = raw
        .words
        .iter()
        .enumerate()
        .map(|(j, word)| {
            let at = || format!("pages[{index}].words[{j}]");
            Ok(Word {
                text: word.content.clone(),
                confidence: confidence(word.confidence, at)?,
                polygon: polygon(word.polygon.as_ref(), at)?,
                span: check.span(word.span, at)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let selection_marks = raw
        .selection_marks
        .iter()
        .enumerate()
        .map(|(j, mark)| {
            let at = || format!("pages[{index}].selectionMarks[{j}]");
            let state = selection_state(&mark.state)
                .ok_or_else(|| malformed(format!("{}: unknown state '{}'", at(), mark.state)))?;
            Ok(SelectionMark {
                state,
                confidence: confidence(mark.confidence, at)?,
                polygon: polygon(mark.polygon.as_ref(), at)?,
                span: mark.span.map(|s| check.span(s, at)).transpose()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        page_number: raw.page_number,
        width: raw.width.unwrap_or(0.0),
        height: raw.height.unwrap_or(0.0),
        unit,
        rotation_angle: raw.angle.unwrap_or(0.0),
        lines,
        words,
        selection_marks,
    })
}

fn length_unit(raw: &str) -> Option<LengthUnit> {
    match raw {
        "pixel" => Some(LengthUnit::Pixel),
        "inch" => Some(LengthUnit::Inch),
        _ => None,
    }
}

pub(super) fn selection_state(raw: &str) -> Option<SelectionState> {
    match raw {
        "selected" => Some(SelectionState::Selected),
        "unselected" => Some(SelectionState::Unselected),
        _ => None,
    }
}

pub(super) fn tables(raw: Vec<RawTable>) -> Result<Vec<Table>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, table)| table_from_raw(i, table))
        .collect()
}

fn table_from_raw(index: usize, raw: RawTable) -> Result<Table> {
    let cells = raw
        .cells
        .into_iter()
        .enumerate()
        .map(|(j, cell)| cell_from_raw(index, j, raw.row_count, raw.column_count, cell))
        .collect::<Result<Vec<_>>>()?;

    Ok(Table {
        row_count: raw.row_count,
        column_count: raw.column_count,
        cells,
        page_numbers: page_numbers(&raw.bounding_regions),
    })
}

fn cell_from_raw(
    table: usize,
    index: usize,
    row_count: usize,
    column_count: usize,
    raw: RawTableCell,
) -> Result<TableCell> {
    let at = || format!("tables[{table}].cells[{index}]");

    if raw.row_index >= row_count {
        return Err(malformed(format!(
            "{}: rowIndex {} outside rowCount {row_count}",
            at(),
            raw.row_index
        )));
    }
    if raw.column_index >= column_count {
        return Err(malformed(format!(
            "{}: columnIndex {} outside columnCount {column_count}",
            at(),
            raw.column_index
        )));
    }

    let row_span = raw.row_span.unwrap_or(1);
    let column_span = raw.column_span.unwrap_or(1);
    if row_span == 0 || exceeds(raw.row_index, row_span, row_count) {
        return Err(malformed(format!("{}: rowSpan {row_span} out of range", at())));
    }
    if column_span == 0 || exceeds(raw.column_index, column_span, column_count) {
        return Err(malformed(format!(
            "{}: columnSpan {column_span} out of range",
            at()
        )));
    }

    let kind = match raw.kind.as_deref() {
        None | Some("content") | Some("description") => CellKind::Data,
        Some("columnHeader") | Some("stubHead") => CellKind::Header,
        Some("rowHeader") => CellKind::RowHeader,
        Some(other) => return Err(malformed(format!("{}: unknown kind '{other}'", at()))),
    };

    Ok(TableCell {
        row_index: raw.row_index,
        column_index: raw.column_index,
        row_span,
        column_span,
        kind,
        text: raw.content,
        page_number: raw.bounding_regions.iter().find_map(|r| r.page_number),
    })
}

/// Whether `start + span` runs past `count`, counting overflow as past.
fn exceeds(start: usize, span: usize, count: usize) -> bool {
    start.checked_add(span).is_none_or(|end| end > count)
}

/// Distinct page numbers in first-seen order.
fn page_numbers(regions: &[RawBoundingRegion]) -> Vec<u32> {
    let mut pages = Vec::new();
    for page in regions.iter().filter_map(|r| r.page_number) {
        if !pages.contains(&page) {
            pages.push(page);
        }
    }
    pages
}

pub(super) fn languages(
    raw: Vec<crate::raw::RawLanguage>,
    check: &SpanCheck,
) -> Result<Vec<DetectedLanguage>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, lang)| {
            let at = || format!("languages[{i}]");
            Ok(DetectedLanguage {
                confidence: confidence(lang.confidence, at)?,
                spans: check.spans(&lang.spans, at)?,
                locale: lang.locale,
            })
        })
        .collect()
}

pub(super) fn styles(
    raw: Vec<crate::raw::RawStyle>,
    check: &SpanCheck,
) -> Result<Vec<DetectedStyle>> {
    raw.into_iter()
        .enumerate()
        .map(|(i, style)| {
            let at = || format!("styles[{i}]");
            Ok(DetectedStyle {
                is_handwritten: style.is_handwritten.unwrap_or(false),
                confidence: confidence(style.confidence, at)?,
                spans: check.spans(&style.spans, at)?,
            })
        })
        .collect()
}
