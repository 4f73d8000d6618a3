// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable rendering of normalized analysis results.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use lesewerk_core::result::{
    AddressValue, AnalysisResult, BoundingPolygon, CellKind, CurrencyValue, DetectedLanguage,
    DetectedStyle, ExtractedDocument, Field, FieldValue, KeyValuePair, LengthUnit, Page,
    SelectionState, Table, TextSpan,
};

const RULE: &str = "================================================================================";
const SAMPLE_CHARS: usize = 100;
const LINES_PER_PAGE: usize = 10;
const WORDS_PER_PAGE: usize = 20;

/// Field names whose values are card numbers and must never be printed in
/// full.
const CARD_NUMBER_FIELDS: &[&str] = &["CardNumber"];

/// Text report for one analyzed document.
pub struct ResultView<'a> {
    pub source: &'a str,
    pub result: &'a AnalysisResult,
}

impl<'a> ResultView<'a> {
    pub fn new(source: &'a str, result: &'a AnalysisResult) -> Self {
        Self { source, result }
    }
}

impl Display for ResultView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let result = self.result;
        writeln!(f, "{RULE}")?;
        writeln!(f, "{}", self.source)?;
        writeln!(f, "Model: {}", result.model_id)?;
        writeln!(f, "{RULE}")?;

        write_styles(f, result)?;
        write_languages(f, result)?;
        for page in &result.pages {
            write_page(f, page)?;
        }
        if !result.tables.is_empty() {
            writeln!(f, "\nTables: {}", result.tables.len())?;
            for (index, table) in result.tables.iter().enumerate() {
                write_table(f, index + 1, table)?;
            }
        }
        if !result.key_value_pairs.is_empty() {
            writeln!(f, "\nKey-value pairs: {}", result.key_value_pairs.len())?;
            for pair in &result.key_value_pairs {
                write_pair(f, pair)?;
            }
        }
        for (index, document) in result.documents.iter().enumerate() {
            write_document(f, index + 1, document)?;
        }

        writeln!(f, "\nContent:")?;
        writeln!(f, "{}", result.full_text)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Total characters: {}", result.text_len())
    }
}

fn write_styles(f: &mut Formatter<'_>, result: &AnalysisResult) -> fmt::Result {
    writeln!(f, "\nStyles:")?;
    if result.detected_styles.is_empty() {
        return writeln!(f, "  none reported");
    }
    for (index, style) in result.detected_styles.iter().enumerate() {
        write_style(f, index + 1, style, &result.full_text)?;
    }
    Ok(())
}

fn write_style(f: &mut Formatter<'_>, index: usize, style: &DetectedStyle, text: &str) -> fmt::Result {
    let kind = if style.is_handwritten {
        "handwritten"
    } else {
        "printed"
    };
    writeln!(f, "  Style #{index}: {kind} ({})", percent(style.confidence))?;
    if style.is_handwritten {
        if let Some(span) = style.spans.first() {
            writeln!(f, "    Sample: '{}'", sample(text, span))?;
        }
    }
    Ok(())
}

fn write_languages(f: &mut Formatter<'_>, result: &AnalysisResult) -> fmt::Result {
    if result.detected_languages.is_empty() {
        return Ok(());
    }
    writeln!(f, "\nLanguages:")?;
    for (index, language) in result.detected_languages.iter().enumerate() {
        write_language(f, index + 1, language, &result.full_text)?;
    }
    Ok(())
}

fn write_language(
    f: &mut Formatter<'_>,
    index: usize,
    language: &DetectedLanguage,
    text: &str,
) -> fmt::Result {
    writeln!(
        f,
        "  Language #{index}: {} ({}), {} span(s)",
        language.locale,
        percent(language.confidence),
        language.spans.len()
    )?;
    if let Some(span) = language.spans.first() {
        writeln!(f, "    Sample: '{}'", sample(text, span))?;
    }
    Ok(())
}

fn write_page(f: &mut Formatter<'_>, page: &Page) -> fmt::Result {
    writeln!(f, "\n--- Page {} ---", page.page_number)?;
    match page.unit {
        Some(unit) => writeln!(f, "  Size: {} x {} {}", page.width, page.height, unit_name(unit))?,
        None => writeln!(f, "  Size: no physical page")?,
    }
    writeln!(f, "  Rotation: {}°", page.rotation_angle)?;
    writeln!(
        f,
        "  Lines: {}, words: {}, selection marks: {}",
        page.lines.len(),
        page.words.len(),
        page.selection_marks.len()
    )?;

    for (index, line) in page.lines.iter().take(LINES_PER_PAGE).enumerate() {
        writeln!(f, "  Line #{}: '{}'", index + 1, line.text)?;
        writeln!(f, "    Box: {}", format_polygon(line.polygon.as_ref()))?;
    }
    if page.lines.len() > LINES_PER_PAGE {
        writeln!(f, "  ... and {} more lines", page.lines.len() - LINES_PER_PAGE)?;
    }

    for word in page.words.iter().take(WORDS_PER_PAGE) {
        writeln!(f, "  Word '{}': {}", word.text, percent(word.confidence))?;
    }
    if page.words.len() > WORDS_PER_PAGE {
        writeln!(f, "  ... and {} more words", page.words.len() - WORDS_PER_PAGE)?;
    }

    for (index, mark) in page.selection_marks.iter().enumerate() {
        writeln!(
            f,
            "  Selection mark #{}: {} {} ({})",
            index + 1,
            mark_symbol(mark.state),
            state_name(mark.state),
            percent(mark.confidence)
        )?;
        writeln!(f, "    Box: {}", format_polygon(mark.polygon.as_ref()))?;
    }
    Ok(())
}

fn write_table(f: &mut Formatter<'_>, index: usize, table: &Table) -> fmt::Result {
    let pages = table
        .page_numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        f,
        "\n  Table #{index}: {} rows x {} columns, {} cells",
        table.row_count,
        table.column_count,
        table.cells.len()
    )?;
    if !pages.is_empty() {
        writeln!(f, "    Pages: {pages}")?;
    }
    for row in table.rows() {
        for cell in row {
            let marker = match cell.kind {
                CellKind::Header => " [HEADER]",
                CellKind::RowHeader => " [ROW HEADER]",
                CellKind::Data => "",
            };
            let mut spans = String::new();
            if cell.row_span > 1 {
                spans.push_str(&format!(" (spans {} rows)", cell.row_span));
            }
            if cell.column_span > 1 {
                spans.push_str(&format!(" (spans {} columns)", cell.column_span));
            }
            writeln!(
                f,
                "    Cell[{}][{}]: '{}'{marker}{spans}",
                cell.row_index, cell.column_index, cell.text
            )?;
        }
    }
    Ok(())
}

fn write_pair(f: &mut Formatter<'_>, pair: &KeyValuePair) -> fmt::Result {
    match &pair.value {
        Some(value) => writeln!(
            f,
            "  {}: {} ({})",
            pair.key.content,
            value.content,
            percent(pair.value_confidence.unwrap_or(pair.key_confidence))
        ),
        None => writeln!(
            f,
            "  {}: <no value> ({})",
            pair.key.content,
            percent(pair.key_confidence)
        ),
    }
}

fn write_document(f: &mut Formatter<'_>, index: usize, document: &ExtractedDocument) -> fmt::Result {
    write!(f, "\nDocument #{index}: {}", document.doc_type)?;
    if let Some(confidence) = document.confidence {
        write!(f, " ({})", percent(confidence))?;
    }
    writeln!(f)?;
    write_fields(f, &document.fields, 1)
}

fn write_fields(f: &mut Formatter<'_>, fields: &BTreeMap<String, Field>, depth: usize) -> fmt::Result {
    for (name, field) in fields {
        write_field(f, name, field, depth)?;
    }
    Ok(())
}

fn write_field(f: &mut Formatter<'_>, label: &str, field: &Field, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    let confidence = field
        .confidence
        .map(|c| format!(" ({})", percent(c)))
        .unwrap_or_default();
    match &field.value {
        FieldValue::Array(items) => {
            writeln!(f, "{indent}{label}: {} item(s){confidence}", items.len())?;
            for (index, item) in items.iter().enumerate() {
                write_field(f, &format!("#{}", index + 1), item, depth + 1)?;
            }
            Ok(())
        }
        FieldValue::Object(map) => {
            writeln!(f, "{indent}{label}:{confidence}")?;
            write_fields(f, map, depth + 1)
        }
        FieldValue::String(text) if CARD_NUMBER_FIELDS.contains(&label) => {
            writeln!(f, "{indent}{label}: {}{confidence}", mask_card_number(text))
        }
        value => writeln!(f, "{indent}{label}: {}{confidence}", value_text(value)),
    }
}

/// Display text for a field value.
pub fn value_text(value: &FieldValue) -> String {
    match value {
        FieldValue::String(text) | FieldValue::PhoneNumber(text) | FieldValue::CountryRegion(text) => {
            text.clone()
        }
        FieldValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        FieldValue::Time(time) => time.format("%H:%M:%S").to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Currency(currency) => currency_text(currency),
        FieldValue::Address(address) => address_text(address),
        FieldValue::Boolean(flag) => String::from(if *flag { "yes" } else { "no" }),
        FieldValue::SelectionMark(state) => format!("{} {}", mark_symbol(*state), state_name(*state)),
        FieldValue::Array(items) => format!("{} item(s)", items.len()),
        FieldValue::Object(map) => format!("{} field(s)", map.len()),
    }
}

fn currency_text(currency: &CurrencyValue) -> String {
    let mut text = format!(
        "{}{:.2}",
        currency.symbol.as_deref().unwrap_or(""),
        currency.amount
    );
    if let Some(code) = &currency.code {
        text.push(' ');
        text.push_str(code);
    }
    text
}

fn address_text(address: &AddressValue) -> String {
    let street = match (&address.street_address, &address.house_number, &address.road) {
        (Some(street), _, _) => Some(street.clone()),
        (None, Some(number), Some(road)) => Some(format!("{number} {road}")),
        (None, None, Some(road)) => Some(road.clone()),
        _ => None,
    };
    [
        street,
        address.unit.clone(),
        address.city.clone(),
        address.state.clone(),
        address.postal_code.clone(),
        address.country_region.clone(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

/// Card number reduced to its last four digits, e.g. `XXXX-XXXX-XXXX-9010`.
pub fn mask_card_number(number: &str) -> String {
    let digits: Vec<char> = number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if digits.len() < 4 {
        return "XXXX".into();
    }
    let last: String = digits[digits.len() - 4..].iter().collect();
    format!("XXXX-XXXX-XXXX-{last}")
}

/// Corner points as `[x, y], ...`, or `N/A` when the service gave none.
pub fn format_polygon(polygon: Option<&BoundingPolygon>) -> String {
    match polygon {
        Some(polygon) => polygon
            .points()
            .iter()
            .map(|(x, y)| format!("[{x}, {y}]"))
            .collect::<Vec<_>>()
            .join(", "),
        None => "N/A".into(),
    }
}

fn sample(text: &str, span: &TextSpan) -> String {
    let Some(slice) = span.slice(text) else {
        return String::new();
    };
    if slice.chars().count() > SAMPLE_CHARS {
        let head: String = slice.chars().take(SAMPLE_CHARS).collect();
        format!("{head}...")
    } else {
        slice.to_string()
    }
}

fn percent(confidence: f32) -> String {
    format!("{:.2}%", confidence * 100.0)
}

fn mark_symbol(state: SelectionState) -> &'static str {
    match state {
        SelectionState::Selected => "✓",
        SelectionState::Unselected => "☐",
    }
}

fn state_name(state: SelectionState) -> &'static str {
    match state {
        SelectionState::Selected => "selected",
        SelectionState::Unselected => "unselected",
    }
}

fn unit_name(unit: LengthUnit) -> &'static str {
    match unit {
        LengthUnit::Pixel => "pixel",
        LengthUnit::Inch => "inch",
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use lesewerk_core::result::{Line, SelectionMark, SpannedText, TableCell, Word};

    use super::*;

    fn polygon() -> BoundingPolygon {
        BoundingPolygon([0.5, 0.5, 3.0, 0.5, 3.0, 0.75, 0.5, 0.75])
    }

    fn leaf(value: FieldValue, confidence: f32) -> Field {
        Field {
            value,
            content: None,
            confidence: Some(confidence),
        }
    }

    fn sample_result() -> AnalysisResult {
        let full_text = "Order form\nSigned Ana".to_string();
        AnalysisResult {
            model_id: "prebuilt-layout".into(),
            full_text,
            pages: vec![Page {
                page_number: 1,
                width: 8.5,
                height: 11.0,
                unit: Some(LengthUnit::Inch),
                rotation_angle: 0.0,
                lines: vec![
                    Line {
                        text: "Order form".into(),
                        polygon: Some(polygon()),
                        span: TextSpan::new(0, 10),
                    },
                    Line {
                        text: "Signed Ana".into(),
                        polygon: None,
                        span: TextSpan::new(11, 10),
                    },
                ],
                words: vec![Word {
                    text: "Order".into(),
                    confidence: 0.5,
                    polygon: Some(polygon()),
                    span: TextSpan::new(0, 5),
                }],
                selection_marks: vec![SelectionMark {
                    state: SelectionState::Unselected,
                    confidence: 0.25,
                    polygon: None,
                    span: None,
                }],
            }],
            tables: vec![Table {
                row_count: 2,
                column_count: 2,
                cells: vec![
                    TableCell {
                        row_index: 0,
                        column_index: 0,
                        row_span: 1,
                        column_span: 2,
                        kind: CellKind::Header,
                        text: "Item".into(),
                        page_number: Some(1),
                    },
                    TableCell {
                        row_index: 1,
                        column_index: 0,
                        row_span: 1,
                        column_span: 1,
                        kind: CellKind::RowHeader,
                        text: "Pen".into(),
                        page_number: Some(1),
                    },
                ],
                page_numbers: vec![1],
            }],
            key_value_pairs: vec![KeyValuePair {
                key: SpannedText {
                    content: "Signed".into(),
                    span: TextSpan::new(11, 6),
                },
                value: None,
                key_confidence: 0.5,
                value_confidence: None,
            }],
            documents: Vec::new(),
            detected_languages: vec![DetectedLanguage {
                locale: "en".into(),
                confidence: 0.75,
                spans: vec![TextSpan::new(0, 10)],
            }],
            detected_styles: vec![DetectedStyle {
                is_handwritten: true,
                confidence: 0.5,
                spans: vec![TextSpan::new(11, 10)],
            }],
        }
    }

    #[test]
    fn polygon_prints_points_or_placeholder() {
        assert_eq!(
            format_polygon(Some(&polygon())),
            "[0.5, 0.5], [3, 0.5], [3, 0.75], [0.5, 0.75]"
        );
        assert_eq!(format_polygon(None), "N/A");
    }

    #[test]
    fn card_numbers_keep_last_four_digits() {
        assert_eq!(mask_card_number("4000 1234 5678 9010"), "XXXX-XXXX-XXXX-9010");
        assert_eq!(mask_card_number("4000123456789010"), "XXXX-XXXX-XXXX-9010");
        assert_eq!(mask_card_number("12"), "XXXX");
    }

    #[test]
    fn layout_report_lists_every_section() {
        let result = sample_result();
        let text = ResultView::new("form.pdf", &result).to_string();

        assert!(text.contains("Model: prebuilt-layout"));
        assert!(text.contains("Style #1: handwritten (50.00%)"));
        assert!(text.contains("Sample: 'Signed Ana'"));
        assert!(text.contains("Language #1: en (75.00%), 1 span(s)"));
        assert!(text.contains("Sample: 'Order form'"));
        assert!(text.contains("Size: 8.5 x 11 inch"));
        assert!(text.contains("Box: [0.5, 0.5], [3, 0.5], [3, 0.75], [0.5, 0.75]"));
        assert!(text.contains("Box: N/A"));
        assert!(text.contains("Word 'Order': 50.00%"));
        assert!(text.contains("Selection mark #1: ☐ unselected (25.00%)"));
        assert!(text.contains("Cell[0][0]: 'Item' [HEADER] (spans 2 columns)"));
        assert!(text.contains("Cell[1][0]: 'Pen' [ROW HEADER]"));
        assert!(text.contains("Signed: <no value> (50.00%)"));
        assert!(text.contains("Total characters: 21"));
    }

    #[test]
    fn field_tree_masks_card_numbers_and_indents_children() {
        let item = Field {
            value: FieldValue::Object(BTreeMap::from([(
                "Description".to_string(),
                leaf(FieldValue::String("Coffee".into()), 0.5),
            )])),
            content: None,
            confidence: None,
        };
        let mut result = sample_result();
        result.documents = vec![ExtractedDocument {
            doc_type: "creditCard".into(),
            confidence: Some(0.75),
            fields: BTreeMap::from([
                (
                    "CardNumber".to_string(),
                    leaf(FieldValue::String("4000123456789010".into()), 0.5),
                ),
                (
                    "ExpirationDate".to_string(),
                    leaf(
                        FieldValue::Date(NaiveDate::from_ymd_opt(2029, 1, 31).expect("date")),
                        0.5,
                    ),
                ),
                (
                    "Items".to_string(),
                    Field {
                        value: FieldValue::Array(vec![item]),
                        content: None,
                        confidence: None,
                    },
                ),
            ]),
        }];

        let text = ResultView::new("card.jpg", &result).to_string();
        assert!(text.contains("Document #1: creditCard (75.00%)"));
        assert!(text.contains("  CardNumber: XXXX-XXXX-XXXX-9010 (50.00%)"));
        assert!(!text.contains("4000123456789010"));
        assert!(text.contains("  ExpirationDate: 2029-01-31 (50.00%)"));
        assert!(text.contains("  Items: 1 item(s)\n    #1:\n      Description: Coffee (50.00%)"));
    }

    #[test]
    fn typed_values_render_readably() {
        let currency = FieldValue::Currency(CurrencyValue {
            amount: 12.5,
            code: Some("USD".into()),
            symbol: Some("$".into()),
        });
        assert_eq!(value_text(&currency), "$12.50 USD");

        let address = FieldValue::Address(AddressValue {
            house_number: Some("123".into()),
            road: Some("Main St".into()),
            city: Some("Redmond".into()),
            state: Some("WA".into()),
            postal_code: Some("98052".into()),
            ..AddressValue::default()
        });
        assert_eq!(value_text(&address), "123 Main St, Redmond, WA, 98052");
        assert_eq!(
            value_text(&FieldValue::SelectionMark(SelectionState::Selected)),
            "✓ selected"
        );
    }
}
