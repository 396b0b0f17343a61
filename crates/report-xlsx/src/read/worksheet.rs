use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use report_model::{Cell, CellRef, CellStyle, CellValue, Column, Range, Row, StyleSheet};

use super::ReadError;

#[derive(Debug, Default)]
pub(crate) struct ParsedWorksheet {
    pub(crate) rows: Vec<Row>,
    pub(crate) columns: Vec<Column>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TextTarget {
    Value,
    Formula,
    Inline,
}

#[derive(Debug)]
struct PendingCell {
    at: CellRef,
    cell_type: Option<String>,
    style: u32,
    value: String,
    formula: Option<String>,
    inline: Option<String>,
}

/// Parse a worksheet part into dense rows and column records.
///
/// Rows are indexed by `row/@r` (gaps become empty rows) and cells by `c/@r` (gaps become
/// empty cells) so every row starts at column `A`. `<mergeCell>` ranges are folded into the
/// anchor cell's `h_merge`/`v_merge` spans.
pub(crate) fn parse_worksheet(
    xml: &[u8],
    shared_strings: &[String],
    styles: &StyleSheet,
) -> Result<ParsedWorksheet, ReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut out = ParsedWorksheet::default();
    let mut merges: Vec<Range> = Vec::new();

    let mut current_row: Option<u32> = None;
    let mut last_row: Option<u32> = None;
    let mut next_col: u32 = 0;
    let mut pending: Option<PendingCell> = None;
    let mut text_target: Option<TextTarget> = None;
    let mut in_phonetic = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"col" => out.columns.push(parse_col(e)?),
                    b"row" => {
                        let row_idx = match attr(e, b"r")? {
                            Some(r) => r
                                .trim()
                                .parse::<u32>()
                                .ok()
                                .and_then(|r| r.checked_sub(1))
                                .ok_or_else(|| ReadError::InvalidCellRef(r.clone()))?,
                            None => last_row.map_or(0, |r| r + 1),
                        };
                        last_row = Some(row_idx);
                        next_col = 0;
                        let row = row_at(&mut out.rows, row_idx);
                        apply_row_attrs(e, row)?;
                        current_row = (!is_empty).then_some(row_idx);
                    }
                    b"c" => {
                        let cell = parse_cell_start(e, current_row.unwrap_or(0), next_col)?;
                        next_col = cell.at.col + 1;
                        if is_empty {
                            place(&mut out.rows, finish_cell(cell, shared_strings, styles));
                        } else {
                            pending = Some(cell);
                        }
                    }
                    b"v" if pending.is_some() && !is_empty => text_target = Some(TextTarget::Value),
                    b"f" if !is_empty => {
                        if let Some(cell) = pending.as_mut() {
                            cell.formula.get_or_insert_with(String::new);
                            text_target = Some(TextTarget::Formula);
                        }
                    }
                    b"is" => {
                        if let Some(cell) = pending.as_mut() {
                            cell.inline.get_or_insert_with(String::new);
                        }
                    }
                    b"rPh" => in_phonetic = !is_empty,
                    b"t" if pending.is_some() && !in_phonetic && !is_empty => {
                        text_target = Some(TextTarget::Inline)
                    }
                    b"mergeCell" => {
                        if let Some(reference) = attr(e, b"ref")? {
                            let range = Range::from_a1(&reference)
                                .map_err(|_| ReadError::InvalidRangeRef(reference.clone()))?;
                            merges.push(range);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                if let (Some(target), Some(cell)) = (text_target, pending.as_mut()) {
                    let text = e.unescape()?;
                    push_text(cell, target, &text);
                }
            }
            Event::CData(ref e) => {
                if let (Some(target), Some(cell)) = (text_target, pending.as_mut()) {
                    let text = std::str::from_utf8(e)?;
                    push_text(cell, target, text);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"c" => {
                    if let Some(cell) = pending.take() {
                        place(&mut out.rows, finish_cell(cell, shared_strings, styles));
                    }
                    text_target = None;
                }
                b"v" | b"f" | b"t" => text_target = None,
                b"rPh" => in_phonetic = false,
                b"row" => current_row = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    for range in merges {
        if range.is_single_cell() {
            continue;
        }
        let anchor = cell_at(&mut out.rows, range.start);
        anchor.h_merge = range.end.col - range.start.col;
        anchor.v_merge = range.end.row - range.start.row;
    }

    Ok(out)
}

fn push_text(cell: &mut PendingCell, target: TextTarget, text: &str) {
    match target {
        TextTarget::Value => cell.value.push_str(text),
        TextTarget::Formula => cell.formula.get_or_insert_with(String::new).push_str(text),
        TextTarget::Inline => cell.inline.get_or_insert_with(String::new).push_str(text),
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, ReadError> {
    for a in e.attributes() {
        let a = a?;
        if a.key.local_name().as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_xml_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}

fn parse_col(e: &BytesStart<'_>) -> Result<Column, ReadError> {
    let mut col = Column::default();
    for a in e.attributes() {
        let a = a?;
        let value = a.unescape_value()?;
        match a.key.local_name().as_ref() {
            b"min" => col.min = value.trim().parse().unwrap_or_default(),
            b"max" => col.max = value.trim().parse().unwrap_or_default(),
            b"width" => col.width = value.trim().parse().ok(),
            b"customWidth" => col.custom_width = parse_xml_bool(&value),
            b"style" => col.style = value.trim().parse().ok(),
            b"hidden" => col.hidden = parse_xml_bool(&value),
            b"collapsed" => col.collapsed = parse_xml_bool(&value),
            b"outlineLevel" => col.outline_level = value.trim().parse().unwrap_or_default(),
            _ => {}
        }
    }
    if col.max < col.min {
        col.max = col.min;
    }
    Ok(col)
}

fn apply_row_attrs(e: &BytesStart<'_>, row: &mut Row) -> Result<(), ReadError> {
    let mut height = None;
    let mut custom_height = None;
    for a in e.attributes() {
        let a = a?;
        let value = a.unescape_value()?;
        match a.key.local_name().as_ref() {
            b"ht" => height = value.trim().parse::<f64>().ok(),
            b"customHeight" => custom_height = Some(parse_xml_bool(&value)),
            b"hidden" => row.hidden = parse_xml_bool(&value),
            _ => {}
        }
    }
    // `ht` without `customHeight="0"` is an explicit height.
    if custom_height != Some(false) {
        row.height = height;
    }
    Ok(())
}

fn parse_cell_start(
    e: &BytesStart<'_>,
    current_row: u32,
    next_col: u32,
) -> Result<PendingCell, ReadError> {
    let mut at = CellRef::new(current_row, next_col);
    let mut cell_type = None;
    let mut style = 0;
    for a in e.attributes() {
        let a = a?;
        let value = a.unescape_value()?;
        match a.key.local_name().as_ref() {
            b"r" => {
                at = CellRef::from_a1(&value)
                    .map_err(|_| ReadError::InvalidCellRef(value.to_string()))?
            }
            b"t" => cell_type = Some(value.into_owned()),
            b"s" => style = value.trim().parse().unwrap_or_default(),
            _ => {}
        }
    }
    Ok(PendingCell {
        at,
        cell_type,
        style,
        value: String::new(),
        formula: None,
        inline: None,
    })
}

fn finish_cell(
    pending: PendingCell,
    shared_strings: &[String],
    styles: &StyleSheet,
) -> (CellRef, Cell) {
    let PendingCell {
        at,
        cell_type,
        style,
        value,
        formula,
        inline,
    } = pending;

    let value = match cell_type.as_deref() {
        Some("s") => match value.trim().parse::<usize>().ok().and_then(|i| shared_strings.get(i)) {
            Some(s) => CellValue::String(s.clone()),
            None => {
                log::warn!("cell {at}: shared string index `{value}` out of range");
                CellValue::Empty
            }
        },
        Some("inlineStr") => CellValue::String(inline.unwrap_or_default()),
        Some("str") => CellValue::String(value),
        Some("b") => CellValue::Boolean(parse_xml_bool(&value)),
        Some("e") => CellValue::Error(value),
        _ if value.trim().is_empty() => CellValue::Empty,
        _ => match value.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => {
                log::warn!("cell {at}: non-numeric value `{value}` kept as text");
                CellValue::String(value)
            }
        },
    };

    let (num_fmt, hidden) = styles
        .xf(style)
        .map(|xf| (xf.num_fmt.clone(), xf.hidden))
        .unwrap_or_default();

    let cell = Cell {
        value,
        formula: formula.filter(|f| !f.is_empty()),
        style: CellStyle::new(style),
        num_fmt,
        hidden,
        ..Default::default()
    };
    (at, cell)
}

fn row_at(rows: &mut Vec<Row>, row: u32) -> &mut Row {
    let idx = row as usize;
    if rows.len() <= idx {
        rows.resize_with(idx + 1, Row::default);
    }
    &mut rows[idx]
}

fn cell_at(rows: &mut Vec<Row>, at: CellRef) -> &mut Cell {
    let row = row_at(rows, at.row);
    let idx = at.col as usize;
    if row.cells.len() <= idx {
        row.cells.resize_with(idx + 1, Cell::default);
    }
    &mut row.cells[idx]
}

fn place(rows: &mut Vec<Row>, (at, cell): (CellRef, Cell)) {
    *cell_at(rows, at) = cell;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use report_model::CellXf;

    fn parse(xml: &str, shared: &[&str]) -> ParsedWorksheet {
        let shared: Vec<String> = shared.iter().map(|s| s.to_string()).collect();
        let styles = StyleSheet {
            cell_xfs: vec![
                CellXf::default(),
                CellXf {
                    num_fmt_id: 2,
                    num_fmt: "0.00".to_string(),
                    hidden: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        parse_worksheet(xml.as_bytes(), &shared, &styles).unwrap()
    }

    #[test]
    fn densifies_rows_and_cells() {
        let sheet = parse(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
              <sheetData>
                <row r="1"><c r="B1" t="s"><v>0</v></c></row>
                <row r="3" ht="30" customHeight="1" hidden="1"><c r="A3" s="1"><v>1.5</v></c><c r="C3" t="b"><v>1</v></c></row>
              </sheetData>
            </worksheet>"#,
            &["{{name}}"],
        );

        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].texts(), vec!["", "{{name}}"]);
        assert!(sheet.rows[1].cells.is_empty());

        let third = &sheet.rows[2];
        assert_eq!(third.height, Some(30.0));
        assert!(third.hidden);
        assert_eq!(third.cells.len(), 3);
        assert_eq!(third.cells[0].value, CellValue::Number(1.5));
        assert_eq!(third.cells[0].style.xf_index, 1);
        assert_eq!(third.cells[0].num_fmt, "0.00");
        assert!(third.cells[0].hidden);
        assert_eq!(third.cells[2].value, CellValue::Boolean(true));
    }

    #[test]
    fn reads_inline_strings_formulas_and_errors() {
        let sheet = parse(
            r#"<worksheet><sheetData><row r="1">
                <c r="A1" t="inlineStr"><is><r><t>{{a</t></r><r><t>}}</t></r><rPh><t>x</t></rPh></is></c>
                <c r="B1" t="str"><f>A1&amp;"!"</f><v>cached</v></c>
                <c r="C1" t="e"><v>#DIV/0!</v></c>
                <c r="D1"><f>1+1</f><v>2</v></c>
            </row></sheetData></worksheet>"#,
            &[],
        );

        let cells = &sheet.rows[0].cells;
        assert_eq!(cells[0].value, CellValue::String("{{a}}".to_string()));
        assert_eq!(cells[1].formula.as_deref(), Some("A1&\"!\""));
        assert_eq!(cells[1].value, CellValue::String("cached".to_string()));
        assert_eq!(cells[2].value, CellValue::Error("#DIV/0!".to_string()));
        assert_eq!(cells[3].formula.as_deref(), Some("1+1"));
        assert_eq!(cells[3].value, CellValue::Number(2.0));
    }

    #[test]
    fn folds_merge_cells_into_anchor_spans() {
        let sheet = parse(
            r#"<worksheet><cols><col min="1" max="2" width="20.5" customWidth="1"/></cols>
              <sheetData><row r="2"><c r="B2" t="s"><v>0</v></c></row></sheetData>
              <mergeCells count="2"><mergeCell ref="B2:D3"/><mergeCell ref="F5:F5"/></mergeCells>
            </worksheet>"#,
            &["title"],
        );

        let anchor = &sheet.rows[1].cells[1];
        assert_eq!((anchor.h_merge, anchor.v_merge), (2, 1));
        assert_eq!(sheet.rows.len(), 2, "single-cell merges are ignored");
        assert_eq!(
            sheet.columns,
            vec![Column {
                min: 1,
                max: 2,
                width: Some(20.5),
                custom_width: true,
                ..Default::default()
            }]
        );
    }

    #[test]
    fn cells_without_references_follow_previous_ones() {
        let sheet = parse(
            r#"<worksheet><sheetData><row><c t="s"><v>0</v></c><c t="s"><v>1</v></c></row><row><c t="s"><v>1</v></c></row></sheetData></worksheet>"#,
            &["a", "b"],
        );
        assert_eq!(sheet.rows[0].texts(), vec!["a", "b"]);
        assert_eq!(sheet.rows[1].texts(), vec!["b"]);
    }
}
