use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use report_model::{Cell, CellRef, CellValue, Column, Row, Sheet, Workbook};
use thiserror::Error;
use zip::ZipWriter;

use crate::styles::{append_wrap_text_xfs, StylesError, DEFAULT_STYLES_XML};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Styles(#[from] StylesError),
}

pub fn write_workbook(workbook: &Workbook, path: impl AsRef<Path>) -> Result<(), WriteError> {
    let file = File::create(path)?;
    write_workbook_to_writer(workbook, file)
}

pub fn write_workbook_to_bytes(workbook: &Workbook) -> Result<Vec<u8>, WriteError> {
    let mut cursor = Cursor::new(Vec::new());
    write_workbook_to_writer(workbook, &mut cursor)?;
    Ok(cursor.into_inner())
}

pub fn write_workbook_to_writer<W: Write + Seek>(
    workbook: &Workbook,
    writer: W,
) -> Result<(), WriteError> {
    let mut zip = ZipWriter::new(writer);
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let shared_strings = SharedStrings::build(workbook);
    let styles = ResolvedStyles::build(workbook)?;
    let has_theme = workbook.styles.theme_xml.is_some();

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(root_rels_xml().as_bytes())?;

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml(workbook, !shared_strings.is_empty(), has_theme).as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml(workbook).as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(workbook_rels_xml(workbook, !shared_strings.is_empty(), has_theme).as_bytes())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(&styles.xml)?;

    if let Some(theme) = &workbook.styles.theme_xml {
        zip.start_file("xl/theme/theme1.xml", options)?;
        zip.write_all(theme)?;
    }

    if !shared_strings.is_empty() {
        zip.start_file("xl/sharedStrings.xml", options)?;
        zip.write_all(shared_strings.to_xml().as_bytes())?;
    }

    for (idx, sheet) in workbook.sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", idx + 1), options)?;
        zip.write_all(sheet_xml(sheet, &shared_strings, &styles).as_bytes())?;
    }

    let _writer = zip.finish()?;
    Ok(())
}

struct SharedStrings {
    values: Vec<String>,
    index: HashMap<String, u32>,
}

impl SharedStrings {
    fn build(workbook: &Workbook) -> Self {
        let mut table = SharedStrings {
            values: Vec::new(),
            index: HashMap::new(),
        };
        let strings = workbook
            .sheets
            .iter()
            .flat_map(|sheet| sheet.rows.iter())
            .flat_map(|row| row.cells.iter())
            .filter(|cell| cell.formula.is_none())
            .filter_map(|cell| match &cell.value {
                CellValue::String(s) if !s.is_empty() => Some(s),
                _ => None,
            });
        for s in strings {
            if !table.index.contains_key(s) {
                table.index.insert(s.clone(), table.values.len() as u32);
                table.values.push(s.clone());
            }
        }
        table
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(
            r#"<sst xmlns="{MAIN_NS}" count="{0}" uniqueCount="{0}">"#,
            self.values.len()
        ));
        for s in &self.values {
            let space = if s.trim() != s { r#" xml:space="preserve""# } else { "" };
            out.push_str(&format!("<si><t{space}>{}</t></si>", escape_xml(s)));
        }
        out.push_str("</sst>");
        out
    }
}

/// `styles.xml` as written plus the xf index each cell style resolves to.
struct ResolvedStyles {
    xml: Vec<u8>,
    wrap_xfs: BTreeMap<u32, u32>,
    xf_count: u32,
}

impl ResolvedStyles {
    fn build(workbook: &Workbook) -> Result<Self, WriteError> {
        let styles = &workbook.styles;
        let base_xml = match &styles.styles_xml {
            Some(bytes) => std::str::from_utf8(bytes).map_err(StylesError::Utf8)?,
            None => DEFAULT_STYLES_XML,
        };
        let xf_count = if styles.styles_xml.is_some() {
            styles.cell_xfs.len() as u32
        } else {
            1
        };

        let bases: BTreeSet<u32> = workbook
            .sheets
            .iter()
            .flat_map(|sheet| sheet.rows.iter())
            .flat_map(|row| row.cells.iter())
            .filter(|cell| cell.style.wrap_text)
            .map(|cell| cell.style.xf_index)
            .filter(|xf| !styles.xf(*xf).is_some_and(|record| record.wrap_text))
            .collect();

        if bases.is_empty() {
            return Ok(Self {
                xml: base_xml.as_bytes().to_vec(),
                wrap_xfs: BTreeMap::new(),
                xf_count,
            });
        }

        let bases: Vec<u32> = bases.into_iter().collect();
        let (xml, wrap_xfs) = append_wrap_text_xfs(base_xml, &bases)?;
        log::debug!("derived {} wrapping cell formats", wrap_xfs.len());
        Ok(Self {
            xml: xml.into_bytes(),
            wrap_xfs,
            xf_count,
        })
    }

    fn xf_for(&self, cell: &Cell) -> u32 {
        let xf = cell.style.xf_index;
        if cell.style.wrap_text {
            if let Some(derived) = self.wrap_xfs.get(&xf) {
                return *derived;
            }
        }
        if xf >= self.xf_count && xf != 0 {
            log::warn!("cell format {xf} is not defined in styles.xml; using the default format");
            return 0;
        }
        xf
    }
}

fn root_rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
    )
}

fn content_types_xml(workbook: &Workbook, has_shared_strings: bool, has_theme: bool) -> String {
    let mut overrides = String::new();
    overrides.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for idx in 1..=workbook.sheets.len() {
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{idx}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    overrides.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    if has_theme {
        overrides.push_str(r#"<Override PartName="/xl/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#);
    }
    if has_shared_strings {
        overrides.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  {overrides}
</Types>"#
    )
}

fn workbook_xml(workbook: &Workbook) -> String {
    let mut sheets_xml = String::new();
    for (idx, sheet) in workbook.sheets.iter().enumerate() {
        let sheet_id = idx + 1;
        sheets_xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{sheet_id}" r:id="rId{sheet_id}"/>"#,
            escape_xml(&sheet.name)
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">
  <sheets>{sheets_xml}</sheets>
</workbook>"#
    )
}

fn workbook_rels_xml(workbook: &Workbook, has_shared_strings: bool, has_theme: bool) -> String {
    let mut rels = String::new();
    for idx in 1..=workbook.sheets.len() {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{idx}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{idx}.xml"/>"#
        ));
    }
    // Package parts after the sheets so sheet relationship ids match sheet numbers.
    let mut next = workbook.sheets.len() + 1;
    rels.push_str(&format!(
        r#"<Relationship Id="rId{next}" Type="{REL_NS}/styles" Target="styles.xml"/>"#
    ));
    next += 1;
    if has_theme {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{next}" Type="{REL_NS}/theme" Target="theme/theme1.xml"/>"#
        ));
        next += 1;
    }
    if has_shared_strings {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{next}" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/>"#
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  {rels}
</Relationships>"#
    )
}

fn sheet_xml(sheet: &Sheet, shared_strings: &SharedStrings, styles: &ResolvedStyles) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">"#
    ));

    if !sheet.columns.is_empty() {
        out.push_str("<cols>");
        for col in &sheet.columns {
            out.push_str(&col_xml(col));
        }
        out.push_str("</cols>");
    }

    out.push_str("<sheetData>");
    for (row_idx, row) in sheet.rows.iter().enumerate() {
        out.push_str(&row_xml(row_idx as u32, row, shared_strings, styles));
    }
    out.push_str("</sheetData>");

    let merges = sheet.merged_ranges();
    if !merges.is_empty() {
        out.push_str(&format!(r#"<mergeCells count="{}">"#, merges.len()));
        for range in merges {
            out.push_str(&format!(r#"<mergeCell ref="{range}"/>"#));
        }
        out.push_str("</mergeCells>");
    }

    out.push_str("</worksheet>");
    out
}

fn col_xml(col: &Column) -> String {
    let mut out = format!(r#"<col min="{}" max="{}""#, col.min, col.max);
    if let Some(width) = col.width {
        out.push_str(&format!(r#" width="{width}""#));
    }
    if let Some(style) = col.style {
        out.push_str(&format!(r#" style="{style}""#));
    }
    if col.hidden {
        out.push_str(r#" hidden="1""#);
    }
    if col.custom_width {
        out.push_str(r#" customWidth="1""#);
    }
    if col.outline_level > 0 {
        out.push_str(&format!(r#" outlineLevel="{}""#, col.outline_level));
    }
    if col.collapsed {
        out.push_str(r#" collapsed="1""#);
    }
    out.push_str("/>");
    out
}

fn row_xml(
    row_idx: u32,
    row: &Row,
    shared_strings: &SharedStrings,
    styles: &ResolvedStyles,
) -> String {
    let mut cells = String::new();
    for (col_idx, cell) in row.cells.iter().enumerate() {
        let at = CellRef::new(row_idx, col_idx as u32);
        cells.push_str(&cell_xml(at, cell, shared_strings, styles));
    }
    if cells.is_empty() && row.height.is_none() && !row.hidden {
        return String::new();
    }

    let mut out = format!(r#"<row r="{}""#, row_idx + 1);
    if let Some(height) = row.height {
        out.push_str(&format!(r#" ht="{height}" customHeight="1""#));
    }
    if row.hidden {
        out.push_str(r#" hidden="1""#);
    }
    if cells.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        out.push_str(&cells);
        out.push_str("</row>");
    }
    out
}

fn cell_xml(
    at: CellRef,
    cell: &Cell,
    shared_strings: &SharedStrings,
    styles: &ResolvedStyles,
) -> String {
    let xf = styles.xf_for(cell);
    let blank = cell.value.is_empty() && cell.formula.is_none();
    if blank && xf == 0 && cell.h_merge == 0 && cell.v_merge == 0 {
        return String::new();
    }

    let mut out = format!(r#"<c r="{at}""#);
    if xf != 0 {
        out.push_str(&format!(r#" s="{xf}""#));
    }

    let formula = cell
        .formula
        .as_deref()
        .map(|f| format!("<f>{}</f>", escape_xml(f)))
        .unwrap_or_default();

    let (cell_type, value) = match &cell.value {
        CellValue::Empty => (None, None),
        CellValue::String(s) if s.is_empty() => (None, None),
        CellValue::String(s) => match shared_strings.get(s) {
            Some(idx) if cell.formula.is_none() => (Some("s"), Some(idx.to_string())),
            _ => (Some("str"), Some(escape_xml(s))),
        },
        CellValue::Number(n) if n.is_finite() => (None, Some(n.to_string())),
        CellValue::Number(_) => (Some("e"), Some("#NUM!".to_string())),
        CellValue::Boolean(b) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
        CellValue::Error(e) => (Some("e"), Some(escape_xml(e))),
    };

    if let Some(t) = cell_type {
        out.push_str(&format!(r#" t="{t}""#));
    }
    if formula.is_empty() && value.is_none() {
        out.push_str("/>");
        return out;
    }
    out.push('>');
    out.push_str(&formula);
    if let Some(v) = value {
        out.push_str(&format!("<v>{v}</v>"));
    }
    out.push_str("</c>");
    out
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
