use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use quick_xml::events::attributes::AttrError;
use report_model::{StyleSheet, Workbook};
use roxmltree::Document;
use thiserror::Error;
use zip::ZipArchive;

use crate::path::{rels_for_part, resolve_target};
use crate::shared_strings::parse_shared_strings_xml;
use crate::styles::parse_cell_xfs;
use crate::zip_util::{read_zip_part_optional, read_zip_part_required, MAX_ZIP_PART_BYTES};

mod worksheet;

use worksheet::parse_worksheet;

const ROOT_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const REL_TYPE_OFFICE_DOCUMENT: &str = "/officeDocument";
const REL_TYPE_WORKSHEET: &str = "/worksheet";
const REL_TYPE_STYLES: &str = "/styles";
const REL_TYPE_SHARED_STRINGS: &str = "/sharedStrings";
const REL_TYPE_THEME: &str = "/theme";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] AttrError),
    #[error("xml parse error: {0}")]
    Dom(#[from] roxmltree::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("sharedStrings.xml parse error: {0}")]
    SharedStrings(#[from] crate::shared_strings::SharedStringsError),
    #[error(transparent)]
    Styles(#[from] crate::styles::StylesError),
    #[error("invalid worksheet name: {0}")]
    InvalidSheetName(#[from] report_model::SheetNameError),
    #[error("missing required part: {0}")]
    MissingPart(&'static str),
    #[error("worksheet `{sheet}` points at missing part {part}")]
    MissingSheetPart { sheet: String, part: String },
    #[error("part {part} is too large ({size} bytes, max {max})")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("invalid cell reference: {0}")]
    InvalidCellRef(String),
    #[error("invalid range reference: {0}")]
    InvalidRangeRef(String),
}

/// Open an `.xlsx` file from disk.
pub fn read_workbook(path: impl AsRef<Path>) -> Result<Workbook, ReadError> {
    let file = File::open(path)?;
    read_workbook_from_reader(file)
}

pub fn read_workbook_from_bytes(bytes: &[u8]) -> Result<Workbook, ReadError> {
    read_workbook_from_reader(Cursor::new(bytes))
}

pub fn read_workbook_from_reader<R: Read + Seek>(mut reader: R) -> Result<Workbook, ReadError> {
    // Callers may pass a reused reader.
    reader.seek(SeekFrom::Start(0))?;
    let mut archive = ZipArchive::new(reader)?;
    read_workbook_from_zip(&mut archive)
}

fn read_workbook_from_zip<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Workbook, ReadError> {
    let workbook_part = match read_zip_part_optional(archive, ROOT_RELS_PART, MAX_ZIP_PART_BYTES)? {
        Some(bytes) => parse_relationships(&bytes)?
            .into_iter()
            .find(|rel| rel.type_.ends_with(REL_TYPE_OFFICE_DOCUMENT))
            .map(|rel| resolve_target("", &rel.target))
            .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()),
        None => DEFAULT_WORKBOOK_PART.to_string(),
    };

    let workbook_xml = if workbook_part == DEFAULT_WORKBOOK_PART {
        read_zip_part_required(archive, DEFAULT_WORKBOOK_PART)?
    } else {
        read_zip_part_optional(archive, &workbook_part, MAX_ZIP_PART_BYTES)?
            .ok_or(ReadError::MissingPart(DEFAULT_WORKBOOK_PART))?
    };
    let workbook_rels = read_zip_part_optional(archive, &rels_for_part(&workbook_part), MAX_ZIP_PART_BYTES)?
        .map(|bytes| parse_relationships(&bytes))
        .transpose()?
        .unwrap_or_default();

    let part_for_type = |suffix: &str| {
        workbook_rels
            .iter()
            .find(|rel| rel.type_.ends_with(suffix))
            .map(|rel| resolve_target(&workbook_part, &rel.target))
    };

    let styles_xml = match part_for_type(REL_TYPE_STYLES) {
        Some(part) => read_zip_part_optional(archive, &part, MAX_ZIP_PART_BYTES)?,
        None => None,
    };
    let cell_xfs = match styles_xml.as_deref() {
        Some(bytes) => parse_cell_xfs(bytes)?,
        None => Vec::new(),
    };
    let theme_xml = match part_for_type(REL_TYPE_THEME) {
        Some(part) => read_zip_part_optional(archive, &part, MAX_ZIP_PART_BYTES)?,
        None => None,
    };
    let shared_strings = match part_for_type(REL_TYPE_SHARED_STRINGS) {
        Some(part) => match read_zip_part_optional(archive, &part, MAX_ZIP_PART_BYTES)? {
            Some(bytes) => parse_shared_strings_xml(std::str::from_utf8(&bytes)?)?,
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    let mut workbook = Workbook::with_styles(StyleSheet {
        styles_xml,
        theme_xml,
        cell_xfs,
    });

    for (name, rel_id) in parse_workbook_sheets(&workbook_xml)? {
        let Some(rel) = workbook_rels
            .iter()
            .find(|rel| rel.id == rel_id && rel.type_.ends_with(REL_TYPE_WORKSHEET))
        else {
            log::warn!("skipping sheet `{name}`: no worksheet relationship `{rel_id}`");
            continue;
        };
        let part = resolve_target(&workbook_part, &rel.target);
        let xml = read_zip_part_optional(archive, &part, MAX_ZIP_PART_BYTES)?.ok_or_else(|| {
            ReadError::MissingSheetPart {
                sheet: name.clone(),
                part: part.clone(),
            }
        })?;

        let parsed = parse_worksheet(&xml, &shared_strings, &workbook.styles)?;
        let sheet = workbook.add_sheet(name)?;
        sheet.rows = parsed.rows;
        sheet.columns = parsed.columns;
        log::debug!(
            "read sheet `{}` from {part}: {} rows, {} column records",
            sheet.name,
            sheet.rows.len(),
            sheet.columns.len()
        );
    }

    Ok(workbook)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    id: String,
    type_: String,
    target: String,
}

fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, ReadError> {
    let xml = std::str::from_utf8(xml)?;
    let doc = Document::parse(xml)?;

    let rels = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
        .filter(|n| n.attribute("TargetMode") != Some("External"))
        .filter_map(|n| {
            Some(Relationship {
                id: n.attribute("Id")?.to_string(),
                type_: n.attribute("Type").unwrap_or_default().to_string(),
                target: n.attribute("Target").unwrap_or_default().to_string(),
            })
        })
        .collect();
    Ok(rels)
}

/// `(name, relationship id)` for each `<sheet>` in workbook order.
fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<(String, String)>, ReadError> {
    let xml = std::str::from_utf8(xml)?;
    let doc = Document::parse(xml)?;

    let sheets = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "sheet")
        .filter_map(|n| {
            let name = n.attribute("name")?;
            // `r:id`; match on local name since producers vary the prefix.
            let rel_id = n
                .attributes()
                .find(|a| a.name() == "id" && a.namespace().is_some())?
                .value();
            Some((name.to_string(), rel_id.to_string()))
        })
        .collect();
    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_internal_relationships_only() {
        let rels = parse_relationships(
            br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
              <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
              <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
            </Relationships>"#,
        )
        .unwrap();

        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].id, "rId1");
        assert_eq!(rels[0].target, "worksheets/sheet1.xml");
    }

    #[test]
    fn sheet_ids_are_read_regardless_of_prefix() {
        let sheets = parse_workbook_sheets(
            br#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
                          xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
              <sheets>
                <sheet name="Data" sheetId="1" rel:id="rId3"/>
                <sheet name="Totals" sheetId="2" rel:id="rId1"/>
              </sheets>
            </workbook>"#,
        )
        .unwrap();

        assert_eq!(
            sheets,
            vec![
                ("Data".to_string(), "rId3".to_string()),
                ("Totals".to_string(), "rId1".to_string()),
            ]
        );
    }
}
