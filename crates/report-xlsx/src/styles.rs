//! `styles.xml` support.
//!
//! The report reuses the template's stylesheet verbatim, so cells keep pointing at the same
//! `cellXfs` indices. The only edit ever made is appending wrapping copies of existing `<xf>`
//! records when rendering forces word wrap; existing indices stay stable.

use std::collections::{BTreeMap, HashMap};

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use report_model::CellXf;
use roxmltree::Document;
use thiserror::Error;

/// Stylesheet written when the template has none. Mirrors a blank Excel workbook.
pub(crate) const DEFAULT_STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1">
    <font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font>
  </fonts>
  <fills count="2">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
  </fills>
  <borders count="1">
    <border><left/><right/><top/><bottom/><diagonal/></border>
  </borders>
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>
  <cellXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
  </cellXfs>
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>
  <dxfs count="0"/>
  <tableStyles count="0" defaultTableStyle="TableStyleMedium9" defaultPivotStyle="PivotStyleLight16"/>
</styleSheet>
"#;

#[derive(Debug, Error)]
pub enum StylesError {
    #[error("styles.xml is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("styles.xml parse error: {0}")]
    Dom(#[from] roxmltree::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("styles.xml root is not <styleSheet>")]
    InvalidRoot,
    #[error("styles.xml has no <cellXfs>")]
    MissingCellXfs,
}

/// Format code of a built-in number format id (ECMA-376 §18.8.30).
pub fn builtin_num_fmt(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// Parse the `cellXfs` table of `styles.xml`.
pub fn parse_cell_xfs(xml: &[u8]) -> Result<Vec<CellXf>, StylesError> {
    let xml = std::str::from_utf8(xml)?;
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "styleSheet" {
        return Err(StylesError::InvalidRoot);
    }

    let mut custom: HashMap<u32, String> = HashMap::new();
    if let Some(num_fmts) = child(root, "numFmts") {
        for fmt in num_fmts.children().filter(|n| n.has_tag_name_local("numFmt")) {
            let id = fmt.attribute("numFmtId").and_then(|v| v.parse().ok());
            if let (Some(id), Some(code)) = (id, fmt.attribute("formatCode")) {
                custom.insert(id, code.to_string());
            }
        }
    }

    let Some(cell_xfs) = child(root, "cellXfs") else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for xf in cell_xfs.children().filter(|n| n.has_tag_name_local("xf")) {
        let num_fmt_id: u32 = xf
            .attribute("numFmtId")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let num_fmt = custom
            .get(&num_fmt_id)
            .cloned()
            .or_else(|| builtin_num_fmt(num_fmt_id).map(str::to_string))
            .unwrap_or_else(|| "General".to_string());
        let wrap_text = child(xf, "alignment")
            .and_then(|a| a.attribute("wrapText"))
            .is_some_and(parse_xml_bool);
        let hidden = child(xf, "protection")
            .and_then(|p| p.attribute("hidden"))
            .is_some_and(parse_xml_bool);
        out.push(CellXf {
            num_fmt_id,
            num_fmt,
            wrap_text,
            hidden,
        });
    }
    Ok(out)
}

/// Append a word-wrapping copy of each `bases` xf to `cellXfs`.
///
/// Returns the rewritten XML and a map from base xf index to the index of its wrapping copy.
/// A base index with no `<xf>` record gets a copy of a default record.
pub(crate) fn append_wrap_text_xfs(
    styles_xml: &str,
    bases: &[u32],
) -> Result<(String, BTreeMap<u32, u32>), StylesError> {
    let existing = {
        let doc = Document::parse(styles_xml)?;
        let cell_xfs = child(doc.root_element(), "cellXfs").ok_or(StylesError::MissingCellXfs)?;
        cell_xfs
            .children()
            .filter(|n| n.has_tag_name_local("xf"))
            .count() as u32
    };
    let mapping: BTreeMap<u32, u32> = bases
        .iter()
        .enumerate()
        .map(|(i, base)| (*base, existing + i as u32))
        .collect();

    let mut reader = Reader::from_str(styles_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut in_cell_xfs = false;
    let mut xf_prefix: Option<String> = None;
    let mut captured: HashMap<u32, Vec<Event<'static>>> = HashMap::new();
    let mut current: Option<Vec<Event<'static>>> = None;
    let mut depth = 0usize;
    let mut next_xf = 0u32;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            _ if current.is_some() => {
                match &event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth -= 1,
                    _ => {}
                }
                let owned = event.clone().into_owned();
                writer.write_event(event)?;
                if let Some(events) = current.as_mut() {
                    events.push(owned);
                }
                if depth == 0 {
                    if let Some(events) = current.take() {
                        captured.insert(next_xf, events);
                    }
                    next_xf += 1;
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = true;
                let count = (existing as usize + bases.len()).to_string();
                writer.write_event(Event::Start(with_attr(e, "count", &count)?))?;
            }
            Event::Start(ref e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                xf_prefix = prefix_of(e);
                depth = 1;
                current = Some(vec![event.clone().into_owned()]);
                writer.write_event(event.borrow())?;
            }
            Event::Empty(ref e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                xf_prefix = prefix_of(e);
                captured.insert(next_xf, vec![event.clone().into_owned()]);
                next_xf += 1;
                writer.write_event(event.borrow())?;
            }
            Event::End(ref e) if in_cell_xfs && e.local_name().as_ref() == b"cellXfs" => {
                in_cell_xfs = false;
                for base in bases {
                    let derived = match captured.get(base) {
                        Some(events) => wrap_xf(events, xf_prefix.as_deref())?,
                        None => default_wrap_xf(xf_prefix.as_deref()),
                    };
                    for ev in derived {
                        writer.write_event(ev)?;
                    }
                }
                writer.write_event(event.borrow())?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"cellXfs" => {
                let count = bases.len().to_string();
                let start = with_attr(e, "count", &count)?;
                let end = BytesEnd::new(start_name(&start)?);
                writer.write_event(Event::Start(start))?;
                for _ in bases {
                    for ev in default_wrap_xf(None) {
                        writer.write_event(ev)?;
                    }
                }
                writer.write_event(Event::End(end))?;
            }
            _ => writer.write_event(event)?,
        }
        buf.clear();
    }

    let xml = String::from_utf8(writer.into_inner())
        .map_err(|e| StylesError::Utf8(e.utf8_error()))?;
    Ok((xml, mapping))
}

fn wrap_xf(
    events: &[Event<'static>],
    prefix: Option<&str>,
) -> Result<Vec<Event<'static>>, StylesError> {
    let mut out = Vec::with_capacity(events.len() + 2);
    let Some(first) = events.first() else {
        return Ok(default_wrap_xf(prefix));
    };

    match first {
        Event::Empty(e) => {
            let start = with_attr(e, "applyAlignment", "1")?;
            let end = BytesEnd::new(start_name(&start)?);
            out.push(Event::Start(start));
            out.push(Event::Empty(wrap_alignment(prefix)));
            out.push(Event::End(end));
            return Ok(out);
        }
        Event::Start(e) => out.push(Event::Start(with_attr(e, "applyAlignment", "1")?)),
        _ => return Ok(default_wrap_xf(prefix)),
    }

    let mut depth = 1usize;
    let mut has_alignment = false;
    for ev in &events[1..] {
        match ev {
            Event::Start(e) if depth == 1 && e.local_name().as_ref() == b"alignment" => {
                has_alignment = true;
                out.push(Event::Start(with_attr(e, "wrapText", "1")?));
                depth += 1;
            }
            Event::Empty(e) if depth == 1 && e.local_name().as_ref() == b"alignment" => {
                has_alignment = true;
                out.push(Event::Empty(with_attr(e, "wrapText", "1")?));
            }
            Event::Start(_) => {
                depth += 1;
                out.push(ev.clone());
            }
            Event::End(_) => {
                depth -= 1;
                out.push(ev.clone());
            }
            _ => out.push(ev.clone()),
        }
    }

    // `<alignment>` is the first child of `<xf>` in the schema.
    if !has_alignment {
        out.insert(1, Event::Empty(wrap_alignment(prefix)));
    }
    Ok(out)
}

fn default_wrap_xf(prefix: Option<&str>) -> Vec<Event<'static>> {
    let name = prefixed_tag(prefix, "xf");
    let mut start = BytesStart::new(name.clone());
    for (key, value) in [
        ("numFmtId", "0"),
        ("fontId", "0"),
        ("fillId", "0"),
        ("borderId", "0"),
        ("xfId", "0"),
        ("applyAlignment", "1"),
    ] {
        start.push_attribute((key, value));
    }
    vec![
        Event::Start(start),
        Event::Empty(wrap_alignment(prefix)),
        Event::End(BytesEnd::new(name)),
    ]
}

fn wrap_alignment(prefix: Option<&str>) -> BytesStart<'static> {
    let mut alignment = BytesStart::new(prefixed_tag(prefix, "alignment"));
    alignment.push_attribute(("wrapText", "1"));
    alignment
}

/// Copy `e` with `key` set to `value` (replacing any existing value).
fn with_attr(e: &BytesStart<'_>, key: &str, value: &str) -> Result<BytesStart<'static>, StylesError> {
    let mut out = BytesStart::new(start_name(e)?);
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            continue;
        }
        out.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
    }
    out.push_attribute((key, value));
    Ok(out)
}

fn start_name(e: &BytesStart<'_>) -> Result<String, StylesError> {
    Ok(std::str::from_utf8(e.name().as_ref())?.to_string())
}

fn prefix_of(e: &BytesStart<'_>) -> Option<String> {
    e.name()
        .prefix()
        .and_then(|p| std::str::from_utf8(p.as_ref()).ok().map(str::to_string))
}

fn prefixed_tag(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    local: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name_local(local))
}

trait HasLocalName {
    fn has_tag_name_local(&self, local: &str) -> bool;
}

impl HasLocalName for roxmltree::Node<'_, '_> {
    fn has_tag_name_local(&self, local: &str) -> bool {
        self.is_element() && self.tag_name().name() == local
    }
}

fn parse_xml_bool(val: &str) -> bool {
    matches!(val, "1" | "true" | "TRUE")
}
