use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedStringsError {
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("malformed sharedStrings.xml: {0}")]
    Malformed(&'static str),
}

/// Parse `xl/sharedStrings.xml` into the visible text of each `<si>` entry.
///
/// Rich-text runs are flattened; phonetic (`<rPh>`) runs are not part of the displayed
/// string and are dropped.
pub fn parse_shared_strings_xml(xml: &str) -> Result<Vec<String>, SharedStringsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut items = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(parse_si(&mut reader)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"si" => items.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn parse_si(reader: &mut Reader<&[u8]>) -> Result<String, SharedStringsError> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                text.push_str(&read_text(reader, QName(b"t"))?);
            }
            // `<r>` runs hold their text in a nested `<t>`, which the arm above picks up.
            Event::Start(e) if e.local_name().as_ref() == b"r" => {}
            Event::Start(e) => {
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"si" => break,
            Event::Eof => return Err(SharedStringsError::Malformed("unexpected eof in <si>")),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

pub(crate) fn read_text(
    reader: &mut Reader<&[u8]>,
    end: QName<'_>,
) -> Result<String, SharedStringsError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Event::End(e) if e.name() == end => break,
            Event::Eof => return Err(SharedStringsError::Malformed("unexpected eof in <t>")),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_rich_runs_and_skips_phonetic_text() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
  <si><t>{{range groups}}</t></si>
  <si><r><rPr><b/></rPr><t>{{</t></r><r><t xml:space="preserve">name }}</t></r></si>
  <si><t>Base</t><rPh sb="0" eb="4"><t>PHO</t></rPh></si>
</sst>"#;

        let items = parse_shared_strings_xml(xml).expect("parse sharedStrings.xml");
        assert_eq!(items, vec!["{{range groups}}", "{{name }}", "Base"]);
    }

    #[test]
    fn unescapes_entities() {
        let xml = r#"<sst><si><t>a &amp; b</t></si></sst>"#;
        assert_eq!(parse_shared_strings_xml(xml).unwrap(), vec!["a & b"]);
    }
}
