use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::ReadError;

/// Maximum uncompressed size accepted for any single part (ZIP bomb guardrail).
pub(crate) const MAX_ZIP_PART_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// Compare part names ignoring ASCII case, `\` vs `/` separators and leading separators.
pub(crate) fn zip_part_names_equivalent(a: &str, b: &str) -> bool {
    fn canonical(s: &str) -> impl Iterator<Item = u8> + '_ {
        s.trim_start_matches(['/', '\\']).bytes().map(|b| match b {
            b'\\' => b'/',
            other => other.to_ascii_lowercase(),
        })
    }
    canonical(a).eq(canonical(b))
}

/// Index of the entry named `name`, preferring an exact match over an equivalent one.
fn find_zip_part<R: Read + Seek>(archive: &ZipArchive<R>, name: &str) -> Option<usize> {
    let mut equivalent = None;
    for (idx, entry) in archive.file_names().enumerate() {
        if entry == name {
            return Some(idx);
        }
        if equivalent.is_none() && zip_part_names_equivalent(entry, name) {
            equivalent = Some(idx);
        }
    }
    equivalent
}

/// Read a part into memory, returning `Ok(None)` when it does not exist.
///
/// The declared size is checked first, then the read itself is capped at `max_bytes + 1` so
/// forged size metadata cannot inflate past the limit.
pub(crate) fn read_zip_part_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, ReadError> {
    let Some(idx) = find_zip_part(archive, name) else {
        return Ok(None);
    };
    let mut file = archive.by_index(idx)?;
    if file.is_dir() {
        return Ok(None);
    }

    if file.size() > max_bytes {
        return Err(ReadError::PartTooLarge {
            part: name.to_string(),
            size: file.size(),
            max: max_bytes,
        });
    }

    let mut buf = Vec::new();
    (&mut file).take(max_bytes.saturating_add(1)).read_to_end(&mut buf)?;
    if buf.len() as u64 > max_bytes {
        return Err(ReadError::PartTooLarge {
            part: name.to_string(),
            size: buf.len() as u64,
            max: max_bytes,
        });
    }
    Ok(Some(buf))
}

pub(crate) fn read_zip_part_required<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Vec<u8>, ReadError> {
    read_zip_part_optional(archive, name, MAX_ZIP_PART_BYTES)?.ok_or(ReadError::MissingPart(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Cursor, Write};

    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn equivalent_names_ignore_case_and_separators() {
        assert!(zip_part_names_equivalent("XL\\Workbook.xml", "xl/workbook.xml"));
        assert!(zip_part_names_equivalent("/xl/workbook.xml", "xl/workbook.xml"));
        assert!(!zip_part_names_equivalent("xl/workbook.xml", "xl/workbook.xm"));
    }

    #[test]
    fn prefers_exact_entry_over_equivalent_one() {
        let bytes = build_zip(&[("XL/Workbook.xml", b"equivalent"), ("xl/workbook.xml", b"exact")]);
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let part = read_zip_part_optional(&mut archive, "xl/workbook.xml", 64)
            .unwrap()
            .unwrap();
        assert_eq!(part, b"exact");
    }

    #[test]
    fn missing_part_is_none_and_oversized_part_errors() {
        let bytes = build_zip(&[("a.txt", b"hello world")]);
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        assert!(read_zip_part_optional(&mut archive, "b.txt", 64).unwrap().is_none());
        match read_zip_part_optional(&mut archive, "a.txt", 10).unwrap_err() {
            ReadError::PartTooLarge { part, .. } => assert_eq!(part, "a.txt"),
            other => panic!("expected PartTooLarge, got {other:?}"),
        }
    }
}
