//! OPC part-name arithmetic for relationship targets.

/// Part name that `target` points at, for a relationship owned by `owner`.
///
/// Targets are relative to the owner's directory unless they start with `/`. Fragments are
/// dropped and `.`/`..` segments collapsed.
pub(crate) fn resolve_target(owner: &str, target: &str) -> String {
    let target = match target.find('#') {
        Some(idx) => &target[..idx],
        None => target,
    };

    let base = match (target.starts_with('/'), target.is_empty()) {
        (true, _) => "",
        (false, true) => owner,
        (false, false) => owner.rsplit_once('/').map_or("", |(dir, _)| dir),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(target.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }
    segments.join("/")
}

/// Relationships part of `part`: `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`.
pub(crate) fn rels_for_part(part: &str) -> String {
    let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
    if dir.is_empty() {
        format!("_rels/{file}.rels")
    } else {
        format!("{dir}/_rels/{file}.rels")
    }
}
