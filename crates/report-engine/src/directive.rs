//! Recognition of the directives embedded in template cell text.
//!
//! * `{{range <prop>}}` opens a block repeated once per element of `<prop>`.
//! * `{{end}}` closes the innermost open block.
//! * `{{<prop>.<field>}}` anywhere in a row makes the row array-driven by `<prop>`.
//!
//! Open/close directives are only recognised in the first cell of a row.

use std::sync::OnceLock;

use regex::Regex;
use report_model::Row;

pub const RANGE: &str = "range";

/// An opening directive: `{{<name> <prop>}}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Block<'a> {
    pub name: &'a str,
    pub prop: &'a str,
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s+(\w+)\s*\}\}").expect("valid regex"))
}

fn end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*end\s*\}\}").expect("valid regex"))
}

fn list_prop_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\.\w+\s*\}\}").expect("valid regex"))
}

fn first_text(row: &Row) -> Option<&str> {
    row.first_cell()
        .and_then(|cell| cell.text())
        .filter(|text| !text.is_empty())
}

/// The `range` block opened by `row`, if any.
pub fn block(row: &Row) -> Option<Block<'_>> {
    let caps = block_re().captures(first_text(row)?)?;
    let name = caps.get(1)?.as_str();
    if name != RANGE {
        return None;
    }
    Some(Block {
        name,
        prop: caps.get(2)?.as_str(),
    })
}

pub fn is_block_end(row: &Row) -> bool {
    first_text(row).is_some_and(|text| end_re().is_match(text))
}

/// Name of the array driving `row`: the first `{{prop.field}}` reference, scanning cells in
/// order and skipping empty ones.
pub fn list_prop(row: &Row) -> Option<&str> {
    row.cells
        .iter()
        .filter_map(|cell| cell.text())
        .filter(|text| !text.is_empty())
        .find_map(|text| list_prop_re().captures(text)?.get(1).map(|m| m.as_str()))
}
