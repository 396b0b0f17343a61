//! XLSX import/export for report templates.
//!
//! Reading densifies each worksheet into [`report_model::Row`]s (so a template can be walked
//! row by row) and keeps `styles.xml`/theme bytes so the report can reuse the template's
//! style indices verbatim. Writing produces a fresh package from a [`report_model::Workbook`]:
//! only the style parts are carried over from the template; everything else is regenerated.

mod path;
mod read;
mod shared_strings;
mod styles;
mod write;
mod zip_util;

pub use read::{read_workbook, read_workbook_from_bytes, read_workbook_from_reader, ReadError};
pub use shared_strings::{parse_shared_strings_xml, SharedStringsError};
pub use styles::{builtin_num_fmt, parse_cell_xfs, StylesError};
pub use write::{write_workbook, write_workbook_to_bytes, write_workbook_to_writer, WriteError};
