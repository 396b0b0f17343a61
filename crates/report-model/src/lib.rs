//! `report-model` defines the in-memory spreadsheet structures used by report templates.
//!
//! The model is row-oriented: a [`Sheet`] is an ordered list of [`Row`]s and each row an
//! ordered list of [`Cell`]s starting at column `A`. This is the shape the template engine
//! walks and appends to, so the `.xlsx` codec densifies sparse worksheet XML into it on read
//! and re-derives cell references (and merged ranges) on write.

mod address;
mod cell;
mod column;
mod row;
mod sheet;
mod style;
mod value;
mod workbook;

pub use address::{A1ParseError, CellRef, Range, RangeParseError, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use cell::{Cell, CloneOptions};
pub use column::Column;
pub use row::Row;
pub use sheet::Sheet;
pub use style::{CellStyle, CellXf, StyleSheet};
pub use value::CellValue;
pub use workbook::{validate_sheet_name, SheetNameError, Workbook, EXCEL_MAX_SHEET_NAME_LEN};
