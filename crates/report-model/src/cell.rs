use serde::{Deserialize, Serialize};

use crate::{CellStyle, CellValue};

/// Options honored by the structural clone primitives on [`Cell`] and [`crate::Row`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Force word wrap on every cloned cell.
    pub force_wrap_text: bool,
}

/// A single cell record.
///
/// Merge spans follow the anchor-cell convention: the top-left cell of a merged region
/// carries `h_merge`/`v_merge` (the number of *additional* columns/rows covered) and the
/// covered cells stay in the row as placeholders. Spans are relative, so they stay correct
/// when the row is cloned to a new position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,

    /// Formula text, copied verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(default)]
    pub style: CellStyle,

    #[serde(default)]
    pub h_merge: u32,

    #[serde(default)]
    pub v_merge: u32,

    #[serde(default)]
    pub hidden: bool,

    /// Number format code resolved from the cell's style.
    #[serde(default)]
    pub num_fmt: String,
}

impl Cell {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Text of a string cell; `None` for any other value.
    pub fn text(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Copy value, formula, style, merge spans, hidden flag and number format.
    pub fn clone_with(&self, options: &CloneOptions) -> Cell {
        let mut cell = self.clone();
        if options.force_wrap_text {
            cell.style.wrap_text = true;
        }
        cell
    }
}
