use serde::{Deserialize, Serialize};

use crate::{CellRef, Column, Range, Row};

/// A worksheet: name, rows in display order, and column records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a row and return a handle to it.
    pub fn add_row(&mut self, row: Row) -> &mut Row {
        self.rows.push(row);
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    /// Merged regions implied by the anchor cells' spans at their current positions.
    pub fn merged_ranges(&self) -> Vec<Range> {
        let mut out = Vec::new();
        for (row_idx, row) in self.rows.iter().enumerate() {
            for (col_idx, cell) in row.cells.iter().enumerate() {
                if cell.h_merge == 0 && cell.v_merge == 0 {
                    continue;
                }
                let start = CellRef::new(row_idx as u32, col_idx as u32);
                let end = CellRef::new(start.row + cell.v_merge, start.col + cell.h_merge);
                out.push(Range::new(start, end));
            }
        }
        out
    }
}
