use serde::{Deserialize, Serialize};

use crate::{Cell, CloneOptions};

/// An ordered run of cells starting at column `A`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub cells: Vec<Cell>,
    /// Custom height in points; `None` keeps the sheet default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub hidden: bool,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            ..Default::default()
        }
    }

    /// Build a row of string cells.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Cell::new(t.into())).collect())
    }

    pub fn first_cell(&self) -> Option<&Cell> {
        self.cells.first()
    }

    /// Structural copy of the row: every cell is cloned with `options`, height and
    /// visibility are kept.
    pub fn clone_with(&self, options: &CloneOptions) -> Row {
        Row {
            cells: self.cells.iter().map(|c| c.clone_with(options)).collect(),
            height: self.height,
            hidden: self.hidden,
        }
    }

    /// Text of each cell, using `""` for non-string cells. Convenient for assertions.
    pub fn texts(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|c| c.text().unwrap_or_default().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_with_keeps_height_and_wraps_every_cell() {
        let mut row = Row::from_texts(["a", "b"]);
        row.height = Some(30.0);

        let cloned = row.clone_with(&CloneOptions {
            force_wrap_text: true,
        });
        assert_eq!(cloned.height, Some(30.0));
        assert_eq!(cloned.texts(), vec!["a", "b"]);
        assert!(cloned.cells.iter().all(|c| c.style.wrap_text));
    }
}
