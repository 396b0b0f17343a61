use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Sheet, StyleSheet};

/// Excel's limit on worksheet name length.
pub const EXCEL_MAX_SHEET_NAME_LEN: usize = 31;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetNameError {
    #[error("sheet name cannot be blank")]
    EmptyName,
    #[error("sheet name cannot exceed {EXCEL_MAX_SHEET_NAME_LEN} characters")]
    TooLong,
    #[error("sheet name contains invalid character `{0}`")]
    InvalidCharacter(char),
    #[error("sheet name cannot begin or end with an apostrophe")]
    LeadingOrTrailingApostrophe,
    #[error("sheet name `{0}` is already taken")]
    DuplicateName(String),
}

/// Validate a worksheet name against Excel's rules (uniqueness is checked by
/// [`Workbook::add_sheet`]).
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.trim().is_empty() {
        return Err(SheetNameError::EmptyName);
    }
    if name.chars().count() > EXCEL_MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong);
    }
    if let Some(ch) = name
        .chars()
        .find(|c| matches!(c, ':' | '\\' | '/' | '?' | '*' | '[' | ']'))
    {
        return Err(SheetNameError::InvalidCharacter(ch));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::LeadingOrTrailingApostrophe);
    }
    Ok(())
}

/// An ordered collection of sheets plus the workbook-level style parts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default)]
    pub sheets: Vec<Sheet>,
    #[serde(default)]
    pub styles: StyleSheet,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty workbook that shares `styles` with another one, so style indices copied
    /// from that workbook's cells stay valid.
    pub fn with_styles(styles: StyleSheet) -> Self {
        Self {
            sheets: Vec::new(),
            styles,
        }
    }

    /// Append an empty sheet. Names are compared case-insensitively, as Excel does.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> Result<&mut Sheet, SheetNameError> {
        let name = name.into();
        validate_sheet_name(&name)?;
        let folded = name.to_lowercase();
        if self.sheets.iter().any(|s| s.name.to_lowercase() == folded) {
            return Err(SheetNameError::DuplicateName(name));
        }
        self.sheets.push(Sheet::new(name));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        let folded = name.to_lowercase();
        self.sheets.iter().find(|s| s.name.to_lowercase() == folded)
    }
}
