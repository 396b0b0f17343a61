use serde::{Deserialize, Serialize};

/// Style reference carried by a cell.
///
/// XLSX cells point at an `<xf>` record in `styles.xml` (`c/@s`). The model keeps that index
/// as-is so styles round-trip verbatim; `wrap_text` requests word wrap on top of the
/// referenced record and makes the writer derive a wrapping `<xf>` when the original does
/// not already wrap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellStyle {
    #[serde(default)]
    pub xf_index: u32,
    #[serde(default)]
    pub wrap_text: bool,
}

impl CellStyle {
    pub const fn new(xf_index: u32) -> Self {
        Self {
            xf_index,
            wrap_text: false,
        }
    }
}

/// The parts of a `cellXfs/xf` record the model cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellXf {
    pub num_fmt_id: u32,
    /// Number format code (built-in or custom) for `num_fmt_id`.
    pub num_fmt: String,
    pub wrap_text: bool,
    /// `<protection hidden="1">`.
    pub hidden: bool,
}

/// Workbook-level style parts, preserved byte-for-byte from the template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    /// Raw `xl/styles.xml`. `None` means the writer emits a default stylesheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles_xml: Option<Vec<u8>>,
    /// Raw `xl/theme/theme1.xml`, if the template had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_xml: Option<Vec<u8>>,
    /// Parsed `cellXfs`, indexed by xf index.
    #[serde(default)]
    pub cell_xfs: Vec<CellXf>,
}

impl StyleSheet {
    pub fn xf(&self, xf_index: u32) -> Option<&CellXf> {
        self.cell_xfs.get(xf_index as usize)
    }
}
