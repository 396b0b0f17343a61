use serde::{Deserialize, Serialize};

/// A worksheet `<col>` record. Copied from template to report without interpretation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// 1-based first column covered by the record.
    pub min: u32,
    /// 1-based last column covered by the record.
    pub max: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub custom_width: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<u32>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub outline_level: u8,
}
