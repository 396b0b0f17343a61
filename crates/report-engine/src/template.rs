use std::io::Write;
use std::path::Path;

use report_model::{CloneOptions, SheetNameError, Workbook};
use report_xlsx::{ReadError, WriteError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{Context, Value};
use crate::eval::{Evaluator, HandlebarsEvaluator};
use crate::render::{RenderError, SheetRenderer};

/// Options for [`XlsxTemplate::render_with_options`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Turn on word wrap in every rendered cell.
    pub force_wrap_text: bool,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to read template: {0}")]
    Read(#[from] ReadError),
    #[error("failed to write report: {0}")]
    Write(#[from] WriteError),
    #[error("invalid report sheet: {0}")]
    SheetName(#[from] SheetNameError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no template has been loaded")]
    NoTemplate,
    #[error("the report has not been rendered yet")]
    NotYetRendered,
}

/// An XLSX template and the last report rendered from it.
///
/// ```no_run
/// use report_engine::{Value, XlsxTemplate};
///
/// let mut template = XlsxTemplate::open("template.xlsx")?;
/// let data = Value::from(serde_json::json!({"items": [{"name": "apples", "qty": 3}]}));
/// template.render(&data)?;
/// template.save("report.xlsx")?;
/// # Ok::<(), report_engine::TemplateError>(())
/// ```
pub struct XlsxTemplate {
    template: Option<Workbook>,
    report: Option<Workbook>,
    evaluator: Box<dyn Evaluator>,
}

impl XlsxTemplate {
    /// An empty template; load one with [`XlsxTemplate::read_template`].
    pub fn new() -> Self {
        Self {
            template: None,
            report: None,
            evaluator: Box::new(HandlebarsEvaluator::new()),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let mut template = Self::new();
        template.read_template(path)?;
        Ok(template)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let mut template = Self::new();
        template.read_template_bytes(bytes)?;
        Ok(template)
    }

    /// Use `evaluator` for scalar placeholders instead of the default Handlebars one.
    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Load (or replace) the template. Any previously rendered report is discarded.
    pub fn read_template(&mut self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let path = path.as_ref();
        let workbook = report_xlsx::read_workbook(path)?;
        log::debug!(
            "loaded template {} with {} sheets",
            path.display(),
            workbook.sheets.len()
        );
        self.set_template(workbook);
        Ok(())
    }

    pub fn read_template_bytes(&mut self, bytes: &[u8]) -> Result<(), TemplateError> {
        let workbook = report_xlsx::read_workbook_from_bytes(bytes)?;
        self.set_template(workbook);
        Ok(())
    }

    fn set_template(&mut self, workbook: Workbook) {
        self.template = Some(workbook);
        self.report = None;
    }

    pub fn template(&self) -> Option<&Workbook> {
        self.template.as_ref()
    }

    pub fn report(&self) -> Option<&Workbook> {
        self.report.as_ref()
    }

    pub fn render(&mut self, data: &Value) -> Result<(), TemplateError> {
        self.render_with_options(data, RenderOptions::default())
    }

    /// Render every template sheet.
    ///
    /// `data` is either one mapping used for every sheet, or a list whose element `i` is the
    /// context of sheet `i`; sheets past the end of the list (or whose element is not a
    /// mapping) render with an empty context. On error the previous report, if any, is kept.
    pub fn render_with_options(
        &mut self,
        data: &Value,
        options: RenderOptions,
    ) -> Result<(), TemplateError> {
        let template = self.template.as_ref().ok_or(TemplateError::NoTemplate)?;
        let renderer = SheetRenderer::new(self.evaluator.as_ref()).with_clone_options(CloneOptions {
            force_wrap_text: options.force_wrap_text,
        });

        let empty = Context::new();
        let mut report = Workbook::with_styles(template.styles.clone());
        for (idx, sheet) in template.sheets.iter().enumerate() {
            let context = sheet_context(data, idx).unwrap_or_else(|| {
                log::warn!("no context for sheet `{}`; rendering it with an empty one", sheet.name);
                &empty
            });

            let rows = renderer.render(&sheet.rows, context)?;
            log::debug!(
                "rendered sheet `{}`: {} template rows -> {} rows",
                sheet.name,
                sheet.rows.len(),
                rows.len()
            );

            let out = report.add_sheet(sheet.name.clone())?;
            out.rows = rows;
            out.columns = sheet.columns.clone();
        }

        self.report = Some(report);
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let report = self.report.as_ref().ok_or(TemplateError::NotYetRendered)?;
        report_xlsx::write_workbook(report, path)?;
        Ok(())
    }

    /// Write the report's XLSX bytes to `writer`.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), TemplateError> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TemplateError> {
        let report = self.report.as_ref().ok_or(TemplateError::NotYetRendered)?;
        Ok(report_xlsx::write_workbook_to_bytes(report)?)
    }
}

impl Default for XlsxTemplate {
    fn default() -> Self {
        Self::new()
    }
}

fn sheet_context(data: &Value, idx: usize) -> Option<&Context> {
    match data {
        Value::Map(context) => Some(context),
        Value::List(items) => items.get(idx)?.as_map(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sheet_context_selection() {
        let shared = Value::from(json!({"a": 1}));
        assert_eq!(sheet_context(&shared, 5).and_then(|c| c.get("a")), Some(&Value::Int(1)));

        let per_sheet = Value::from(json!([{"a": 1}, 2]));
        assert_eq!(sheet_context(&per_sheet, 0).and_then(|c| c.get("a")), Some(&Value::Int(1)));
        assert!(sheet_context(&per_sheet, 1).is_none());
        assert!(sheet_context(&per_sheet, 2).is_none());
        assert!(sheet_context(&Value::Null, 0).is_none());
    }

    #[test]
    fn render_options_deserialize_with_defaults() {
        let options: RenderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, RenderOptions::default());
        let options: RenderOptions = serde_json::from_str(r#"{"force_wrap_text": true}"#).unwrap();
        assert!(options.force_wrap_text);
    }

    #[test]
    fn rendering_and_saving_need_their_prerequisites() {
        let mut template = XlsxTemplate::new();
        assert!(matches!(
            template.render(&Value::Null),
            Err(TemplateError::NoTemplate)
        ));
        assert!(matches!(template.to_bytes(), Err(TemplateError::NotYetRendered)));
        assert!(matches!(
            template.write(Vec::new()),
            Err(TemplateError::NotYetRendered)
        ));
    }
}
