//! XLSX report templating.
//!
//! A template is an ordinary workbook whose cells carry placeholders:
//!
//! * `{{expr}}` is substituted by the scalar [`Evaluator`] (Handlebars by default);
//! * a row whose first cell is `{{range prop}}` opens a block, closed by a row whose first cell
//!   is `{{end}}`; the rows in between are rendered once per element of the list `prop`, with
//!   the element's fields shadowing the enclosing context;
//! * a row containing `{{prop.field}}` where `prop` is a list is rendered once per element,
//!   with `prop` bound to that element.
//!
//! [`XlsxTemplate`] loads templates, renders them against a [`Value`] and writes the report.

pub mod context;
pub mod directive;
pub mod eval;
pub mod render;
pub mod scanner;
pub mod template;

pub use context::{Context, Scope, UnresolvedProperty, Value};
pub use eval::{EvalError, Evaluator, HandlebarsEvaluator};
pub use render::{RenderError, SheetRenderer};
pub use template::{RenderOptions, TemplateError, XlsxTemplate};
