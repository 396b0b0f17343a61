//! Scalar placeholder substitution.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use handlebars::Handlebars;
use regex::Regex;
use thiserror::Error;

use crate::context::{Scope, Value};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Template(#[from] handlebars::RenderError),
    #[error(transparent)]
    Compile(#[from] handlebars::TemplateError),
    #[error("{0}")]
    Message(String),
}

/// Renders the `{{...}}` placeholders of one cell against the visible variables.
pub trait Evaluator {
    fn evaluate(&self, text: &str, scope: &Scope<'_>) -> Result<String, EvalError>;
}

impl<F> Evaluator for F
where
    F: Fn(&str, &Scope<'_>) -> Result<String, EvalError>,
{
    fn evaluate(&self, text: &str, scope: &Scope<'_>) -> Result<String, EvalError> {
        self(text, scope)
    }
}

/// Names that handlebars gives a meaning of its own inside `{{...}}`.
const KEYWORDS: &[&str] = &["this", "else", "true", "false", "null"];

fn mustache_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid regex"))
}

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][\w-]*(?:\.[\w-]+)*)\s*$").expect("valid regex")
    })
}

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][\w-]*").expect("valid regex"))
}

enum Piece {
    Text(String),
    Path(String),
}

/// A cell's text, prepared once and reused for every row it renders into.
enum CellTemplate {
    /// Literal text and plain `{{path}}` placeholders, resolved straight from the scope.
    Paths(Vec<Piece>),
    /// Registered with handlebars under the cell text. `roots` holds every identifier the
    /// template mentions; only those variables are handed to the renderer.
    Handlebars { roots: Vec<String> },
}

/// Handlebars-backed evaluator.
///
/// Output is not HTML-escaped and missing values render as empty text. Cells made only of
/// plain placeholders (`{{customer.name}}`, `{{items.0.sku}}`) are resolved directly against
/// the scope, where a field lookup on a list or scalar is simply missing. Cells using helpers
/// (`{{#if}}`, `{{#each}}`, registered helpers) are compiled once and rendered by handlebars.
pub struct HandlebarsEvaluator {
    registry: RefCell<Handlebars<'static>>,
    cells: RefCell<HashMap<String, CellTemplate>>,
}

impl HandlebarsEvaluator {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(false);
        Self {
            registry: RefCell::new(registry),
            cells: RefCell::new(HashMap::new()),
        }
    }

    /// Access to the underlying registry, e.g. to register helpers.
    pub fn registry_mut(&mut self) -> &mut Handlebars<'static> {
        // A new helper can turn a plain placeholder into a helper call.
        self.cells.get_mut().clear();
        self.registry.get_mut()
    }

    fn compile(&self, text: &str) -> Result<CellTemplate, EvalError> {
        if let Some(pieces) = self.plain_pieces(text) {
            return Ok(CellTemplate::Paths(pieces));
        }

        self.registry
            .borrow_mut()
            .register_template_string(text, text)?;
        let mut roots: Vec<String> = Vec::new();
        for caps in mustache_re().captures_iter(text) {
            for ident in ident_re().find_iter(&caps[1]) {
                if !roots.iter().any(|root| root == ident.as_str()) {
                    roots.push(ident.as_str().to_string());
                }
            }
        }
        Ok(CellTemplate::Handlebars { roots })
    }

    /// `text` split into literal runs and plain placeholders, or `None` when it needs
    /// handlebars.
    fn plain_pieces(&self, text: &str) -> Option<Vec<Piece>> {
        if text.contains("{{{") || text.contains("\\{{") {
            return None;
        }

        let registry = self.registry.borrow();
        let mut pieces = Vec::new();
        let mut last = 0;
        for caps in mustache_re().captures_iter(text) {
            let whole = caps.get(0)?;
            let path = path_re().captures(&caps[1])?.get(1)?.as_str();
            let head = path.split('.').next().unwrap_or(path);
            if KEYWORDS.contains(&head) || registry.get_helper(head).is_some() {
                return None;
            }
            if whole.start() > last {
                pieces.push(Piece::Text(text[last..whole.start()].to_string()));
            }
            pieces.push(Piece::Path(path.to_string()));
            last = whole.end();
        }
        if last < text.len() {
            pieces.push(Piece::Text(text[last..].to_string()));
        }

        // An unterminated `{{` is for handlebars to report.
        let unterminated = pieces
            .iter()
            .any(|piece| matches!(piece, Piece::Text(t) if t.contains("{{")));
        (!unterminated).then_some(pieces)
    }
}

impl Default for HandlebarsEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for HandlebarsEvaluator {
    fn evaluate(&self, text: &str, scope: &Scope<'_>) -> Result<String, EvalError> {
        if !self.cells.borrow().contains_key(text) {
            let compiled = self.compile(text)?;
            self.cells.borrow_mut().insert(text.to_string(), compiled);
        }

        let cells = self.cells.borrow();
        match &cells[text] {
            CellTemplate::Paths(pieces) => {
                let mut out = String::new();
                for piece in pieces {
                    match piece {
                        Piece::Text(literal) => out.push_str(literal),
                        Piece::Path(path) => {
                            if let Some(value) = scope.lookup(path) {
                                push_scalar(&mut out, value);
                            }
                        }
                    }
                }
                Ok(out)
            }
            CellTemplate::Handlebars { roots } => {
                let vars: BTreeMap<&str, &Value> = roots
                    .iter()
                    .filter_map(|root| Some((root.as_str(), scope.get(root)?)))
                    .collect();
                let context = handlebars::Context::wraps(&vars)?;
                Ok(self.registry.borrow().render_with_context(text, &context)?)
            }
        }
    }
}

/// Lists and mappings have no text of their own and render empty.
fn push_scalar(out: &mut String, value: &Value) {
    match value {
        Value::Null | Value::List(_) | Value::Map(_) => {}
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) => out.push_str(&f.to_string()),
        Value::String(s) => out.push_str(s),
    }
}
