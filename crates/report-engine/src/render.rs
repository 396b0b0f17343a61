use report_model::{CellValue, CloneOptions, Row};
use thiserror::Error;

use crate::context::{Context, Scope, UnresolvedProperty};
use crate::directive;
use crate::eval::{EvalError, Evaluator};
use crate::scanner;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("block `{{{{{name} {prop}}}}}` is never closed by `{{{{end}}}}`")]
    MalformedBlock { name: String, prop: String },
    #[error(transparent)]
    UnresolvedRangeProperty(#[from] UnresolvedProperty),
    #[error("failed to render `{text}`: {source}")]
    Substitution {
        text: String,
        #[source]
        source: EvalError,
    },
}

/// Expands the rows of one template sheet.
pub struct SheetRenderer<'e> {
    evaluator: &'e dyn Evaluator,
    clone_options: CloneOptions,
}

impl<'e> SheetRenderer<'e> {
    pub fn new(evaluator: &'e dyn Evaluator) -> Self {
        Self {
            evaluator,
            clone_options: CloneOptions::default(),
        }
    }

    pub fn with_clone_options(mut self, options: CloneOptions) -> Self {
        self.clone_options = options;
        self
    }

    pub fn render(&self, rows: &[Row], context: &Context) -> Result<Vec<Row>, RenderError> {
        let mut out = Vec::with_capacity(rows.len());
        self.render_scoped(rows, &Scope::root(context), &mut out)?;
        Ok(out)
    }

    /// Render `rows` against `scope`, appending the produced rows to `out`.
    pub fn render_scoped(
        &self,
        rows: &[Row],
        scope: &Scope<'_>,
        out: &mut Vec<Row>,
    ) -> Result<(), RenderError> {
        let mut cursor = 0;
        while cursor < rows.len() {
            let rest = &rows[cursor..];
            let row = &rest[0];

            if let Some(block) = directive::block(row) {
                let len = scanner::block_len(rest).ok_or_else(|| RenderError::MalformedBlock {
                    name: block.name.to_string(),
                    prop: block.prop.to_string(),
                })?;
                let body = &rest[1..len - 1];
                let elements = scope.element_contexts(block.prop)?;
                log::debug!(
                    "expanding `{} {}`: {} body rows x {} elements",
                    block.name,
                    block.prop,
                    body.len(),
                    elements.len()
                );
                for element in elements {
                    let inner = Scope::element(block.prop, element, scope);
                    self.render_scoped(body, &inner, out)?;
                }
                cursor += len;
                continue;
            }

            let items = directive::list_prop(row)
                .and_then(|prop| Some((prop, scope.get(prop)?.as_list()?)));
            match items {
                Some((prop, items)) => {
                    for item in items {
                        let bound = Scope::bind(prop, item, scope);
                        out.push(self.render_row(row, &bound)?);
                    }
                }
                None => out.push(self.render_row(row, scope)?),
            }
            cursor += 1;
        }
        Ok(())
    }

    fn render_row(&self, row: &Row, scope: &Scope<'_>) -> Result<Row, RenderError> {
        let mut rendered = row.clone_with(&self.clone_options);
        for cell in &mut rendered.cells {
            let CellValue::String(text) = &cell.value else {
                continue;
            };
            if !text.contains("{{") {
                continue;
            }
            let value = self
                .evaluator
                .evaluate(text, scope)
                .map_err(|source| RenderError::Substitution {
                    text: text.clone(),
                    source,
                })?;
            cell.value = CellValue::String(value);
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Value;
    use crate::eval::HandlebarsEvaluator;
    use pretty_assertions::assert_eq;
    use report_model::{Cell, CellStyle};
    use serde_json::json;

    fn rows(rows: &[&[&str]]) -> Vec<Row> {
        rows.iter().map(|r| Row::from_texts(r.iter().copied())).collect()
    }

    fn context(json: serde_json::Value) -> Context {
        Value::from(json).as_map().cloned().unwrap()
    }

    fn render(template: &[Row], data: serde_json::Value) -> Result<Vec<Vec<String>>, RenderError> {
        let evaluator = HandlebarsEvaluator::new();
        let out = SheetRenderer::new(&evaluator).render(template, &context(data))?;
        Ok(out.iter().map(Row::texts).collect())
    }

    #[test]
    fn range_block_inside_rebinds_the_property_to_the_element() {
        let template = rows(&[&["{{range groups}}"], &["{{groups.name}}", "{{name}}"], &["{{end}}"]]);
        let out = render(
            &template,
            json!({"groups": [{"name": "Work"}, {"name": "Home"}]}),
        )
        .unwrap();
        assert_eq!(out, vec![vec!["Work", "Work"], vec!["Home", "Home"]]);
    }

    #[test]
    fn array_driven_row_fans_out() {
        let template = rows(&[&["{{items.qty}}", "units"]]);
        let out = render(&template, json!({"items": [{"qty": 2}, {"qty": 5}]})).unwrap();
        assert_eq!(out, vec![vec!["2", "units"], vec!["5", "units"]]);
    }

    #[test]
    fn array_driven_row_sees_the_whole_sequence_again_afterwards() {
        let template = rows(&[
            &["{{items.name}}", "{{title}}"],
            &["{{#each items}}{{name}};{{/each}}"],
        ]);
        let out = render(
            &template,
            json!({"title": "T", "items": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}),
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                vec!["a", "T"],
                vec!["b", "T"],
                vec!["c", "T"],
                vec!["a;b;c;"]
            ]
        );
    }

    #[test]
    fn only_the_first_list_reference_drives_the_row() {
        let template = rows(&[&["{{items.qty}}", "{{tags.name}}", "{{tags.0.name}}"]]);
        let out = render(
            &template,
            json!({"items": [{"qty": 2}, {"qty": 5}], "tags": [{"name": "x"}]}),
        )
        .unwrap();
        assert_eq!(out, vec![vec!["2", "", "x"], vec!["5", "", "x"]]);
    }

    #[test]
    fn range_property_is_the_current_element_inside_the_block() {
        let template = rows(&[
            &["{{range groups}}"],
            &["{{#each groups}}{{@key}}={{this}};{{/each}}"],
            &["{{end}}"],
        ]);
        let data = json!({"groups": [{"name": "Work"}, {"name": "Home"}]});
        assert_eq!(
            render(&template, data.clone()).unwrap(),
            vec![vec!["name=Work;"], vec!["name=Home;"]]
        );

        let nested = rows(&[
            &["{{range groups}}"],
            &["{{range groups}}"],
            &["{{name}}"],
            &["{{end}}"],
            &["{{end}}"],
        ]);
        let err = render(&nested, data).unwrap_err();
        assert!(
            matches!(&err, RenderError::UnresolvedRangeProperty(p) if p.property == "groups"),
            "{err:?}"
        );
    }

    #[test]
    fn large_sibling_lists_do_not_slow_rows_down() {
        let n = 5_000;
        let orders: Vec<_> = (0..n).map(|id| json!({"id": id})).collect();
        let catalog: Vec<_> = (0..n).map(|sku| json!({"sku": sku, "name": "item"})).collect();
        let template = rows(&[&["{{range orders}}"], &["/{{id}}/"], &["{{end}}"]]);

        let out = render(&template, json!({"orders": orders, "catalog": catalog})).unwrap();
        assert_eq!(out.len(), n);
        assert_eq!(out[n - 1], vec![format!("/{}/", n - 1)]);
    }

    #[test]
    fn non_list_driving_property_renders_once() {
        let template = rows(&[&["{{customer.name}}"]]);
        let out = render(&template, json!({"customer": {"name": "Ann"}})).unwrap();
        assert_eq!(out, vec![vec!["Ann"]]);

        let out = render(&template, json!({})).unwrap();
        assert_eq!(out, vec![vec![""]]);
    }

    #[test]
    fn block_scoping_shadows_without_leaking() {
        let template = rows(&[
            &["{{range rows}}"],
            &["{{x}}-{{y}}"],
            &["{{end}}"],
            &["{{x}}"],
        ]);
        let out = render(&template, json!({"x": 1, "y": 2, "rows": [{"x": 3}]})).unwrap();
        assert_eq!(out, vec![vec!["3-2"], vec!["1"]]);
    }

    #[test]
    fn nested_blocks_expand_in_order() {
        let template = rows(&[
            &["header"],
            &["{{range orders}}"],
            &["Order {{id}}"],
            &["{{range lines}}"],
            &["", "{{sku}}", "{{id}}"],
            &["{{end}}"],
            &["{{end}}"],
            &["footer"],
        ]);
        let out = render(
            &template,
            json!({"orders": [
                {"id": 1, "lines": [{"sku": "A"}, {"sku": "B"}]},
                {"id": 2, "lines": []},
                {"id": 3, "lines": [{"sku": "C", "id": 30}]}
            ]}),
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                vec!["header"],
                vec!["Order 1"],
                vec!["", "A", "1"],
                vec!["", "B", "1"],
                vec!["Order 2"],
                vec!["Order 3"],
                vec!["", "C", "30"],
                vec!["footer"],
            ]
        );
    }

    #[test]
    fn unclosed_outer_block_is_named() {
        let template = rows(&[&["{{range a}}"], &["{{range b}}"], &["x"], &["{{end}}"]]);
        let err = render(&template, json!({"a": [{}], "b": [{}]})).unwrap_err();
        match err {
            RenderError::MalformedBlock { name, prop } => {
                assert_eq!((name.as_str(), prop.as_str()), ("range", "a"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            render(&rows(&[&["{{range a}}"]]), json!({"a": []}))
                .unwrap_err()
                .to_string(),
            "block `{{range a}}` is never closed by `{{end}}`"
        );
    }

    #[test]
    fn range_over_anything_but_a_list_of_mappings_fails() {
        let template = rows(&[&["{{range p}}"], &["x"], &["{{end}}"]]);
        for data in [
            json!({"p": 1}),
            json!({"p": "text"}),
            json!({"p": [1, 2]}),
            json!({"p": {"a": 1}}),
            json!({}),
        ] {
            let err = render(&template, data.clone()).unwrap_err();
            assert!(
                matches!(&err, RenderError::UnresolvedRangeProperty(p) if p.property == "p"),
                "{data}: {err:?}"
            );
        }
        assert_eq!(render(&template, json!({"p": []})).unwrap(), Vec::<Vec<String>>::new());
    }

    #[test]
    fn substitution_failures_abort() {
        let template = rows(&[&["ok"], &["{{#if}}"]]);
        let err = render(&template, json!({})).unwrap_err();
        assert!(
            matches!(&err, RenderError::Substitution { text, .. } if text == "{{#if}}"),
            "{err:?}"
        );
    }

    #[test]
    fn cells_without_placeholders_skip_the_evaluator() {
        let failing = |_: &str, _: &Scope<'_>| -> Result<String, EvalError> {
            Err(EvalError::Message("evaluator called".to_string()))
        };
        let mut number = Cell::new(4.0);
        number.style = CellStyle::new(2);
        let template = vec![Row::new(vec![Cell::new("plain"), number.clone()])];

        let out = SheetRenderer::new(&failing)
            .render(&template, &Context::new())
            .unwrap();
        assert_eq!(out[0].cells[0].value, CellValue::from("plain"));
        assert_eq!(out[0].cells[1], number);
    }

    #[test]
    fn forced_wrap_applies_to_every_rendered_cell() {
        let evaluator = HandlebarsEvaluator::new();
        let mut template = rows(&[&["{{items.name}}", "static"]]);
        template[0].height = Some(28.5);

        let out = SheetRenderer::new(&evaluator)
            .with_clone_options(CloneOptions {
                force_wrap_text: true,
            })
            .render(&template, &context(json!({"items": [{"name": "a"}, {"name": "b"}]})))
            .unwrap();

        assert_eq!(out.len(), 2);
        for row in &out {
            assert_eq!(row.height, Some(28.5));
            assert!(row.cells.iter().all(|c| c.style.wrap_text));
        }
        assert!(!template[0].cells[0].style.wrap_text);
    }
}
