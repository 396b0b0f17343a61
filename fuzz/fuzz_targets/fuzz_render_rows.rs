#![no_main]

use libfuzzer_sys::fuzz_target;
use report_engine::{HandlebarsEvaluator, SheetRenderer, Value};
use report_model::Row;

const MAX_ROWS: usize = 256;

fuzz_target!(|data: &[u8]| {
    // Each line is a row; `|` separates cells.
    let input = String::from_utf8_lossy(data);
    let rows: Vec<Row> = input
        .lines()
        .take(MAX_ROWS)
        .map(|line| Row::from_texts(line.split('|')))
        .collect();

    let context = Value::from(serde_json::json!({
        "name": "fuzz",
        "items": [{"name": "a", "qty": 1}, {"name": "b", "qty": 2}],
        "groups": [{"name": "g", "items": [{"name": "c"}]}],
        "scalar": 3
    }));
    let Some(context) = context.as_map() else {
        return;
    };

    // Errors are fine; panics and hangs are not.
    let evaluator = HandlebarsEvaluator::new();
    let _ = SheetRenderer::new(&evaluator).render(&rows, context);
});
