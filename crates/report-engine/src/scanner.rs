use report_model::Row;

use crate::directive;

/// Length of the block opened by `rows[0]`, counting both the opening and the closing row.
///
/// Nested `range` opens are matched by depth counting. Returns `None` when the block is
/// never closed.
pub fn block_len(rows: &[Row]) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, row) in rows.iter().enumerate().skip(1) {
        if row.cells.is_empty() {
            continue;
        }
        if directive::is_block_end(row) {
            if depth == 0 {
                return Some(idx + 1);
            }
            depth -= 1;
        } else if directive::block(row).is_some() {
            depth += 1;
        }
    }
    None
}
