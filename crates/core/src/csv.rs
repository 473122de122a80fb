//! Maps the CSV export of a sheet into word pairs.
//!
//! The dialect is the one spreadsheet exports produce: rows end in `\r\n`,
//! cells are comma separated, and a cell containing a comma is wrapped in
//! double quotes. Formula errors are exported as the literal `#VALUE!`.

use crate::model::WordPair;

const ROW_SEPARATOR: &str = "\r\n";
const FORMULA_ERROR: &str = "#VALUE!";

/// Parse raw CSV text into word pairs, keeping row order.
///
/// Only the first two cells of a row are used. A row is dropped when both of
/// them are blank or hold the formula error marker.
#[must_use]
pub fn parse_word_pairs(raw: &str) -> Vec<WordPair> {
    raw.split(ROW_SEPARATOR)
        .filter_map(|row| {
            let mut cells = split_cells(row).into_iter().map(unquote);
            let original = cells.next().unwrap_or_default();
            let translated = cells.next().unwrap_or_default();
            if is_void(&original) && is_void(&translated) {
                None
            } else {
                Some(WordPair::new(original, translated))
            }
        })
        .collect()
}

/// Split on commas that are not inside a quoted span.
fn split_cells(row: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (idx, ch) in row.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(&row[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    cells.push(&row[start..]);
    cells
}

/// Strip one layer of surrounding double quotes.
fn unquote(cell: &str) -> String {
    cell.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(cell)
        .to_owned()
}

fn is_void(cell: &str) -> bool {
    cell.trim().is_empty() || cell == FORMULA_ERROR
}
