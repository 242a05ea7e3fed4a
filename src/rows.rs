use crate::token::PositionedToken;

/// Default vertical tolerance for grouping tokens into a row, in the
/// decoder's page-relative units. Fine enough for header detection; the
/// history grid uses wider bands of its own.
pub const ROW_Y_TOLERANCE: f64 = 0.35;

/// One cell of a reconstructed row.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub x: f64,
    pub text: String,
}

/// A cluster of tokens sharing a vertical position within tolerance.
#[derive(Debug, Clone)]
pub struct Row {
    pub y: f64,
    pub cells: Vec<Cell>,
}

impl Row {
    /// Joined cell text with blanks collapsed, for label matching.
    pub fn text(&self) -> String {
        let joined = self
            .cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        crate::token::normalize_spaces(&joined)
    }
}

/// Cluster tokens into rows by Y proximity.
///
/// Each token joins the first existing row whose anchor Y lies within
/// `y_tolerance`, else starts a new row. O(n·r), fine at page token
/// counts. Rows come back Y-sorted with cells X-sorted; every token lands
/// in exactly one row.
pub fn group_rows(tokens: &[PositionedToken], y_tolerance: f64) -> Vec<Row> {
    let mut rows: Vec<Row> = Vec::new();

    for token in tokens {
        if token.text.trim().is_empty() {
            continue;
        }
        let idx = rows
            .iter()
            .position(|r| (r.y - token.y).abs() <= y_tolerance)
            .unwrap_or_else(|| {
                rows.push(Row { y: token.y, cells: Vec::new() });
                rows.len() - 1
            });
        rows[idx].cells.push(Cell { x: token.x, text: token.text.clone() });
    }

    rows.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal));
    for row in &mut rows {
        row.cells
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(text: &str, x: f64, y: f64) -> PositionedToken {
        PositionedToken { x, y, text: text.to_string() }
    }

    #[test]
    fn test_simple_grouping() {
        let tokens = vec![
            make_token("B", 5.0, 10.1),
            make_token("A", 1.0, 10.0),
            make_token("C", 1.0, 12.0),
        ];

        let rows = group_rows(&tokens, ROW_Y_TOLERANCE);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells.len(), 2);
        assert_eq!(rows[0].cells[0].text, "A"); // X-sorted within row
        assert_eq!(rows[0].cells[1].text, "B");
        assert_eq!(rows[1].cells[0].text, "C");
    }

    #[test]
    fn test_every_token_in_exactly_one_row() {
        let tokens: Vec<_> = (0..20)
            .map(|i| make_token("t", i as f64, (i as f64) * 0.2))
            .collect();

        let rows = group_rows(&tokens, ROW_Y_TOLERANCE);

        let total: usize = rows.iter().map(|r| r.cells.len()).sum();
        assert_eq!(total, tokens.len());
    }

    #[test]
    fn test_rows_sorted_by_y() {
        let tokens = vec![
            make_token("low", 0.0, 30.0),
            make_token("high", 0.0, 5.0),
            make_token("mid", 0.0, 15.0),
        ];

        let rows = group_rows(&tokens, ROW_Y_TOLERANCE);

        let ys: Vec<f64> = rows.iter().map(|r| r.y).collect();
        assert!(ys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_wide_tolerance_merges_bands() {
        let tokens = vec![make_token("a", 0.0, 10.0), make_token("b", 1.0, 10.8)];

        assert_eq!(group_rows(&tokens, ROW_Y_TOLERANCE).len(), 2);
        assert_eq!(group_rows(&tokens, 0.9).len(), 1);
    }

    #[test]
    fn test_blank_tokens_skipped() {
        let tokens = vec![make_token("  ", 0.0, 10.0), make_token("a", 1.0, 20.0)];

        let rows = group_rows(&tokens, ROW_Y_TOLERANCE);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_row_text_normalized() {
        let row = Row {
            y: 1.0,
            cells: vec![
                Cell { x: 0.0, text: "Total".into() },
                Cell { x: 2.0, text: " es: ".into() },
            ],
        };
        assert_eq!(row.text(), "Total es:");
    }
}
