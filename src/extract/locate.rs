use std::sync::LazyLock;

use regex::Regex;

use crate::rows::{group_rows, Row, ROW_Y_TOLERANCE};
use crate::token::Page;

static ACTIVOS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Cr[ée]ditos Activos").unwrap());
static ORIGINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)original").unwrap());
static VIGENTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)vigente").unwrap());

/// The page carrying the active-credits totals table, with its rows
/// already grouped.
#[derive(Debug)]
pub struct LocatedTable {
    pub page_index: usize,
    pub rows: Vec<Row>,
}

/// Scan pages in order for the active-credits section.
///
/// A page qualifies on an explicit "Créditos Activos" label, or on the
/// co-occurrence of the Original and Vigente column labels. `None` means
/// the section is absent from the document, which callers treat as a
/// legitimate result.
pub fn find_totals_page(pages: &[Page]) -> Option<LocatedTable> {
    for (page_index, page) in pages.iter().enumerate() {
        let rows = group_rows(&page.tokens, ROW_Y_TOLERANCE);
        let joined = rows.iter().map(Row::text).collect::<Vec<_>>().join("\n");

        if ACTIVOS_RE.is_match(&joined)
            || (ORIGINAL_RE.is_match(&joined) && VIGENTE_RE.is_match(&joined))
        {
            log::debug!("active-credits section found on page {page_index}");
            return Some(LocatedTable { page_index, rows });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::PositionedToken;

    fn page_with(texts: &[(&str, f64, f64)]) -> Page {
        Page {
            tokens: texts
                .iter()
                .map(|(t, x, y)| PositionedToken { x: *x, y: *y, text: (*t).to_string() })
                .collect(),
        }
    }

    #[test]
    fn test_finds_page_by_section_label() {
        let pages = vec![
            page_with(&[("Datos del cliente", 1.0, 1.0)]),
            page_with(&[("Créditos Activos", 1.0, 1.0)]),
        ];

        let hit = find_totals_page(&pages).expect("located");
        assert_eq!(hit.page_index, 1);
    }

    #[test]
    fn test_finds_page_by_column_labels() {
        let pages = vec![page_with(&[
            ("Monto Original", 1.0, 1.0),
            ("Saldo Vigente", 8.0, 1.0),
        ])];

        assert_eq!(find_totals_page(&pages).unwrap().page_index, 0);
    }

    #[test]
    fn test_absent_section_is_none() {
        let pages = vec![page_with(&[("Historial", 1.0, 1.0)])];
        assert!(find_totals_page(&pages).is_none());
    }
}
