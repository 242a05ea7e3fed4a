use std::sync::LazyLock;

use regex::Regex;

use crate::extract::header::{ColumnKey, HeaderCalibration};
use crate::numeric::parse_number_loose;
use crate::rows::Row;

pub static TOTALS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(Total(?:es)?)\s*:?").unwrap());

/// One data row of the totals table mapped onto the eight columns.
#[derive(Debug, Clone, Default)]
pub struct RowAssignment {
    pub original: Option<f64>,
    pub vigente: Option<f64>,
    /// Bucket values in [`ColumnKey::BUCKETS`] order.
    pub buckets: [f64; 6],
    /// The row carries a literal "Total(es):" label.
    pub has_totals_marker: bool,
}

/// Assign a row's numeric cells to the calibrated columns.
///
/// Each parseable cell goes to the nearest column center within the
/// calibration tolerance; anything further out is stray print (footnotes,
/// page totals) and is dropped. Original/Vigente keep the
/// maximum-magnitude candidate so a stray zero cannot overwrite the real
/// figure; buckets sum their candidates so a value split across fragments
/// still adds up.
///
/// When proximity fails, ordinal fallbacks assume the eight values appear
/// in printed order: Original/Vigente take the 1st/2nd numeric token and a
/// zero-valued bucket takes the token at its printed position.
pub fn assign_row(row: &Row, header: &HeaderCalibration) -> RowAssignment {
    let mut by_column: [Vec<f64>; 8] = Default::default();
    let mut numeric_by_x: Vec<(f64, f64)> = Vec::new();

    let has_totals_marker = row.cells.iter().any(|c| TOTALS_MARKER.is_match(&c.text));

    for cell in &row.cells {
        let Some(n) = parse_number_loose(&cell.text) else {
            continue;
        };
        numeric_by_x.push((cell.x, n));

        let nearest = header
            .centers
            .iter()
            .enumerate()
            .map(|(i, &x)| (i, (cell.x - x).abs()))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((idx, dist)) = nearest {
            if dist <= header.max_distance {
                by_column[idx].push(n);
            }
        }
    }

    let max_magnitude = |values: &[f64]| -> Option<f64> {
        values
            .iter()
            .copied()
            .max_by(|a, b| {
                a.abs().partial_cmp(&b.abs()).unwrap_or(std::cmp::Ordering::Equal)
            })
    };

    let mut original = max_magnitude(&by_column[ColumnKey::Original.ordinal()]);
    let mut vigente = max_magnitude(&by_column[ColumnKey::Vigente.ordinal()]);
    let mut buckets = [0.0; 6];
    for (slot, key) in buckets.iter_mut().zip(ColumnKey::BUCKETS) {
        *slot = by_column[key.ordinal()].iter().sum();
    }

    numeric_by_x.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let ordered: Vec<f64> = numeric_by_x.into_iter().map(|(_, n)| n).collect();

    if ordered.len() >= 2 {
        if original.is_none() || original == Some(0.0) {
            original = Some(ordered[0]);
        }
        if vigente.is_none() || vigente == Some(0.0) {
            vigente = Some(ordered[1]);
        }
    }
    for (pos, slot) in buckets.iter_mut().enumerate() {
        if *slot == 0.0 {
            if let Some(&v) = ordered.get(pos + 2) {
                *slot = v;
            }
        }
    }

    RowAssignment { original, vigente, buckets, has_totals_marker }
}
