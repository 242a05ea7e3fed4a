use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ExtractError, Result};
use crate::extract::assign::{assign_row, TOTALS_MARKER};
use crate::extract::header::{bucket_pattern, find_header, ColumnKey};
use crate::extract::locate::find_totals_page;
use crate::numeric::{numeric_runs, parse_number};
use crate::token::Page;

/// Rows past these sentinels belong to the next report section.
static TABLE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Resumen Cr[ée]ditos Activos|Cr[ée]ditos Liquidados|INFORMACI[ÓO]N COMERCIAL")
        .unwrap()
});

static ORIGINAL_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\boriginal\b").unwrap());
static VIGENTE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvigente\b").unwrap());

/// How many following lines may hold a label's detached value.
const LABEL_LOOKAHEAD: usize = 3;

/// Unscaled totals as read from the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTotals {
    pub original: Option<f64>,
    pub vigente: Option<f64>,
    /// In [`ColumnKey::BUCKETS`] order.
    pub buckets: [f64; 6],
}

/// Which tier of the fallback chain produced the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsSource {
    Coordinates,
    TotalsLine,
    LabelSearch,
}

impl TotalsSource {
    pub fn label(self) -> &'static str {
        match self {
            TotalsSource::Coordinates => "coordinates",
            TotalsSource::TotalsLine => "bridova text mode",
            TotalsSource::LabelSearch => "label fallback",
        }
    }
}

#[derive(Debug)]
pub struct TotalsExtraction {
    pub totals: RawTotals,
    pub source: TotalsSource,
}

/// Run the cascading totals chain: coordinate reconstruction, then the
/// text-mode totals line, then the per-label search.
///
/// The last tier is skipped in totals-only mode; failing the first two
/// tiers there is a contract violation surfaced as
/// [`ExtractError::TotalsNotFound`].
pub fn extract_totals(
    pages: &[Page],
    all_text: &str,
    only_totals: bool,
) -> Result<TotalsExtraction> {
    let strategies: [(TotalsSource, Box<dyn Fn() -> Option<RawTotals> + '_>); 2] = [
        (TotalsSource::Coordinates, Box::new(|| by_coordinates(pages))),
        (TotalsSource::TotalsLine, Box::new(|| by_totals_line(all_text))),
    ];

    for (source, strategy) in strategies {
        if let Some(totals) = strategy() {
            log::info!("totals resolved via {}", source.label());
            return Ok(TotalsExtraction { totals, source });
        }
    }

    if only_totals {
        return Err(ExtractError::TotalsNotFound);
    }

    log::warn!("totals row not found, falling back to label search");
    Ok(TotalsExtraction {
        totals: by_labels(all_text),
        source: TotalsSource::LabelSearch,
    })
}

/// Tier 1: geometric reconstruction of the totals table.
///
/// Locates the section page, calibrates the header, then walks the data
/// rows until the section ends, returning the first row carrying a
/// literal totals marker.
pub fn by_coordinates(pages: &[Page]) -> Option<RawTotals> {
    let located = find_totals_page(pages)?;
    let header = find_header(&located.rows)?;

    for row in &located.rows[header.row_index + 1..] {
        let line = row.text();
        if TABLE_END.is_match(&line) {
            break;
        }
        let mapped = assign_row(row, &header);
        if mapped.has_totals_marker {
            return Some(RawTotals {
                original: mapped.original,
                vigente: mapped.vigente,
                buckets: mapped.buckets,
            });
        }
    }
    None
}

/// Tier 2: positional parse of the text around a "Total(es):" line.
///
/// Some vintages print the totals as one fragmented text line with no
/// recoverable header geometry. For each marker line and its immediate
/// neighbors (including pairwise concatenations), the last eight integer
/// runs map positionally to original, vigente and the six buckets,
/// left-padded with zeros when fewer survive.
pub fn by_totals_line(all_text: &str) -> Option<RawTotals> {
    let lines: Vec<&str> = all_text
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for (i, line) in lines.iter().enumerate() {
        if !TOTALS_MARKER.is_match(line) {
            continue;
        }

        let prev = i.checked_sub(1).map(|p| lines[p]).unwrap_or("");
        let next = lines.get(i + 1).copied().unwrap_or("");
        let candidates = [
            (*line).to_string(),
            prev.to_string(),
            next.to_string(),
            format!("{prev} {line}").trim().to_string(),
            format!("{line} {next}").trim().to_string(),
        ];

        for candidate in &candidates {
            if let Some(totals) = parse_totals_line(candidate) {
                return Some(totals);
            }
        }
    }
    None
}

/// Parse the integer runs of a candidate totals line.
fn parse_totals_line(line: &str) -> Option<RawTotals> {
    let mut values: Vec<i64> = Vec::new();
    for run in numeric_runs(line) {
        let cleaned: String =
            run.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
        if cleaned.is_empty() {
            values.push(0);
        } else if let Ok(n) = cleaned.parse::<i64>() {
            values.push(n);
        }
    }
    if values.len() < 2 {
        return None;
    }

    let tail = &values[values.len().saturating_sub(8)..];
    let mut take = vec![0i64; 8 - tail.len()];
    take.extend_from_slice(tail);

    let mut buckets = [0.0; 6];
    for (slot, v) in buckets.iter_mut().zip(&take[2..]) {
        *slot = *v as f64;
    }
    Some(RawTotals {
        original: Some(take[0] as f64),
        vigente: Some(take[1] as f64),
        buckets,
    })
}

/// Tier 3: independent label search over plain text.
///
/// Original and Vigente are each looked up by label (scanning a few lines
/// below for a detached value); every bucket label occurrence contributes
/// its line's last number, summed across the document.
pub fn by_labels(all_text: &str) -> RawTotals {
    let lines: Vec<&str> = all_text
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let bucket_res: Vec<Regex> = ColumnKey::BUCKETS
        .iter()
        .map(|k| Regex::new(bucket_pattern(*k)).unwrap())
        .collect();

    let mut buckets = [0.0; 6];
    for line in &lines {
        for (slot, re) in buckets.iter_mut().zip(&bucket_res) {
            if re.is_match(line) {
                if let Some(v) = last_number(line) {
                    *slot += v;
                }
            }
        }
    }

    RawTotals {
        original: single_labeled(&lines, &ORIGINAL_LABEL),
        vigente: single_labeled(&lines, &VIGENTE_LABEL),
        buckets,
    }
}

fn last_number(line: &str) -> Option<f64> {
    numeric_runs(line).iter().filter_map(|r| parse_number(r)).last()
}

fn single_labeled(lines: &[&str], label: &Regex) -> Option<f64> {
    for (i, line) in lines.iter().enumerate() {
        if !label.is_match(line) {
            continue;
        }
        if let Some(v) = last_number(line) {
            return Some(v);
        }
        for following in lines.iter().skip(i + 1).take(LABEL_LOOKAHEAD) {
            if let Some(v) = last_number(following) {
                return Some(v);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::PositionedToken;

    fn make_token(text: &str, x: f64, y: f64) -> PositionedToken {
        PositionedToken { x, y, text: text.to_string() }
    }

    fn totals_table_page() -> Page {
        let mut tokens = vec![
            make_token("Créditos Activos", 2.0, 2.0),
            make_token("Original", 10.0, 5.0),
            make_token("Vigente", 16.0, 5.0),
            make_token("1-29 días", 22.0, 5.0),
            make_token("30-59 días", 28.0, 5.0),
            make_token("60-89 días", 34.0, 5.0),
            make_token("90-119 días", 40.0, 5.0),
            make_token("120-179 días", 46.0, 5.0),
            make_token("180+", 52.0, 5.0),
        ];
        // One credit line, then the totals row.
        tokens.extend([
            make_token("Hipoteca", 2.0, 7.0),
            make_token("60,000", 10.0, 7.0),
            make_token("55,000", 16.0, 7.0),
            make_token("Totales:", 2.0, 9.0),
            make_token("100,000", 10.0, 9.0),
            make_token("90,000", 16.0, 9.0),
            make_token("1,000", 22.0, 9.0),
            make_token("2,000", 28.0, 9.0),
            make_token("0", 34.0, 9.0),
            make_token("0", 40.0, 9.0),
            make_token("0", 46.0, 9.0),
            make_token("500", 52.0, 9.0),
        ]);
        Page { tokens }
    }

    #[test]
    fn test_by_coordinates_reads_totals_row() {
        let totals = by_coordinates(&[totals_table_page()]).expect("totals");
        assert_eq!(totals.original, Some(100000.0));
        assert_eq!(totals.vigente, Some(90000.0));
        assert_eq!(totals.buckets, [1000.0, 2000.0, 0.0, 0.0, 0.0, 500.0]);
    }

    #[test]
    fn test_by_totals_line() {
        let text = "Resumen\nTotales: 100,000 90,000 1,000 2,000 0 0 0 500\nOtra línea";
        let totals = by_totals_line(text).expect("totals");
        assert_eq!(totals.original, Some(100000.0));
        assert_eq!(totals.vigente, Some(90000.0));
        assert_eq!(totals.buckets, [1000.0, 2000.0, 0.0, 0.0, 0.0, 500.0]);
    }

    #[test]
    fn test_by_totals_line_pads_short_rows() {
        let text = "Totales: 100 90";
        let totals = by_totals_line(text).expect("totals");
        // Two numbers right-align onto the eight columns.
        assert_eq!(totals.original, Some(0.0));
        assert_eq!(totals.buckets[4], 100.0);
        assert_eq!(totals.buckets[5], 90.0);
    }

    #[test]
    fn test_by_totals_line_checks_neighbor_lines() {
        let text = "Totales:\n100 90 1 2 3 4 5 6";
        let totals = by_totals_line(text).expect("totals");
        assert_eq!(totals.original, Some(100.0));
        assert_eq!(totals.buckets[5], 6.0);
    }

    #[test]
    fn test_by_labels() {
        let text = "Monto Original $5,000\nSaldo Vigente\nnota\n$4,000\n1-29 días 250\n1-29 días 50";
        let totals = by_labels(text);
        assert_eq!(totals.original, Some(5000.0));
        assert_eq!(totals.vigente, Some(4000.0));
        assert_eq!(totals.buckets[0], 300.0); // summed across occurrences
    }

    #[test]
    fn test_chain_prefers_text_mode_over_labels() {
        // No coordinate header anywhere, but a parsable totals line: the
        // chain must stop at text mode.
        let text = "Totales: 100 90 1 2 3 4 5 6";
        let out = extract_totals(&[], text, false).unwrap();
        assert_eq!(out.source, TotalsSource::TotalsLine);
        assert_eq!(out.source.label(), "bridova text mode");
    }

    #[test]
    fn test_only_totals_contract() {
        let err = extract_totals(&[], "sin tabla", true).unwrap_err();
        assert!(matches!(err, ExtractError::TotalsNotFound));

        let ok = extract_totals(&[], "sin tabla", false).unwrap();
        assert_eq!(ok.source, TotalsSource::LabelSearch);
    }
}
