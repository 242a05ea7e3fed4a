use std::sync::LazyLock;

use regex::Regex;

use crate::extract::calibrate::median;
use crate::rows::{Cell, Row};

/// The eight columns of the active-credits totals table, in the fixed
/// left-to-right order they are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Original,
    Vigente,
    V1_29,
    V30_59,
    V60_89,
    V90_119,
    V120_179,
    V180Plus,
}

impl ColumnKey {
    pub const ALL: [ColumnKey; 8] = [
        ColumnKey::Original,
        ColumnKey::Vigente,
        ColumnKey::V1_29,
        ColumnKey::V30_59,
        ColumnKey::V60_89,
        ColumnKey::V90_119,
        ColumnKey::V120_179,
        ColumnKey::V180Plus,
    ];

    /// The six aging buckets, left to right.
    pub const BUCKETS: [ColumnKey; 6] = [
        ColumnKey::V1_29,
        ColumnKey::V30_59,
        ColumnKey::V60_89,
        ColumnKey::V90_119,
        ColumnKey::V120_179,
        ColumnKey::V180Plus,
    ];

    /// Printed position of the column, 0-based from the left.
    pub fn ordinal(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap()
    }
}

/// Declaration of an expected column: key plus the label pattern that
/// identifies it in the header. The table is data, not branching, so new
/// report vintages only need new entries.
pub struct ColumnSpec {
    pub key: ColumnKey,
    pub label: Regex,
}

/// Day-range bucket label patterns, shared with the text-mode fallback.
pub fn bucket_pattern(key: ColumnKey) -> &'static str {
    match key {
        ColumnKey::V1_29 => r"(?i)(1\s*[–-]\s*29|1\s*a\s*29)\s*d[ií]as?",
        ColumnKey::V30_59 => r"(?i)(30\s*[–-]\s*59|30\s*a\s*59)\s*d[ií]as?",
        ColumnKey::V60_89 => r"(?i)(60\s*[–-]\s*89|60\s*a\s*89)\s*d[ií]as?",
        ColumnKey::V90_119 => r"(?i)(90\s*[–-]\s*119|90\s*a\s*119)\s*d[ií]as?",
        ColumnKey::V120_179 => r"(?i)(120\s*[–-]\s*179|120\s*a\s*179)\s*d[ií]as?",
        ColumnKey::V180Plus => r"(?i)(180\+|180\s*\+|180\s*y\s*m[aá]s|180\s*o\s+m[aá]s)",
        _ => unreachable!("not a bucket column"),
    }
}

static HEADER_COLUMNS: LazyLock<Vec<ColumnSpec>> = LazyLock::new(|| {
    let mut specs = vec![
        ColumnSpec {
            key: ColumnKey::Original,
            label: Regex::new(r"(?i)\boriginal\b").unwrap(),
        },
        ColumnSpec {
            key: ColumnKey::Vigente,
            label: Regex::new(r"(?i)\bvigente\b").unwrap(),
        },
    ];
    for key in ColumnKey::BUCKETS {
        specs.push(ColumnSpec { key, label: Regex::new(bucket_pattern(key)).unwrap() });
    }
    specs
});

static ORIGINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)original").unwrap());
static VIGENTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)vigente").unwrap());
static DIAS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)d[ií]as").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Y deltas within which the next one or two physical rows are merged
/// into the header (bucket labels often wrap onto a second line).
const HEADER_MERGE_NEXT: f64 = 1.8;
const HEADER_MERGE_SECOND: f64 = 2.6;

/// Fallback gaps when too few columns resolved to measure spacing.
const DEFAULT_LABEL_GAP: f64 = 4.5;
const DEFAULT_CENTER_GAP: f64 = 5.0;

/// Fraction of the median inter-column gap used as assignment tolerance.
const MAX_DISTANCE_FRAC: f64 = 0.6;
const MAX_DISTANCE_FLOOR: f64 = 2.0;

/// Resolved header geometry: the representative X of each of the eight
/// columns plus the tolerance for assigning numbers to them. Read-only
/// once derived.
#[derive(Debug, Clone)]
pub struct HeaderCalibration {
    /// Index of the header's first physical row within the page rows.
    pub row_index: usize,
    pub header_y: f64,
    /// One center per [`ColumnKey::ALL`] entry, in ordinal order.
    pub centers: [f64; 8],
    pub max_distance: f64,
}

/// Locate the column-header row(s) and compute column centers.
///
/// Requires at minimum the Original and Vigente labels; missing bucket
/// columns are backfilled by extrapolating the median gap rightward from
/// Vigente, preserving the printed order. Returns `None` when no row
/// qualifies — a routine outcome, not an error.
pub fn find_header(rows: &[Row]) -> Option<HeaderCalibration> {
    for (i, first) in rows.iter().enumerate() {
        let line = first.text();
        if !ORIGINAL_RE.is_match(&line) || !VIGENTE_RE.is_match(&line) {
            continue;
        }

        let mut merged: Vec<Cell> = first.cells.clone();
        if let Some(next) = rows.get(i + 1) {
            if next.y - first.y < HEADER_MERGE_NEXT {
                merged.extend(next.cells.iter().cloned());
            }
        }
        if let Some(second) = rows.get(i + 2) {
            if second.y - first.y < HEADER_MERGE_SECOND {
                merged.extend(second.cells.iter().cloned());
            }
        }
        merged.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

        if !merged.iter().any(|c| DIAS_RE.is_match(&c.text)) {
            continue;
        }

        let mut centers: [Option<f64>; 8] = [None; 8];
        for spec in HEADER_COLUMNS.iter() {
            for cell in &merged {
                let text = SPACES_RE.replace_all(&cell.text, " ");
                if spec.label.is_match(&text) {
                    centers[spec.key.ordinal()] = Some(cell.x);
                    break;
                }
            }
        }

        if centers[ColumnKey::Original.ordinal()].is_none() {
            continue;
        }
        let Some(vigente_x) = centers[ColumnKey::Vigente.ordinal()] else {
            continue;
        };

        // Median gap between the columns that did resolve.
        let mut known: Vec<f64> = centers.iter().flatten().copied().collect();
        known.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let gaps: Vec<f64> = known.windows(2).map(|w| w[1] - w[0]).collect();
        let label_gap = median(&gaps).unwrap_or(DEFAULT_LABEL_GAP);

        for (pos, key) in ColumnKey::BUCKETS.iter().enumerate() {
            let slot = &mut centers[key.ordinal()];
            if slot.is_none() {
                *slot = Some(vigente_x + label_gap * (pos + 1) as f64);
            }
        }
        let centers = centers.map(|c| c.unwrap_or(vigente_x));

        let mut all_sorted = centers.to_vec();
        all_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let center_gaps: Vec<f64> = all_sorted.windows(2).map(|w| w[1] - w[0]).collect();
        let center_gap = median(&center_gaps).unwrap_or(DEFAULT_CENTER_GAP);
        let max_distance = MAX_DISTANCE_FLOOR.max(center_gap * MAX_DISTANCE_FRAC);

        log::debug!(
            "header at row {i} (y={:.2}), median gap {center_gap:.2}, tolerance {max_distance:.2}",
            first.y
        );
        return Some(HeaderCalibration {
            row_index: i,
            header_y: first.y,
            centers,
            max_distance,
        });
    }
    None
}
