use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::calibrate::{
    assigned_values, auto_calibrate, nearest_unique_assign, refine_shift, NumericGroup,
    ASSIGN_MAX_FRAC,
};
use crate::numeric::{numeric_runs, parse_number};
use crate::report::HistoryRecord;
use crate::rows::{group_rows, Row, ROW_Y_TOLERANCE};
use crate::token::{Page, PositionedToken};

static MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Ene|Feb|Mar|Abr|May|Jun|Jul|Ago|Sep|Oct|Nov|Dic)\s+\d{4}\b").unwrap()
});
static MONTH_CAPTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Ene|Feb|Mar|Abr|May|Jun|Jul|Ago|Sep|Oct|Nov|Dic)\s+(\d{4})\b").unwrap()
});

/// Short alphanumeric portfolio-rating codes, e.g. `1A`, `2B1`.
static RATING_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+[A-Z]{1,3}\d?\b").unwrap());

/// The metric rows of one month block, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Vigente,
    V1_29,
    V30_59,
    V60_89,
    V90Mas,
    TotalMes,
    Calificacion,
}

static METRIC_LABELS: LazyLock<Vec<(Metric, Regex)>> = LazyLock::new(|| {
    let pattern = |p: &str| Regex::new(p).unwrap();
    vec![
        (Metric::Vigente, pattern(r"(?i)\bVigente\b")),
        (Metric::V1_29, pattern(r"(?i)Vencido.*(1\s*a\s*29|1\s*[–-]\s*29)\s*d[ií]as?")),
        (Metric::V30_59, pattern(r"(?i)Vencido.*(30\s*a\s*59|30\s*[–-]\s*59)\s*d[ií]as?")),
        (Metric::V60_89, pattern(r"(?i)Vencido.*(60\s*a\s*89|60\s*[–-]\s*89)\s*d[ií]as?")),
        (
            Metric::V90Mas,
            pattern(r"(?i)(Vencido.*(m[aá]s\s*de\s*89|90\+|89\+))|Vencido.*(90\s*y\s*m[aá]s)"),
        ),
        (Metric::TotalMes, pattern(r"(?i)\bTotal\s*mes\b")),
        (Metric::Calificacion, pattern(r"(?i)Calificaci[oó]n de Cartera")),
    ]
});

/// A month header row needs at least this many month-year tokens.
const MIN_MONTH_TOKENS: usize = 2;

/// How far below a month header the metric labels are searched.
const BLOCK_SCAN_ROWS: usize = 24;

/// Column pitch fallback when only one month resolved.
const DEFAULT_AVG_GAP: f64 = 6.0;

/// Vertical band tuning: fraction of the measured inter-row pitch,
/// clamped to a sane range; fallback pitch when unmeasurable.
const BAND_FRAC: f64 = 0.9;
const BAND_MIN: f64 = 1.2;
const BAND_MAX: f64 = 2.2;
const DEFAULT_ROW_GAP: f64 = 1.4;

/// Horizontal gap under which adjacent tokens are fragments of one number.
const GROUP_DX: f64 = 1.0;

/// Rating text capture: join radius and token cap per column.
const RATING_RADIUS_FRAC: f64 = 0.9;
const RATING_MAX_TOKENS: usize = 6;

/// Extract the monthly historical series from every page.
///
/// Each month block is keyed by `periodo`; a month printed again on a
/// later page overwrites the earlier detection. The result is ascending
/// by `periodo` with no duplicates.
pub fn extract_history(pages: &[Page]) -> Vec<HistoryRecord> {
    let mut by_period: BTreeMap<String, HistoryRecord> = BTreeMap::new();

    for page in pages {
        let rows = group_rows(&page.tokens, ROW_Y_TOLERANCE);
        for (i, row) in rows.iter().enumerate() {
            if let Some(block) = MonthBlock::detect(row, &rows[i + 1..]) {
                block.extract_into(&page.tokens, &mut by_period);
            }
        }
    }

    by_period.into_values().collect()
}

/// Scale every monetary field of the history by the document multiplier.
pub fn apply_multiplier(records: &mut [HistoryRecord], multiplier: f64) {
    for r in records {
        r.vigente *= multiplier;
        r.venc_1_29 *= multiplier;
        r.venc_30_59 *= multiplier;
        r.venc_60_89 *= multiplier;
        r.venc_90_mas *= multiplier;
        r.total_mes *= multiplier;
    }
}

/// One detected month-header row plus the metric row bands below it.
struct MonthBlock {
    /// (periodo, label X) pairs, left to right.
    months: Vec<(String, f64)>,
    centers: Vec<f64>,
    avg_gap: f64,
    /// Band center Y per metric, where found.
    metric_y: [Option<f64>; 7],
    y_tolerance: f64,
}

impl MonthBlock {
    /// Treat `row` as a month header if it carries enough month-year
    /// tokens, and locate the metric rows among `following`.
    fn detect(row: &Row, following: &[Row]) -> Option<MonthBlock> {
        let mut months: Vec<(String, f64)> = row
            .cells
            .iter()
            .filter_map(|c| {
                let caps = MONTH_CAPTURE.captures(&c.text)?;
                let mm = month_number(caps.get(1)?.as_str())?;
                Some((format!("{}-{mm}", caps.get(2)?.as_str()), c.x))
            })
            .collect();
        if months.len() < MIN_MONTH_TOKENS {
            return None;
        }
        months.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let centers: Vec<f64> = months.iter().map(|m| m.1).collect();
        let avg_gap = if centers.len() > 1 {
            (centers[centers.len() - 1] - centers[0]) / (centers.len() - 1) as f64
        } else {
            DEFAULT_AVG_GAP
        };

        let mut metric_y: [Option<f64>; 7] = [None; 7];
        for next in following.iter().take(BLOCK_SCAN_ROWS) {
            let line = next.text();
            if MONTH_RE.is_match(&line) {
                break; // start of the next month block
            }
            for (metric, label) in METRIC_LABELS.iter() {
                let slot = &mut metric_y[*metric as usize];
                if slot.is_none() && label.is_match(&line) {
                    *slot = Some(next.y);
                    break;
                }
            }
        }
        metric_y[Metric::Vigente as usize]?;

        let found: Vec<f64> = metric_y.iter().flatten().copied().collect();
        let row_gap = if found.len() > 1 {
            let min = found.iter().copied().fold(f64::INFINITY, f64::min);
            let max = found.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (max - min) / (found.len() - 1) as f64
        } else {
            DEFAULT_ROW_GAP
        };
        let y_tolerance = (row_gap * BAND_FRAC).clamp(BAND_MIN, BAND_MAX);

        log::debug!(
            "month block: {} months, gap {avg_gap:.2}, band tolerance {y_tolerance:.2}",
            months.len()
        );
        Some(MonthBlock { months, centers, avg_gap, metric_y, y_tolerance })
    }

    fn groups_for(&self, tokens: &[PositionedToken], metric: Metric) -> Vec<NumericGroup> {
        self.metric_y[metric as usize]
            .map(|y| numeric_groups_in_band(tokens, y, self.y_tolerance))
            .unwrap_or_default()
    }

    /// Run the three refinement passes and emit one record per month.
    fn extract_into(
        &self,
        tokens: &[PositionedToken],
        by_period: &mut BTreeMap<String, HistoryRecord>,
    ) {
        let max_distance = self.avg_gap * ASSIGN_MAX_FRAC;

        // Pass 1: naive unique-nearest on the Vigente row.
        let vigente_groups = self.groups_for(tokens, Metric::Vigente);
        let initial = nearest_unique_assign(&vigente_groups, &self.centers, max_distance);

        // Pass 2: shift out the systematic bias seen on that row.
        let calibrated = auto_calibrate(&self.centers, &initial, self.avg_gap);

        // Pass 3: cross-validate small shifts against the printed totals.
        let metric_rows: Vec<Vec<NumericGroup>> = [
            Metric::Vigente,
            Metric::V1_29,
            Metric::V30_59,
            Metric::V60_89,
            Metric::V90Mas,
        ]
        .into_iter()
        .map(|m| self.groups_for(tokens, m))
        .collect();
        let totals_groups = self.groups_for(tokens, Metric::TotalMes);
        let centers =
            refine_shift(&calibrated, self.avg_gap, &metric_rows, &totals_groups);

        let values_of = |groups: &[NumericGroup]| -> Vec<f64> {
            assigned_values(&nearest_unique_assign(groups, &centers, max_distance))
        };
        let vigente = values_of(&metric_rows[0]);
        let v1_29 = values_of(&metric_rows[1]);
        let v30_59 = values_of(&metric_rows[2]);
        let v60_89 = values_of(&metric_rows[3]);
        let v90_mas = values_of(&metric_rows[4]);

        let ratings = self.ratings_by_column(tokens, &centers);

        for (k, (periodo, _)) in self.months.iter().enumerate() {
            let venc = v1_29[k] + v30_59[k] + v60_89[k] + v90_mas[k];
            let record = HistoryRecord {
                periodo: periodo.clone(),
                vigente: vigente[k],
                venc_1_29: v1_29[k],
                venc_30_59: v30_59[k],
                venc_60_89: v60_89[k],
                venc_90_mas: v90_mas[k],
                calificacion_cartera: ratings[k].clone(),
                total_mes: vigente[k] + venc,
                sin_atrasos: venc == 0.0,
            };
            // Last detection of a repeated month wins.
            by_period.insert(periodo.clone(), record);
        }
    }

    /// Read the "Calificación de Cartera" text row: per column, join the
    /// nearest few tokens and pull out rating codes.
    fn ratings_by_column(
        &self,
        tokens: &[PositionedToken],
        centers: &[f64],
    ) -> Vec<Vec<String>> {
        let Some(y) = self.metric_y[Metric::Calificacion as usize] else {
            return vec![Vec::new(); centers.len()];
        };
        let band: Vec<&PositionedToken> = tokens
            .iter()
            .filter(|t| (t.y - y).abs() <= self.y_tolerance)
            .collect();
        let radius = self.avg_gap * RATING_RADIUS_FRAC;

        centers
            .iter()
            .map(|&cx| {
                let mut near: Vec<(f64, &str)> = band
                    .iter()
                    .map(|t| ((t.x - cx).abs(), t.text.as_str()))
                    .filter(|(d, _)| *d <= radius)
                    .collect();
                near.sort_by(|a, b| {
                    a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
                });
                let joined = near
                    .iter()
                    .take(RATING_MAX_TOKENS)
                    .map(|(_, t)| *t)
                    .collect::<Vec<_>>()
                    .join(" ");
                RATING_CODE
                    .find_iter(&joined)
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .collect()
    }
}

fn month_number(abbr: &str) -> Option<&'static str> {
    Some(match abbr {
        "Ene" => "01",
        "Feb" => "02",
        "Mar" => "03",
        "Abr" => "04",
        "May" => "05",
        "Jun" => "06",
        "Jul" => "07",
        "Ago" => "08",
        "Sep" => "09",
        "Oct" => "10",
        "Nov" => "11",
        "Dic" => "12",
        _ => return None,
    })
}

/// Consolidate the tokens of a horizontal band into numeric groups.
///
/// Tokens within `GROUP_DX` of each other are fragments of one printed
/// number: their text is concatenated and the longest embedded numeric
/// run becomes the group's value, positioned at the mean X.
pub fn numeric_groups_in_band(
    tokens: &[PositionedToken],
    y_center: f64,
    y_tolerance: f64,
) -> Vec<NumericGroup> {
    let mut band: Vec<&PositionedToken> = tokens
        .iter()
        .filter(|t| (t.y - y_center).abs() <= y_tolerance)
        .collect();
    band.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

    let mut clusters: Vec<Vec<&PositionedToken>> = Vec::new();
    for token in band {
        match clusters.last_mut() {
            Some(cluster)
                if token.x - cluster.last().unwrap().x <= GROUP_DX =>
            {
                cluster.push(token);
            }
            _ => clusters.push(vec![token]),
        }
    }

    clusters
        .into_iter()
        .filter_map(|cluster| {
            let text: String = cluster.iter().map(|t| t.text.as_str()).collect();
            let runs = numeric_runs(&text);
            // Longest run wins; later runs win length ties.
            let chosen = runs
                .iter()
                .fold("", |best, cur| if cur.len() >= best.len() { cur } else { best });
            let value = parse_number(chosen)?;
            let x = cluster.iter().map(|t| t.x).sum::<f64>() / cluster.len() as f64;
            Some(NumericGroup { x, value })
        })
        .collect()
}
