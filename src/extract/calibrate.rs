//! Pure numeric passes of the history grid refinement.
//!
//! Columns are anchored on printed month labels whose pitch is regular but
//! whose absolute offset drifts between report vintages. A single
//! nearest-center pass picks up systematic bias from fragmented tokens, so
//! assignment escalates: unique nearest matching, then a median-bias shift
//! calibrated on the "Vigente" row, then a small shift sweep cross-validated
//! against the independently printed "Total mes" row. Everything here works
//! on plain coordinate/value arrays, nothing page- or token-shaped.

/// Fraction of the average column gap a token may sit from a center and
/// still be assigned to it.
pub const ASSIGN_MAX_FRAC: f64 = 0.85;

/// Median bias below this fraction of the gap is treated as noise.
pub const NOISE_FLOOR_FRAC: f64 = 0.15;

/// Auto-calibration never shifts centers further than this fraction.
pub const CALIBRATION_CAP_FRAC: f64 = 0.35;

/// Step size of the cross-validation shift sweep.
pub const REFINE_STEP_FRAC: f64 = 0.08;

/// Half-range of the cross-validation shift sweep.
pub const REFINE_RANGE_FRAC: f64 = 0.32;

/// Minimum assigned samples before the bias calibration is trusted.
pub const MIN_CALIBRATION_SAMPLES: usize = 3;

/// A consolidated numeric token: merged fragments reduced to one value at
/// a representative X position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericGroup {
    pub x: f64,
    pub value: f64,
}

/// One column's assignment result.
#[derive(Debug, Clone, Copy)]
pub struct Assigned {
    pub value: f64,
    /// Signed offset of the assigned token from the column center.
    pub delta: f64,
}

/// Upper median of a sample (the element at `len / 2` after sorting).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(sorted[sorted.len() / 2])
}

/// Assign numeric groups to column centers, one-to-one.
///
/// All (group, column) pairs within `max_distance` are ranked by distance
/// and taken greedily, skipping groups and columns already claimed. Two
/// adjacent months can never both win the same stray token, and no token
/// ever lands in two columns.
pub fn nearest_unique_assign(
    groups: &[NumericGroup],
    centers: &[f64],
    max_distance: f64,
) -> Vec<Option<Assigned>> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (gi, group) in groups.iter().enumerate() {
        for (ci, &center) in centers.iter().enumerate() {
            let dist = (group.x - center).abs();
            if dist <= max_distance {
                pairs.push((gi, ci, dist));
            }
        }
    }
    pairs.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut group_used = vec![false; groups.len()];
    let mut out: Vec<Option<Assigned>> = vec![None; centers.len()];

    for (gi, ci, _) in pairs {
        if group_used[gi] || out[ci].is_some() {
            continue;
        }
        group_used[gi] = true;
        out[ci] = Some(Assigned {
            value: groups[gi].value,
            delta: groups[gi].x - centers[ci],
        });
    }

    out
}

/// Per-column values of an assignment, zero where nothing was assigned.
pub fn assigned_values(assignments: &[Option<Assigned>]) -> Vec<f64> {
    assignments.iter().map(|a| a.map_or(0.0, |a| a.value)).collect()
}

/// Correct a systematic horizontal skew using the "Vigente" row.
///
/// Takes the median signed offset of that row's assigned tokens; a median
/// above the noise floor shifts every center uniformly, clamped to the
/// safety cap. Returns the centers unchanged when there are too few
/// samples or the bias is within noise.
pub fn auto_calibrate(
    centers: &[f64],
    vigente: &[Option<Assigned>],
    avg_gap: f64,
) -> Vec<f64> {
    let deltas: Vec<f64> = vigente.iter().flatten().map(|a| a.delta).collect();
    if deltas.len() < MIN_CALIBRATION_SAMPLES {
        return centers.to_vec();
    }

    let Some(bias) = median(&deltas) else {
        return centers.to_vec();
    };
    if bias.abs() < avg_gap * NOISE_FLOOR_FRAC {
        return centers.to_vec();
    }

    let limit = avg_gap * CALIBRATION_CAP_FRAC;
    let shift = bias.clamp(-limit, limit);
    log::debug!("auto-calibration shifting centers by {shift:.3} (bias {bias:.3})");
    centers.iter().map(|x| x + shift).collect()
}

/// Cross-validate the calibrated centers against the "Total mes" row.
///
/// Sweeps a small set of additional uniform shifts; for each candidate,
/// the per-column sum of the metric rows is compared (median absolute
/// difference) against the totals row as printed. The shift minimizing
/// the error wins. `metric_rows` holds the consolidated groups of the
/// Vigente row and the four overdue bands.
pub fn refine_shift(
    centers: &[f64],
    avg_gap: f64,
    metric_rows: &[Vec<NumericGroup>],
    totals_row: &[NumericGroup],
) -> Vec<f64> {
    if totals_row.is_empty() || centers.is_empty() {
        return centers.to_vec();
    }

    let max_distance = avg_gap * ASSIGN_MAX_FRAC;
    let printed: Vec<f64> =
        assigned_values(&nearest_unique_assign(totals_row, centers, max_distance));

    let step = avg_gap * REFINE_STEP_FRAC;
    let limit = avg_gap * REFINE_RANGE_FRAC;

    let mut best = centers.to_vec();
    let mut best_err = f64::INFINITY;

    let mut shift = -limit;
    while shift <= limit + 1e-6 {
        let candidate: Vec<f64> = centers.iter().map(|x| x + shift).collect();

        let mut computed = vec![0.0; centers.len()];
        for row in metric_rows {
            let values =
                assigned_values(&nearest_unique_assign(row, &candidate, max_distance));
            for (total, v) in computed.iter_mut().zip(values) {
                *total += v;
            }
        }

        let diffs: Vec<f64> = printed
            .iter()
            .zip(&computed)
            .map(|(p, c)| (p - c).abs())
            .collect();
        let err = median(&diffs).unwrap_or(0.0);

        if err < best_err {
            best_err = err;
            best = candidate;
        }
        shift += step;
    }

    log::debug!("refine sweep settled at median error {best_err:.3}");
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(x: f64, value: f64) -> NumericGroup {
        NumericGroup { x, value }
    }

    #[test]
    fn test_median_upper() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0]), Some(4.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_nearest_unique_basic() {
        let centers = [10.0, 20.0, 30.0];
        let groups = [group(10.2, 1.0), group(19.8, 2.0), group(30.1, 3.0)];

        let out = nearest_unique_assign(&groups, &centers, 2.0);
        assert_eq!(assigned_values(&out), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_nearest_unique_is_one_to_one() {
        // Two groups both closest to the middle column; the nearer one wins
        // it, the other must not be double-counted anywhere.
        let centers = [10.0, 20.0, 30.0];
        let groups = [group(19.5, 5.0), group(20.4, 7.0)];

        let out = nearest_unique_assign(&groups, &centers, 10.0);

        let assigned: Vec<f64> = out.iter().flatten().map(|a| a.value).collect();
        assert_eq!(assigned.len(), 2);
        assert_eq!(out[1].unwrap().value, 7.0); // 20.4 is nearer to 20.0
        // 19.5 spills to an adjacent free column rather than duplicating.
        assert_eq!(out[0].unwrap().value, 5.0);
    }

    #[test]
    fn test_nearest_unique_discards_outliers() {
        let centers = [10.0];
        let groups = [group(50.0, 9.0)];

        let out = nearest_unique_assign(&groups, &centers, 3.0);
        assert!(out[0].is_none());
    }

    #[test]
    fn test_auto_calibrate_shifts_on_bias() {
        let centers = [10.0, 20.0, 30.0, 40.0];
        // Every assigned token sits ~2.0 right of its center; gap = 10, so
        // the bias clears the 1.5 noise floor and stays under the 3.5 cap.
        let vigente: Vec<Option<Assigned>> = vec![
            Some(Assigned { value: 1.0, delta: 2.0 }),
            Some(Assigned { value: 2.0, delta: 2.1 }),
            Some(Assigned { value: 3.0, delta: 1.9 }),
            None,
        ];

        let out = auto_calibrate(&centers, &vigente, 10.0);
        assert!((out[0] - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_calibrate_ignores_noise_and_small_samples() {
        let centers = [10.0, 20.0, 30.0];
        let small_bias: Vec<Option<Assigned>> = vec![
            Some(Assigned { value: 1.0, delta: 0.5 }),
            Some(Assigned { value: 2.0, delta: 0.4 }),
            Some(Assigned { value: 3.0, delta: 0.5 }),
        ];
        // 0.5 < 10.0 * NOISE_FLOOR_FRAC
        assert_eq!(auto_calibrate(&centers, &small_bias, 10.0), centers.to_vec());

        let two_samples: Vec<Option<Assigned>> = vec![
            Some(Assigned { value: 1.0, delta: 3.0 }),
            Some(Assigned { value: 2.0, delta: 3.0 }),
            None,
        ];
        assert_eq!(auto_calibrate(&centers, &two_samples, 10.0), centers.to_vec());
    }

    #[test]
    fn test_auto_calibrate_caps_shift() {
        let centers = [10.0, 20.0, 30.0];
        let huge: Vec<Option<Assigned>> = vec![
            Some(Assigned { value: 1.0, delta: 9.0 }),
            Some(Assigned { value: 2.0, delta: 9.0 }),
            Some(Assigned { value: 3.0, delta: 9.0 }),
        ];

        let out = auto_calibrate(&centers, &huge, 10.0);
        assert!((out[0] - (10.0 + 10.0 * CALIBRATION_CAP_FRAC)).abs() < 1e-9);
    }

    #[test]
    fn test_refine_shift_prefers_centers_that_keep_tokens_in_range() {
        // One column, token printed 6.0 right of the nominal center. The
        // most negative sweep candidates push the token past the assignment
        // cutoff (computed total drops to 0, error 5); the first candidate
        // keeping it in range wins.
        let centers = vec![10.0];
        let vigente = vec![group(16.0, 5.0)];
        let totals = vec![group(16.0, 5.0)];

        let refined = refine_shift(&centers, 10.0, &[vigente], &totals);
        assert!((refined[0] - 7.6).abs() < 1e-6);
    }

    #[test]
    fn test_refine_shift_without_totals_row_is_identity() {
        let centers = vec![10.0, 20.0];
        assert_eq!(refine_shift(&centers, 10.0, &[], &[]), centers);
    }
}
