use crate::report::{BucketSums, HistoryKpis, HistoryRecord, RatioEntry};

/// KPIs are computed over the trailing window of the history.
const KPI_WINDOW_MONTHS: usize = 12;

fn severity(r: &HistoryRecord) -> i32 {
    if r.venc_90_mas > 0.0 {
        4
    } else if r.venc_60_89 > 0.0 {
        3
    } else if r.venc_30_59 > 0.0 {
        2
    } else if r.venc_1_29 > 0.0 {
        1
    } else {
        0
    }
}

fn severity_label(level: i32) -> &'static str {
    match level {
        4 => "90+",
        3 => "60-89",
        2 => "30-59",
        1 => "1-29",
        _ => "sin atraso",
    }
}

fn overdue(r: &HistoryRecord) -> f64 {
    r.venc_1_29 + r.venc_30_59 + r.venc_60_89 + r.venc_90_mas
}

/// Summary statistics over the last twelve months of history.
///
/// An empty history yields the fixed all-null/zero shape instead of an
/// error. On equal severity the most recent month wins the worst-bucket
/// slot.
pub fn compute_kpis(history: &[HistoryRecord]) -> HistoryKpis {
    if history.is_empty() {
        return HistoryKpis {
            meses_con_atraso: 0,
            peor_bucket: "sin datos".to_string(),
            mes_peor_bucket: None,
            ratios_vencido_sobre_vigente: Vec::new(),
            sumas_por_bucket: BucketSums::default(),
            meses_desde_ultimo_90_mas: None,
        };
    }

    let window = &history[history.len().saturating_sub(KPI_WINDOW_MONTHS)..];

    let meses_con_atraso = window.iter().filter(|r| overdue(r) > 0.0).count();

    let mut worst_level = -1;
    let mut mes_peor_bucket = None;
    for r in window {
        let level = severity(r);
        if level >= worst_level {
            worst_level = level;
            mes_peor_bucket = Some(r.periodo.clone());
        }
    }
    let peor_bucket = severity_label(worst_level).to_string();

    let ratios_vencido_sobre_vigente = window
        .iter()
        .map(|r| RatioEntry {
            periodo: r.periodo.clone(),
            ratio: if r.vigente != 0.0 {
                // Percent, 2-decimal rounding.
                Some((overdue(r) / r.vigente * 10000.0).round() / 100.0)
            } else {
                None
            },
        })
        .collect();

    let mut sumas_por_bucket = BucketSums::default();
    for r in window {
        sumas_por_bucket.v1_29 += r.venc_1_29;
        sumas_por_bucket.v30_59 += r.venc_30_59;
        sumas_por_bucket.v60_89 += r.venc_60_89;
        sumas_por_bucket.v90_mas += r.venc_90_mas;
    }

    let meses_desde_ultimo_90_mas = window
        .iter()
        .rev()
        .position(|r| r.venc_90_mas > 0.0);

    HistoryKpis {
        meses_con_atraso,
        peor_bucket,
        mes_peor_bucket,
        ratios_vencido_sobre_vigente,
        sumas_por_bucket,
        meses_desde_ultimo_90_mas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(periodo: &str, vigente: f64, buckets: [f64; 4]) -> HistoryRecord {
        let venc = buckets.iter().sum::<f64>();
        HistoryRecord {
            periodo: periodo.to_string(),
            vigente,
            venc_1_29: buckets[0],
            venc_30_59: buckets[1],
            venc_60_89: buckets[2],
            venc_90_mas: buckets[3],
            calificacion_cartera: Vec::new(),
            total_mes: vigente + venc,
            sin_atrasos: venc == 0.0,
        }
    }

    #[test]
    fn test_empty_history_does_not_panic() {
        let kpis = compute_kpis(&[]);
        assert_eq!(kpis.meses_con_atraso, 0);
        assert_eq!(kpis.peor_bucket, "sin datos");
        assert!(kpis.mes_peor_bucket.is_none());
        assert!(kpis.ratios_vencido_sobre_vigente.is_empty());
        assert!(kpis.meses_desde_ultimo_90_mas.is_none());
    }

    #[test]
    fn test_ratio_percent_rounding() {
        let kpis = compute_kpis(&[record("2024-01", 10000.0, [500.0, 0.0, 0.0, 0.0])]);
        assert_eq!(kpis.ratios_vencido_sobre_vigente[0].ratio, Some(5.0));
    }

    #[test]
    fn test_ratio_null_on_zero_vigente() {
        let kpis = compute_kpis(&[record("2024-01", 0.0, [500.0, 0.0, 0.0, 0.0])]);
        assert_eq!(kpis.ratios_vencido_sobre_vigente[0].ratio, None);
    }

    #[test]
    fn test_worst_bucket_most_recent_wins_ties() {
        let kpis = compute_kpis(&[
            record("2024-01", 100.0, [0.0, 0.0, 0.0, 10.0]),
            record("2024-02", 100.0, [0.0, 0.0, 0.0, 0.0]),
            record("2024-03", 100.0, [0.0, 0.0, 0.0, 10.0]),
        ]);
        assert_eq!(kpis.peor_bucket, "90+");
        assert_eq!(kpis.mes_peor_bucket.as_deref(), Some("2024-03"));
    }

    #[test]
    fn test_months_since_last_90_plus() {
        let kpis = compute_kpis(&[
            record("2024-01", 100.0, [0.0, 0.0, 0.0, 10.0]),
            record("2024-02", 100.0, [0.0, 0.0, 0.0, 0.0]),
            record("2024-03", 100.0, [5.0, 0.0, 0.0, 0.0]),
        ]);
        assert_eq!(kpis.meses_desde_ultimo_90_mas, Some(2));
        assert_eq!(kpis.meses_con_atraso, 2);
    }

    #[test]
    fn test_window_is_last_twelve() {
        let mut history: Vec<HistoryRecord> = (1..=12)
            .map(|m| record(&format!("2023-{m:02}"), 100.0, [0.0; 4]))
            .collect();
        history.insert(0, record("2022-12", 100.0, [0.0, 0.0, 0.0, 50.0]));

        let kpis = compute_kpis(&history);
        // The delinquent month fell out of the window.
        assert_eq!(kpis.meses_con_atraso, 0);
        assert_eq!(kpis.peor_bucket, "sin atraso");
        assert_eq!(kpis.sumas_por_bucket.v90_mas, 0.0);
    }
}
