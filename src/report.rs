use serde::Serialize;

use crate::extract::totals::RawTotals;

pub const UNITS_PESOS: &str = "pesos";
pub const UNITS_CONVERTED: &str = "pesos (convertido desde miles)";

/// Successful analysis response.
#[derive(Debug, Serialize)]
pub struct Report {
    pub ok: bool,
    pub meta: Meta,
    pub data: Summary,
    /// Ascending by `periodo`, no duplicates.
    pub historia: Vec<HistoryRecord>,
    #[serde(rename = "kpisHistoria")]
    pub kpis_historia: HistoryKpis,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    #[serde(rename = "milesDePesosDetectado")]
    pub miles_de_pesos_detectado: bool,
}

/// Failure response shape.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub ok: bool,
    pub error: String,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorReport { ok: false, error: error.into() }
    }
}

/// The headline totals, multiplier-scaled and enriched with the derived
/// overdue and grand totals.
#[derive(Debug, Serialize, PartialEq)]
pub struct Summary {
    #[serde(rename = "montoOriginal")]
    pub monto_original: Option<f64>,
    #[serde(rename = "saldoVigente")]
    pub saldo_vigente: Option<f64>,
    pub buckets: SummaryBuckets,
    #[serde(rename = "saldoVencido")]
    pub saldo_vencido: f64,
    #[serde(rename = "saldoTotal")]
    pub saldo_total: f64,
    pub unidades: String,
    pub fuente: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SummaryBuckets {
    #[serde(rename = "1_29")]
    pub v1_29: f64,
    #[serde(rename = "30_59")]
    pub v30_59: f64,
    #[serde(rename = "60_89")]
    pub v60_89: f64,
    #[serde(rename = "90_119")]
    pub v90_119: f64,
    #[serde(rename = "120_179")]
    pub v120_179: f64,
    #[serde(rename = "180_mas")]
    pub v180_mas: f64,
}

impl Summary {
    /// Scale raw totals by the document multiplier and derive the
    /// overdue sum and grand total.
    pub fn from_raw(raw: &RawTotals, multiplier: f64, fuente: &str) -> Summary {
        let [b1, b2, b3, b4, b5, b6] = raw.buckets;
        let vencido = b1 + b2 + b3 + b4 + b5 + b6;

        let saldo_vigente = raw.vigente.map(|v| v * multiplier);
        Summary {
            monto_original: raw.original.map(|v| v * multiplier),
            saldo_vigente,
            buckets: SummaryBuckets {
                v1_29: b1 * multiplier,
                v30_59: b2 * multiplier,
                v60_89: b3 * multiplier,
                v90_119: b4 * multiplier,
                v120_179: b5 * multiplier,
                v180_mas: b6 * multiplier,
            },
            saldo_vencido: vencido * multiplier,
            saldo_total: saldo_vigente.unwrap_or(0.0) + vencido * multiplier,
            unidades: if multiplier == 1000.0 { UNITS_CONVERTED } else { UNITS_PESOS }
                .to_string(),
            fuente: fuente.to_string(),
        }
    }
}

/// One month of the historical series.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryRecord {
    /// `YYYY-MM`.
    pub periodo: String,
    pub vigente: f64,
    pub venc_1_29: f64,
    pub venc_30_59: f64,
    pub venc_60_89: f64,
    pub venc_90_mas: f64,
    pub calificacion_cartera: Vec<String>,
    pub total_mes: f64,
    pub sin_atrasos: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryKpis {
    #[serde(rename = "mesesConAtraso")]
    pub meses_con_atraso: usize,
    #[serde(rename = "peorBucket")]
    pub peor_bucket: String,
    #[serde(rename = "mesPeorBucket")]
    pub mes_peor_bucket: Option<String>,
    #[serde(rename = "ratiosVencidoSobreVigente")]
    pub ratios_vencido_sobre_vigente: Vec<RatioEntry>,
    #[serde(rename = "sumasPorBucket")]
    pub sumas_por_bucket: BucketSums,
    #[serde(rename = "mesesDesdeUltimo90mas")]
    pub meses_desde_ultimo_90_mas: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RatioEntry {
    pub periodo: String,
    pub ratio: Option<f64>,
}

/// Coarser four-bucket sums used by the history KPIs.
#[derive(Debug, Default, Serialize)]
pub struct BucketSums {
    #[serde(rename = "1_29")]
    pub v1_29: f64,
    #[serde(rename = "30_59")]
    pub v30_59: f64,
    #[serde(rename = "60_89")]
    pub v60_89: f64,
    #[serde(rename = "90_mas")]
    pub v90_mas: f64,
}
