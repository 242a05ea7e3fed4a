pub mod assign;
pub mod calibrate;
pub mod header;
pub mod history;
pub mod kpi;
pub mod locate;
pub mod totals;

use crate::error::Result;
use crate::numeric::detect_multiplier;
use crate::report::{Meta, Report, Summary};
use crate::rows::{group_rows, Row, ROW_Y_TOLERANCE};
use crate::token::{normalize_spaces, Page};

/// The whole document as normalized text, one line per reconstructed row.
pub fn document_text(pages: &[Page]) -> String {
    let joined = pages
        .iter()
        .map(|page| {
            group_rows(&page.tokens, ROW_Y_TOLERANCE)
                .iter()
                .map(Row::text)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n");
    normalize_spaces(&joined)
}

/// Analyze one decoded document: totals chain, history, KPIs.
///
/// Totals and history run independently; a failure of one never aborts
/// the other. The only error short of bad input is the totals-only
/// contract violation. Deterministic for a given token set.
pub fn analyze(pages: &[Page], only_totals: bool) -> Result<Report> {
    let all_text = document_text(pages);
    let multiplier = detect_multiplier(&all_text);
    if multiplier != 1.0 {
        log::info!("amounts declared in thousands of pesos, scaling by {multiplier}");
    }

    let extraction = totals::extract_totals(pages, &all_text, only_totals)?;
    let data = Summary::from_raw(&extraction.totals, multiplier, extraction.source.label());

    let mut historia = history::extract_history(pages);
    history::apply_multiplier(&mut historia, multiplier);
    let kpis_historia = kpi::compute_kpis(&historia);

    Ok(Report {
        ok: true,
        meta: Meta { miles_de_pesos_detectado: multiplier == 1000.0 },
        data,
        historia,
        kpis_historia,
    })
}
