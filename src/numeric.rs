use std::sync::LazyLock;

use regex::Regex;

/// A run of characters that can belong to a formatted amount: digits,
/// separators, sign, currency symbol, parentheses.
static NUMERIC_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-$()0-9.,]+").unwrap());

static MILES_DE_PESOS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)todas las cantidades?.*?en.*?miles de pesos").unwrap()
});

/// Parse a formatted amount under MX conventions.
///
/// Strips non-breaking spaces, whitespace and `$`; a fully parenthesized
/// value is negative; commas are thousands separators. Returns `None` for
/// anything that is not a clean number after stripping.
pub fn parse_number(text: &str) -> Option<f64> {
    let mut s: String = text.replace('\u{00A0}', " ").trim().to_string();
    s.retain(|c| !c.is_whitespace() && c != '$');

    let negative = s.starts_with('(') && s.ends_with(')');
    s.retain(|c| c != '(' && c != ')' && c != ',');

    if s.is_empty() {
        return None;
    }
    let n: f64 = s.parse().ok()?;
    Some(if negative { -n } else { n })
}

/// Looser variant: extract the first embedded numeric run before parsing.
///
/// Recovers numbers the decoder glued to a neighboring label fragment.
pub fn parse_number_loose(text: &str) -> Option<f64> {
    let m = NUMERIC_RUN.find(text)?;
    parse_number(m.as_str())
}

/// All numeric runs embedded in a line, in order.
pub fn numeric_runs(text: &str) -> Vec<&str> {
    NUMERIC_RUN.find_iter(text).map(|m| m.as_str()).collect()
}

/// Detect the "amounts stated in thousands of pesos" boilerplate and
/// return the process-wide multiplier (1 or 1000).
pub fn detect_multiplier(all_text: &str) -> f64 {
    if MILES_DE_PESOS.is_match(all_text) { 1000.0 } else { 1.0 }
}
