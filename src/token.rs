use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::Result;

/// One decoded text fragment with its page-relative position.
///
/// Produced by the external PDF decoder; input-only, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// All text fragments of a single page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub tokens: Vec<PositionedToken>,
}

// Wire shape of the decoder's token dump: Pages[].Texts[].{x,y,R[].T},
// with each run's text percent-encoded.
#[derive(Debug, Deserialize)]
struct RawDump {
    #[serde(rename = "Pages", default)]
    pages: Vec<RawPage>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(rename = "Texts", default)]
    texts: Vec<RawText>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(rename = "R", default)]
    runs: Vec<RawRun>,
}

#[derive(Debug, Deserialize)]
struct RawRun {
    #[serde(rename = "T", default)]
    t: String,
}

/// Parse a decoder token dump (JSON) into per-page positioned tokens.
///
/// Multi-run fragments are concatenated after percent-decoding; fragments
/// that are empty after trimming are dropped.
pub fn pages_from_json(data: &[u8]) -> Result<Vec<Page>> {
    let dump: RawDump = serde_json::from_slice(data)?;

    let pages = dump
        .pages
        .into_iter()
        .map(|page| {
            let tokens = page
                .texts
                .into_iter()
                .filter_map(|t| {
                    let text: String =
                        t.runs.iter().map(|r| percent_decode(&r.t)).collect();
                    if text.trim().is_empty() {
                        None
                    } else {
                        Some(PositionedToken { x: t.x, y: t.y, text })
                    }
                })
                .collect();
            Page { tokens }
        })
        .collect();

    Ok(pages)
}

/// Decode `%XX` escapes in a run's text.
///
/// Malformed sequences or non-UTF-8 results leave the input unchanged, the
/// way the decoder's own consumers tolerate them.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
            return s.to_string();
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}

/// Collapse runs of spaces/tabs, strip non-breaking spaces and carriage
/// returns, and trim. Newlines are preserved as line separators.
pub fn normalize_spaces(s: &str) -> String {
    static BLANKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

    let replaced = s.replace('\u{00A0}', " ").replace('\r', "");
    BLANKS.replace_all(&replaced, " ").trim().to_string()
}
