//! Broker statement extraction engine.
//!
//! Reconstructs a structured portfolio record from the text of a broker
//! statement PDF: holdings keyed by checksum-valid ISIN plus a single cash
//! position. The engine is pure: text in, data and warnings out, no
//! logging and no filesystem access. Anything the statement does not
//! state is left as `None`, never guessed.

pub mod cash;
pub mod fields;
pub mod isin;
pub mod numeric;
pub mod section;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use numeric::NumberFormat;

/// One trimmed line of extracted statement text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Position in the full document, counted across page boundaries.
    pub index: usize,
    pub page: usize,
    pub text: String,
}

/// A holding reconstructed from one statement row.
///
/// `isin` is always present and checksum-valid; every numeric field is
/// optional and stays `None` when the row did not yield it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedHolding {
    pub name: Option<String>,
    pub isin: String,
    pub quantity: Option<f64>,
    pub avg_buy_price: Option<f64>,
    pub current_price: Option<f64>,
    pub market_value: Option<f64>,
    pub currency: String,
    pub source_line_index: usize,
}

/// The statement's cash balance, if one was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashPosition {
    pub amount: Option<f64>,
    pub currency: String,
}

/// A non-fatal extraction problem. Warnings accumulate; one bad row never
/// aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub code: String,
    pub message: String,
    pub line_index: Option<usize>,
}

impl ParseWarning {
    pub fn new(code: &str, message: impl Into<String>, line_index: Option<usize>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            line_index,
        }
    }
}

/// Everything one extraction run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub holdings: Vec<ExtractedHolding>,
    pub cash: Option<CashPosition>,
    pub warnings: Vec<ParseWarning>,
}

/// Fatal extraction failures. Everything recoverable is a [`ParseWarning`].
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(
        "only {got} characters of text extracted (minimum {min}); \
         the PDF is likely scanned and OCR is not supported"
    )]
    InsufficientText { got: usize, min: usize },
}

/// Caller-supplied knobs for the targeted statement layout.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Keywords that open the holdings table. First occurrence wins.
    pub holdings_anchors: Vec<String>,
    /// Keywords that close the holdings table (cash or totals section).
    pub section_terminators: Vec<String>,
    /// Keywords that mark the cash balance line.
    pub cash_keywords: Vec<String>,
    /// Currency assumed when a line names none.
    pub default_currency: String,
    pub number_format: NumberFormat,
    /// Runs with less extracted text than this are refused as likely scanned.
    pub min_text_len: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            holdings_anchors: vec![
                "POSITIONEN".to_string(),
                "DEPOTBESTAND".to_string(),
                "DEPOTÜBERSICHT".to_string(),
                "PORTFOLIO".to_string(),
                "HOLDINGS".to_string(),
            ],
            section_terminators: vec![
                "CASH".to_string(),
                "GUTHABEN".to_string(),
                "BARBESTAND".to_string(),
                "GESAMT".to_string(),
                "SUMME".to_string(),
                "TOTAL".to_string(),
            ],
            cash_keywords: vec![
                "Cash".to_string(),
                "Guthaben".to_string(),
                "Verfügbar".to_string(),
                "Available".to_string(),
            ],
            default_currency: "EUR".to_string(),
            number_format: NumberFormat::default(),
            min_text_len: 100,
        }
    }
}

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(EUR|USD|GBP|CHF)\b").unwrap());

/// Split raw extracted page text into trimmed lines, preserving order and
/// page boundaries (form feed separates pages). Empty lines are kept so
/// line distances stay meaningful for the label-proximity pass.
pub fn normalize_pages(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut index = 0;
    for (page, page_text) in text.split('\u{0c}').enumerate() {
        for raw in page_text.lines() {
            lines.push(Line {
                index,
                page,
                text: raw.trim().to_string(),
            });
            index += 1;
        }
    }
    lines
}

/// Find the first of EUR/USD/GBP/CHF (code or symbol) in `text`, falling
/// back to `default_currency` silently; an unlabeled amount in the base
/// currency is the expected common case.
pub fn detect_currency(text: &str, default_currency: &str) -> String {
    let code = CURRENCY_RE
        .find(text)
        .map(|m| (m.start(), m.as_str().to_string()));
    let symbol = text.char_indices().find_map(|(i, c)| match c {
        '€' => Some((i, "EUR")),
        '$' => Some((i, "USD")),
        '£' => Some((i, "GBP")),
        _ => None,
    });
    match (code, symbol) {
        (Some((ci, c)), Some((si, s))) => {
            if ci <= si {
                c
            } else {
                s.to_string()
            }
        }
        (Some((_, c)), None) => c,
        (None, Some((_, s))) => s.to_string(),
        (None, None) => default_currency.to_string(),
    }
}

/// Run the full extraction over raw page text.
pub fn extract_portfolio(text: &str, config: &ExtractorConfig) -> Result<Extraction, ExtractError> {
    let got = text.trim().chars().count();
    if got < config.min_text_len {
        return Err(ExtractError::InsufficientText {
            got,
            min: config.min_text_len,
        });
    }
    let lines = normalize_pages(text);
    extract_from_lines(&lines, config)
}

/// Run the full extraction over an already-normalized line sequence.
pub fn extract_from_lines(
    lines: &[Line],
    config: &ExtractorConfig,
) -> Result<Extraction, ExtractError> {
    let got: usize = lines.iter().map(|l| l.text.chars().count()).sum();
    if got < config.min_text_len {
        return Err(ExtractError::InsufficientText {
            got,
            min: config.min_text_len,
        });
    }

    let mut warnings = Vec::new();
    let mut holdings = Vec::new();

    match section::locate_holdings_section(lines, config) {
        Some(sec) => {
            let assignments = isin::resolve_isins(lines, sec, &mut warnings);
            for (line_index, isin) in assignments {
                holdings.push(build_holding(&lines[line_index], &isin, config, &mut warnings));
            }
        }
        None => {
            warnings.push(ParseWarning::new(
                "no_holdings_section",
                "no holdings section found",
                None,
            ));
        }
    }

    let cash = cash::extract_cash(lines, config);
    if cash.is_none() {
        warnings.push(ParseWarning::new(
            "no_cash_position",
            "could not extract cash position",
            None,
        ));
    }

    Ok(Extraction {
        holdings,
        cash,
        warnings,
    })
}

fn build_holding(
    line: &Line,
    isin: &str,
    config: &ExtractorConfig,
    warnings: &mut Vec<ParseWarning>,
) -> ExtractedHolding {
    // Numbers are read only after the row's ISIN text is blanked out.
    let masked = isin::mask_isin_candidates(&line.text);
    let tokens = numeric::extract_number_tokens(&masked, config.number_format);
    let mapped = fields::map_fields(&tokens);

    let missing = mapped.missing();
    if !missing.is_empty() {
        warnings.push(ParseWarning::new(
            "insufficient_numeric_fields",
            format!(
                "holding {}: insufficient numeric fields, missing {}",
                isin,
                missing.join(", ")
            ),
            Some(line.index),
        ));
    }

    ExtractedHolding {
        name: holding_name(line, isin, config.number_format),
        isin: isin.to_string(),
        quantity: mapped.quantity,
        avg_buy_price: mapped.avg_buy_price,
        current_price: mapped.current_price,
        market_value: mapped.market_value,
        currency: detect_currency(&line.text, &config.default_currency),
        source_line_index: line.index,
    }
}

/// Best-effort security name for a holding row: the text left of the ISIN
/// when the row carries it, otherwise whatever reads like a name once
/// identifiers, labels and numbers are blanked out.
fn holding_name(line: &Line, isin: &str, format: NumberFormat) -> Option<String> {
    if let Some(pos) = line.text.find(isin) {
        let prefix = line.text[..pos].trim();
        if !prefix.is_empty() {
            return Some(prefix.to_string());
        }
    }

    let mut cleaned = isin::mask_isin_candidates(&line.text);
    cleaned = isin::mask_label_tokens(&cleaned);
    let spans: Vec<(usize, usize)> = numeric::extract_number_tokens(&cleaned, format)
        .iter()
        .map(|t| (t.start, t.end))
        .collect();
    cleaned = blank_spans(&cleaned, &spans);

    let name = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if isin::has_name_text(&name) {
        Some(name)
    } else {
        None
    }
}

/// Overwrite the given byte ranges with spaces. Ranges must cover ASCII
/// text (ISIN matches and numeric tokens always do).
pub(crate) fn blank_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut bytes = text.as_bytes().to_vec();
    for &(start, end) in spans {
        for b in &mut bytes[start..end] {
            *b = b' ';
        }
    }
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}
