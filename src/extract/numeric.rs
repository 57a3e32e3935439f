//! Numeric token extraction.
//!
//! Statement amounts arrive in mixed shapes (`1.234,56`, `1,234.56`,
//! `1755.00`, `+255.00`) and the separator meaning depends on the export
//! locale. Parsing is driven by an explicit [`NumberFormat`] so a run is
//! deterministic instead of guessing per token.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+-]?\d+(?:[.,]\d+)*").unwrap());

/// Separator interpretation for numeric tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    /// Per-token resolution: with both separators present the rightmost one
    /// is the decimal point; a single separator type occurring more than
    /// once is thousands grouping; occurring exactly once it is the
    /// decimal point.
    #[default]
    Auto,
    /// Strict `1.234,56` (decimal comma, dot grouping).
    DecimalComma,
    /// Strict `1,234.56` (decimal point, comma grouping).
    DecimalPoint,
}

/// One numeric token, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberToken {
    pub value: f64,
    /// The source text carried a leading `+` or `-`.
    pub explicit_sign: bool,
    /// Byte span of the token within the line.
    pub start: usize,
    pub end: usize,
}

/// Extract all numeric tokens from `text`, left to right. Digits glued to
/// letters (identifier fragments, ISIN remnants) are skipped.
pub fn extract_number_tokens(text: &str, format: NumberFormat) -> Vec<NumberToken> {
    let mut tokens = Vec::new();
    for m in TOKEN_RE.find_iter(text) {
        if touches_identifier(text, m.start(), m.end()) {
            continue;
        }
        let raw = m.as_str();
        let (explicit_sign, negative, body) = match raw.as_bytes()[0] {
            b'+' => (true, false, &raw[1..]),
            b'-' => (true, true, &raw[1..]),
            _ => (false, false, raw),
        };
        if let Some(value) = parse_decimal(body, format) {
            tokens.push(NumberToken {
                value: if negative { -value } else { value },
                explicit_sign,
                start: m.start(),
                end: m.end(),
            });
        }
    }
    tokens
}

/// Order-preserving numeric values of [`extract_number_tokens`].
pub fn extract_numbers(text: &str, format: NumberFormat) -> Vec<f64> {
    extract_number_tokens(text, format)
        .iter()
        .map(|t| t.value)
        .collect()
}

fn touches_identifier(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(|c| c.is_alphanumeric()) || after.is_some_and(|c| c.is_alphanumeric())
}

fn parse_decimal(body: &str, format: NumberFormat) -> Option<f64> {
    let normalized = match format {
        NumberFormat::DecimalComma => body.replace('.', "").replace(',', "."),
        NumberFormat::DecimalPoint => body.replace(',', ""),
        NumberFormat::Auto => match (body.rfind('.'), body.rfind(',')) {
            (Some(d), Some(c)) => {
                let (decimal, grouping) = if d > c { ('.', ',') } else { (',', '.') };
                body.chars()
                    .filter(|&ch| ch != grouping)
                    .map(|ch| if ch == decimal { '.' } else { ch })
                    .collect()
            }
            (Some(_), None) => normalize_single_separator(body, '.'),
            (None, Some(_)) => normalize_single_separator(body, ','),
            (None, None) => body.to_string(),
        },
    };
    normalized.parse::<f64>().ok()
}

fn normalize_single_separator(body: &str, sep: char) -> String {
    if body.matches(sep).count() > 1 {
        body.chars().filter(|&c| c != sep).collect()
    } else {
        body.replace(sep, ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_european_style() {
        assert_eq!(extract_numbers("1.234,56", NumberFormat::Auto), vec![1234.56]);
        assert_eq!(extract_numbers("0,572", NumberFormat::Auto), vec![0.572]);
        assert_eq!(
            extract_numbers("1.439,13 EUR", NumberFormat::Auto),
            vec![1439.13]
        );
    }

    #[test]
    fn test_plain_style_row() {
        assert_eq!(
            extract_numbers("10  150.00  175.50  1755.00  +255.00", NumberFormat::Auto),
            vec![10.0, 150.00, 175.50, 1755.00, 255.00]
        );
    }

    #[test]
    fn test_sign_preserved() {
        assert_eq!(extract_numbers("-123,45", NumberFormat::Auto), vec![-123.45]);
        let tokens = extract_number_tokens("1755.00  +255.00", NumberFormat::Auto);
        assert_eq!(tokens.len(), 2);
        assert!(!tokens[0].explicit_sign);
        assert!(tokens[1].explicit_sign);
        assert_eq!(tokens[1].value, 255.00);
    }

    #[test]
    fn test_repeated_separator_is_grouping() {
        assert_eq!(
            extract_numbers("1.234.567", NumberFormat::Auto),
            vec![1_234_567.0]
        );
        assert_eq!(
            extract_numbers("1,234,567", NumberFormat::Auto),
            vec![1_234_567.0]
        );
    }

    #[test]
    fn test_mixed_separators_rightmost_wins() {
        assert_eq!(
            extract_numbers("1,234.56", NumberFormat::Auto),
            vec![1234.56]
        );
        assert_eq!(
            extract_numbers("1.234,56", NumberFormat::Auto),
            vec![1234.56]
        );
    }

    #[test]
    fn test_strict_modes() {
        assert_eq!(
            extract_numbers("1.234", NumberFormat::DecimalComma),
            vec![1234.0]
        );
        assert_eq!(extract_numbers("1.234", NumberFormat::Auto), vec![1.234]);
        assert_eq!(
            extract_numbers("1,234", NumberFormat::DecimalPoint),
            vec![1234.0]
        );
        assert_eq!(
            extract_numbers("1.234,56", NumberFormat::DecimalComma),
            vec![1234.56]
        );
    }

    #[test]
    fn test_identifier_digits_skipped() {
        // Digits glued to letters belong to identifiers, not amounts.
        assert!(extract_numbers("WKN A0RPWH", NumberFormat::Auto).is_empty());
        assert!(extract_numbers("US0378331005", NumberFormat::Auto).is_empty());
        assert_eq!(
            extract_numbers("Konto12 hat 42 Stück", NumberFormat::Auto),
            vec![42.0]
        );
    }

    #[test]
    fn test_empty_and_plain_text() {
        assert!(extract_numbers("", NumberFormat::Auto).is_empty());
        assert!(extract_numbers("keine Zahlen hier", NumberFormat::Auto).is_empty());
    }

    #[test]
    fn test_token_spans() {
        let tokens = extract_number_tokens("x 10 y 20", NumberFormat::Auto);
        assert_eq!(tokens.len(), 2);
        assert_eq!(&"x 10 y 20"[tokens[0].start..tokens[0].end], "10");
        assert_eq!(&"x 10 y 20"[tokens[1].start..tokens[1].end], "20");
    }
}
