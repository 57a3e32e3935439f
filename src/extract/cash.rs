//! Cash balance extraction.

use regex::Regex;

use super::{detect_currency, isin, numeric, CashPosition, ExtractorConfig, Line};

/// Find the statement's cash balance: the first keyword line that also
/// carries a number wins, and the last number on it is the amount (cash
/// lines put the label first and the amount last). No keyword match means
/// no cash position; the amount is never inferred from portfolio totals.
pub fn extract_cash(lines: &[Line], config: &ExtractorConfig) -> Option<CashPosition> {
    if config.cash_keywords.is_empty() {
        return None;
    }
    let alternation = config
        .cash_keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let keyword_re = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).ok()?;

    for line in lines {
        if !keyword_re.is_match(&line.text) {
            continue;
        }
        let masked = isin::mask_isin_candidates(&line.text);
        let tokens = numeric::extract_number_tokens(&masked, config.number_format);
        if let Some(last) = tokens.last() {
            return Some(CashPosition {
                amount: Some(last.value),
                currency: detect_currency(&line.text, &config.default_currency),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_from(texts: &[&str]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Line {
                index: i,
                page: 0,
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_cash_line_found() {
        let lines = lines_from(&[
            "Depotauszug",
            "Apple Inc.  US0378331005  10  1755.00",
            "Cash: 1,234.56 EUR",
        ]);
        let cash = extract_cash(&lines, &ExtractorConfig::default()).unwrap();
        assert_eq!(cash.amount, Some(1234.56));
        assert_eq!(cash.currency, "EUR");
    }

    #[test]
    fn test_last_number_on_line_is_amount() {
        let lines = lines_from(&["Verfügbarer Betrag per 30.06. Guthaben 2 Konten 512,34"]);
        let cash = extract_cash(&lines, &ExtractorConfig::default()).unwrap();
        assert_eq!(cash.amount, Some(512.34));
    }

    #[test]
    fn test_keyword_line_without_number_is_skipped() {
        let lines = lines_from(&["Guthaben und Verrechnungskonto", "Available: 99,00 EUR"]);
        let cash = extract_cash(&lines, &ExtractorConfig::default()).unwrap();
        assert_eq!(cash.amount, Some(99.00));
    }

    #[test]
    fn test_no_cash_line() {
        let lines = lines_from(&["Depotauszug", "Apple Inc. 10 Stück"]);
        assert!(extract_cash(&lines, &ExtractorConfig::default()).is_none());
    }

    #[test]
    fn test_keyword_is_word_bounded() {
        // "Cashflow" must not count as a cash label.
        let lines = lines_from(&["Cashflow Analyse 12,00"]);
        assert!(extract_cash(&lines, &ExtractorConfig::default()).is_none());
    }

    #[test]
    fn test_default_currency_applied() {
        let config = ExtractorConfig {
            default_currency: "CHF".to_string(),
            ..ExtractorConfig::default()
        };
        let lines = lines_from(&["Guthaben 512,34"]);
        let cash = extract_cash(&lines, &config).unwrap();
        assert_eq!(cash.currency, "CHF");
    }
}
