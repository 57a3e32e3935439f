//! Column mapping for holding rows.
//!
//! The targeted layout orders its columns quantity, average buy price,
//! current price, market value, with an optional signed gain/loss at the
//! end. Rows that lost columns on the way through text extraction degrade
//! to partial data instead of shifting values into the wrong fields.

use super::numeric::NumberToken;

/// Semantic fields mapped from a row's numeric tokens. Anything the row
/// did not yield stays `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MappedFields {
    pub quantity: Option<f64>,
    pub avg_buy_price: Option<f64>,
    pub current_price: Option<f64>,
    pub market_value: Option<f64>,
}

impl MappedFields {
    /// Names of the fields left unmapped, in column order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.quantity.is_none() {
            out.push("quantity");
        }
        if self.avg_buy_price.is_none() {
            out.push("avg_buy_price");
        }
        if self.current_price.is_none() {
            out.push("current_price");
        }
        if self.market_value.is_none() {
            out.push("market_value");
        }
        out
    }
}

/// Map a row's numeric tokens onto the layout's column order.
///
/// A trailing explicitly-signed token is the gain/loss column and is
/// dropped first. Then, by count: four or more tokens map positionally
/// (extras are noise); two or three keep the first as quantity and the
/// last as market value, with a lone middle token read as the current
/// price; a single token is taken as the market value.
pub fn map_fields(tokens: &[NumberToken]) -> MappedFields {
    let mut values: Vec<f64> = tokens.iter().map(|t| t.value).collect();
    if tokens.last().is_some_and(|t| t.explicit_sign) {
        values.pop();
    }

    match values.len() {
        0 => MappedFields::default(),
        1 => MappedFields {
            market_value: Some(values[0]),
            ..Default::default()
        },
        2 => MappedFields {
            quantity: Some(values[0]),
            market_value: Some(values[1]),
            ..Default::default()
        },
        3 => MappedFields {
            quantity: Some(values[0]),
            current_price: Some(values[1]),
            market_value: Some(values[2]),
            ..Default::default()
        },
        _ => MappedFields {
            quantity: Some(values[0]),
            avg_buy_price: Some(values[1]),
            current_price: Some(values[2]),
            market_value: Some(values[3]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[(f64, bool)]) -> Vec<NumberToken> {
        values
            .iter()
            .enumerate()
            .map(|(i, &(value, explicit_sign))| NumberToken {
                value,
                explicit_sign,
                start: i * 10,
                end: i * 10 + 5,
            })
            .collect()
    }

    #[test]
    fn test_four_numbers_map_positionally() {
        let mapped = map_fields(&tokens(&[
            (10.0, false),
            (150.00, false),
            (175.50, false),
            (1755.00, false),
        ]));
        assert_eq!(mapped.quantity, Some(10.0));
        assert_eq!(mapped.avg_buy_price, Some(150.00));
        assert_eq!(mapped.current_price, Some(175.50));
        assert_eq!(mapped.market_value, Some(1755.00));
        assert!(mapped.missing().is_empty());
    }

    #[test]
    fn test_trailing_gain_loss_is_stripped() {
        let mapped = map_fields(&tokens(&[
            (10.0, false),
            (150.00, false),
            (175.50, false),
            (1755.00, false),
            (255.00, true),
        ]));
        assert_eq!(mapped.market_value, Some(1755.00));
    }

    #[test]
    fn test_two_numbers() {
        let mapped = map_fields(&tokens(&[(10.0, false), (1755.00, false)]));
        assert_eq!(mapped.quantity, Some(10.0));
        assert_eq!(mapped.market_value, Some(1755.00));
        assert_eq!(mapped.avg_buy_price, None);
        assert_eq!(mapped.current_price, None);
        assert_eq!(mapped.missing(), vec!["avg_buy_price", "current_price"]);
    }

    #[test]
    fn test_three_numbers_middle_is_current_price() {
        let mapped = map_fields(&tokens(&[(10.0, false), (175.50, false), (1755.00, false)]));
        assert_eq!(mapped.quantity, Some(10.0));
        assert_eq!(mapped.current_price, Some(175.50));
        assert_eq!(mapped.market_value, Some(1755.00));
        assert_eq!(mapped.avg_buy_price, None);
    }

    #[test]
    fn test_single_number_is_market_value() {
        let mapped = map_fields(&tokens(&[(1755.00, false)]));
        assert_eq!(mapped.market_value, Some(1755.00));
        assert_eq!(
            mapped.missing(),
            vec!["quantity", "avg_buy_price", "current_price"]
        );
    }

    #[test]
    fn test_no_numbers() {
        let mapped = map_fields(&[]);
        assert_eq!(mapped, MappedFields::default());
        assert_eq!(mapped.missing().len(), 4);
    }

    #[test]
    fn test_extra_unsigned_numbers_ignored() {
        let mapped = map_fields(&tokens(&[
            (10.0, false),
            (150.00, false),
            (175.50, false),
            (1755.00, false),
            (99.0, false),
        ]));
        assert_eq!(mapped.market_value, Some(1755.00));
    }
}
