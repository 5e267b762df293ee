use regex::Regex;

use crate::config::NumberConfig;

/// Pulls plausible price tokens out of OCR text.
#[derive(Debug, Clone)]
pub struct NumberParser {
    digit_run: Regex,
    allow_integers: bool,
    min_price: f64,
    max_price: f64,
}

/// A comma at byte `i` that separates thousands: a digit before it, exactly
/// three digits after it.
fn is_group_separator(bytes: &[u8], i: usize) -> bool {
    i > 0
        && bytes[i - 1].is_ascii_digit()
        && bytes.len() >= i + 4
        && bytes[i + 1..i + 4].iter().all(u8::is_ascii_digit)
        && bytes.get(i + 4).is_none_or(|b| !b.is_ascii_digit())
}

/// `61,000.00` -> `61000.00`. Commas between two prices and commas after a
/// fractional part are kept.
fn strip_separators(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_fraction = false;
    for (i, ch) in text.char_indices() {
        if ch == ',' && !in_fraction && is_group_separator(bytes, i) {
            continue;
        }
        if ch == '.' {
            in_fraction = i > 0 && bytes[i - 1].is_ascii_digit();
        } else if !ch.is_ascii_digit() {
            in_fraction = false;
        }
        out.push(ch);
    }
    out
}

impl NumberParser {
    pub fn new(config: &NumberConfig) -> Self {
        Self {
            digit_run: Regex::new(r"\d+(?:\.\d+)?").expect("digit pattern is valid"),
            allow_integers: config.allow_integers,
            min_price: config.min_price,
            max_price: config.max_price,
        }
    }

    /// 3-5 integer digits and 1-4 fractional ones. The fraction is optional
    /// when integers are allowed.
    fn is_price_shape(&self, token: &str) -> bool {
        let (int, frac) = match token.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (token, None),
        };
        let int_ok = (3..=5).contains(&int.len());
        match frac {
            Some(frac) => int_ok && (1..=4).contains(&frac.len()),
            None => int_ok && self.allow_integers,
        }
    }

    /// Prices in the order they appear, out-of-range tokens dropped.
    ///
    /// A token is a whole run of digits: letters may touch it (`TP61234.50`),
    /// other digits may not, so `250000.00` never yields `50000.00`.
    pub fn parse(&self, text: &str) -> Vec<f64> {
        let normalized = strip_separators(text);
        let bytes = normalized.as_bytes();
        self.digit_run
            .find_iter(&normalized)
            .filter(|m| m.start() == 0 || bytes[m.start() - 1] != b'.')
            .filter(|m| self.is_price_shape(m.as_str()))
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| (self.min_price..=self.max_price).contains(v))
            .collect()
    }
}

impl Default for NumberParser {
    fn default() -> Self {
        Self::new(&NumberConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_token_order() {
        let parser = NumberParser::default();
        assert_eq!(parser.parse("TP 1 61234.50 / 2 61890.00"), vec![61234.50, 61890.00]);
    }

    #[test]
    fn drops_out_of_range_tokens() {
        let parser = NumberParser::default();
        assert!(parser.parse("99.99").is_empty());
        assert!(parser.parse("250000.00").is_empty());
        assert_eq!(parser.parse("99.99 61000.5 250000.00"), vec![61000.5]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let parser = NumberParser::default();
        let text = "entry 61,000.00 sl 59,800";
        assert_eq!(parser.parse(text), parser.parse(text));
        assert_eq!(parser.parse(text), vec![61000.0, 59800.0]);
    }

    #[test]
    fn strips_thousands_separators() {
        let parser = NumberParser::default();
        assert_eq!(parser.parse("62,500 / 63,000"), vec![62500.0, 63000.0]);
    }

    #[test]
    fn uppercase_labels_may_touch_prices() {
        let parser = NumberParser::default();
        assert_eq!(parser.parse("TP61234.50 SL:59800.00"), vec![61234.50, 59800.00]);
    }

    #[test]
    fn comma_between_prices_is_not_a_separator() {
        let parser = NumberParser::default();
        assert_eq!(parser.parse("61000.00,62000.00"), vec![61000.0, 62000.0]);
        assert_eq!(parser.parse("61000.00,620 x"), vec![61000.0, 620.0]);

        let strict = NumberParser::new(&NumberConfig {
            allow_integers: false,
            ..Default::default()
        });
        assert_eq!(strict.parse("61000.00,62000.00"), vec![61000.0, 62000.0]);
    }

    #[test]
    fn long_fractions_and_stray_decimals_are_rejected() {
        let parser = NumberParser::default();
        assert!(parser.parse("61234.56789").is_empty());
        assert!(parser.parse(".12345").is_empty());
        assert_eq!(parser.parse("1,234,567 61,500"), vec![61500.0]);
    }

    #[test]
    fn strict_mode_requires_decimals() {
        let parser = NumberParser::new(&NumberConfig {
            allow_integers: false,
            ..Default::default()
        });
        assert_eq!(parser.parse("62500 61234.5"), vec![61234.5]);
    }

    #[test]
    fn range_is_configurable() {
        let parser = NumberParser::new(&NumberConfig {
            max_price: 200_000.0,
            ..Default::default()
        });
        assert!(parser.parse("150000.00").is_empty(), "six integer digits never match");
        assert_eq!(parser.parse("99999.5"), vec![99999.5]);
    }
}
