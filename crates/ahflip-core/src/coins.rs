//! Coin amounts: auction-house tax, shorthand parsing and formatting.
//!
//! Coins are whole numbers throughout the engine, so plain integers are
//! used instead of a decimal type.

use crate::error::{CoreError, Result};

/// Listing-fee brackets in basis points, highest threshold first.
const LISTING_FEE_BPS: [(u64, u64); 3] = [(100_000_000, 250), (10_000_000, 200), (0, 100)];

/// Collection tax applies at or above this price.
const COLLECTION_TAX_THRESHOLD: u64 = 1_000_000;
const COLLECTION_TAX_BPS: u64 = 100;

/// Amount received when an item listed at `price` sells.
///
/// # Examples
/// ```
/// assert_eq!(ahflip_core::after_tax(10_000_000), 9_700_000);
/// assert_eq!(ahflip_core::after_tax(500_000), 495_000);
/// ```
pub fn after_tax(price: u64) -> u64 {
    let listing_bps = LISTING_FEE_BPS
        .iter()
        .find(|(threshold, _)| price >= *threshold)
        .map(|(_, bps)| *bps)
        .unwrap_or(0);
    let collection_bps = if price >= COLLECTION_TAX_THRESHOLD {
        COLLECTION_TAX_BPS
    } else {
        0
    };

    let tax = (price as u128 * (listing_bps + collection_bps) as u128 / 10_000) as u64;
    price.saturating_sub(tax)
}

/// Parse a shorthand amount such as `"25m"`, `"1.5b"`, `"500k"` or
/// `"1,250,000"`.
pub fn parse_shorthand(input: &str) -> Result<u64> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        return Err(CoreError::InvalidAmount(input.to_string()));
    }

    let (number, multiplier) = match cleaned.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('k') => (&cleaned[..cleaned.len() - 1], 1_000f64),
        Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000f64),
        Some('b') => (&cleaned[..cleaned.len() - 1], 1_000_000_000f64),
        _ => (cleaned.as_str(), 1f64),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| CoreError::InvalidAmount(input.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::InvalidAmount(input.to_string()));
    }

    Ok((value * multiplier).round() as u64)
}

/// Parse an amount as printed in chat, e.g. `"1,250,000"`.
pub fn parse_coins(input: &str) -> Result<u64> {
    let digits: String = input.chars().filter(|c| *c != ',').collect();
    digits
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidAmount(input.to_string()))
}

/// Compact human form used in logs: `1.5B`, `25M`, `500K`.
pub fn format_coins(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs() as f64;

    let (scaled, suffix) = if abs >= 1e9 {
        (abs / 1e9, "B")
    } else if abs >= 1e6 {
        (abs / 1e6, "M")
    } else if abs >= 1e3 {
        (abs / 1e3, "K")
    } else {
        return format!("{}{}", sign, abs as u64);
    };

    let text = format!("{:.1}", scaled);
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{}{}{}", sign, text, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_tax_brackets() {
        assert_eq!(after_tax(500_000), 495_000);
        assert_eq!(after_tax(1_000_000), 980_000);
        assert_eq!(after_tax(10_000_000), 9_700_000);
        assert_eq!(after_tax(100_000_000), 96_500_000);
        assert_eq!(after_tax(0), 0);
    }

    #[test]
    fn test_parse_shorthand() {
        assert_eq!(parse_shorthand("25m").unwrap(), 25_000_000);
        assert_eq!(parse_shorthand("1.5b").unwrap(), 1_500_000_000);
        assert_eq!(parse_shorthand("500K").unwrap(), 500_000);
        assert_eq!(parse_shorthand("1,250,000").unwrap(), 1_250_000);
        assert_eq!(parse_shorthand(" 42 ").unwrap(), 42);
    }

    #[test]
    fn test_parse_shorthand_rejects_garbage() {
        assert!(parse_shorthand("").is_err());
        assert!(parse_shorthand("m").is_err());
        assert!(parse_shorthand("abc").is_err());
        assert!(parse_shorthand("-5m").is_err());
    }

    #[test]
    fn test_parse_coins() {
        assert_eq!(parse_coins("12,345,678").unwrap(), 12_345_678);
        assert!(parse_coins("12.5").is_err());
    }

    #[test]
    fn test_format_coins() {
        assert_eq!(format_coins(1_500_000_000), "1.5B");
        assert_eq!(format_coins(25_000_000), "25M");
        assert_eq!(format_coins(-500_000), "-500K");
        assert_eq!(format_coins(999), "999");
    }
}
