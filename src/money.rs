//! Money Conversion Module
//!
//! Unified conversion between the internal minor-unit representation and
//! the major-unit representation used by operators and the remote API.
//! All conversions MUST go through this module.
//!
//! ## Internal Representation
//! - All amounts are stored as `i64` minor units (cents)
//! - The scale factor is fixed: 1 major unit = 100 minor units
//! - The remote wagering API only ever sees major units
//!
//! ## Usage
//! ```rust
//! use tier_ledger::money::{format_amount, parse_amount};
//!
//! // Operator types "25.5"
//! let internal = parse_amount("25.5").unwrap();
//! assert_eq!(internal, 2550);
//!
//! assert_eq!(format_amount(2550), "25.50");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::core_types::MinorUnits;

/// Decimal places between minor and major units.
pub const MINOR_DECIMALS: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Operator → Internal (String → i64)
// ============================================================================

/// Convert an operator-typed positive amount ("25", "25.5", "25.50") to
/// minor units.
///
/// # Errors
/// * `PrecisionOverflow` - more than two decimal places (no silent truncation)
/// * `InvalidAmount` - zero or signed input
/// * `Overflow` - result does not fit `i64`
/// * `InvalidFormat` - anything else
pub fn parse_amount(amount_str: &str) -> Result<MinorUnits, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let amount = parse_unsigned(amount_str)?;
    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Like [`parse_amount`] but accepts a leading sign and zero.
///
/// Used for settlement adjustments, where the sign carries the funding
/// direction.
pub fn parse_signed_amount(amount_str: &str) -> Result<MinorUnits, MoneyError> {
    let amount_str = amount_str.trim();
    let (negative, digits) = match amount_str.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount_str.strip_prefix('+').unwrap_or(amount_str)),
    };

    if digits.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    let value = parse_unsigned(digits)?;
    Ok(if negative { -value } else { value })
}

fn parse_unsigned(amount_str: &str) -> Result<MinorUnits, MoneyError> {
    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            // Require both sides of the dot so ".5" and "5." are rejected
            if parts[0].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing leading zero (e.g., use 0.5 instead of .5)".into(),
                ));
            }
            if parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if frac.len() > MINOR_DECIMALS as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: MINOR_DECIMALS,
        });
    }

    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in amount: {}",
            amount_str
        )));
    }

    let whole_num: i64 = whole.parse::<i64>().map_err(|_| MoneyError::Overflow)?;

    let frac_num: i64 = if frac.is_empty() {
        0
    } else {
        let frac_padded = format!("{:0<width$}", frac, width = MINOR_DECIMALS as usize);
        frac_padded
            .parse::<i64>()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    whole_num
        .checked_mul(10i64.pow(MINOR_DECIMALS))
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)
}

// ============================================================================
// Format: Internal → Operator / Remote
// ============================================================================

/// Minor units as a major-unit Decimal, exact (`2550` → `25.50`).
pub fn to_major_units(value: MinorUnits) -> Decimal {
    Decimal::new(value, MINOR_DECIMALS)
}

/// Major-unit Decimal back to minor units. Rejects sub-cent precision.
pub fn from_major_units(value: Decimal) -> Result<MinorUnits, MoneyError> {
    let scaled = value * Decimal::from(10i64.pow(MINOR_DECIMALS));
    if !scaled.fract().is_zero() {
        return Err(MoneyError::PrecisionOverflow {
            provided: value.scale(),
            max: MINOR_DECIMALS,
        });
    }
    scaled.to_i64().ok_or(MoneyError::Overflow)
}

/// Display string with two decimals, signed (`-2550` → `"-25.50"`).
pub fn format_amount(value: MinorUnits) -> String {
    format!("{:.prec$}", to_major_units(value), prec = MINOR_DECIMALS as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_basic() {
        assert_eq!(parse_amount("25"), Ok(2500));
        assert_eq!(parse_amount("25.5"), Ok(2550));
        assert_eq!(parse_amount("0.01"), Ok(1));
        assert_eq!(parse_amount(" 100.00 "), Ok(10000));
    }

    #[test]
    fn test_parse_amount_rejects() {
        assert_eq!(parse_amount("0"), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("-1"), Err(MoneyError::InvalidAmount));
        assert_eq!(
            parse_amount("1.001"),
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        );
        assert!(matches!(parse_amount(".5"), Err(MoneyError::InvalidFormat(_))));
        assert!(matches!(parse_amount("5."), Err(MoneyError::InvalidFormat(_))));
        assert!(matches!(parse_amount("1.2.3"), Err(MoneyError::InvalidFormat(_))));
        assert!(matches!(parse_amount("12a"), Err(MoneyError::InvalidFormat(_))));
        assert_eq!(
            parse_amount("999999999999999999999"),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_parse_signed_amount() {
        assert_eq!(parse_signed_amount("-50"), Ok(-5000));
        assert_eq!(parse_signed_amount("+12.3"), Ok(1230));
        assert_eq!(parse_signed_amount("0"), Ok(0));
        assert!(parse_signed_amount("-").is_err());
    }

    #[test]
    fn test_major_units() {
        assert_eq!(to_major_units(2550).to_string(), "25.50");
        assert_eq!(to_major_units(-1).to_string(), "-0.01");
        assert_eq!(from_major_units(Decimal::new(2550, 2)), Ok(2550));
        assert!(from_major_units(Decimal::new(1, 3)).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(12500), "125.00");
        assert_eq!(format_amount(-2550), "-25.50");
        assert_eq!(format_amount(0), "0.00");
    }
}
