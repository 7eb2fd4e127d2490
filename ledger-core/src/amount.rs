//! Amount codec
//!
//! Balances are integers in base units: one display unit is 10^18 base units
//! (the ERC-20 convention). Human-entered amounts are parsed as exact
//! decimals with `rust_decimal` and truncated toward zero, so a float never
//! represents a balance.

use crate::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Fraction digits of one display unit
pub const DECIMALS: u32 = 18;

/// Base units in one display unit
pub const BASE_UNITS_PER_TOKEN: i128 = 1_000_000_000_000_000_000;

/// Integers above this value are taken to already be base units
pub const BASE_UNIT_THRESHOLD: i128 = 10_000_000_000;

/// Amount as supplied by a caller, before it is normalized to base units
#[derive(Debug, Clone, PartialEq)]
pub enum AmountInput {
    /// Whole number; may already be base units (see [`parse_amount`])
    Integer(i128),
    /// Floating-point display amount
    Float(f64),
    /// Numeric text, either decimal or base units
    Text(String),
    /// Exact display amount
    Decimal(Decimal),
}

impl AmountInput {
    /// Classify a JSON number by its literal: integer form becomes
    /// [`AmountInput::Integer`] at full `i128` width, anything else a float.
    ///
    /// Relies on serde_json's `arbitrary_precision`, which keeps literals
    /// above `u64::MAX` intact instead of rounding them to `f64`.
    pub fn from_json_number(number: &serde_json::Number) -> Result<Self> {
        let literal = number.to_string();
        if let Ok(v) = literal.parse::<i128>() {
            return Ok(AmountInput::Integer(v));
        }

        let digits = literal.strip_prefix('-').unwrap_or(&literal);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Parse(format!("amount {} is out of range", literal)));
        }

        number
            .as_f64()
            .map(AmountInput::Float)
            .ok_or_else(|| Error::Parse(format!("invalid amount {}", literal)))
    }
}

impl<'de> Deserialize<'de> for AmountInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(number) => {
                AmountInput::from_json_number(&number).map_err(de::Error::custom)
            }
            serde_json::Value::String(text) => Ok(AmountInput::Text(text)),
            other => Err(de::Error::custom(format!(
                "expected a number or numeric string, got {}",
                other
            ))),
        }
    }
}

impl From<i32> for AmountInput {
    fn from(v: i32) -> Self {
        AmountInput::Integer(v as i128)
    }
}

impl From<i64> for AmountInput {
    fn from(v: i64) -> Self {
        AmountInput::Integer(v as i128)
    }
}

impl From<u64> for AmountInput {
    fn from(v: u64) -> Self {
        AmountInput::Integer(v as i128)
    }
}

impl From<i128> for AmountInput {
    fn from(v: i128) -> Self {
        AmountInput::Integer(v)
    }
}

impl From<f64> for AmountInput {
    fn from(v: f64) -> Self {
        AmountInput::Float(v)
    }
}

impl From<&str> for AmountInput {
    fn from(v: &str) -> Self {
        AmountInput::Text(v.to_string())
    }
}

impl From<String> for AmountInput {
    fn from(v: String) -> Self {
        AmountInput::Text(v)
    }
}

impl From<Decimal> for AmountInput {
    fn from(v: Decimal) -> Self {
        AmountInput::Decimal(v)
    }
}

impl fmt::Display for AmountInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountInput::Integer(v) => write!(f, "{}", v),
            AmountInput::Float(v) => write!(f, "{}", v),
            AmountInput::Text(v) => write!(f, "{}", v),
            AmountInput::Decimal(v) => write!(f, "{}", v),
        }
    }
}

/// Convert a display amount to base units, truncating toward zero
pub fn to_base_units(amount: Decimal) -> Result<i128> {
    let truncated = amount.round_dp_with_strategy(DECIMALS, RoundingStrategy::ToZero);
    let missing_digits = DECIMALS - truncated.scale();

    truncated
        .mantissa()
        .checked_mul(10i128.pow(missing_digits))
        .ok_or_else(|| Error::Parse(format!("amount {} is out of range", amount)))
}

/// Convert base units to a display amount (18 fraction digits at most)
pub fn from_base_units(base_units: i128) -> Result<Decimal> {
    Decimal::try_from_i128_with_scale(base_units, DECIMALS)
        .map(|d| d.normalize())
        .map_err(|e| Error::Parse(format!("{} base units: {}", base_units, e)))
}

/// Render base units as a plain decimal string without trailing zeros.
///
/// Works on the integer directly, so the whole `i128` range formats and
/// scientific notation never appears.
pub fn format(base_units: i128) -> String {
    let sign = if base_units < 0 { "-" } else { "" };
    let magnitude = base_units.unsigned_abs();
    let scale = BASE_UNITS_PER_TOKEN as u128;

    let whole = magnitude / scale;
    let fraction = magnitude % scale;

    if fraction == 0 {
        return format!("{}{}", sign, whole);
    }

    let digits = format!("{:018}", fraction);
    format!("{}{}.{}", sign, whole, digits.trim_end_matches('0'))
}

/// Normalize caller input to base units.
///
/// An integer, or a numeric string with no decimal point and more than ten
/// characters, that is greater than 10^10 passes through as base units.
/// Everything else is a display amount. Near the threshold the two
/// readings differ by a factor of 10^18; callers relying on the boundary
/// should send decimal strings.
pub fn parse_amount(input: impl Into<AmountInput>) -> Result<i128> {
    match input.into() {
        AmountInput::Integer(v) => {
            if v > BASE_UNIT_THRESHOLD {
                return Ok(v);
            }
            to_base_units(Decimal::try_from_i128_with_scale(v, 0)?)
        }
        AmountInput::Text(text) => {
            let text = text.trim();
            if !text.contains('.') && text.len() > 10 {
                if let Ok(v) = text.parse::<i128>() {
                    if v > BASE_UNIT_THRESHOLD {
                        return Ok(v);
                    }
                }
            }
            to_base_units(parse_decimal(text)?)
        }
        AmountInput::Float(v) => {
            if !v.is_finite() {
                return Err(Error::Parse(format!("amount {} is not finite", v)));
            }
            to_base_units(parse_decimal(&v.to_string())?)
        }
        AmountInput::Decimal(d) => to_base_units(d),
    }
}

fn parse_decimal(text: &str) -> Result<Decimal> {
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str_exact(text)
    };
    parsed.map_err(|e| Error::Parse(format!("invalid amount {:?}: {}", text, e)))
}

/// Parse a base-unit integer string (as persisted)
pub fn parse_base_units(text: &str) -> Result<u128> {
    u128::from_str(text.trim())
        .map_err(|e| Error::Parse(format!("invalid base-unit amount {:?}: {}", text, e)))
}

/// Serde adapter writing `u128` base units as decimal strings.
///
/// JSON numbers lose precision above 2^53 in most consumers, and bincode
/// keeps the same representation as the wire format.
pub mod base_units_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as string
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserialize from string
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_base_units(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(dec("1.5")).unwrap(), 1_500_000_000_000_000_000);
        assert_eq!(to_base_units(dec("100")).unwrap(), 100 * BASE_UNITS_PER_TOKEN);
        assert_eq!(to_base_units(dec("0.000000000000000001")).unwrap(), 1);
    }

    #[test]
    fn test_to_base_units_truncates() {
        // 19th fraction digit is dropped, never rounded up
        assert_eq!(to_base_units(dec("0.0000000000000000019")).unwrap(), 1);
        assert_eq!(to_base_units(dec("-0.0000000000000000019")).unwrap(), -1);
    }

    #[test]
    fn test_negative_not_clamped() {
        assert_eq!(to_base_units(dec("-2")).unwrap(), -2 * BASE_UNITS_PER_TOKEN);
        assert_eq!(parse_amount("-2").unwrap(), -2 * BASE_UNITS_PER_TOKEN);
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(1_500_000_000_000_000_000).unwrap(), dec("1.5"));
        assert_eq!(from_base_units(1).unwrap(), dec("0.000000000000000001"));
    }

    #[test]
    fn test_round_trip() {
        for s in ["0", "1", "1.5", "123.456789012345678901", "0.000000000000000001"] {
            let truncated = dec(s).round_dp_with_strategy(DECIMALS, RoundingStrategy::ToZero);
            assert_eq!(from_base_units(to_base_units(dec(s)).unwrap()).unwrap(), truncated);
        }
        assert_eq!(from_base_units(to_base_units(dec("42.25")).unwrap()).unwrap(), dec("42.25"));
    }

    #[test]
    fn test_format() {
        assert_eq!(format(1_500_000_000_000_000_000), "1.5");
        assert_eq!(format(100 * BASE_UNITS_PER_TOKEN), "100");
        assert_eq!(format(1), "0.000000000000000001");
        assert_eq!(format(0), "0");
        assert_eq!(format(-1_500_000_000_000_000_000), "-1.5");
        // Far beyond Decimal's 96-bit range, still exact
        assert_eq!(format(i128::MAX), "170141183460469231731.687303715884105727");
    }

    #[test]
    fn test_parse_amount_threshold_integers() {
        // Below the threshold: display units
        assert_eq!(
            parse_amount(5_000_000_000i64).unwrap(),
            5_000_000_000 * BASE_UNITS_PER_TOKEN
        );
        // Exactly the threshold is still display units
        assert_eq!(
            parse_amount(10_000_000_000i64).unwrap(),
            10_000_000_000 * BASE_UNITS_PER_TOKEN
        );
        // Above the threshold: already base units
        assert_eq!(parse_amount(50_000_000_000i64).unwrap(), 50_000_000_000);
        assert_eq!(parse_amount(10_000_000_001i64).unwrap(), 10_000_000_001);
    }

    #[test]
    fn test_parse_amount_threshold_strings() {
        assert_eq!(
            parse_amount("5000000000").unwrap(),
            5_000_000_000 * BASE_UNITS_PER_TOKEN
        );
        assert_eq!(parse_amount("50000000000").unwrap(), 50_000_000_000);
        assert_eq!(
            parse_amount("1000000000000000000").unwrap(),
            1_000_000_000_000_000_000
        );
        // A decimal point always means display units
        assert_eq!(
            parse_amount("50000000000.0").unwrap(),
            50_000_000_000 * BASE_UNITS_PER_TOKEN
        );
    }

    #[test]
    fn test_parse_amount_not_idempotent_at_boundary() {
        let once = parse_amount(5i64).unwrap();
        assert_eq!(once, 5 * BASE_UNITS_PER_TOKEN);
        // Re-parsing base units above the threshold is stable
        assert_eq!(parse_amount(once).unwrap(), once);

        // But a small base-unit value is re-read as display units
        let tiny = parse_amount("0.000000001").unwrap();
        assert_eq!(tiny, 1_000_000_000);
        assert_ne!(parse_amount(tiny).unwrap(), tiny);
    }

    #[test]
    fn test_parse_amount_floats_and_decimals() {
        assert_eq!(parse_amount(1.5f64).unwrap(), 1_500_000_000_000_000_000);
        assert_eq!(parse_amount(dec("0.25")).unwrap(), 250_000_000_000_000_000);
        // Floats never pass through, however large
        assert_eq!(
            parse_amount(1e11f64).unwrap(),
            100_000_000_000 * BASE_UNITS_PER_TOKEN
        );
        assert!(parse_amount(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_amount_scientific() {
        assert_eq!(parse_amount("1e3").unwrap(), 1000 * BASE_UNITS_PER_TOKEN);
    }

    #[test]
    fn test_parse_amount_malformed() {
        for bad in ["", "abc", "1.2.3", "1,5", "--1"] {
            assert!(matches!(parse_amount(bad), Err(Error::Parse(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_amount_input_deserialize() {
        let values: Vec<AmountInput> =
            serde_json::from_str(r#"[1000, -3, 1.5, "2.25", "100000000000000000000"]"#).unwrap();
        assert_eq!(values[0], AmountInput::Integer(1000));
        assert_eq!(values[1], AmountInput::Integer(-3));
        assert_eq!(values[2], AmountInput::Float(1.5));
        assert_eq!(values[3], AmountInput::Text("2.25".to_string()));
        assert_eq!(
            parse_amount(values[4].clone()).unwrap(),
            100 * BASE_UNITS_PER_TOKEN
        );
    }

    #[test]
    fn test_amount_input_deserialize_wide_integers() {
        // Integer literals above u64::MAX stay integers and pass through as base units
        let values: Vec<AmountInput> = serde_json::from_str(
            r#"[100000000000000000000, 18446744073709551616, -100000000000000000000, 1e20, 2.0]"#,
        )
        .unwrap();
        assert_eq!(values[0], AmountInput::Integer(100 * BASE_UNITS_PER_TOKEN));
        assert_eq!(
            parse_amount(values[0].clone()).unwrap(),
            100 * BASE_UNITS_PER_TOKEN
        );
        assert_eq!(values[1], AmountInput::Integer(18_446_744_073_709_551_616));
        assert_eq!(values[2], AmountInput::Integer(-100 * BASE_UNITS_PER_TOKEN));
        // Exponent or fraction in the literal keeps the display-amount reading
        assert_eq!(values[3], AmountInput::Float(1e20));
        assert_eq!(values[4], AmountInput::Float(2.0));

        let value: serde_json::Value = serde_json::from_str("100000000000000000000").unwrap();
        let from_value: AmountInput = serde_json::from_value(value).unwrap();
        assert_eq!(from_value, AmountInput::Integer(100 * BASE_UNITS_PER_TOKEN));
    }

    #[test]
    fn test_amount_input_deserialize_rejects() {
        assert!(serde_json::from_str::<AmountInput>("1000000000000000000000000000000000000000000").is_err());
        assert!(serde_json::from_str::<AmountInput>("true").is_err());
        assert!(serde_json::from_str::<AmountInput>("null").is_err());
    }

    #[test]
    fn test_base_units_str_serde() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Row {
            #[serde(with = "base_units_str")]
            amount: u128,
        }

        let json = serde_json::to_string(&Row { amount: 100 * BASE_UNITS_PER_TOKEN as u128 }).unwrap();
        assert_eq!(json, r#"{"amount":"100000000000000000000"}"#);
        let row: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(row.amount, 100 * BASE_UNITS_PER_TOKEN as u128);
    }
}
