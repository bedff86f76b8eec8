//! Integer-only monetary values.
//!
//! A [`Money`] is an arbitrary-precision count of the minor units of a
//! [`Currency`]: cents for USD, satoshis for SATS. There is no floating
//! point anywhere in this module; callers holding a binary float must
//! format it to a decimal string before it can enter the type.
//!
//! # Serialization
//!
//! Serializes as `{"cents": "<decimal string>", "currency": "USD"}` so that
//! minor units and currency round-trip byte-for-byte regardless of
//! magnitude. The key is `cents` for both currencies for wire stability.

use std::fmt;
use std::sync::LazyLock;

use alloy_primitives::U256;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Atomic USDC units per cent (USDC carries six decimals, cents two).
const USDC_ATOMIC_PER_CENT: u64 = 10_000;

static DOLLAR_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d{1,2})?$").expect("dollar form regex compiles"));

/// The currency of a [`Money`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// United States dollars, minor unit: cents.
    #[serde(rename = "USD")]
    Usd,
    /// Bitcoin Lightning satoshis, minor unit: the satoshi itself.
    #[serde(rename = "SATS")]
    Sats,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usd => f.write_str("USD"),
            Self::Sats => f.write_str("SATS"),
        }
    }
}

/// An arbitrary-precision monetary value in minor units of a currency.
///
/// Arithmetic is exact. Mixing currencies in arithmetic or comparisons is a
/// programmer error and panics; the budget manager converts between
/// currencies explicitly before any arithmetic meets values of both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Money {
    minor_units: U256,
    currency: Currency,
}

impl Money {
    /// Parses a dollar string of the form `d(.d{1,2})?` into USD cents.
    ///
    /// Scaling is exact integer arithmetic on the decimal text; `"1.5"` is
    /// 150 cents and `"0.01"` is 1 cent.
    ///
    /// # Errors
    ///
    /// Returns `bad-config` when the string does not match the dollar form.
    pub fn from_dollars(s: &str) -> Result<Self, Error> {
        if !DOLLAR_FORM.is_match(s) {
            return Err(Error::bad_config(format!(
                "invalid dollar amount {s:?}: expected a form like \"1\" or \"1.50\""
            )));
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let whole: U256 = whole
            .parse()
            .map_err(|_| Error::bad_config(format!("dollar amount {s:?} is out of range")))?;
        let frac_cents = match frac.len() {
            0 => U256::ZERO,
            1 => U256::from(frac.parse::<u64>().expect("digit parses") * 10),
            _ => U256::from(frac.parse::<u64>().expect("two digits parse")),
        };
        let cents = whole
            .checked_mul(U256::from(100u64))
            .and_then(|c| c.checked_add(frac_cents))
            .ok_or_else(|| Error::bad_config(format!("dollar amount {s:?} is out of range")))?;
        Ok(Self::usd(cents))
    }

    /// Creates a USD value from a cent count.
    pub fn from_cents<T: Into<U256>>(cents: T) -> Self {
        Self::usd(cents.into())
    }

    /// Creates a SATS value from a satoshi count.
    pub fn from_satoshis<T: Into<U256>>(sats: T) -> Self {
        Self {
            minor_units: sats.into(),
            currency: Currency::Sats,
        }
    }

    const fn usd(cents: U256) -> Self {
        Self {
            minor_units: cents,
            currency: Currency::Usd,
        }
    }

    /// Returns the minor-unit count.
    #[must_use]
    pub const fn minor_units(&self) -> U256 {
        self.minor_units
    }

    /// Returns the currency.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns `true` when the value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.minor_units.is_zero()
    }

    fn assert_same_currency(&self, other: &Self, op: &str) {
        assert!(
            self.currency == other.currency,
            "money {op} across currencies ({} vs {})",
            self.currency,
            other.currency
        );
    }

    /// Adds two values of the same currency.
    ///
    /// # Panics
    ///
    /// Panics when the currencies differ.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        self.assert_same_currency(other, "addition");
        Self {
            minor_units: self
                .minor_units
                .checked_add(other.minor_units)
                .expect("money addition overflow"),
            currency: self.currency,
        }
    }

    /// Subtracts `other` from `self`; the subtrahend must not exceed the
    /// minuend, since a [`Money`] is never negative.
    ///
    /// # Panics
    ///
    /// Panics when the currencies differ or `other` exceeds `self`.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        self.assert_same_currency(other, "subtraction");
        Self {
            minor_units: self
                .minor_units
                .checked_sub(other.minor_units)
                .expect("money subtraction below zero"),
            currency: self.currency,
        }
    }

    /// Saturating subtraction: returns zero instead of panicking when
    /// `other` exceeds `self`. Used for "remaining budget" arithmetic.
    ///
    /// # Panics
    ///
    /// Panics when the currencies differ.
    #[must_use]
    pub fn saturating_subtract(&self, other: &Self) -> Self {
        self.assert_same_currency(other, "subtraction");
        Self {
            minor_units: self.minor_units.saturating_sub(other.minor_units),
            currency: self.currency,
        }
    }

    /// Returns `true` when `self > other`.
    ///
    /// # Panics
    ///
    /// Panics when the currencies differ.
    #[must_use]
    pub fn greater_than(&self, other: &Self) -> bool {
        self.assert_same_currency(other, "comparison");
        self.minor_units > other.minor_units
    }

    /// Returns `true` when `self >= other`.
    ///
    /// # Panics
    ///
    /// Panics when the currencies differ.
    #[must_use]
    pub fn greater_than_or_equal(&self, other: &Self) -> bool {
        self.assert_same_currency(other, "comparison");
        self.minor_units >= other.minor_units
    }

    /// Returns `true` when the values are equal.
    ///
    /// # Panics
    ///
    /// Panics when the currencies differ.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.assert_same_currency(other, "comparison");
        self.minor_units == other.minor_units
    }

    /// Formats for display: `"$d.cc"` for USD, `"<n> sats"` for SATS.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self.currency {
            Currency::Usd => {
                let hundred = U256::from(100u64);
                let dollars = self.minor_units / hundred;
                let cents: u64 = (self.minor_units % hundred).to::<u64>();
                format!("${dollars}.{cents:02}")
            }
            Currency::Sats => format!("{} sats", self.minor_units),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

#[derive(Serialize, Deserialize)]
struct MoneyRepr {
    cents: String,
    currency: Currency,
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MoneyRepr {
            cents: self.minor_units.to_string(),
            currency: self.currency,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = MoneyRepr::deserialize(deserializer)?;
        let minor_units = repr
            .cents
            .parse::<U256>()
            .map_err(|_| serde::de::Error::custom("cents must be a non-negative integer string"))?;
        Ok(Self {
            minor_units,
            currency: repr.currency,
        })
    }
}

/// Rounds an atomic USDC amount (six decimals) up to whole cents.
///
/// Any positive dust below one cent still charges one cent; payments must
/// never round down to free.
#[must_use]
pub fn usdc_atomic_to_cents(atomic: U256) -> U256 {
    let per_cent = U256::from(USDC_ATOMIC_PER_CENT);
    let quotient = atomic / per_cent;
    if (atomic % per_cent).is_zero() {
        quotient
    } else {
        quotient + U256::from(1u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dollars_whole() {
        let m = Money::from_dollars("3").unwrap();
        assert_eq!(m.minor_units(), U256::from(300u64));
        assert_eq!(m.currency(), Currency::Usd);
    }

    #[test]
    fn test_from_dollars_one_fraction_digit() {
        let m = Money::from_dollars("1.5").unwrap();
        assert_eq!(m.minor_units(), U256::from(150u64));
    }

    #[test]
    fn test_from_dollars_two_fraction_digits() {
        let m = Money::from_dollars("0.01").unwrap();
        assert_eq!(m.minor_units(), U256::from(1u64));
    }

    #[test]
    fn test_from_dollars_rejects_bad_forms() {
        for s in ["", "-1", "1.", "1.234", "$1", "1,00", "1.0.0", "abc"] {
            assert!(Money::from_dollars(s).is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn test_add_subtract_roundtrip() {
        let a = Money::from_cents(120u64);
        let b = Money::from_cents(45u64);
        assert_eq!(a.add(&b).subtract(&b), a);
    }

    #[test]
    #[should_panic(expected = "across currencies")]
    fn test_currency_mix_panics() {
        let _ = Money::from_cents(1u64).add(&Money::from_satoshis(1u64));
    }

    #[test]
    #[should_panic(expected = "below zero")]
    fn test_subtract_below_zero_panics() {
        let _ = Money::from_cents(1u64).subtract(&Money::from_cents(2u64));
    }

    #[test]
    fn test_display_usd_pads_fraction() {
        assert_eq!(Money::from_cents(5u64).to_display_string(), "$0.05");
        assert_eq!(Money::from_cents(1234u64).to_display_string(), "$12.34");
        assert_eq!(Money::from_cents(100u64).to_display_string(), "$1.00");
    }

    #[test]
    fn test_display_sats() {
        assert_eq!(Money::from_satoshis(200u64).to_display_string(), "200 sats");
    }

    #[test]
    fn test_serde_roundtrip_preserves_units_and_currency() {
        for m in [
            Money::from_cents(0u64),
            Money::from_cents(1u64),
            Money::from_satoshis(98_765u64),
        ] {
            let json = serde_json::to_string(&m).unwrap();
            let back: Money = serde_json::from_str(&json).unwrap();
            assert_eq!(back, m);
        }
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Money::from_cents(55u64)).unwrap();
        assert_eq!(json, serde_json::json!({"cents": "55", "currency": "USD"}));
    }

    #[test]
    fn test_atomic_to_cents_exact() {
        assert_eq!(usdc_atomic_to_cents(U256::ZERO), U256::ZERO);
        assert_eq!(usdc_atomic_to_cents(U256::from(10_000u64)), U256::from(1u64));
        assert_eq!(
            usdc_atomic_to_cents(U256::from(500_000u64)),
            U256::from(50u64)
        );
    }

    #[test]
    fn test_atomic_to_cents_rounds_dust_up() {
        assert_eq!(usdc_atomic_to_cents(U256::from(1u64)), U256::from(1u64));
        assert_eq!(usdc_atomic_to_cents(U256::from(9_999u64)), U256::from(1u64));
        assert_eq!(
            usdc_atomic_to_cents(U256::from(10_001u64)),
            U256::from(2u64)
        );
    }

    #[test]
    fn test_saturating_subtract_floors_at_zero() {
        let a = Money::from_cents(10u64);
        let b = Money::from_cents(25u64);
        assert!(a.saturating_subtract(&b).is_zero());
    }
}

