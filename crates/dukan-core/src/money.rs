//! # Money Module
//!
//! Fixed-point monetary values and currency normalization.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A ledger that sums thousands of movements cannot drift by even one    │
//! │  micro-unit, or the cached balances stop reconciling with a replay.    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Micros (6 fractional digits)                    │
//! │    $1.50 = 1_500_000 micros                                            │
//! │    Sums and qty × price products are exact; division happens only at   │
//! │    the currency-normalization boundary and rounds half-up there.       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Normalization Contract
//! Every amount stored by the ledger is in the reference currency (USD).
//! A local-currency (UZS) amount is divided by the per-record exchange rate
//! exactly once, on the way in, rounded half-up at 6 fractional digits.
//! Rates are captured per record and never refreshed retroactively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::error::{LedgerError, LedgerResult};

/// Number of micro-units per whole currency unit (6 fractional digits).
pub const MICROS_PER_UNIT: i64 = 1_000_000;

// =============================================================================
// Currency
// =============================================================================

/// The currencies the ledger accepts on input.
///
/// All persisted ledger amounts are in [`Currency::REFERENCE`]; `Uzs` only
/// exists at the boundary, before [`normalize`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Uzs,
}

impl Currency {
    /// The single currency all ledger sums are normalized into.
    pub const REFERENCE: Currency = Currency::Usd;

    /// Checks whether this is the reference currency.
    #[inline]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Currency::Usd)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Usd => write!(f, "USD"),
            Currency::Uzs => write!(f, "UZS"),
        }
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in micro-units (10⁻⁶ of a currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: balances go negative (a debtor who overpaid, a cash
///   account after a large expense)
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **6 fractional digits**: matches the precision every persisted amount
///   carries; rounding happens only at display or normalization boundaries
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from micro-units.
    ///
    /// ## Example
    /// ```rust
    /// use dukan_core::money::Money;
    ///
    /// let price = Money::from_micros(1_500_000); // 1.50
    /// assert_eq!(price.micros(), 1_500_000);
    /// ```
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Money(micros)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_major(units: i64) -> Self {
        Money(units * MICROS_PER_UNIT)
    }

    /// Converts a float into Money, rejecting non-finite input.
    ///
    /// The only place floats are tolerated is at the API boundary; the
    /// ledger itself never computes with them.
    pub fn try_from_f64(value: f64) -> LedgerResult<Self> {
        if !value.is_finite() {
            return Err(LedgerError::invalid_amount(format!(
                "amount must be finite, got {value}"
            )));
        }
        let scaled = value * MICROS_PER_UNIT as f64;
        if scaled >= i64::MAX as f64 || scaled <= i64::MIN as f64 {
            return Err(LedgerError::invalid_amount("amount overflows fixed-point range"));
        }
        Ok(Money(scaled.round() as i64))
    }

    /// Returns the value in micro-units.
    #[inline]
    pub const fn micros(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity. Exact, no rounding.
    ///
    /// ## Example
    /// ```rust
    /// use dukan_core::money::Money;
    ///
    /// let unit_price = Money::from_major(5);
    /// assert_eq!(unit_price.multiply_quantity(4), Money::from_major(20));
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Divides this amount by an exchange rate (`rate` whole units of local
    /// currency per reference unit), rounding half-up at 6 digits.
    ///
    /// This is the ONLY division in the ledger and it runs exactly once per
    /// amount, at the normalization boundary.
    pub fn div_rate(&self, rate: Money) -> Money {
        // (amount / rate) in micros = amount_micros * MICROS / rate_micros
        Money(div_half_up(
            self.0 as i128 * MICROS_PER_UNIT as i128,
            rate.0 as i128,
        ))
    }

    /// Multiplies this amount by an exchange rate, rounding half-up.
    /// Used when converting reference amounts into a debtor's local currency.
    pub fn mul_rate(&self, rate: Money) -> Money {
        Money(div_half_up(
            self.0 as i128 * rate.0 as i128,
            MICROS_PER_UNIT as i128,
        ))
    }

    /// Rounds to 2 fractional digits, half-up. Display/persist-boundary only.
    pub fn round_to_cents(&self) -> Money {
        let step = MICROS_PER_UNIT / 100;
        Money(div_half_up(self.0 as i128, step as i128) * step)
    }
}

/// Integer division rounding half away from zero on ties.
///
/// Matches decimal ROUND_HALF_UP, which is what every quantized amount in
/// the system uses.
pub(crate) fn div_half_up(num: i128, den: i128) -> i64 {
    debug_assert!(den != 0);
    let sign = if (num < 0) != (den < 0) { -1 } else { 1 };
    let (n, d) = (num.abs(), den.abs());
    let q = (2 * n + d) / (2 * d);
    (sign * q) as i64
}

// =============================================================================
// Exchange Rates & Normalization
// =============================================================================

/// Returns a usable exchange rate: non-positive rates collapse to 1.
///
/// The original data set contains historical records saved before rate
/// capture existed; treating those as rate 1 keeps them summable without
/// special-casing every call site.
#[inline]
pub fn rate_or_default(rate: Money) -> Money {
    if rate.is_positive() {
        rate
    } else {
        Money::from_major(1)
    }
}

/// Normalizes an amount into the reference currency.
///
/// ## Contract
/// - reference currency: passes through unchanged
/// - local currency: `amount / rate`, rounded half-up at 6 digits
/// - local currency with `rate ≤ 0`: `InvalidAmount`
///
/// ## Example
/// ```rust
/// use dukan_core::money::{normalize, Currency, Money};
///
/// let rate = Money::from_major(13_000); // 13 000 UZS per USD
/// let uzs = Money::from_major(26_000);
/// assert_eq!(normalize(uzs, Currency::Uzs, rate).unwrap(), Money::from_major(2));
/// ```
pub fn normalize(amount: Money, currency: Currency, rate: Money) -> LedgerResult<Money> {
    if currency.is_reference() {
        return Ok(amount);
    }
    if !rate.is_positive() {
        return Err(LedgerError::invalid_amount(format!(
            "cannot normalize {currency} amount without a positive exchange rate"
        )));
    }
    Ok(amount.div_rate(rate))
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the amount with two fractional digits, half-up.
///
/// For debugging and log lines; UI formatting is the caller's concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = div_half_up(self.0 as i128, (MICROS_PER_UNIT / 100) as i128);
        let sign = if cents < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (cents / 100).abs(), (cents % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_micros_and_major() {
        assert_eq!(Money::from_major(2).micros(), 2_000_000);
        assert_eq!(Money::from_micros(1_500_000), Money::from_major(1) + Money::from_micros(500_000));
    }

    #[test]
    fn test_try_from_f64_rejects_non_finite() {
        assert!(Money::try_from_f64(f64::NAN).is_err());
        assert!(Money::try_from_f64(f64::INFINITY).is_err());
        assert!(Money::try_from_f64(f64::NEG_INFINITY).is_err());
        assert_eq!(Money::try_from_f64(1.5).unwrap(), Money::from_micros(1_500_000));
    }

    #[test]
    fn test_arithmetic_is_exact() {
        let a = Money::from_micros(333_333);
        let sum: Money = std::iter::repeat(a).take(3).sum();
        assert_eq!(sum.micros(), 999_999); // no hidden rounding

        assert_eq!(a.multiply_quantity(3).micros(), 999_999);
        assert_eq!((-a).micros(), -333_333);
    }

    #[test]
    fn test_div_rate_half_up() {
        // 10 UZS at rate 3 → 3.333333 (3.3333333... rounds to 3.333333)
        let amount = Money::from_major(10);
        let rate = Money::from_major(3);
        assert_eq!(amount.div_rate(rate).micros(), 3_333_333);

        // exact tie rounds away from zero: 1 / 2 = 0.5000005? construct a tie:
        // 0.000001 / 2 = 0.0000005 → rounds to 0.000001
        assert_eq!(Money::from_micros(1).div_rate(Money::from_major(2)).micros(), 1);
        // negative ties round away from zero as well
        assert_eq!(Money::from_micros(-1).div_rate(Money::from_major(2)).micros(), -1);
    }

    #[test]
    fn test_mul_rate() {
        let amount = Money::from_micros(2_500_000); // 2.5 USD
        let rate = Money::from_major(13_000);
        assert_eq!(amount.mul_rate(rate), Money::from_major(32_500));
    }

    #[test]
    fn test_normalize_reference_passthrough() {
        let amount = Money::from_major(7);
        // rate is irrelevant (even zero) when the currency is already USD
        assert_eq!(normalize(amount, Currency::Usd, Money::zero()).unwrap(), amount);
    }

    #[test]
    fn test_normalize_local_divides() {
        let rate = Money::from_major(13_000);
        let uzs = Money::from_major(13_000);
        assert_eq!(normalize(uzs, Currency::Uzs, rate).unwrap(), Money::from_major(1));
    }

    #[test]
    fn test_normalize_local_without_rate_fails() {
        let err = normalize(Money::from_major(5), Currency::Uzs, Money::zero());
        assert!(matches!(err, Err(LedgerError::InvalidAmount { .. })));
    }

    #[test]
    fn test_rate_or_default() {
        assert_eq!(rate_or_default(Money::zero()), Money::from_major(1));
        assert_eq!(rate_or_default(Money::from_micros(-5)), Money::from_major(1));
        assert_eq!(rate_or_default(Money::from_major(13_000)), Money::from_major(13_000));
    }

    #[test]
    fn test_display_rounds_half_up() {
        assert_eq!(format!("{}", Money::from_micros(1_995_000)), "2.00");
        assert_eq!(format!("{}", Money::from_micros(1_994_999)), "1.99");
        assert_eq!(format!("{}", Money::from_micros(-550_000)), "-0.55");
    }

    #[test]
    fn test_round_to_cents() {
        assert_eq!(Money::from_micros(1_234_567).round_to_cents().micros(), 1_230_000);
        assert_eq!(Money::from_micros(1_235_000).round_to_cents().micros(), 1_240_000);
    }
}
