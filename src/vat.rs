//! VAT Decomposition
//!
//! Splits tax-inclusive line totals into their tax-exclusive amount and VAT
//! amount, per line, using that line's own rate.

use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

/// Errors specific to VAT rates and decomposition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VatError {
    /// Rate outside the 0..=100 percent-point range.
    #[error("VAT rate {0} is outside the 0..=100 range")]
    RateOutOfRange(Decimal),

    /// Decimal conversion overflowed or could not be represented.
    #[error("VAT amount conversion overflowed or was not finite")]
    Conversion,
}

/// A VAT rate in percent points (e.g. `20` for 20%).
///
/// Construction rejects rates outside 0..=100, so a divisor of zero in
/// [`VatRate::decompose`] is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatRate(Decimal);

impl VatRate {
    /// Create a rate from percent points.
    ///
    /// # Errors
    ///
    /// Returns [`VatError::RateOutOfRange`] if the rate is negative or
    /// above 100.
    pub fn new(percent_points: Decimal) -> Result<Self, VatError> {
        if percent_points < Decimal::ZERO || percent_points > Decimal::ONE_HUNDRED {
            return Err(VatError::RateOutOfRange(percent_points));
        }

        Ok(Self(percent_points))
    }

    /// The standard 20% rate applied when a product does not set one.
    #[must_use]
    pub fn standard() -> Self {
        Self(Decimal::new(20, 0))
    }

    /// A 0% rate.
    #[must_use]
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// The rate in percent points.
    #[must_use]
    pub fn percent_points(&self) -> Decimal {
        self.0
    }

    /// Split a tax-inclusive amount into net and VAT portions.
    ///
    /// The net amount is `gross / (1 + rate/100)`, rounded half-away-from-zero
    /// at the minor-unit boundary; the VAT amount is the remainder, so
    /// `net + vat` always reproduces the gross exactly in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`VatError::Conversion`] if the gross amount cannot be
    /// represented during decimal conversion.
    pub fn decompose<'a>(&self, gross: Money<'a, Currency>) -> Result<VatBreakdown<'a>, VatError> {
        let gross_minor = gross.to_minor_units();

        let gross_dec = Decimal::from_i64(gross_minor).ok_or(VatError::Conversion)?;
        let divisor = Decimal::ONE + self.0 / Decimal::ONE_HUNDRED;

        let net_minor = (gross_dec / divisor)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(VatError::Conversion)?;

        let vat_minor = gross_minor.checked_sub(net_minor).ok_or(VatError::Conversion)?;

        Ok(VatBreakdown {
            net: Money::from_minor(net_minor, gross.currency()),
            vat: Money::from_minor(vat_minor, gross.currency()),
        })
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self::standard()
    }
}

/// The net/VAT split of a tax-inclusive amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VatBreakdown<'a> {
    /// Tax-exclusive portion.
    pub net: Money<'a, Currency>,

    /// VAT portion.
    pub vat: Money<'a, Currency>,
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::TRY;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn rejects_negative_rate() {
        let result = VatRate::new(Decimal::new(-1, 0));

        assert!(matches!(result, Err(VatError::RateOutOfRange(_))));
    }

    #[test]
    fn rejects_rate_above_one_hundred() {
        let result = VatRate::new(Decimal::new(101, 0));

        assert!(matches!(result, Err(VatError::RateOutOfRange(_))));
    }

    #[test]
    fn default_rate_is_twenty_percent() {
        assert_eq!(VatRate::default().percent_points(), Decimal::new(20, 0));
    }

    #[test]
    fn decomposes_exact_division() -> TestResult {
        // 180.00 TRY at 20% -> net 150.00, VAT 30.00
        let breakdown = VatRate::standard().decompose(Money::from_minor(18_000, TRY))?;

        assert_eq!(breakdown.net, Money::from_minor(15_000, TRY));
        assert_eq!(breakdown.vat, Money::from_minor(3_000, TRY));

        Ok(())
    }

    #[test]
    fn zero_rate_is_all_net() -> TestResult {
        let breakdown = VatRate::zero().decompose(Money::from_minor(990, TRY))?;

        assert_eq!(breakdown.net, Money::from_minor(990, TRY));
        assert_eq!(breakdown.vat, Money::from_minor(0, TRY));

        Ok(())
    }

    #[test]
    fn net_plus_vat_reproduces_gross_exactly() -> TestResult {
        let rate = VatRate::new(Decimal::new(18, 0))?;

        for gross_minor in [1, 7, 99, 1_234, 55_555, 1_000_001] {
            let gross = Money::from_minor(gross_minor, TRY);
            let breakdown = rate.decompose(gross)?;

            assert_eq!(
                breakdown.net.add(breakdown.vat)?,
                gross,
                "round-trip failed for {gross_minor} minor units"
            );
        }

        Ok(())
    }

    #[test]
    fn rounds_net_half_away_from_zero() -> TestResult {
        // 1.25 TRY at 25%: 125 / 1.25 = 100 exactly; 1.26 -> 100.8 -> 101
        let rate = VatRate::new(Decimal::new(25, 0))?;

        let exact = rate.decompose(Money::from_minor(125, TRY))?;
        assert_eq!(exact.net, Money::from_minor(100, TRY));

        let rounded = rate.decompose(Money::from_minor(126, TRY))?;
        assert_eq!(rounded.net, Money::from_minor(101, TRY));
        assert_eq!(rounded.vat, Money::from_minor(25, TRY));

        Ok(())
    }
}
