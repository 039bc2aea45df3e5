//! Shipping
//!
//! Delivery-fee policy and calculation. The policy is an explicit
//! configuration value handed to the order composer — there is no ambient
//! singleton. Fees are stored in minor units of the cart currency.

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};

/// How the delivery fee is derived from the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    /// One standard fee for the whole cart.
    Single,

    /// The standard fee multiplied by the number of items.
    SumAll,

    /// The standard fee for the first item plus a per-item fee for the rest.
    FirstPlus,

    /// Free above the threshold, the standard fee below it — independent of
    /// the global free-shipping switch.
    Threshold,

    /// Priced by the chosen delivery method; currently the standard fee for
    /// every method.
    Delivery,
}

/// Shipping-fee configuration.
///
/// Defaults mirror the storefront's stock settings: 30 TRY standard fee,
/// [`CalculationMethod::Single`], free shipping from 500 TRY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingPolicy {
    /// Standard fee in minor units.
    pub standard_fee: i64,

    /// Fee calculation method.
    pub calculation_method: CalculationMethod,

    /// Per-item surcharge in minor units, used by
    /// [`CalculationMethod::FirstPlus`].
    pub per_item_extra_fee: i64,

    /// Global free-shipping switch.
    pub free_shipping_enabled: bool,

    /// Cart total (in minor units) from which shipping is free.
    pub free_shipping_threshold: i64,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            standard_fee: 3_000,
            calculation_method: CalculationMethod::Single,
            per_item_extra_fee: 0,
            free_shipping_enabled: true,
            free_shipping_threshold: 50_000,
        }
    }
}

impl ShippingPolicy {
    /// Load a policy from its YAML representation.
    ///
    /// Unknown calculation methods fail here, at the parse boundary, instead
    /// of silently falling back at computation time.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_norway::Error`] if the document is malformed.
    pub fn from_yaml(source: &str) -> Result<Self, serde_norway::Error> {
        serde_norway::from_str(source)
    }

    /// Compute the delivery fee for a cart.
    ///
    /// `item_count` is the sum of line quantities; `cart_total` is the
    /// gross (VAT-inclusive, post-discount) total before shipping. The
    /// free-shipping threshold is inclusive: a total exactly at the
    /// threshold ships free.
    #[must_use]
    pub fn compute<'a>(
        &self,
        item_count: u64,
        cart_total: Money<'a, Currency>,
    ) -> Money<'a, Currency> {
        let currency = cart_total.currency();
        let total_minor = cart_total.to_minor_units();

        if self.free_shipping_enabled && total_minor >= self.free_shipping_threshold {
            return Money::from_minor(0, currency);
        }

        let count = i64::try_from(item_count).unwrap_or(i64::MAX);

        let fee = match self.calculation_method {
            CalculationMethod::Single | CalculationMethod::Delivery => self.standard_fee,
            CalculationMethod::SumAll => self.standard_fee.saturating_mul(count),
            CalculationMethod::FirstPlus => self
                .standard_fee
                .saturating_add(self.per_item_extra_fee.saturating_mul(count.saturating_sub(1))),
            CalculationMethod::Threshold => {
                if total_minor >= self.free_shipping_threshold {
                    0
                } else {
                    self.standard_fee
                }
            }
        };

        Money::from_minor(fee, currency)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::TRY;
    use testresult::TestResult;

    use super::*;

    fn policy(method: CalculationMethod) -> ShippingPolicy {
        ShippingPolicy {
            calculation_method: method,
            ..ShippingPolicy::default()
        }
    }

    #[test]
    fn free_shipping_threshold_is_inclusive() {
        let policy = policy(CalculationMethod::Single);

        assert_eq!(
            policy.compute(1, Money::from_minor(50_000, TRY)),
            Money::from_minor(0, TRY)
        );
        assert_eq!(
            policy.compute(1, Money::from_minor(49_999, TRY)),
            Money::from_minor(3_000, TRY)
        );
    }

    #[test]
    fn single_method_charges_one_standard_fee() {
        let policy = policy(CalculationMethod::Single);

        assert_eq!(
            policy.compute(7, Money::from_minor(10_000, TRY)),
            Money::from_minor(3_000, TRY)
        );
    }

    #[test]
    fn sum_all_multiplies_by_item_count() {
        let policy = policy(CalculationMethod::SumAll);

        assert_eq!(
            policy.compute(3, Money::from_minor(10_000, TRY)),
            Money::from_minor(9_000, TRY)
        );
    }

    #[test]
    fn first_plus_adds_per_item_fee_after_the_first() {
        let policy = ShippingPolicy {
            calculation_method: CalculationMethod::FirstPlus,
            per_item_extra_fee: 500,
            ..ShippingPolicy::default()
        };

        assert_eq!(
            policy.compute(1, Money::from_minor(10_000, TRY)),
            Money::from_minor(3_000, TRY)
        );
        assert_eq!(
            policy.compute(4, Money::from_minor(10_000, TRY)),
            Money::from_minor(4_500, TRY)
        );
    }

    #[test]
    fn threshold_method_works_with_free_shipping_disabled() {
        let policy = ShippingPolicy {
            calculation_method: CalculationMethod::Threshold,
            free_shipping_enabled: false,
            ..ShippingPolicy::default()
        };

        assert_eq!(
            policy.compute(2, Money::from_minor(50_000, TRY)),
            Money::from_minor(0, TRY)
        );
        assert_eq!(
            policy.compute(2, Money::from_minor(49_999, TRY)),
            Money::from_minor(3_000, TRY)
        );
    }

    #[test]
    fn delivery_method_charges_the_standard_fee() {
        let policy = ShippingPolicy {
            calculation_method: CalculationMethod::Delivery,
            free_shipping_enabled: false,
            ..ShippingPolicy::default()
        };

        assert_eq!(
            policy.compute(2, Money::from_minor(10_000, TRY)),
            Money::from_minor(3_000, TRY)
        );
    }

    #[test]
    fn from_yaml_parses_snake_case_methods() -> TestResult {
        let policy = ShippingPolicy::from_yaml(
            "standard_fee: 2500\ncalculation_method: first_plus\nper_item_extra_fee: 250\n",
        )?;

        assert_eq!(policy.standard_fee, 2_500);
        assert_eq!(policy.calculation_method, CalculationMethod::FirstPlus);
        assert_eq!(policy.per_item_extra_fee, 250);
        // Unlisted fields keep their defaults.
        assert!(policy.free_shipping_enabled);
        assert_eq!(policy.free_shipping_threshold, 50_000);

        Ok(())
    }

    #[test]
    fn from_yaml_rejects_unknown_method() {
        let result = ShippingPolicy::from_yaml("calculation_method: teleport\n");

        assert!(result.is_err());
    }
}
