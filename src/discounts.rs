//! Discounts
//!
//! Time-windowed discount rules, the registry that holds them, and
//! best-discount selection: given a product and the active rules, pick the
//! single rule yielding the lowest price, if any improves on the undiscounted
//! price. Rules never stack.

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso::Currency};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use thiserror::Error;

use crate::catalog::{CategoryKey, ProductKey};

new_key_type! {
    /// Discount Key
    pub struct DiscountKey;
}

/// Errors specific to discount calculations.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Errors raised when constructing a validity window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    /// Window start must precede its end.
    #[error("window start {start} is not before end {end}")]
    StartNotBeforeEnd {
        /// Requested start instant.
        start: Timestamp,

        /// Requested end instant.
        end: Timestamp,
    },
}

/// How a discount reduces a price.
#[derive(Debug, Clone, Copy)]
pub enum DiscountKind<'a> {
    /// Reduce the price by a fraction (e.g. 10% off).
    PercentageOff(Percentage),

    /// Subtract a fixed amount, clamped at zero.
    AmountOff(Money<'a, Currency>),
}

/// How a discount is triggered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountMethod {
    /// Applied automatically to every eligible cart.
    Automatic,

    /// Applied only when the customer enters a coupon code.
    CouponCode,
}

/// Which products a rule is eligible to apply to.
#[derive(Debug, Clone)]
pub enum DiscountScope {
    /// Every product in the catalog.
    AllProducts,

    /// Products belonging to one of the listed categories.
    Categories(SmallVec<[CategoryKey; 2]>),

    /// An explicit product list.
    Products(SmallVec<[ProductKey; 4]>),
}

impl DiscountScope {
    /// Whether this scope covers the given product.
    #[must_use]
    pub fn applies_to(&self, product: ProductKey, category: Option<CategoryKey>) -> bool {
        match self {
            Self::AllProducts => true,
            Self::Categories(categories) => {
                category.is_some_and(|category| categories.contains(&category))
            }
            Self::Products(products) => products.contains(&product),
        }
    }
}

/// Extra requirement a rule places on the cart as a whole.
#[derive(Debug, Clone, Copy)]
pub enum DiscountCondition<'a> {
    /// The cart's pre-discount gross total must reach this amount.
    MinCartAmount(Money<'a, Currency>),

    /// No condition.
    Unconditional,
}

impl DiscountCondition<'_> {
    /// Whether the condition holds for the given pre-discount cart gross.
    #[must_use]
    pub fn is_met_by(&self, cart_gross: Money<'_, Currency>) -> bool {
        match self {
            Self::MinCartAmount(minimum) => {
                cart_gross.to_minor_units() >= minimum.to_minor_units()
            }
            Self::Unconditional => true,
        }
    }
}

/// Validity window of a rule. Invariant: `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    start: Timestamp,
    end: Timestamp,
}

impl ActiveWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::StartNotBeforeEnd`] unless `start < end`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, WindowError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(WindowError::StartNotBeforeEnd { start, end })
        }
    }

    /// Whether the instant falls inside the window (both ends inclusive).
    #[must_use]
    pub fn contains(&self, now: Timestamp) -> bool {
        self.start <= now && now <= self.end
    }

    /// Window start.
    #[must_use]
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Window end.
    #[must_use]
    pub fn end(&self) -> Timestamp {
        self.end
    }
}

/// A discount rule as configured in the admin panel.
#[derive(Debug, Clone)]
pub struct DiscountRule<'a> {
    /// Display name shown next to discounted prices.
    pub name: String,

    /// How the rule is triggered.
    pub method: DiscountMethod,

    /// How the rule reduces a price.
    pub kind: DiscountKind<'a>,

    /// Which products the rule covers.
    pub scope: DiscountScope,

    /// Cart-level requirement, checked by the order composer.
    pub condition: DiscountCondition<'a>,

    /// Validity window.
    pub window: ActiveWindow,

    /// Admin on/off switch, independent of the window.
    pub is_active: bool,
}

impl<'a> DiscountRule<'a> {
    /// Convenience constructor for an enabled, unconditional automatic rule.
    pub fn automatic(
        name: impl Into<String>,
        kind: DiscountKind<'a>,
        scope: DiscountScope,
        window: ActiveWindow,
    ) -> Self {
        Self {
            name: name.into(),
            method: DiscountMethod::Automatic,
            kind,
            scope,
            condition: DiscountCondition::Unconditional,
            window,
            is_active: true,
        }
    }

    /// A rule is active at `now` iff its switch is on and `now` falls inside
    /// its window.
    #[must_use]
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.is_active && self.window.contains(now)
    }
}

/// Registry of discount rules.
///
/// Insertion order is preserved and drives tie-breaking: when two rules
/// produce the same candidate price, the earliest-registered rule wins,
/// making selection deterministic across calls.
#[derive(Debug, Default)]
pub struct DiscountBook<'a> {
    rules: SlotMap<DiscountKey, DiscountRule<'a>>,
    order: Vec<DiscountKey>,
}

impl<'a> DiscountBook<'a> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule, returning its key.
    pub fn insert(&mut self, rule: DiscountRule<'a>) -> DiscountKey {
        let key = self.rules.insert(rule);
        self.order.push(key);
        key
    }

    /// Look up a rule by key.
    #[must_use]
    pub fn get(&self, key: DiscountKey) -> Option<&DiscountRule<'a>> {
        self.rules.get(key)
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All rules active at `now`, in insertion order.
    #[must_use]
    pub fn active_at(&self, now: Timestamp) -> Vec<(DiscountKey, &DiscountRule<'a>)> {
        self.order
            .iter()
            .filter_map(|key| self.rules.get(*key).map(|rule| (*key, rule)))
            .filter(|(_, rule)| rule.is_active_at(now))
            .collect()
    }

    /// Rules active at `now` that apply without a coupon, in insertion order.
    #[must_use]
    pub fn active_automatic(&self, now: Timestamp) -> Vec<(DiscountKey, &DiscountRule<'a>)> {
        self.active_at(now)
            .into_iter()
            .filter(|(_, rule)| rule.method == DiscountMethod::Automatic)
            .collect()
    }
}

/// The discount applied to a displayed or composed price.
///
/// Recomputed whenever the price is shown; never authoritative until the
/// resulting totals are frozen on an order.
#[derive(Debug, Clone)]
pub struct DiscountSnapshot<'a> {
    /// The winning rule.
    pub discount: DiscountKey,

    /// The rule's display name.
    pub name: String,

    /// The rule's reduction.
    pub kind: DiscountKind<'a>,

    /// Unit price after the discount, rounded half-away-from-zero to minor
    /// units.
    pub discounted_price: Money<'a, Currency>,

    /// Reduction in percent points: the rule's own value for percentage
    /// rules, otherwise derived from the price drop and rounded to whole
    /// points.
    pub percent_points: Decimal,
}

/// Calculate the discount amount in minor units based on a percentage and a
/// minor unit amount, rounding half-away-from-zero.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows
/// or cannot be safely represented.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage crate doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// Candidate price in minor units after applying a reduction, clamped at
/// zero.
fn discounted_minor(kind: &DiscountKind<'_>, base_minor: i64) -> Result<i64, DiscountError> {
    let minor = match kind {
        DiscountKind::PercentageOff(percent) => base_minor
            .checked_sub(percent_of_minor(percent, base_minor)?)
            .ok_or(DiscountError::PercentConversion)?,
        DiscountKind::AmountOff(amount) => base_minor.saturating_sub(amount.to_minor_units()),
    };

    Ok(0.max(minor))
}

/// Select the single rule yielding the lowest price for this product, if any
/// improves on `unit_price`.
///
/// `unit_price` is the assembled pre-discount unit price (base price plus
/// add-ons). Only strict improvements count, so the result never carries a
/// discounted price at or above the input; ties keep the earliest rule in
/// the slice. Cart-level conditions are not checked here — callers filter
/// rules first.
///
/// # Errors
///
/// Returns a [`DiscountError`] if a percentage calculation overflows.
pub fn select_best_discount<'a>(
    product: ProductKey,
    category: Option<CategoryKey>,
    unit_price: Money<'a, Currency>,
    rules: &[(DiscountKey, &DiscountRule<'a>)],
) -> Result<Option<DiscountSnapshot<'a>>, DiscountError> {
    let base_minor = unit_price.to_minor_units();

    let mut best: Option<(DiscountKey, &DiscountRule<'a>)> = None;
    let mut best_minor = base_minor;

    for (key, rule) in rules {
        if !rule.scope.applies_to(product, category) {
            continue;
        }

        let candidate = discounted_minor(&rule.kind, base_minor)?;

        if candidate < best_minor {
            best_minor = candidate;
            best = Some((*key, rule));
        }
    }

    let Some((key, rule)) = best else {
        return Ok(None);
    };

    Ok(Some(DiscountSnapshot {
        discount: key,
        name: rule.name.clone(),
        kind: rule.kind,
        discounted_price: Money::from_minor(best_minor, unit_price.currency()),
        percent_points: percent_points_for(&rule.kind, base_minor, best_minor)?,
    }))
}

/// Percent points shown next to a discounted price.
fn percent_points_for(
    kind: &DiscountKind<'_>,
    base_minor: i64,
    discounted_minor: i64,
) -> Result<Decimal, DiscountError> {
    match kind {
        // The rule's configured value, normalized so 0.10 displays as 10
        // rather than 10.0.
        DiscountKind::PercentageOff(percent) => {
            Ok((((*percent) * Decimal::ONE) * Decimal::ONE_HUNDRED).normalize())
        }
        // Derived from the actual price drop, rounded to whole points.
        DiscountKind::AmountOff(_) => {
            let base = Decimal::from_i64(base_minor).ok_or(DiscountError::PercentConversion)?;
            let discounted =
                Decimal::from_i64(discounted_minor).ok_or(DiscountError::PercentConversion)?;

            if base == Decimal::ZERO {
                return Ok(Decimal::ZERO);
            }

            Ok(((base - discounted) / base * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::TRY;
    use slotmap::SlotMap;
    use smallvec::smallvec;
    use testresult::TestResult;

    use super::*;

    fn window() -> TestResult<ActiveWindow> {
        Ok(ActiveWindow::new(
            "2026-01-01T00:00:00Z".parse()?,
            "2026-12-31T23:59:59Z".parse()?,
        )?)
    }

    fn mid_year() -> TestResult<Timestamp> {
        Ok("2026-06-15T12:00:00Z".parse()?)
    }

    #[test]
    fn window_rejects_inverted_bounds() -> TestResult {
        let start: Timestamp = "2026-02-01T00:00:00Z".parse()?;
        let end: Timestamp = "2026-01-01T00:00:00Z".parse()?;

        assert_eq!(
            ActiveWindow::new(start, end),
            Err(WindowError::StartNotBeforeEnd { start, end })
        );

        Ok(())
    }

    #[test]
    fn window_is_inclusive_at_both_ends() -> TestResult {
        let window = window()?;

        assert!(window.contains(window.start()));
        assert!(window.contains(window.end()));
        assert!(!window.contains("2027-01-01T00:00:00Z".parse()?));
        assert!(!window.contains("2025-12-31T23:59:59Z".parse()?));

        Ok(())
    }

    #[test]
    fn inactive_rule_is_never_active() -> TestResult {
        let mut rule = DiscountRule::automatic(
            "Kış İndirimi",
            DiscountKind::PercentageOff(Percentage::from(0.10)),
            DiscountScope::AllProducts,
            window()?,
        );
        rule.is_active = false;

        assert!(!rule.is_active_at(mid_year()?));

        Ok(())
    }

    #[test]
    fn book_filters_by_window_and_method() -> TestResult {
        let mut book = DiscountBook::new();

        let automatic = book.insert(DiscountRule::automatic(
            "Otomatik",
            DiscountKind::PercentageOff(Percentage::from(0.10)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let mut coupon = DiscountRule::automatic(
            "Kupon",
            DiscountKind::AmountOff(Money::from_minor(1_000, TRY)),
            DiscountScope::AllProducts,
            window()?,
        );
        coupon.method = DiscountMethod::CouponCode;
        let coupon = book.insert(coupon);

        let mut expired = DiscountRule::automatic(
            "Geçmiş",
            DiscountKind::PercentageOff(Percentage::from(0.50)),
            DiscountScope::AllProducts,
            ActiveWindow::new(
                "2025-01-01T00:00:00Z".parse()?,
                "2025-02-01T00:00:00Z".parse()?,
            )?,
        );
        expired.is_active = true;
        book.insert(expired);

        let now = mid_year()?;

        let active: Vec<DiscountKey> = book.active_at(now).iter().map(|(key, _)| *key).collect();
        assert_eq!(active, vec![automatic, coupon]);

        let auto_only: Vec<DiscountKey> = book
            .active_automatic(now)
            .iter()
            .map(|(key, _)| *key)
            .collect();
        assert_eq!(auto_only, vec![automatic]);

        Ok(())
    }

    #[test]
    fn selects_rule_with_lowest_candidate_price() -> TestResult {
        // 20% off 100 TRY beats 10 TRY off: 80 < 90.
        let mut book = DiscountBook::new();
        let fixed = book.insert(DiscountRule::automatic(
            "10 TL İndirim",
            DiscountKind::AmountOff(Money::from_minor(1_000, TRY)),
            DiscountScope::AllProducts,
            window()?,
        ));
        let percent = book.insert(DiscountRule::automatic(
            "%20 İndirim",
            DiscountKind::PercentageOff(Percentage::from(0.20)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let rules = book.active_at(mid_year()?);

        let snapshot = select_best_discount(
            ProductKey::default(),
            None,
            Money::from_minor(10_000, TRY),
            &rules,
        )?
        .ok_or("expected a discount")?;

        assert_eq!(snapshot.discount, percent);
        assert_ne!(snapshot.discount, fixed);
        assert_eq!(snapshot.discounted_price, Money::from_minor(8_000, TRY));
        assert_eq!(snapshot.percent_points, Decimal::new(20, 0));

        Ok(())
    }

    #[test]
    fn percent_points_display_without_a_trailing_fraction() -> TestResult {
        let mut book = DiscountBook::new();
        book.insert(DiscountRule::automatic(
            "%10 İndirim",
            DiscountKind::PercentageOff(Percentage::from(0.10)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let rules = book.active_at(mid_year()?);

        let snapshot = select_best_discount(
            ProductKey::default(),
            None,
            Money::from_minor(10_000, TRY),
            &rules,
        )?
        .ok_or("expected a discount")?;

        assert_eq!(snapshot.percent_points.to_string(), "10");

        Ok(())
    }

    #[test]
    fn returns_none_when_no_rule_improves_the_price() -> TestResult {
        let mut book = DiscountBook::new();
        book.insert(DiscountRule::automatic(
            "Sıfır",
            DiscountKind::PercentageOff(Percentage::from(0.0)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let rules = book.active_at(mid_year()?);

        let snapshot = select_best_discount(
            ProductKey::default(),
            None,
            Money::from_minor(10_000, TRY),
            &rules,
        )?;

        assert!(snapshot.is_none());

        Ok(())
    }

    #[test]
    fn product_scope_excludes_other_products() -> TestResult {
        let mut products = SlotMap::<ProductKey, ()>::with_key();
        let targeted = products.insert(());
        let other = products.insert(());

        let mut book = DiscountBook::new();
        book.insert(DiscountRule::automatic(
            "Tek Ürün",
            DiscountKind::PercentageOff(Percentage::from(0.30)),
            DiscountScope::Products(smallvec![targeted]),
            window()?,
        ));

        let rules = book.active_at(mid_year()?);
        let price = Money::from_minor(10_000, TRY);

        assert!(select_best_discount(targeted, None, price, &rules)?.is_some());
        assert!(select_best_discount(other, None, price, &rules)?.is_none());

        Ok(())
    }

    #[test]
    fn category_scope_requires_a_matching_category() -> TestResult {
        let mut categories = SlotMap::<CategoryKey, ()>::with_key();
        let dresses = categories.insert(());
        let scarves = categories.insert(());

        let mut book = DiscountBook::new();
        book.insert(DiscountRule::automatic(
            "Elbise Kampanyası",
            DiscountKind::PercentageOff(Percentage::from(0.15)),
            DiscountScope::Categories(smallvec![dresses]),
            window()?,
        ));

        let rules = book.active_at(mid_year()?);
        let price = Money::from_minor(10_000, TRY);
        let product = ProductKey::default();

        assert!(select_best_discount(product, Some(dresses), price, &rules)?.is_some());
        assert!(select_best_discount(product, Some(scarves), price, &rules)?.is_none());
        assert!(select_best_discount(product, None, price, &rules)?.is_none());

        Ok(())
    }

    #[test]
    fn ties_keep_the_earliest_registered_rule() -> TestResult {
        // Both rules land on 90.00 TRY; insertion order decides.
        let mut book = DiscountBook::new();
        let first = book.insert(DiscountRule::automatic(
            "Önce",
            DiscountKind::PercentageOff(Percentage::from(0.10)),
            DiscountScope::AllProducts,
            window()?,
        ));
        book.insert(DiscountRule::automatic(
            "Sonra",
            DiscountKind::AmountOff(Money::from_minor(1_000, TRY)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let rules = book.active_at(mid_year()?);

        let snapshot = select_best_discount(
            ProductKey::default(),
            None,
            Money::from_minor(10_000, TRY),
            &rules,
        )?
        .ok_or("expected a discount")?;

        assert_eq!(snapshot.discount, first);

        Ok(())
    }

    #[test]
    fn fixed_amount_clamps_at_zero_and_derives_percent_points() -> TestResult {
        let mut book = DiscountBook::new();
        book.insert(DiscountRule::automatic(
            "Dev İndirim",
            DiscountKind::AmountOff(Money::from_minor(20_000, TRY)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let rules = book.active_at(mid_year()?);

        let snapshot = select_best_discount(
            ProductKey::default(),
            None,
            Money::from_minor(8_000, TRY),
            &rules,
        )?
        .ok_or("expected a discount")?;

        assert_eq!(snapshot.discounted_price, Money::from_minor(0, TRY));
        assert_eq!(snapshot.percent_points, Decimal::ONE_HUNDRED);

        Ok(())
    }

    #[test]
    fn derived_percent_points_round_to_whole_points() -> TestResult {
        // 10 TRY off 30 TRY = 33.33..% -> 33 points.
        let mut book = DiscountBook::new();
        book.insert(DiscountRule::automatic(
            "10 TL İndirim",
            DiscountKind::AmountOff(Money::from_minor(1_000, TRY)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let rules = book.active_at(mid_year()?);

        let snapshot = select_best_discount(
            ProductKey::default(),
            None,
            Money::from_minor(3_000, TRY),
            &rules,
        )?
        .ok_or("expected a discount")?;

        assert_eq!(snapshot.percent_points, Decimal::new(33, 0));

        Ok(())
    }

    #[test]
    fn percentage_rounds_half_away_from_zero_at_the_cent() -> TestResult {
        // 15% off 0.99 TRY: 99 - 14.85 -> 99 - 15 = 84 minor units.
        let mut book = DiscountBook::new();
        book.insert(DiscountRule::automatic(
            "%15",
            DiscountKind::PercentageOff(Percentage::from(0.15)),
            DiscountScope::AllProducts,
            window()?,
        ));

        let rules = book.active_at(mid_year()?);

        let snapshot =
            select_best_discount(ProductKey::default(), None, Money::from_minor(99, TRY), &rules)?
                .ok_or("expected a discount")?;

        assert_eq!(snapshot.discounted_price, Money::from_minor(84, TRY));

        Ok(())
    }

    #[test]
    fn min_cart_amount_condition_checks_gross() -> TestResult {
        let condition = DiscountCondition::MinCartAmount(Money::from_minor(50_000, TRY));

        assert!(condition.is_met_by(Money::from_minor(50_000, TRY)));
        assert!(!condition.is_met_by(Money::from_minor(49_999, TRY)));
        assert!(DiscountCondition::Unconditional.is_met_by(Money::from_minor(0, TRY)));

        Ok(())
    }

    #[test]
    fn percent_of_minor_overflow_returns_error() {
        let percent = Percentage::from(2.0);
        let result = percent_of_minor(&percent, i64::MAX);

        assert!(matches!(result, Err(DiscountError::PercentConversion)));
    }

    #[test]
    fn percent_of_minor_calculates_correctly() -> TestResult {
        let percent = Percentage::from(0.25);

        assert_eq!(percent_of_minor(&percent, 200)?, 50);

        Ok(())
    }
}
