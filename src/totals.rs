//! Order Totals
//!
//! Composes the persisted amounts of an order from a resolved cart: per-line
//! assembled prices, the best applicable discount per line, the VAT split of
//! each line total, the shipping fee, and the grand total.

use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::{
    cart::{Cart, CartError, ResolvedLine},
    catalog::Catalog,
    discounts::{DiscountError, DiscountKey, DiscountRule, DiscountSnapshot, select_best_discount},
    pricing::{PricingError, assemble_unit_price},
    shipping::ShippingPolicy,
    vat::{VatBreakdown, VatError},
};

/// Errors raised while composing order totals.
#[derive(Debug, Error)]
pub enum TotalsError {
    /// A cart line no longer resolves against the catalog.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// A unit price could not be assembled.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// A discount calculation failed.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// A VAT decomposition failed.
    #[error(transparent)]
    Vat(#[from] VatError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// A line or order amount exceeded the representable range.
    #[error("order amount exceeded the representable range")]
    AmountOverflow,
}

/// One priced order line, frozen at composition time.
#[derive(Debug)]
pub struct OrderLine<'a> {
    /// Product display name.
    pub product_name: String,

    /// Line quantity.
    pub quantity: u32,

    /// Assembled pre-discount unit price (base price plus add-ons).
    pub unit_price: Money<'a, Currency>,

    /// The discount applied to the unit price, if any rule improved on it.
    pub discount: Option<DiscountSnapshot<'a>>,

    /// Post-discount unit price times quantity, tax inclusive.
    pub line_total: Money<'a, Currency>,

    /// Net/VAT split of the line total at the product's rate.
    pub vat: VatBreakdown<'a>,
}

/// The composed amounts persisted on an order.
#[derive(Debug)]
pub struct OrderTotals<'a> {
    /// Priced lines in cart order.
    pub lines: Vec<OrderLine<'a>>,

    /// Sum of line net amounts (tax exclusive).
    pub subtotal: Money<'a, Currency>,

    /// Sum of line VAT amounts.
    pub total_vat: Money<'a, Currency>,

    /// Total reduction relative to undiscounted line totals.
    pub total_discount: Money<'a, Currency>,

    /// Delivery fee on the post-discount gross.
    pub shipping: Money<'a, Currency>,

    /// Subtotal plus VAT plus shipping.
    pub grand_total: Money<'a, Currency>,
}

/// Compose the amounts an order would be persisted with.
///
/// The composition is a pure function of its inputs: resolving the same cart
/// against the same catalog, rules and policy always yields the same totals.
/// `rules` should already be filtered to the rules active at checkout time
/// (see [`crate::discounts::DiscountBook::active_automatic`]); cart-level
/// conditions are checked here, against the pre-discount gross of the whole
/// cart. An empty cart composes to all-zero totals with no shipping fee.
///
/// # Errors
///
/// Returns a [`TotalsError`] if a line no longer resolves, a requested
/// quantity exceeds current stock, or an amount calculation fails.
pub fn compose_order_totals<'a>(
    cart: &Cart,
    catalog: &Catalog<'a>,
    rules: &[(DiscountKey, &DiscountRule<'a>)],
    policy: &ShippingPolicy,
) -> Result<OrderTotals<'a>, TotalsError> {
    let currency = cart.currency();
    let zero = Money::from_minor(0, currency);

    if cart.is_empty() {
        return Ok(OrderTotals {
            lines: Vec::new(),
            subtotal: zero,
            total_vat: zero,
            total_discount: zero,
            shipping: zero,
            grand_total: zero,
        });
    }

    let resolved = cart.resolve(catalog)?;

    // Stock may have drained since the lines were added.
    for line in &resolved {
        if line.quantity > line.available_stock {
            return Err(TotalsError::Cart(CartError::InsufficientStock {
                variant: line.product.name.clone(),
                requested: line.quantity,
                available: line.available_stock,
            }));
        }
    }

    let unit_prices = resolved
        .iter()
        .map(|line| Ok(assemble_unit_price(line.product, line.length, &line.options)?))
        .collect::<Result<Vec<_>, TotalsError>>()?;

    // Cart-level conditions are gated against the gross the customer would
    // pay before any discount, so a rule cannot disqualify itself by the
    // very reduction it grants.
    let pre_discount_gross = resolved
        .iter()
        .zip(&unit_prices)
        .try_fold(zero, |total, (line, unit_price)| {
            total
                .add(times_quantity(*unit_price, line.quantity)?)
                .map_err(TotalsError::from)
        })?;

    let eligible: Vec<(DiscountKey, &DiscountRule<'a>)> = rules
        .iter()
        .filter(|(_, rule)| rule.condition.is_met_by(pre_discount_gross))
        .copied()
        .collect();

    let mut lines = Vec::with_capacity(resolved.len());
    let mut subtotal = zero;
    let mut total_vat = zero;
    let mut total_discount = zero;
    let mut gross_total = zero;

    for (line, unit_price) in resolved.iter().zip(&unit_prices) {
        let priced = price_line(line, *unit_price, &eligible)?;

        subtotal = subtotal.add(priced.vat.net)?;
        total_vat = total_vat.add(priced.vat.vat)?;
        gross_total = gross_total.add(priced.line_total)?;

        let undiscounted = times_quantity(*unit_price, line.quantity)?;
        total_discount = total_discount.add(undiscounted.sub(priced.line_total)?)?;

        lines.push(priced);
    }

    let shipping = policy.compute(cart.total_quantity(), gross_total);
    let grand_total = gross_total.add(shipping)?;

    Ok(OrderTotals {
        lines,
        subtotal,
        total_vat,
        total_discount,
        shipping,
        grand_total,
    })
}

/// Price one resolved line: pick its best discount, extend by quantity and
/// split out the VAT.
fn price_line<'a>(
    line: &ResolvedLine<'_, 'a>,
    unit_price: Money<'a, Currency>,
    eligible: &[(DiscountKey, &DiscountRule<'a>)],
) -> Result<OrderLine<'a>, TotalsError> {
    let discount = select_best_discount(line.key, line.product.category, unit_price, eligible)?;

    let effective_unit = discount
        .as_ref()
        .map_or(unit_price, |snapshot| snapshot.discounted_price);

    let line_total = times_quantity(effective_unit, line.quantity)?;
    let vat = line.product.vat_rate.decompose(line_total)?;

    Ok(OrderLine {
        product_name: line.product.name.clone(),
        quantity: line.quantity,
        unit_price,
        discount,
        line_total,
        vat,
    })
}

/// Multiply a unit amount by a line quantity in minor units.
fn times_quantity<'a>(
    unit: Money<'a, Currency>,
    quantity: u32,
) -> Result<Money<'a, Currency>, TotalsError> {
    let minor = unit
        .to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(TotalsError::AmountOverflow)?;

    Ok(Money::from_minor(minor, unit.currency()))
}
