//! Line Price Assembly
//!
//! Computes the pre-discount unit price of one cart line: base price, plus
//! the chosen length's signed adjustment, plus each selected option's price.

use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::catalog::{LengthChoice, Product, ProductOption};

/// Errors that can occur while assembling a unit price.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Assemble the pre-discount unit price for a product with the given
/// selections.
///
/// Absent selections contribute nothing; options are additive and
/// independent, so their order is immaterial. No clamping is performed —
/// keeping component prices non-negative is the catalog owner's concern.
///
/// # Errors
///
/// Returns [`PricingError::Money`] if the add-on currencies do not match the
/// product's base price currency.
pub fn assemble_unit_price<'a>(
    product: &Product<'a>,
    length: Option<&LengthChoice<'a>>,
    options: &[&ProductOption<'a>],
) -> Result<Money<'a, Currency>, PricingError> {
    let mut price = product.base_price;

    if let Some(length) = length {
        price = price.add(length.adjustment)?;
    }

    for option in options {
        price = price.add(option.price)?;
    }

    Ok(price)
}
