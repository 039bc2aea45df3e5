//! Cart
//!
//! Client-held cart lines referencing catalog products by key and variant
//! selections by name. Stock-vs-quantity validation happens here, at
//! mutation time; the order composer re-checks it before composing totals.

use rusty_money::iso::Currency;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    catalog::{Catalog, LengthChoice, Product, ProductKey, ProductOption},
    variants::VariantKey,
};

/// Errors raised while mutating or resolving a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// Quantity must be at least one.
    #[error("quantity must be at least one")]
    ZeroQuantity,

    /// Referenced product is not in the catalog.
    #[error("product is not in the catalog")]
    UnknownProduct(ProductKey),

    /// Product's currency differs from the cart currency.
    #[error("product {product} is priced in {actual}, but the cart uses {expected}")]
    CurrencyMismatch {
        /// Product name.
        product: String,

        /// Cart currency code.
        expected: &'static str,

        /// Product currency code.
        actual: &'static str,
    },

    /// Selected variant does not exist on the product.
    #[error("product {product} has no variant {variant}")]
    UnknownVariant {
        /// Product name.
        product: String,

        /// Composite variant name.
        variant: String,
    },

    /// Selected length does not exist on the product.
    #[error("product {product} has no length {length}")]
    UnknownLength {
        /// Product name.
        product: String,

        /// Length name.
        length: String,
    },

    /// Selected option does not exist on the product.
    #[error("product {product} has no option {option}")]
    UnknownOption {
        /// Product name.
        product: String,

        /// Option name.
        option: String,
    },

    /// Requested quantity exceeds the variant's stock.
    #[error("variant {variant} has {available} in stock, requested {requested}")]
    InsufficientStock {
        /// Composite variant name.
        variant: String,

        /// Quantity requested (including any merged line).
        requested: u32,

        /// Stock available for the variant.
        available: u32,
    },

    /// No line matches the given selection.
    #[error("no cart line matches the given selection")]
    LineNotFound,
}

/// One product + variant selection + quantity within a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Referenced product.
    pub product: ProductKey,

    /// Chosen variant.
    pub variant: VariantKey,

    /// Chosen length name, if any.
    pub length: Option<String>,

    /// Chosen option names.
    pub options: SmallVec<[String; 2]>,

    /// Positive quantity.
    pub quantity: u32,
}

impl CartLine {
    /// Create a line with no length or options.
    #[must_use]
    pub fn new(product: ProductKey, variant: VariantKey, quantity: u32) -> Self {
        Self {
            product,
            variant,
            length: None,
            options: SmallVec::new(),
            quantity,
        }
    }

    /// Lines merge when they share product, variant and length.
    fn matches_selection(
        &self,
        product: ProductKey,
        variant: &VariantKey,
        length: Option<&str>,
    ) -> bool {
        self.product == product && self.variant == *variant && self.length.as_deref() == length
    }
}

/// A cart line resolved against the catalog.
#[derive(Debug)]
pub struct ResolvedLine<'c, 'a> {
    /// Referenced product key.
    pub key: ProductKey,

    /// Referenced product.
    pub product: &'c Product<'a>,

    /// Resolved length choice, if one was selected.
    pub length: Option<&'c LengthChoice<'a>>,

    /// Resolved options.
    pub options: SmallVec<[&'c ProductOption<'a>; 2]>,

    /// Line quantity.
    pub quantity: u32,

    /// Stock available for the chosen variant at resolution time.
    pub available_stock: u32,
}

/// Cart
#[derive(Debug)]
pub struct Cart {
    lines: Vec<CartLine>,
    currency: &'static Currency,
}

impl Cart {
    /// Create an empty cart in the given currency.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            lines: Vec::new(),
            currency,
        }
    }

    /// Add a line, validating it against the catalog.
    ///
    /// A line with the same product, variant and length as an existing one
    /// merges into it by summing quantities; the merged quantity must still
    /// fit the variant's stock.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the quantity is zero, the product or any
    /// selection name does not resolve, the product's currency differs from
    /// the cart's, or stock is insufficient.
    pub fn add(&mut self, catalog: &Catalog<'_>, line: CartLine) -> Result<(), CartError> {
        if line.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        let resolved = resolve_line(catalog, &line, self.currency)?;

        let merged_quantity = self
            .lines
            .iter()
            .find(|existing| {
                existing.matches_selection(line.product, &line.variant, line.length.as_deref())
            })
            .map_or(line.quantity, |existing| {
                existing.quantity.saturating_add(line.quantity)
            });

        if merged_quantity > resolved.available_stock {
            return Err(CartError::InsufficientStock {
                variant: line.variant.composite(),
                requested: merged_quantity,
                available: resolved.available_stock,
            });
        }

        match self.lines.iter_mut().find(|existing| {
            existing.matches_selection(line.product, &line.variant, line.length.as_deref())
        }) {
            Some(existing) => existing.quantity = merged_quantity,
            None => self.lines.push(line),
        }

        Ok(())
    }

    /// Replace the quantity of an existing line, validating against stock.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the quantity is zero, no line matches, or
    /// stock is insufficient.
    pub fn set_quantity(
        &mut self,
        catalog: &Catalog<'_>,
        product: ProductKey,
        variant: &VariantKey,
        length: Option<&str>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        let line = self
            .lines
            .iter_mut()
            .find(|line| line.matches_selection(product, variant, length))
            .ok_or(CartError::LineNotFound)?;

        let probe = CartLine {
            quantity,
            ..line.clone()
        };
        let resolved = resolve_line(catalog, &probe, self.currency)?;

        if quantity > resolved.available_stock {
            return Err(CartError::InsufficientStock {
                variant: variant.composite(),
                requested: quantity,
                available: resolved.available_stock,
            });
        }

        line.quantity = quantity;

        Ok(())
    }

    /// Remove the line matching the selection, if present.
    pub fn remove(&mut self, product: ProductKey, variant: &VariantKey, length: Option<&str>) {
        self.lines
            .retain(|line| !line.matches_selection(product, variant, length));
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// The lines currently in the cart.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity))
            .sum()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The cart currency.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Resolve every line against the catalog.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if any line no longer resolves (product
    /// removed, selection renamed, currency changed).
    pub fn resolve<'c, 'a>(
        &self,
        catalog: &'c Catalog<'a>,
    ) -> Result<Vec<ResolvedLine<'c, 'a>>, CartError> {
        self.lines
            .iter()
            .map(|line| resolve_line(catalog, line, self.currency))
            .collect()
    }
}

/// Resolve one line's references by name against the catalog.
fn resolve_line<'c, 'a>(
    catalog: &'c Catalog<'a>,
    line: &CartLine,
    currency: &'static Currency,
) -> Result<ResolvedLine<'c, 'a>, CartError> {
    let product = catalog
        .get(line.product)
        .ok_or(CartError::UnknownProduct(line.product))?;

    let product_currency = product.base_price.currency();
    if product_currency != currency {
        return Err(CartError::CurrencyMismatch {
            product: product.name.clone(),
            expected: currency.iso_alpha_code,
            actual: product_currency.iso_alpha_code,
        });
    }

    let available_stock =
        product
            .variants
            .stock_of(&line.variant)
            .ok_or_else(|| CartError::UnknownVariant {
                product: product.name.clone(),
                variant: line.variant.composite(),
            })?;

    let length = line
        .length
        .as_deref()
        .map(|name| {
            product.length_named(name).ok_or_else(|| CartError::UnknownLength {
                product: product.name.clone(),
                length: name.to_string(),
            })
        })
        .transpose()?;

    let options = line
        .options
        .iter()
        .map(|name| {
            product
                .option_named(name)
                .ok_or_else(|| CartError::UnknownOption {
                    product: product.name.clone(),
                    option: name.clone(),
                })
        })
        .collect::<Result<SmallVec<[&ProductOption<'a>; 2]>, CartError>>()?;

    Ok(ResolvedLine {
        key: line.product,
        product,
        length,
        options,
        quantity: line.quantity,
        available_stock,
    })
}
