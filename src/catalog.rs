//! Catalog
//!
//! Read-only product records as consumed by the pricing engine: base price,
//! VAT rate, variant stock matrix, and the length/option add-ons a customer
//! can select.

use rusty_money::{Money, iso::Currency};
use slotmap::{SlotMap, new_key_type};

use crate::{variants::VariantMatrix, vat::VatRate};

new_key_type! {
    /// Product Key
    pub struct ProductKey;

    /// Category Key
    pub struct CategoryKey;
}

/// Product catalog keyed by [`ProductKey`].
pub type Catalog<'a> = SlotMap<ProductKey, Product<'a>>;

/// A selectable length with a signed price adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthChoice<'a> {
    /// Length name (e.g. "120 cm").
    pub name: String,

    /// Signed delta added to the base price when this length is chosen.
    pub adjustment: Money<'a, Currency>,
}

/// An additional option with a non-negative price (e.g. a matching shawl).
#[derive(Debug, Clone, PartialEq)]
pub struct ProductOption<'a> {
    /// Option name.
    pub name: String,

    /// Price added when this option is selected.
    pub price: Money<'a, Currency>,
}

/// Product
#[derive(Debug, Clone)]
pub struct Product<'a> {
    /// Product name
    pub name: String,

    /// Category used for discount scope matching, if any.
    pub category: Option<CategoryKey>,

    /// Tax-inclusive base price before add-ons and discounts.
    pub base_price: Money<'a, Currency>,

    /// VAT rate applied to this product's line totals.
    pub vat_rate: VatRate,

    /// Stock-tracked variant combinations.
    pub variants: VariantMatrix,

    /// Selectable lengths.
    pub lengths: Vec<LengthChoice<'a>>,

    /// Selectable options.
    pub options: Vec<ProductOption<'a>>,
}

impl<'a> Product<'a> {
    /// Create a product with no category, variants or add-ons and the
    /// standard VAT rate.
    pub fn new(name: impl Into<String>, base_price: Money<'a, Currency>) -> Self {
        Self {
            name: name.into(),
            category: None,
            base_price,
            vat_rate: VatRate::standard(),
            variants: VariantMatrix::new(),
            lengths: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Look up a length choice by name.
    #[must_use]
    pub fn length_named(&self, name: &str) -> Option<&LengthChoice<'a>> {
        self.lengths.iter().find(|length| length.name == name)
    }

    /// Look up an option by name.
    #[must_use]
    pub fn option_named(&self, name: &str) -> Option<&ProductOption<'a>> {
        self.options.iter().find(|option| option.name == name)
    }

    /// Total stock across every variant.
    #[must_use]
    pub fn total_stock(&self) -> u64 {
        self.variants.total_stock()
    }
}
