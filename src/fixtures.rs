//! Fixtures
//!
//! YAML-backed catalog, discount and shipping configuration for tests and
//! demos. Prices are written as `"AMOUNT CURRENCY"` strings and discount
//! values as either a percentage (`"15%"`) or a fixed amount (`"25 TRY"`).

use std::{fs, path::PathBuf};

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, TRY, USD},
};
use serde::Deserialize;
use slotmap::SlotMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    catalog::{Catalog, CategoryKey, LengthChoice, Product, ProductKey, ProductOption},
    discounts::{
        ActiveWindow, DiscountBook, DiscountCondition, DiscountKey, DiscountKind, DiscountMethod,
        DiscountRule, DiscountScope, WindowError,
    },
    shipping::ShippingPolicy,
    variants::VariantMatrix,
    vat::{VatError, VatRate},
};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Invalid timestamp format
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(#[from] jiff::Error),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Unknown discount method
    #[error("Unknown discount method: {0}")]
    UnknownMethod(String),

    /// Unknown discount scope
    #[error("Unknown discount scope: {0}")]
    UnknownScope(String),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Invalid VAT rate
    #[error(transparent)]
    Vat(#[from] VatError),

    /// Invalid validity window
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Currency mismatch between products
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// No products loaded yet
    #[error("No products loaded yet; currency unknown")]
    NoCurrency,
}

/// Wrapper for products in YAML
#[derive(Debug, Deserialize)]
pub struct ProductsFixture {
    /// Map of product key -> product fixture
    pub products: FxHashMap<String, ProductFixture>,
}

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Category name, interned on first use
    #[serde(default)]
    pub category: Option<String>,

    /// Tax-inclusive base price (e.g., "299.90 TRY")
    pub price: String,

    /// VAT rate in percent points; defaults to the standard rate
    #[serde(default)]
    pub vat_rate: Option<Decimal>,

    /// Variant entries in flat storage form
    #[serde(default)]
    pub variants: Vec<VariantFixture>,

    /// Selectable lengths
    #[serde(default)]
    pub lengths: Vec<AddOnFixture>,

    /// Selectable options
    #[serde(default)]
    pub options: Vec<AddOnFixture>,
}

/// One variant entry of a product fixture
#[derive(Debug, Deserialize)]
pub struct VariantFixture {
    /// Composite variant name (e.g. "M | Siyah")
    pub name: String,

    /// Stock level
    pub stock: u32,
}

/// A length or option entry of a product fixture
#[derive(Debug, Deserialize)]
pub struct AddOnFixture {
    /// Add-on name
    pub name: String,

    /// Price or signed adjustment (e.g., "-50 TRY")
    pub price: String,
}

/// Wrapper for discounts in YAML
///
/// Discounts are a list, not a map: their file order becomes registration
/// order, which decides ties between equally good rules.
#[derive(Debug, Deserialize)]
pub struct DiscountsFixture {
    /// Discount fixtures in registration order
    pub discounts: Vec<DiscountFixture>,
}

/// Discount Fixture
#[derive(Debug, Deserialize)]
pub struct DiscountFixture {
    /// Lookup key for tests
    pub key: String,

    /// Display name
    pub name: String,

    /// Reduction: a percentage ("15%") or a fixed amount ("25 TRY")
    pub value: String,

    /// "automatic" (default) or "coupon_code"
    #[serde(default)]
    pub method: Option<String>,

    /// "all" (default), "categories" or "products"
    #[serde(default)]
    pub applies_to: Option<String>,

    /// Category names or product keys, depending on `applies_to`
    #[serde(default)]
    pub targets: Vec<String>,

    /// Minimum pre-discount cart gross (e.g., "500 TRY")
    #[serde(default)]
    pub min_cart_amount: Option<String>,

    /// Window start (RFC 3339)
    pub starts_at: String,

    /// Window end (RFC 3339)
    pub ends_at: String,

    /// Admin switch; defaults to enabled
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Fixture
#[derive(Debug)]
pub struct Fixture<'a> {
    /// Base path for fixture files
    base_path: PathBuf,

    catalog: Catalog<'a>,
    categories: SlotMap<CategoryKey, String>,
    discounts: DiscountBook<'a>,
    shipping: ShippingPolicy,

    /// String key -> `SlotMap` key mappings for lookups
    product_keys: FxHashMap<String, ProductKey>,
    category_keys: FxHashMap<String, CategoryKey>,
    discount_keys: FxHashMap<String, DiscountKey>,

    /// Currency for the fixture set
    currency: Option<&'static Currency>,
}

impl<'a> Fixture<'a> {
    /// Create a new empty fixture with default base path
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            catalog: SlotMap::with_key(),
            categories: SlotMap::with_key(),
            discounts: DiscountBook::new(),
            shipping: ShippingPolicy::default(),
            product_keys: FxHashMap::default(),
            category_keys: FxHashMap::default(),
            discount_keys: FxHashMap::default(),
            currency: None,
        }
    }

    /// Load products from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if there are
    /// currency mismatches.
    pub fn load_products(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("products").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: ProductsFixture = serde_norway::from_str(&contents)?;

        for (key, product_fixture) in fixture.products {
            let (minor_units, currency) = parse_price(&product_fixture.price)?;

            if let Some(existing_currency) = self.currency {
                if existing_currency != currency {
                    return Err(FixtureError::CurrencyMismatch(
                        existing_currency.iso_alpha_code.to_string(),
                        currency.iso_alpha_code.to_string(),
                    ));
                }
            } else {
                self.currency = Some(currency);
            }

            let mut product =
                Product::new(product_fixture.name, Money::from_minor(minor_units, currency));

            product.category = product_fixture
                .category
                .map(|name| self.intern_category(&name));

            if let Some(rate) = product_fixture.vat_rate {
                product.vat_rate = VatRate::new(rate)?;
            }

            product.variants = VariantMatrix::from_entries(
                &product_fixture
                    .variants
                    .iter()
                    .map(|entry| (entry.name.as_str(), entry.stock))
                    .collect::<Vec<_>>(),
            );

            product.lengths = product_fixture
                .lengths
                .into_iter()
                .map(|entry| {
                    let (minor, add_on_currency) = parse_price(&entry.price)?;
                    Ok(LengthChoice {
                        name: entry.name,
                        adjustment: Money::from_minor(minor, add_on_currency),
                    })
                })
                .collect::<Result<_, FixtureError>>()?;

            product.options = product_fixture
                .options
                .into_iter()
                .map(|entry| {
                    let (minor, add_on_currency) = parse_price(&entry.price)?;
                    Ok(ProductOption {
                        name: entry.name,
                        price: Money::from_minor(minor, add_on_currency),
                    })
                })
                .collect::<Result<_, FixtureError>>()?;

            let product_key = self.catalog.insert(product);
            self.product_keys.insert(key, product_key);
        }

        Ok(self)
    }

    /// Load discount rules from a YAML fixture file
    ///
    /// Products referenced by product-scoped rules must be loaded first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a rule
    /// references an unknown product.
    pub fn load_discounts(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("discounts").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: DiscountsFixture = serde_norway::from_str(&contents)?;

        for discount_fixture in fixture.discounts {
            let rule = self.build_rule(&discount_fixture)?;
            let key = self.discounts.insert(rule);

            self.discount_keys.insert(discount_fixture.key, key);
        }

        Ok(self)
    }

    /// Load the shipping policy from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_shipping(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("shipping").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;

        self.shipping = ShippingPolicy::from_yaml(&contents)?;

        Ok(self)
    }

    /// Load a complete fixture set (products, discounts and shipping with the
    /// same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture
            .load_products(name)?
            .load_discounts(name)?
            .load_shipping(name)?;

        Ok(fixture)
    }

    fn intern_category(&mut self, name: &str) -> CategoryKey {
        if let Some(key) = self.category_keys.get(name) {
            return *key;
        }

        let key = self.categories.insert(name.to_string());
        self.category_keys.insert(name.to_string(), key);

        key
    }

    fn build_rule(&mut self, fixture: &DiscountFixture) -> Result<DiscountRule<'a>, FixtureError> {
        let kind = parse_discount_value(&fixture.value)?;

        let method = match fixture.method.as_deref() {
            None | Some("automatic") => DiscountMethod::Automatic,
            Some("coupon_code") => DiscountMethod::CouponCode,
            Some(other) => return Err(FixtureError::UnknownMethod(other.to_string())),
        };

        let scope = match fixture.applies_to.as_deref() {
            None | Some("all") => DiscountScope::AllProducts,
            Some("categories") => DiscountScope::Categories(
                fixture
                    .targets
                    .iter()
                    .map(|name| self.intern_category(name))
                    .collect(),
            ),
            Some("products") => DiscountScope::Products(
                fixture
                    .targets
                    .iter()
                    .map(|key| {
                        self.product_keys
                            .get(key)
                            .copied()
                            .ok_or_else(|| FixtureError::ProductNotFound(key.clone()))
                    })
                    .collect::<Result<SmallVec<_>, FixtureError>>()?,
            ),
            Some(other) => return Err(FixtureError::UnknownScope(other.to_string())),
        };

        let condition = match &fixture.min_cart_amount {
            Some(amount) => {
                let (minor, currency) = parse_price(amount)?;
                DiscountCondition::MinCartAmount(Money::from_minor(minor, currency))
            }
            None => DiscountCondition::Unconditional,
        };

        let window = ActiveWindow::new(
            fixture.starts_at.parse::<Timestamp>()?,
            fixture.ends_at.parse::<Timestamp>()?,
        )?;

        Ok(DiscountRule {
            name: fixture.name.clone(),
            method,
            kind,
            scope,
            condition,
            window,
            is_active: fixture.active,
        })
    }

    /// Get a product by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn product(&self, key: &str) -> Result<&Product<'a>, FixtureError> {
        let product_key = self.product_key(key)?;

        self.catalog
            .get(product_key)
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Get a product key by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found.
    pub fn product_key(&self, key: &str) -> Result<ProductKey, FixtureError> {
        self.product_keys
            .get(key)
            .copied()
            .ok_or_else(|| FixtureError::ProductNotFound(key.to_string()))
    }

    /// Get a category key by name, if any product or rule referenced it
    #[must_use]
    pub fn category_key(&self, name: &str) -> Option<CategoryKey> {
        self.category_keys.get(name).copied()
    }

    /// Get a discount key by its string key
    #[must_use]
    pub fn discount_key(&self, key: &str) -> Option<DiscountKey> {
        self.discount_keys.get(key).copied()
    }

    /// The loaded catalog
    #[must_use]
    pub fn catalog(&self) -> &Catalog<'a> {
        &self.catalog
    }

    /// The loaded discount registry
    #[must_use]
    pub fn discounts(&self) -> &DiscountBook<'a> {
        &self.discounts
    }

    /// The loaded shipping policy
    #[must_use]
    pub fn shipping(&self) -> &ShippingPolicy {
        &self.shipping
    }

    /// Get the currency
    ///
    /// # Errors
    ///
    /// Returns an error if no products have been loaded yet.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoCurrency)
    }
}

impl Default for Fixture<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse price string (e.g., "2.99 TRY") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount cannot be parsed as a decimal, or if the currency code
/// is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    if parts.len() != 2 {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    }

    let amount = parts
        .first()
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let minor_units = amount
        .checked_mul(Decimal::new(100, 0))
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    let currency_code = parts
        .get(1)
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = match *currency_code {
        "TRY" => TRY,
        "GBP" => GBP,
        "USD" => USD,
        "EUR" => EUR,
        other => return Err(FixtureError::UnknownCurrency(other.to_string())),
    };

    Ok((minor_units, currency))
}

/// Parse percentage string (e.g., "15%" or "0.15") into a `Percentage`
///
/// Accepts two formats:
/// - Percentage format: "15%" for 15%
/// - Decimal format: "0.15" for 15%
///
/// # Errors
///
/// Returns an error if the string cannot be parsed or if the value is invalid.
pub fn parse_percentage(s: &str) -> Result<Percentage, FixtureError> {
    let trimmed = s.trim();

    if let Some(percent_str) = trimmed.strip_suffix('%') {
        let value = percent_str
            .trim()
            .parse::<f64>()
            .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()))?;

        // Convert from percent points to a fraction (15 -> 0.15)
        Ok(Percentage::from(value / 100.0))
    } else {
        let value = trimmed
            .parse::<f64>()
            .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()))?;

        Ok(Percentage::from(value))
    }
}

/// Parse a discount value: a percentage ("15%") or a fixed amount ("25 TRY").
///
/// # Errors
///
/// Returns an error if the string parses as neither format.
pub fn parse_discount_value(s: &str) -> Result<DiscountKind<'static>, FixtureError> {
    if s.trim().ends_with('%') {
        Ok(DiscountKind::PercentageOff(parse_percentage(s)?))
    } else {
        let (minor, currency) = parse_price(s)?;

        Ok(DiscountKind::AmountOff(Money::from_minor(minor, currency)))
    }
}
