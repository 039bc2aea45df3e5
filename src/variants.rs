//! Variant Matrix
//!
//! Stock-tracked variant combinations for a product. A variant is a choice of
//! one or two named attributes (e.g. size, or size and colour). Storage
//! systems flatten dual-attribute variants into a composite string key joined
//! by `" | "`; that encoding is parsed and serialized here, at the boundary,
//! and never leaks into pricing logic.

use rustc_hash::FxHashMap;

/// Separator used by the flat storage encoding of dual-attribute variants.
pub const COMPOSITE_SEPARATOR: &str = " | ";

/// A specific choice of one or two variant attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    primary: String,
    secondary: Option<String>,
}

impl VariantKey {
    /// A single-attribute variant (e.g. just a size).
    pub fn single(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
        }
    }

    /// A dual-attribute variant (e.g. size and colour).
    pub fn dual(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Some(secondary.into()),
        }
    }

    /// Parse the flat storage form, splitting on the composite separator.
    ///
    /// `"M"` parses as a single-attribute variant; `"M | Red"` as dual.
    #[must_use]
    pub fn parse_composite(raw: &str) -> Self {
        match raw.split_once(COMPOSITE_SEPARATOR) {
            Some((primary, secondary)) => Self::dual(primary.trim(), secondary.trim()),
            None => Self::single(raw.trim()),
        }
    }

    /// Serialize back to the flat storage form.
    #[must_use]
    pub fn composite(&self) -> String {
        match &self.secondary {
            Some(secondary) => format!("{}{COMPOSITE_SEPARATOR}{secondary}", self.primary),
            None => self.primary.clone(),
        }
    }

    /// First attribute value.
    #[must_use]
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Second attribute value, if the variant has two dimensions.
    #[must_use]
    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }
}

/// Per-variant stock levels for one product.
///
/// Entries keep their insertion order so the flat storage form round-trips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantMatrix {
    stock: FxHashMap<VariantKey, u32>,
    order: Vec<VariantKey>,
}

impl VariantMatrix {
    /// An empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matrix from flat storage entries of `(composite name, stock)`.
    ///
    /// Duplicate names overwrite earlier stock values, keeping the first
    /// position.
    #[must_use]
    pub fn from_entries<S: AsRef<str>>(entries: &[(S, u32)]) -> Self {
        let mut matrix = Self::new();

        for (name, stock) in entries {
            matrix.set_stock(VariantKey::parse_composite(name.as_ref()), *stock);
        }

        matrix
    }

    /// Set the stock level for a variant, inserting it if absent.
    pub fn set_stock(&mut self, key: VariantKey, stock: u32) {
        if self.stock.insert(key.clone(), stock).is_none() {
            self.order.push(key);
        }
    }

    /// Stock level for a variant, or `None` if the product has no such variant.
    #[must_use]
    pub fn stock_of(&self, key: &VariantKey) -> Option<u32> {
        self.stock.get(key).copied()
    }

    /// Sum of stock across every variant.
    #[must_use]
    pub fn total_stock(&self) -> u64 {
        self.stock.values().map(|stock| u64::from(*stock)).sum()
    }

    /// Number of distinct variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the product has no variants at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Serialize back to flat storage entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, u32)> {
        self.order
            .iter()
            .map(|key| (key.composite(), self.stock.get(key).copied().unwrap_or(0)))
            .collect()
    }
}
