//! Çarşı
//!
//! Çarşı is a pricing engine for a clothing storefront: it assembles line
//! prices from base prices and selected add-ons, picks the single best
//! applicable discount per line, splits tax-inclusive totals into net and
//! VAT, computes shipping fees and composes full order totals.

pub mod cart;
pub mod catalog;
pub mod discounts;
pub mod fixtures;
pub mod pricing;
pub mod shipping;
pub mod summary;
pub mod totals;
pub mod variants;
pub mod vat;
