//! The local cart mapping.

use std::collections::BTreeMap;

use crafted_chapter_core::ProductId;
use serde::{Deserialize, Serialize};

/// Mapping of product id to quantity.
///
/// Every quantity is at least 1: constructors drop non-positive entries, and
/// there are no public mutators. A product absent from the mapping has
/// quantity 0. Only the cart engine builds these, always from a server
/// payload or a stored snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ProductId, i64>", into = "BTreeMap<ProductId, u32>")]
pub struct CartItems(BTreeMap<ProductId, u32>);

impl CartItems {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from `(product, quantity)` lines.
    ///
    /// Lines for the same product are summed (saturating at `u32::MAX`);
    /// lines whose quantity is not positive are dropped.
    pub fn from_lines(lines: impl IntoIterator<Item = (ProductId, i64)>) -> Self {
        let mut totals: BTreeMap<ProductId, i64> = BTreeMap::new();
        for (product, quantity) in lines {
            if quantity > 0 {
                let total = totals.entry(product).or_default();
                *total = total.saturating_add(quantity);
            }
        }
        Self(
            totals
                .into_iter()
                .map(|(product, quantity)| (product, u32::try_from(quantity).unwrap_or(u32::MAX)))
                .collect(),
        )
    }

    /// Quantity of `product` (0 when absent).
    #[must_use]
    pub fn quantity(&self, product: &ProductId) -> u32 {
        self.0.get(product).copied().unwrap_or(0)
    }

    /// Whether `product` has a line.
    #[must_use]
    pub fn contains(&self, product: &ProductId) -> bool {
        self.0.contains_key(product)
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.0.values().map(|&q| u64::from(q)).sum()
    }

    /// Lines in product-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, u32)> {
        self.0.iter().map(|(product, &quantity)| (product, quantity))
    }
}

impl From<BTreeMap<ProductId, i64>> for CartItems {
    fn from(map: BTreeMap<ProductId, i64>) -> Self {
        Self::from_lines(map)
    }
}

impl From<CartItems> for BTreeMap<ProductId, u32> {
    fn from(items: CartItems) -> Self {
        items.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(s: &str) -> ProductId {
        ProductId::new(s)
    }

    #[test]
    fn test_drops_non_positive_quantities() {
        let items = CartItems::from_lines([(id("a"), 2), (id("b"), 0), (id("c"), -3)]);
        assert_eq!(items.len(), 1);
        assert_eq!(items.quantity(&id("a")), 2);
        assert_eq!(items.quantity(&id("b")), 0);
        assert!(!items.contains(&id("c")));
    }

    #[test]
    fn test_sums_duplicate_lines() {
        let items = CartItems::from_lines([(id("a"), 1), (id("a"), 2)]);
        assert_eq!(items.quantity(&id("a")), 3);
        assert_eq!(items.total_quantity(), 3);
    }

    #[test]
    fn test_huge_duplicate_lines_saturate() {
        let items = CartItems::from_lines([(id("a"), i64::MAX), (id("a"), 1), (id("a"), i64::MAX)]);
        assert_eq!(items.quantity(&id("a")), u32::MAX);
    }

    #[test]
    fn test_snapshot_json_drops_bad_entries() {
        let items: CartItems = serde_json::from_str(r#"{"a":2,"b":0,"c":-1}"#).unwrap();
        assert_eq!(serde_json::to_string(&items).unwrap(), r#"{"a":2}"#);
    }
}
