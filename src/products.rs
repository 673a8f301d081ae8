//! Products

use rusty_money::{Money, iso::Currency};

use crate::ids::TypedId;

/// Monetary amount in a single ISO currency
pub type Amount = Money<'static, Currency>;

/// Product Id
pub type ProductId = TypedId<Product>;

/// Product record as supplied by the catalog.
///
/// A cart keeps its own copy of this record from the moment the product was
/// added, so `stock` here is a point-in-time figure and only advisory.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Product id
    pub id: ProductId,

    /// Display name
    pub name: String,

    /// Unit price
    pub price: Amount,

    /// Units available when the record was fetched
    pub stock: u32,

    /// Quantity threshold of the bundle tier, `0` when the product has none
    pub bundle_quantity: u32,

    /// Per-unit price inside the bundle tier
    pub bundle_price: Amount,
}

impl Product {
    /// Create a product without a bundle tier
    pub fn new(id: ProductId, name: impl Into<String>, price: Amount, stock: u32) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock,
            bundle_quantity: 0,
            bundle_price: Money::from_minor(0, price.currency()),
        }
    }

    /// Attach a bundle tier: `quantity` or more units are priced at `price` each.
    #[must_use]
    pub fn with_bundle(mut self, quantity: u32, price: Amount) -> Self {
        self.bundle_quantity = quantity;
        self.bundle_price = price;
        self
    }

    /// Currency the product is priced in
    pub fn currency(&self) -> &'static Currency {
        self.price.currency()
    }

    /// Whether any units can be sold
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// The bundle tier as `(threshold, per-unit price)`, when it is configured.
    ///
    /// A tier only counts as configured when both the threshold and the
    /// bundle price are positive.
    pub fn bundle_tier(&self) -> Option<(u32, Amount)> {
        (self.bundle_quantity > 0 && self.bundle_price.to_minor_units() > 0)
            .then_some((self.bundle_quantity, self.bundle_price))
    }

    /// Whether the bundle tier is priced above the unit price.
    ///
    /// Such a product charges more for bulk purchases. It is reported, not
    /// corrected.
    pub fn has_inverted_bundle(&self) -> bool {
        self.bundle_tier()
            .is_some_and(|(_, bundle_price)| {
                bundle_price.to_minor_units() > self.price.to_minor_units()
            })
    }
}
