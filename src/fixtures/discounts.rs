//! Discount Fixtures

use serde::Deserialize;

use crate::{
    discounts::{Discount, DiscountId, DiscountType},
    fixtures::FixtureError,
    memory::StoredDiscount,
    products::ProductId,
};

/// Discount Fixture
#[derive(Debug, Deserialize)]
pub struct DiscountFixture {
    /// Discount id
    pub id: i64,

    /// Discount name
    pub name: String,

    /// `individual_item` or `for_all_item`
    #[serde(rename = "type")]
    pub kind: DiscountType,

    /// Whole percentage points, 0 to 100
    pub percentage: u8,

    /// Product id, for `individual_item` discounts
    #[serde(default)]
    pub product: Option<i64>,

    /// Whether the code can be redeemed
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl DiscountFixture {
    /// Convert into a stored discount with the given code
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::InvalidDiscount`] if the discount is malformed.
    pub fn into_stored(self, code: String) -> Result<StoredDiscount, FixtureError> {
        let discount = Discount::new(
            DiscountId::new(self.id),
            self.name,
            code.clone(),
            self.kind,
            self.percentage,
            self.product.map(ProductId::new),
        )
        .map_err(|source| FixtureError::InvalidDiscount { code, source })?;

        Ok(StoredDiscount {
            discount,
            active: self.active,
        })
    }
}
