//! Discounts
//!
//! Percentage discounts looked up by code. A discount either covers the
//! whole order or only the lines of one product.

use async_trait::async_trait;
use decimal_percentage::Percentage;
use mockall::automock;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::Deserialize;
use thiserror::Error;

use crate::{ids::TypedId, products::ProductId};

pub mod resolver;

pub use resolver::{DiscountResolver, DiscountStatus};

/// Discount Id
pub type DiscountId = TypedId<Discount>;

/// Highest accepted percentage
const MAX_PERCENTAGE: u8 = 100;

/// Discount type as stored by the discount provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Applies to the lines of a single product
    IndividualItem,

    /// Applies to the whole order
    ForAllItem,
}

/// Which part of an order a discount reduces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountScope {
    /// Every line
    AllItems,

    /// Only lines of this product
    Product(ProductId),
}

/// Errors raised when building a [`Discount`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidDiscount {
    /// Percentage above 100
    #[error("discount percentage {0} is above 100")]
    PercentageOutOfRange(u8),

    /// An individual-item discount without a product
    #[error("individual item discount requires a product")]
    MissingProduct,

    /// Empty code
    #[error("discount code is empty")]
    EmptyCode,
}

/// Errors from looking up a discount code
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscountLookupError {
    /// No active discount has this code
    #[error("discount code not found")]
    NotFound,

    /// The provider could not be reached
    #[error("discount provider unavailable: {0}")]
    Unavailable(String),
}

/// Discount
#[derive(Debug, Clone, PartialEq)]
pub struct Discount {
    id: DiscountId,
    name: String,
    code: String,
    scope: DiscountScope,
    percentage: u8,
}

impl Discount {
    /// Create a discount.
    ///
    /// `product` is required for [`DiscountType::IndividualItem`] and ignored
    /// otherwise.
    ///
    /// # Errors
    ///
    /// - [`InvalidDiscount::PercentageOutOfRange`]: `percentage` is above 100.
    /// - [`InvalidDiscount::MissingProduct`]: an individual-item discount has no product.
    /// - [`InvalidDiscount::EmptyCode`]: `code` is empty.
    pub fn new(
        id: DiscountId,
        name: impl Into<String>,
        code: impl Into<String>,
        kind: DiscountType,
        percentage: u8,
        product: Option<ProductId>,
    ) -> Result<Self, InvalidDiscount> {
        let code = code.into();

        if code.is_empty() {
            return Err(InvalidDiscount::EmptyCode);
        }

        if percentage > MAX_PERCENTAGE {
            return Err(InvalidDiscount::PercentageOutOfRange(percentage));
        }

        let scope = match (kind, product) {
            (DiscountType::ForAllItem, _) => DiscountScope::AllItems,
            (DiscountType::IndividualItem, Some(product)) => DiscountScope::Product(product),
            (DiscountType::IndividualItem, None) => return Err(InvalidDiscount::MissingProduct),
        };

        Ok(Self {
            id,
            name: name.into(),
            code,
            scope,
            percentage,
        })
    }

    /// Discount id
    pub fn id(&self) -> DiscountId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Code, case-sensitive as stored
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Lines the discount reduces
    pub fn scope(&self) -> DiscountScope {
        self.scope
    }

    /// Stored type
    pub fn kind(&self) -> DiscountType {
        match self.scope {
            DiscountScope::AllItems => DiscountType::ForAllItem,
            DiscountScope::Product(_) => DiscountType::IndividualItem,
        }
    }

    /// Percentage in whole points, `0..=100`
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// Percentage as a fraction
    pub fn percent(&self) -> Percentage {
        Percentage::from(Decimal::new(i64::from(self.percentage), 2))
    }

    /// Whether lines of `product` are reduced by this discount
    pub fn applies_to(&self, product: ProductId) -> bool {
        match self.scope {
            DiscountScope::AllItems => true,
            DiscountScope::Product(id) => id == product,
        }
    }

    /// Amount taken off `minor` units, rounded half away from zero.
    pub fn amount_off_minor(&self, minor: i64) -> i64 {
        // A fraction in 0..=1 of an i64 always fits back into an i64.
        percent_of_minor(&self.percent(), minor).unwrap_or(0)
    }
}

/// Looks up discounts by code
#[automock]
#[async_trait]
pub trait DiscountProvider: Send + Sync {
    /// Fetch the active discount with this exact code.
    async fn get_discount_by_code(&self, code: &str) -> Result<Discount, DiscountLookupError>;
}

/// Apply `percent` to an amount in minor units, rounding half away from zero.
///
/// Returns `None` when the result cannot be represented.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Option<i64> {
    let minor = Decimal::from_i64(minor)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(minor)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
