//! Product Fixtures

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    products::{Product, ProductId},
};

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Unit price (e.g., "3500 IDR")
    pub price: String,

    /// Units in stock
    pub stock: u32,

    /// Optional bundle tier
    #[serde(default)]
    pub bundle: Option<BundleFixture>,
}

/// Bundle tier of a product fixture
#[derive(Debug, Deserialize)]
pub struct BundleFixture {
    /// Threshold quantity
    pub quantity: u32,

    /// Per-unit price within the tier (e.g., "3200 IDR")
    pub price: String,
}

impl ProductFixture {
    /// Convert into a [`Product`] with the given id
    ///
    /// # Errors
    ///
    /// Returns an error if a price cannot be parsed.
    pub fn into_product(self, id: i64) -> Result<Product, FixtureError> {
        let price = parse_money(&self.price)?;
        let product = Product::new(ProductId::new(id), self.name, price, self.stock);

        match self.bundle {
            Some(bundle) => Ok(product.with_bundle(bundle.quantity, parse_money(&bundle.price)?)),
            None => Ok(product),
        }
    }
}

fn parse_money(s: &str) -> Result<Money<'static, Currency>, FixtureError> {
    let (minor_units, currency) = parse_price(s)?;

    Ok(Money::from_minor(minor_units, currency))
}

/// Parse price string (e.g., "3500 IDR") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount cannot be parsed as a decimal, or if the currency code
/// is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    let [amount, currency_code] = parts.as_slice() else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    if amount.is_sign_negative() {
        return Err(FixtureError::InvalidPrice(s.to_string()));
    }

    let minor_units = amount
        .checked_mul(Decimal::new(100, 0))
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    if *currency_code != iso::IDR.iso_alpha_code {
        return Err(FixtureError::UnknownCurrency((*currency_code).to_string()));
    }

    Ok((minor_units, iso::IDR))
}
