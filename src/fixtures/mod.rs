//! Fixtures
//!
//! YAML fixture sets describing the products and discounts of a store. A set
//! named `toko` lives at `<base>/toko.yml`.

use std::{fs, path::Path};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::{
    discounts::InvalidDiscount,
    memory::MemoryStore,
    products::Product,
};

pub mod discounts;
pub mod products;

pub use discounts::DiscountFixture;
pub use products::{ProductFixture, parse_price};

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

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A discount references a product the fixture does not define
    #[error("Discount {code} references unknown product {product}")]
    UnknownProduct {
        /// Discount code
        code: String,
        /// Referenced product id
        product: i64,
    },

    /// Invalid discount data
    #[error("Invalid discount {code}: {source}")]
    InvalidDiscount {
        /// Discount code
        code: String,
        /// What was wrong with it
        #[source]
        source: InvalidDiscount,
    },
}

/// A store fixture set
#[derive(Debug, Deserialize)]
pub struct StoreFixture {
    /// Map of product id -> product fixture
    pub products: FxHashMap<i64, ProductFixture>,

    /// Map of discount code -> discount fixture
    #[serde(default)]
    pub discounts: FxHashMap<String, DiscountFixture>,
}

impl StoreFixture {
    /// Build a [`MemoryStore`] from the fixture.
    ///
    /// Products are ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if a price or discount is invalid, or a discount
    /// references an unknown product.
    pub fn into_store(self) -> Result<MemoryStore, FixtureError> {
        let mut products = self
            .products
            .into_iter()
            .map(|(id, fixture)| fixture.into_product(id))
            .collect::<Result<Vec<Product>, _>>()?;

        products.sort_by_key(|product| product.id);

        for product in products.iter().filter(|product| product.has_inverted_bundle()) {
            warn!(
                product_id = %product.id,
                price = %product.price,
                bundle_price = %product.bundle_price,
                "bundle price is above unit price"
            );
        }

        let discounts = self
            .discounts
            .into_iter()
            .map(|(code, fixture)| {
                if let Some(product) = fixture.product
                    && !products.iter().any(|p| p.id.get() == product)
                {
                    return Err(FixtureError::UnknownProduct { code, product });
                }

                fixture.into_stored(code)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MemoryStore::new(rusty_money::iso::IDR, products, discounts))
    }
}

/// Parse a store fixture from YAML.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or describes invalid data.
pub fn parse_store(yaml: &str) -> Result<MemoryStore, FixtureError> {
    let fixture: StoreFixture = serde_norway::from_str(yaml)?;

    fixture.into_store()
}

/// Load the fixture set `name` from `base_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_store(base_path: &Path, name: &str) -> Result<MemoryStore, FixtureError> {
    let contents = fs::read_to_string(base_path.join(format!("{name}.yml")))?;

    parse_store(&contents)
}
