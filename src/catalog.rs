//! Catalog
//!
//! Product listings fetched from a [`CatalogProvider`]. A fetch produces an
//! immutable [`CatalogSnapshot`]; stock figures in it are only as fresh as
//! the fetch.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::products::{Product, ProductId};

/// Errors from fetching the catalog
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The provider could not be reached or returned garbage
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the active products
#[automock]
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// List all active products with their current stock and pricing.
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;
}

/// Products as of one fetch
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    products: Vec<Product>,
    index: FxHashMap<ProductId, usize>,
    fetched_at: Timestamp,
}

impl CatalogSnapshot {
    /// Build a snapshot from listed products.
    ///
    /// When an id is listed twice the later record wins.
    pub fn new(products: Vec<Product>, fetched_at: Timestamp) -> Self {
        let mut unique: Vec<Product> = Vec::with_capacity(products.len());
        let mut index = FxHashMap::default();

        for product in products {
            if let Some(position) = index.get(&product.id).copied() {
                if let Some(slot) = unique.get_mut(position) {
                    *slot = product;
                }
            } else {
                index.insert(product.id, unique.len());
                unique.push(product);
            }
        }

        Self {
            products: unique,
            index,
            fetched_at,
        }
    }

    /// Fetch a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`CatalogError`].
    pub async fn fetch(provider: &dyn CatalogProvider) -> Result<Self, CatalogError> {
        let products = provider.list_products().await?;

        Ok(Self::new(products, Timestamp::now()))
    }

    /// Product by id
    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.index
            .get(&id)
            .and_then(|position| self.products.get(*position))
    }

    /// All products, in listing order
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Products with stock left
    pub fn in_stock(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|product| product.in_stock())
    }

    /// Products whose name contains `term`, ignoring case
    pub fn search<'s>(&'s self, term: &str) -> impl Iterator<Item = &'s Product> + use<'s> {
        let term = term.trim().to_lowercase();

        self.products
            .iter()
            .filter(move |product| product.name.to_lowercase().contains(&term))
    }

    /// When the snapshot was fetched
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Number of products
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether there are no products
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// The last good catalog snapshot of a session
pub struct Catalog {
    provider: Arc<dyn CatalogProvider>,
    snapshot: Option<Arc<CatalogSnapshot>>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Create a catalog that has not been fetched yet
    pub fn new(provider: Arc<dyn CatalogProvider>) -> Self {
        Self {
            provider,
            snapshot: None,
        }
    }

    /// Replace the snapshot with a fresh fetch.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`CatalogError`]; the previous snapshot is kept.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        match CatalogSnapshot::fetch(self.provider.as_ref()).await {
            Ok(snapshot) => {
                info!(products = snapshot.len(), "catalog refreshed");

                let snapshot = Arc::new(snapshot);
                self.snapshot = Some(Arc::clone(&snapshot));

                Ok(snapshot)
            }
            Err(error) => {
                warn!(%error, kept = self.snapshot.is_some(), "catalog refresh failed");

                Err(error)
            }
        }
    }

    /// The last good snapshot, if any fetch succeeded
    pub fn snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.snapshot.clone()
    }
}
