//! In-memory collaborators
//!
//! A product and discount store that can stand in for the backend, and a
//! transaction sink that validates and persists orders against it.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use jiff::Timestamp;
use rusty_money::iso::Currency;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::{
    catalog::{CatalogError, CatalogProvider},
    checkout::{OrderLine, OrderPayload, SinkError, Transaction, TransactionId, TransactionSink},
    discounts::{Discount, DiscountLookupError, DiscountProvider},
    products::{Product, ProductId},
    totals::{LineTotal, OrderTotals},
};

/// A discount and whether it can currently be redeemed
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDiscount {
    /// The discount
    pub discount: Discount,

    /// Inactive discounts are not found by code
    pub active: bool,
}

/// Products and discounts of record
#[derive(Debug)]
pub struct MemoryStore {
    currency: &'static Currency,
    products: Mutex<Vec<Product>>,
    discounts: FxHashMap<String, StoredDiscount>,
}

impl MemoryStore {
    /// Create a store. Products keep the given order.
    pub fn new(
        currency: &'static Currency,
        products: Vec<Product>,
        discounts: impl IntoIterator<Item = StoredDiscount>,
    ) -> Self {
        let discounts = discounts
            .into_iter()
            .map(|stored| (stored.discount.code().to_string(), stored))
            .collect();

        Self {
            currency,
            products: Mutex::new(products),
            discounts,
        }
    }

    /// Currency every product is priced in
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Current record of a product
    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.lock().iter().find(|product| product.id == id).cloned()
    }

    /// All current product records
    pub fn products(&self) -> Vec<Product> {
        self.lock().clone()
    }

    /// Active discount with exactly this code
    pub fn discount(&self, code: &str) -> Option<&Discount> {
        self.discounts
            .get(code)
            .filter(|stored| stored.active)
            .map(|stored| &stored.discount)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Product>> {
        self.products.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogProvider for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products())
    }
}

#[async_trait]
impl DiscountProvider for MemoryStore {
    async fn get_discount_by_code(&self, code: &str) -> Result<Discount, DiscountLookupError> {
        self.discount(code)
            .cloned()
            .ok_or(DiscountLookupError::NotFound)
    }
}

/// Transaction sink backed by a [`MemoryStore`].
///
/// Orders are validated against the store's stock, priced from the store's
/// records and applied all-or-nothing.
#[derive(Debug)]
pub struct MemorySink {
    store: Arc<MemoryStore>,
    next_id: AtomicI64,
    transactions: Mutex<Vec<Transaction>>,
}

impl MemorySink {
    /// Create a sink over `store`
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            next_id: AtomicI64::new(1),
            transactions: Mutex::new(Vec::new()),
        }
    }

    /// Transactions persisted so far
    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist(&self, payload: OrderPayload) -> Result<Transaction, SinkError> {
        if payload.items.is_empty() {
            return Err(SinkError::EmptyOrder);
        }

        let discount = payload
            .discount_code
            .as_deref()
            .map(|code| {
                self.store
                    .discount(code)
                    .ok_or_else(|| SinkError::InvalidDiscountCode(code.to_string()))
            })
            .transpose()?;

        let ordered = merge_lines(&payload.items)?;

        let mut products = self.store.lock();
        let mut lines = Vec::with_capacity(ordered.len());

        for line in &ordered {
            let product = products
                .iter()
                .find(|product| product.id == line.product_id)
                .ok_or(SinkError::ProductNotFound(line.product_id))?;

            if line.quantity > product.stock {
                return Err(SinkError::InsufficientStock {
                    product: product.id,
                    requested: line.quantity,
                    available: product.stock,
                });
            }

            lines.push(LineTotal::price(product, line.quantity));
        }

        for line in &ordered {
            if let Some(product) = products.iter_mut().find(|p| p.id == line.product_id) {
                product.stock = product.stock.saturating_sub(line.quantity);
            }
        }

        drop(products);

        let totals = OrderTotals::from_lines(self.store.currency(), lines, discount);

        let transaction = Transaction {
            id: TransactionId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            items: ordered,
            discount_code: discount.map(|discount| discount.code().to_string()),
            total: totals.grand_total(),
            created_at: payload.created_at.unwrap_or_else(Timestamp::now),
        };

        self.transactions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transaction.clone());

        Ok(transaction)
    }
}

#[async_trait]
impl TransactionSink for MemorySink {
    async fn create_transaction(&self, payload: OrderPayload) -> Result<Transaction, SinkError> {
        let result = self.persist(payload);

        match &result {
            Ok(transaction) => {
                info!(id = %transaction.id, total = %transaction.total, "persisted transaction");
            }
            Err(error) => debug!(%error, "refused transaction"),
        }

        result
    }
}

/// Merge lines for the same product, keeping first-seen order.
fn merge_lines(items: &[OrderLine]) -> Result<Vec<OrderLine>, SinkError> {
    let mut merged: Vec<OrderLine> = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity == 0 {
            return Err(SinkError::InvalidQuantity(item.product_id));
        }

        match merged.iter_mut().find(|line| line.product_id == item.product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => merged.push(*item),
        }
    }

    Ok(merged)
}
