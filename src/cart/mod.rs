//! Cart
//!
//! The working set of products a cashier is ringing up. Every mutation checks
//! the stock figure of the product snapshot taken when the product was first
//! added; a change that would break that ceiling is rejected and the previous
//! quantity kept.

use rusty_money::iso::Currency;
use tracing::{debug, warn};

use crate::products::{Product, ProductId};

mod shared;

pub use shared::SharedCart;

/// A product line in the cart
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    /// Id of the product on this line
    pub product_id: ProductId,

    /// Product as it was when first added
    pub product: Product,

    /// Units on this line, always at least one
    pub quantity: u32,
}

/// Why a cart mutation was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The product has no stock at all
    OutOfStock,

    /// The requested quantity is above the product's stock
    ExceedsStock {
        /// Stock of the product snapshot
        stock: u32,
    },

    /// The product is priced in a different currency than the cart
    CurrencyMismatch,
}

/// Outcome of a cart mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// A new line was inserted with a quantity of one
    Added,

    /// An existing line now has this quantity
    Updated(u32),

    /// The line was removed
    Removed,

    /// The mutation was turned down; the cart is as it was
    Rejected(Rejection),

    /// Nothing to do, e.g. the product is not in the cart
    Unchanged,
}

/// Cart
#[derive(Debug, Clone)]
pub struct Cart {
    items: Vec<CartItem>,
    currency: &'static Currency,
}

impl Cart {
    /// Create an empty cart for the given currency
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            items: Vec::new(),
            currency,
        }
    }

    /// Add one unit of `product`.
    ///
    /// A product already in the cart gains one unit if its snapshot stock
    /// allows it; otherwise the cart is left untouched.
    pub fn add_item(&mut self, product: &Product) -> CartChange {
        if product.currency() != self.currency {
            warn!(
                product_id = %product.id,
                product_currency = product.currency().iso_alpha_code,
                cart_currency = self.currency.iso_alpha_code,
                "rejected product in foreign currency"
            );

            return CartChange::Rejected(Rejection::CurrencyMismatch);
        }

        if !product.in_stock() {
            debug!(product_id = %product.id, "product out of stock");

            return CartChange::Rejected(Rejection::OutOfStock);
        }

        if let Some(item) = self.item_mut(product.id) {
            let quantity = item.quantity.saturating_add(1);
            let stock = item.product.stock;

            if quantity > stock {
                debug!(product_id = %product.id, stock, "stock ceiling reached");

                return CartChange::Rejected(Rejection::ExceedsStock { stock });
            }

            item.quantity = quantity;

            debug!(product_id = %product.id, quantity, "incremented cart line");

            return CartChange::Updated(quantity);
        }

        self.items.push(CartItem {
            product_id: product.id,
            product: product.clone(),
            quantity: 1,
        });

        debug!(product_id = %product.id, "added cart line");

        CartChange::Added
    }

    /// Change a line's quantity by `delta` units.
    ///
    /// Reaching zero or below removes the line; going above the snapshot
    /// stock is rejected.
    pub fn update_quantity(&mut self, product_id: ProductId, delta: i64) -> CartChange {
        let Some(current) = self.quantity_of(product_id) else {
            return CartChange::Unchanged;
        };

        self.apply_quantity(product_id, i64::from(current).saturating_add(delta))
    }

    /// Set a line's quantity, with the same bounds as [`Cart::update_quantity`]
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> CartChange {
        if !self.contains(product_id) {
            return CartChange::Unchanged;
        }

        self.apply_quantity(product_id, quantity)
    }

    /// Remove a line regardless of its quantity
    pub fn remove_item(&mut self, product_id: ProductId) -> CartChange {
        let before = self.items.len();

        self.items.retain(|item| item.product_id != product_id);

        if self.items.len() == before {
            CartChange::Unchanged
        } else {
            debug!(%product_id, "removed cart line");

            CartChange::Removed
        }
    }

    /// Remove every line
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Lines in the order they were first added
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Line for a product
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Quantity of a product, if it is in the cart
    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.get(product_id).map(|item| item.quantity)
    }

    /// Whether the product has a line
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Units across all lines
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Currency of the cart
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    fn item_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }

    fn apply_quantity(&mut self, product_id: ProductId, quantity: i64) -> CartChange {
        if quantity <= 0 {
            return self.remove_item(product_id);
        }

        let Some(item) = self.item_mut(product_id) else {
            return CartChange::Unchanged;
        };

        let stock = item.product.stock;

        match u32::try_from(quantity) {
            Ok(quantity) if quantity <= stock => {
                item.quantity = quantity;

                debug!(%product_id, quantity, "set cart line quantity");

                CartChange::Updated(quantity)
            }
            _ => {
                debug!(%product_id, requested = quantity, stock, "quantity above stock");

                CartChange::Rejected(Rejection::ExceedsStock { stock })
            }
        }
    }
}
