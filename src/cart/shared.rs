//! Shared Cart

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusty_money::iso::Currency;

use crate::{
    cart::{Cart, CartChange},
    products::{Product, ProductId},
};

/// Cloneable handle to the one cart of a session.
///
/// Each mutation takes the lock for its whole duration, so concurrent callers
/// observe mutations one at a time.
#[derive(Debug, Clone)]
pub struct SharedCart {
    inner: Arc<Mutex<Cart>>,
}

impl SharedCart {
    /// Create a handle to a new empty cart
    pub fn new(currency: &'static Currency) -> Self {
        Self::from(Cart::new(currency))
    }

    /// Run `f` with read access to the cart
    pub fn with_cart<R>(&self, f: impl FnOnce(&Cart) -> R) -> R {
        f(&*self.lock())
    }

    /// Run `f` with write access to the cart
    pub fn with_cart_mut<R>(&self, f: impl FnOnce(&mut Cart) -> R) -> R {
        f(&mut *self.lock())
    }

    /// See [`Cart::add_item`]
    pub fn add_item(&self, product: &Product) -> CartChange {
        self.lock().add_item(product)
    }

    /// See [`Cart::update_quantity`]
    pub fn update_quantity(&self, product_id: ProductId, delta: i64) -> CartChange {
        self.lock().update_quantity(product_id, delta)
    }

    /// See [`Cart::set_quantity`]
    pub fn set_quantity(&self, product_id: ProductId, quantity: i64) -> CartChange {
        self.lock().set_quantity(product_id, quantity)
    }

    /// See [`Cart::remove_item`]
    pub fn remove_item(&self, product_id: ProductId) -> CartChange {
        self.lock().remove_item(product_id)
    }

    /// See [`Cart::clear`]
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of the cart as it is right now
    pub fn snapshot(&self) -> Cart {
        self.lock().clone()
    }

    /// Whether the cart has no lines
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Mutations leave the cart valid at every step, so a poisoned lock still
    // guards a consistent cart.
    fn lock(&self) -> MutexGuard<'_, Cart> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Cart> for SharedCart {
    fn from(cart: Cart) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cart)),
        }
    }
}
