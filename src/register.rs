//! Register
//!
//! One point-of-sale session: the shared cart, the discount code being
//! entered, an optional transaction time override and the checkout
//! submitter. Nothing here outlives the session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;
use rusty_money::iso::Currency;
use tracing::debug;

use crate::{
    cart::SharedCart,
    checkout::{Checkout, CheckoutError, CheckoutState, OrderPayload, Transaction, TransactionSink},
    discounts::{DiscountProvider, DiscountResolver, DiscountStatus},
    totals::OrderTotals,
};

/// Point-of-sale session
#[derive(Debug)]
pub struct Register {
    cart: SharedCart,
    discounts: DiscountResolver,
    checkout: Checkout,
    created_at: Mutex<Option<Timestamp>>,
}

impl Register {
    /// Open a session with an empty cart
    pub fn new(
        currency: &'static Currency,
        discounts: Arc<dyn DiscountProvider>,
        sink: Arc<dyn TransactionSink>,
    ) -> Self {
        Self::with_cart(SharedCart::new(currency), discounts, sink)
    }

    /// Open a session around an existing cart handle
    pub fn with_cart(
        cart: SharedCart,
        discounts: Arc<dyn DiscountProvider>,
        sink: Arc<dyn TransactionSink>,
    ) -> Self {
        Self {
            cart,
            discounts: DiscountResolver::new(discounts),
            checkout: Checkout::new(sink),
            created_at: Mutex::new(None),
        }
    }

    /// The session's cart
    pub fn cart(&self) -> &SharedCart {
        &self.cart
    }

    /// The session's discount resolver
    pub fn discounts(&self) -> &DiscountResolver {
        &self.discounts
    }

    /// Enter a discount code; see [`DiscountResolver::set_code`]
    pub async fn set_discount_code(&self, code: &str) -> DiscountStatus {
        self.discounts.set_code(code).await
    }

    /// Record the transaction at `at` instead of the sink's clock
    pub fn set_created_at(&self, at: Timestamp) {
        *self.created_at_lock() = Some(at);
    }

    /// Drop the transaction time override
    pub fn clear_created_at(&self) {
        *self.created_at_lock() = None;
    }

    /// Transaction time override, if set
    pub fn created_at(&self) -> Option<Timestamp> {
        *self.created_at_lock()
    }

    /// Checkout state
    pub fn checkout_state(&self) -> CheckoutState {
        self.checkout.state()
    }

    /// Preview of the order totals with the resolved discount
    pub fn totals(&self) -> OrderTotals {
        let discount = self.discounts.active();

        self.cart
            .with_cart(|cart| OrderTotals::calculate(cart, discount.as_ref()))
    }

    /// Submit the cart.
    ///
    /// An empty cart is a no-op and returns `Ok(None)`. A code that failed to
    /// resolve is left out of the order. On success the cart, discount code
    /// and time override are cleared; on failure they are kept for a retry.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::DiscountPending`]: the discount code is still being looked up.
    /// - [`CheckoutError::InProgress`]: another checkout is outstanding.
    /// - [`CheckoutError::Sink`]: the sink rejected the order.
    pub async fn checkout(&self) -> Result<Option<Transaction>, CheckoutError> {
        let code = match self.discounts.status() {
            DiscountStatus::Pending(_) => return Err(CheckoutError::DiscountPending),
            DiscountStatus::Applied(discount) => Some(discount.code().to_string()),
            DiscountStatus::Invalid(code) => {
                debug!(%code, "leaving unresolved discount code out of the order");

                None
            }
            DiscountStatus::None => None,
        };

        let created_at = self.created_at();

        let payload = self.cart.with_cart(|cart| {
            (!cart.is_empty())
                .then(|| OrderPayload::from_cart(cart, code.as_deref(), created_at))
        });

        let Some(payload) = payload else {
            debug!("checkout of empty cart ignored");

            return Ok(None);
        };

        let transaction = self.checkout.submit(payload).await?;

        self.reset();

        Ok(Some(transaction))
    }

    /// Abandon the sale: clear the cart, discount code and time override
    pub fn cancel(&self) {
        self.reset();
    }

    fn reset(&self) {
        self.cart.clear();
        self.discounts.clear();
        self.clear_created_at();
    }

    fn created_at_lock(&self) -> MutexGuard<'_, Option<Timestamp>> {
        self.created_at.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
