//! Checkout errors.

use thiserror::Error;

use crate::products::ProductId;

/// Errors reported by a [`TransactionSink`](super::TransactionSink)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The order has no lines
    #[error("order has no items")]
    EmptyOrder,

    /// A line references an unknown product
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// A line has a quantity of zero
    #[error("invalid quantity for product {0}")]
    InvalidQuantity(ProductId),

    /// Not enough stock to fulfil a line
    #[error("insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Product on the line
        product: ProductId,
        /// Units ordered
        requested: u32,
        /// Units in stock
        available: u32,
    },

    /// The discount code is unknown or inactive
    #[error("invalid discount code {0}")]
    InvalidDiscountCode(String),

    /// The sink could not be reached
    #[error("transaction sink unavailable: {0}")]
    Unavailable(String),
}

/// Errors from submitting a checkout
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// A submission is already outstanding
    #[error("checkout already in progress")]
    InProgress,

    /// The discount code is still being looked up
    #[error("discount code is still being checked")]
    DiscountPending,

    /// The sink rejected the order
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl CheckoutError {
    /// Whether trying again later may succeed without changing the order
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InProgress | Self::DiscountPending | Self::Sink(SinkError::Unavailable(_))
        )
    }
}
