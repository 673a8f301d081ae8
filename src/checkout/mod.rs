//! Checkout
//!
//! Turns a cart into an order payload and submits it to the
//! [`TransactionSink`]. At most one submission is outstanding at a time.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    cart::Cart,
    ids::TypedId,
    products::{Amount, ProductId},
};

mod errors;

pub use errors::{CheckoutError, SinkError};

/// Transaction Id
pub type TransactionId = TypedId<Transaction>;

/// A product and quantity as sent to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Product id
    pub product_id: ProductId,

    /// Units ordered
    pub quantity: u32,
}

/// Order as submitted to the sink.
///
/// Only ids and quantities travel; the sink prices the order from its own
/// records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    /// Lines in cart order
    pub items: Vec<OrderLine>,

    /// Discount code, when one was entered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,

    /// Explicit transaction time; the sink uses its own clock when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl OrderPayload {
    /// Build the payload for the current cart contents.
    ///
    /// The code is trimmed and left out when empty.
    pub fn from_cart(
        cart: &Cart,
        discount_code: Option<&str>,
        created_at: Option<Timestamp>,
    ) -> Self {
        let items = cart
            .items()
            .iter()
            .map(|item| OrderLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();

        let discount_code = discount_code
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);

        Self {
            items,
            discount_code,
            created_at,
        }
    }
}

/// A persisted transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Transaction id
    pub id: TransactionId,

    /// Lines as persisted
    pub items: Vec<OrderLine>,

    /// Discount code that was honoured
    pub discount_code: Option<String>,

    /// Amount charged, as priced by the sink
    pub total: Amount,

    /// Transaction time
    pub created_at: Timestamp,
}

/// Persists orders.
///
/// The sink is authoritative: it re-prices lines, re-validates the discount
/// code and decrements stock. A failed call persists nothing.
#[automock]
#[async_trait]
pub trait TransactionSink: Send + Sync {
    /// Persist an order.
    async fn create_transaction(&self, payload: OrderPayload) -> Result<Transaction, SinkError>;
}

/// Submission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutState {
    /// Ready to submit
    #[default]
    Idle,

    /// A submission is outstanding
    Submitting,

    /// The last submission failed; ready to retry
    Failed,
}

/// Submits orders one at a time
pub struct Checkout {
    sink: Arc<dyn TransactionSink>,
    state: Mutex<CheckoutState>,
}

impl fmt::Debug for Checkout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checkout")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Checkout {
    /// Create an idle submitter
    pub fn new(sink: Arc<dyn TransactionSink>) -> Self {
        Self {
            sink,
            state: Mutex::new(CheckoutState::Idle),
        }
    }

    /// Current state
    pub fn state(&self) -> CheckoutState {
        *self.lock()
    }

    /// Submit `payload` to the sink.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::InProgress`]: another submission is outstanding; the sink is not called.
    /// - [`CheckoutError::Sink`]: the sink rejected the order; the state becomes
    ///   [`CheckoutState::Failed`].
    #[tracing::instrument(
        skip(self, payload),
        fields(
            lines = payload.items.len(),
            has_code = payload.discount_code.is_some(),
            transaction_id = tracing::field::Empty
        )
    )]
    pub async fn submit(&self, payload: OrderPayload) -> Result<Transaction, CheckoutError> {
        let submission = self.begin()?;

        match self.sink.create_transaction(payload).await {
            Ok(transaction) => {
                tracing::Span::current()
                    .record("transaction_id", tracing::field::display(transaction.id));

                info!(total = %transaction.total, "transaction created");

                submission.finish(CheckoutState::Idle);

                Ok(transaction)
            }
            Err(error) => {
                warn!(%error, "transaction rejected");

                submission.finish(CheckoutState::Failed);

                Err(error.into())
            }
        }
    }

    fn begin(&self) -> Result<Submission<'_>, CheckoutError> {
        let mut state = self.lock();

        if *state == CheckoutState::Submitting {
            warn!("checkout already in progress");

            return Err(CheckoutError::InProgress);
        }

        *state = CheckoutState::Submitting;

        Ok(Submission {
            state: &self.state,
            next: CheckoutState::Failed,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CheckoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An outstanding submission.
///
/// Leaves [`CheckoutState::Submitting`] when dropped, so a submission future
/// that is cancelled mid-flight ends up [`CheckoutState::Failed`].
struct Submission<'c> {
    state: &'c Mutex<CheckoutState>,
    next: CheckoutState,
}

impl Submission<'_> {
    fn finish(mut self, next: CheckoutState) {
        self.next = next;
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = self.next;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rusty_money::iso;
    use testresult::TestResult;
    use tokio::sync::Notify;

    use crate::{pricing::rupiah, products::Product};

    use super::*;

    fn transaction(payload: &OrderPayload) -> Transaction {
        Transaction {
            id: TransactionId::new(1),
            items: payload.items.clone(),
            discount_code: payload.discount_code.clone(),
            total: rupiah(10_000),
            created_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn payload() -> OrderPayload {
        OrderPayload {
            items: vec![OrderLine {
                product_id: ProductId::new(1),
                quantity: 2,
            }],
            discount_code: None,
            created_at: None,
        }
    }

    /// Holds every call until released and counts calls.
    #[derive(Default)]
    struct GatedSink {
        calls: AtomicUsize,
        gate: Notify,
    }

    #[async_trait]
    impl TransactionSink for GatedSink {
        async fn create_transaction(
            &self,
            payload: OrderPayload,
        ) -> Result<Transaction, SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;

            Ok(transaction(&payload))
        }
    }

    #[test]
    fn payload_drops_product_snapshot() {
        let mut cart = Cart::new(iso::IDR);
        let a = Product::new(ProductId::new(7), "Sabun", rupiah(3_000), 9);
        let b = Product::new(ProductId::new(2), "Sampo", rupiah(12_000), 9);

        cart.add_item(&a);
        cart.add_item(&a);
        cart.add_item(&b);

        let payload = OrderPayload::from_cart(&cart, None, None);

        assert_eq!(
            payload.items,
            vec![
                OrderLine { product_id: a.id, quantity: 2 },
                OrderLine { product_id: b.id, quantity: 1 },
            ]
        );
    }

    #[test]
    fn payload_omits_blank_code() {
        let cart = Cart::new(iso::IDR);

        assert_eq!(OrderPayload::from_cart(&cart, Some("  "), None).discount_code, None);
        assert_eq!(
            OrderPayload::from_cart(&cart, Some(" HEMAT10 "), None).discount_code,
            Some("HEMAT10".to_string())
        );
    }

    #[test]
    fn payload_serializes_camel_case_without_absent_fields() -> TestResult {
        let json = serde_json::to_value(payload())?;

        assert_eq!(json, serde_json::json!({ "items": [{ "productId": 1, "quantity": 2 }] }));

        Ok(())
    }

    #[test]
    fn payload_serializes_code_and_timestamp() -> TestResult {
        let mut payload = payload();
        payload.discount_code = Some("HEMAT10".to_string());
        payload.created_at = Some("2026-03-01T08:30:00Z".parse()?);

        let json = serde_json::to_value(payload)?;

        assert_eq!(json["discountCode"], "HEMAT10");
        assert_eq!(json["createdAt"], "2026-03-01T08:30:00Z");

        Ok(())
    }

    #[tokio::test]
    async fn successful_submit_returns_to_idle() -> TestResult {
        let mut sink = MockTransactionSink::new();

        sink.expect_create_transaction()
            .once()
            .withf(|payload| payload.items.len() == 1)
            .returning(|payload| Ok(transaction(&payload)));

        let checkout = Checkout::new(Arc::new(sink));
        let created = checkout.submit(payload()).await?;

        assert_eq!(created.id, TransactionId::new(1));
        assert_eq!(checkout.state(), CheckoutState::Idle);

        Ok(())
    }

    #[tokio::test]
    async fn failed_submit_can_be_retried() -> TestResult {
        let mut sink = MockTransactionSink::new();
        let mut attempts = 0;

        sink.expect_create_transaction().times(2).returning(move |payload| {
            attempts += 1;

            if attempts == 1 {
                Err(SinkError::Unavailable("gateway timeout".to_string()))
            } else {
                Ok(transaction(&payload))
            }
        });

        let checkout = Checkout::new(Arc::new(sink));

        let first = checkout.submit(payload()).await;
        assert!(matches!(first, Err(CheckoutError::Sink(SinkError::Unavailable(_)))));
        assert_eq!(checkout.state(), CheckoutState::Failed);

        checkout.submit(payload()).await?;
        assert_eq!(checkout.state(), CheckoutState::Idle);

        Ok(())
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_rejected() {
        let sink = Arc::new(GatedSink::default());
        let checkout = Checkout::new(sink.clone());

        let first = checkout.submit(payload());
        let second = async {
            let result = checkout.submit(payload()).await;
            sink.gate.notify_one();
            result
        };

        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok(), "first submission should succeed");
        assert!(matches!(second, Err(CheckoutError::InProgress)));
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn cancelled_submit_leaves_failed_state() {
        let sink = Arc::new(GatedSink::default());
        let checkout = Checkout::new(sink.clone());

        tokio::select! {
            biased;
            _ = checkout.submit(payload()) => {}
            () = tokio::task::yield_now() => {}
        }

        assert_eq!(checkout.state(), CheckoutState::Failed);
    }
}
