//! Register sessions against the `toko` fixture store

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use jiff::Timestamp;
use testresult::TestResult;
use tokio::sync::Notify;

use kasir::{
    cart::{CartChange, Rejection},
    catalog::{Catalog, CatalogProvider, CatalogSnapshot},
    checkout::{CheckoutError, CheckoutState, OrderPayload, SinkError, Transaction, TransactionSink},
    discounts::{Discount, DiscountLookupError, DiscountProvider, DiscountStatus},
    fixtures,
    memory::{MemorySink, MemoryStore},
    pricing::rupiah,
    products::{Product, ProductId},
    register::Register,
};

const AIR: ProductId = ProductId::new(1);
const BERAS: ProductId = ProductId::new(2);
const KOPI: ProductId = ProductId::new(5);
const TELUR: ProductId = ProductId::new(6);
const SABUN: ProductId = ProductId::new(7);

fn toko() -> Result<Arc<MemoryStore>, fixtures::FixtureError> {
    let base = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");

    Ok(Arc::new(fixtures::load_store(&base, "toko")?))
}

async fn snapshot(store: &Arc<MemoryStore>) -> TestResult<Arc<CatalogSnapshot>> {
    let provider: Arc<dyn CatalogProvider> = store.clone();
    let mut catalog = Catalog::new(provider);

    Ok(catalog.refresh().await?)
}

fn register(store: &Arc<MemoryStore>, sink: Arc<dyn TransactionSink>) -> Register {
    let discounts: Arc<dyn DiscountProvider> = store.clone();

    Register::new(store.currency(), discounts, sink)
}

fn product(snapshot: &CatalogSnapshot, id: ProductId) -> TestResult<&Product> {
    Ok(snapshot.get(id).ok_or("product missing from catalog")?)
}

fn ring_up(register: &Register, product: &Product, quantity: i64) {
    register.cart().add_item(product);
    register.cart().set_quantity(product.id, quantity);
}

#[tokio::test]
async fn prices_and_submits_a_sale() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let sink = Arc::new(MemorySink::new(Arc::clone(&store)));
    let register = register(&store, sink.clone());

    ring_up(&register, product(&catalog, AIR)?, 15);
    ring_up(&register, product(&catalog, BERAS)?, 1);

    let status = register.set_discount_code(" HEMAT10 ").await;
    assert!(matches!(status, DiscountStatus::Applied(_)), "got {status}");

    let totals = register.totals();

    // 10 * 900 + 5 * 1_000 + 75_000
    assert_eq!(totals.subtotal(), rupiah(89_000));
    assert_eq!(totals.discount_amount(), rupiah(8_900));
    assert_eq!(totals.grand_total(), rupiah(80_100));

    let transaction = register.checkout().await?.ok_or("expected a transaction")?;

    assert_eq!(transaction.total, totals.grand_total());
    assert_eq!(transaction.discount_code.as_deref(), Some("HEMAT10"));
    assert_eq!(sink.transactions(), vec![transaction]);
    assert!(register.cart().is_empty());
    assert_eq!(register.discounts().code(), "");

    let refreshed = snapshot(&store).await?;

    assert_eq!(product(&refreshed, AIR)?.stock, 105);
    assert_eq!(product(&refreshed, BERAS)?.stock, 11);

    Ok(())
}

#[tokio::test]
async fn individual_item_discount_only_touches_its_product() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let register = register(&store, Arc::new(MemorySink::new(Arc::clone(&store))));

    ring_up(&register, product(&catalog, BERAS)?, 2);
    ring_up(&register, product(&catalog, KOPI)?, 12);

    register.set_discount_code("BERAS20").await;

    let totals = register.totals();

    assert_eq!(totals.subtotal(), rupiah(165_000));
    assert_eq!(totals.discount_amount(), rupiah(30_000));
    assert_eq!(totals.grand_total(), rupiah(135_000));

    register.set_discount_code("KOPIGRATIS").await;

    // a full discount on a bundled line leaves nothing to pay for it
    assert_eq!(register.totals().discount_amount(), rupiah(15_000));
    assert_eq!(register.totals().grand_total(), rupiah(150_000));

    Ok(())
}

#[tokio::test]
async fn cart_respects_snapshot_stock() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let register = register(&store, Arc::new(MemorySink::new(Arc::clone(&store))));
    let sabun = product(&catalog, SABUN)?;

    for _ in 0..4 {
        register.cart().add_item(sabun);
    }

    assert_eq!(register.cart().with_cart(|cart| cart.quantity_of(SABUN)), Some(3));
    assert_eq!(
        register.cart().add_item(product(&catalog, TELUR)?),
        CartChange::Rejected(Rejection::OutOfStock)
    );
    assert_eq!(register.cart().update_quantity(SABUN, -4), CartChange::Removed);
    assert!(register.cart().is_empty());

    Ok(())
}

#[tokio::test]
async fn unresolved_code_is_not_sent() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let register = register(&store, Arc::new(MemorySink::new(Arc::clone(&store))));

    ring_up(&register, product(&catalog, BERAS)?, 1);

    let status = register.set_discount_code("LEBARAN").await;
    assert_eq!(status.error(), Some("invalid code"));

    let transaction = register.checkout().await?.ok_or("expected a transaction")?;

    assert_eq!(transaction.discount_code, None);
    assert_eq!(transaction.total, rupiah(75_000));

    Ok(())
}

#[tokio::test]
async fn sink_has_the_final_say_on_stock() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let sink: Arc<dyn TransactionSink> = Arc::new(MemorySink::new(Arc::clone(&store)));

    let first = register(&store, Arc::clone(&sink));
    let second = register(&store, sink);
    let at: Timestamp = "2026-04-10T09:15:00Z".parse()?;

    ring_up(&first, product(&catalog, SABUN)?, 2);
    ring_up(&second, product(&catalog, SABUN)?, 2);
    second.set_created_at(at);

    assert!(first.checkout().await?.is_some());

    let result = second.checkout().await;

    assert!(
        matches!(
            result,
            Err(CheckoutError::Sink(SinkError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }))
        ),
        "got {result:?}"
    );
    assert_eq!(second.checkout_state(), CheckoutState::Failed);
    assert_eq!(second.cart().with_cart(|cart| cart.quantity_of(SABUN)), Some(2));
    assert_eq!(second.created_at(), Some(at));

    second.cart().set_quantity(SABUN, 1);

    let retried = second.checkout().await?.ok_or("expected a transaction")?;

    assert_eq!(retried.created_at, at);
    assert_eq!(second.checkout_state(), CheckoutState::Idle);
    assert_eq!(store.product(SABUN).map(|p| p.stock), Some(0));

    Ok(())
}

/// Holds lookups of one code until released.
struct HeldDiscounts {
    store: Arc<MemoryStore>,
    held: &'static str,
    gate: Notify,
}

#[async_trait]
impl DiscountProvider for HeldDiscounts {
    async fn get_discount_by_code(&self, code: &str) -> Result<Discount, DiscountLookupError> {
        if code == self.held {
            self.gate.notified().await;
        }

        self.store.get_discount_by_code(code).await
    }
}

fn holding(store: &Arc<MemoryStore>, held: &'static str) -> (Register, Arc<HeldDiscounts>) {
    let discounts = Arc::new(HeldDiscounts {
        store: Arc::clone(store),
        held,
        gate: Notify::new(),
    });
    let register = Register::new(
        store.currency(),
        discounts.clone(),
        Arc::new(MemorySink::new(Arc::clone(store))),
    );

    (register, discounts)
}

#[tokio::test]
async fn checkout_waits_for_pending_code() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let (register, discounts) = holding(&store, "HEMAT10");

    ring_up(&register, product(&catalog, BERAS)?, 1);

    let (status, blocked) = tokio::join!(register.set_discount_code("HEMAT10"), async {
        let result = register.checkout().await;
        discounts.gate.notify_one();
        result
    });

    assert!(matches!(blocked, Err(CheckoutError::DiscountPending)), "got {blocked:?}");
    assert!(matches!(status, DiscountStatus::Applied(_)), "got {status}");

    let transaction = register.checkout().await?.ok_or("expected a transaction")?;

    assert_eq!(transaction.total, rupiah(67_500));

    Ok(())
}

#[tokio::test]
async fn abandoned_code_lookup_does_not_block_checkout() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let (register, discounts) = holding(&store, "HEMAT10");

    ring_up(&register, product(&catalog, BERAS)?, 1);

    let abandoned = tokio::select! {
        biased;
        status = register.set_discount_code("HEMAT10") => Some(status),
        () = tokio::task::yield_now() => None,
    };

    assert_eq!(abandoned, None);
    assert_eq!(register.discounts().status(), DiscountStatus::None);

    discounts.gate.notify_one();

    let status = register.set_discount_code("HEMAT10").await;
    assert!(matches!(status, DiscountStatus::Applied(_)), "got {status}");

    let transaction = register.checkout().await?.ok_or("expected a transaction")?;

    assert_eq!(transaction.discount_code.as_deref(), Some("HEMAT10"));
    assert_eq!(transaction.total, rupiah(67_500));

    Ok(())
}

#[tokio::test]
async fn stale_code_never_becomes_active() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let (register, discounts) = holding(&store, "HEMAT10");

    ring_up(&register, product(&catalog, BERAS)?, 1);

    let (stale, fresh) = tokio::join!(register.set_discount_code("HEMAT10"), async {
        let status = register.set_discount_code("BERAS20").await;
        discounts.gate.notify_one();
        status
    });

    assert!(
        matches!(&fresh, DiscountStatus::Applied(d) if d.code() == "BERAS20"),
        "got {fresh}"
    );
    assert_eq!(stale, fresh);
    assert_eq!(register.discounts().code(), "BERAS20");

    let totals = register.totals();

    assert_eq!(totals.discount_amount(), rupiah(15_000));
    assert_eq!(totals.grand_total(), rupiah(60_000));

    Ok(())
}

#[tokio::test]
async fn clearing_code_discards_lookup_in_flight() -> TestResult {
    let store = toko()?;
    let (register, discounts) = holding(&store, "HEMAT10");

    let (stale, fresh) = tokio::join!(register.set_discount_code("HEMAT10"), async {
        register.discounts().clear();
        discounts.gate.notify_one();
        register.set_discount_code("").await
    });

    assert_eq!(stale, DiscountStatus::None);
    assert_eq!(fresh, DiscountStatus::None);
    assert_eq!(register.discounts().active(), None);

    Ok(())
}

/// Counts orders and holds them until released.
struct HeldSink {
    inner: MemorySink,
    calls: AtomicUsize,
    gate: Notify,
}

#[async_trait]
impl TransactionSink for HeldSink {
    async fn create_transaction(&self, payload: OrderPayload) -> Result<Transaction, SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;

        self.inner.create_transaction(payload).await
    }
}

#[tokio::test]
async fn double_checkout_sends_one_order() -> TestResult {
    let store = toko()?;
    let catalog = snapshot(&store).await?;
    let sink = Arc::new(HeldSink {
        inner: MemorySink::new(Arc::clone(&store)),
        calls: AtomicUsize::new(0),
        gate: Notify::new(),
    });
    let register = register(&store, sink.clone());

    ring_up(&register, product(&catalog, AIR)?, 3);

    let (first, second) = tokio::join!(register.checkout(), async {
        let result = register.checkout().await;
        sink.gate.notify_one();
        result
    });

    assert!(first?.is_some());
    assert!(matches!(second, Err(CheckoutError::InProgress)), "got {second:?}");
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.inner.transactions().len(), 1);
    assert_eq!(store.product(AIR).map(|p| p.stock), Some(117));

    Ok(())
}
