//! Kasir register
//!
//! Rings up a sale against a fixture store, prints the priced order and
//! optionally submits it.

use std::{process::ExitCode, sync::Arc};

use thiserror::Error;
use tracing::{info, warn};

use kasir::{
    cart::CartChange,
    catalog::{Catalog, CatalogError, CatalogProvider, CatalogSnapshot},
    checkout::{CheckoutError, Transaction},
    discounts::{DiscountProvider, DiscountStatus},
    fixtures::{self, FixtureError},
    memory::{MemorySink, MemoryStore},
    register::Register,
    totals::OrderTotals,
};

use crate::config::{ItemArg, KasirConfig};

mod config;
mod logging;

/// Errors that end a run
#[derive(Debug, Error)]
enum RunError {
    /// The fixture set could not be loaded
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    /// The catalog could not be fetched
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The order was not accepted
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match KasirConfig::load() {
        Ok(config) => config,
        Err(error) => {
            _ = error.print();

            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1));
        }
    };

    if let Err(error) = logging::init_subscriber(&config) {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized, must use eprintln for setup errors"
        )]
        {
            eprintln!("Logging error: {error}");
        }

        return ExitCode::FAILURE;
    }

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "run failed");

            ExitCode::FAILURE
        }
    }
}

async fn run(config: &KasirConfig) -> Result<(), RunError> {
    let store = Arc::new(fixtures::load_store(&config.fixtures_dir, &config.fixture)?);

    info!(fixture = %config.fixture, "loaded fixture store");

    let products: Arc<dyn CatalogProvider> = store.clone();
    let discounts: Arc<dyn DiscountProvider> = store.clone();

    let mut catalog = Catalog::new(products);
    let snapshot = catalog.refresh().await?;

    let register = Register::new(
        store.currency(),
        discounts,
        Arc::new(MemorySink::new(Arc::clone(&store))),
    );

    for item in &config.items {
        ring_up(&register, &snapshot, *item);
    }

    if let Some(code) = &config.code {
        let status = register.set_discount_code(code).await;

        if let Some(reason) = status.error() {
            warn!(%code, reason, "discount code not applied");
        }
    }

    if let Some(at) = config.at {
        register.set_created_at(at);
    }

    print_order(&register.totals(), &register.discounts().status());

    if config.submit {
        match register.checkout().await? {
            Some(transaction) => print_transaction(&transaction, &store),
            None => warn!("nothing to submit, cart is empty"),
        }
    }

    Ok(())
}

fn ring_up(register: &Register, snapshot: &CatalogSnapshot, item: ItemArg) {
    let Some(product) = snapshot.get(item.product_id) else {
        warn!(product_id = %item.product_id, "unknown product");

        return;
    };

    let mut change = register.cart().add_item(product);

    if item.quantity > 1 && !matches!(change, CartChange::Rejected(_)) {
        change = register
            .cart()
            .update_quantity(item.product_id, i64::from(item.quantity - 1));
    }

    if let CartChange::Rejected(rejection) = change {
        warn!(product_id = %item.product_id, ?rejection, "item not added");
    }
}

#[expect(clippy::print_stdout, reason = "order preview is the program's output")]
fn print_order(totals: &OrderTotals, discount: &DiscountStatus) {
    for line in totals.lines() {
        let bundled = if line.bundled { " (bundle)" } else { "" };

        println!(
            "{:>4} x {:<24} @ {:>14} = {:>14}{bundled}",
            line.quantity, line.name, line.unit_price, line.total
        );
    }

    println!("{:>47} {:>14}", "Subtotal", totals.subtotal());

    if let Some(applied) = discount.discount() {
        let label = format!("{} ({}%)", applied.name(), applied.percentage());
        let amount = format!("-{}", totals.discount_amount());

        println!("{label:>47} {amount:>14}");
    }

    println!("{:>47} {:>14}", "Total", totals.grand_total());
}

#[expect(clippy::print_stdout, reason = "submission result is the program's output")]
fn print_transaction(transaction: &Transaction, store: &MemoryStore) {
    println!(
        "Transaction #{} recorded at {} for {}",
        transaction.id, transaction.created_at, transaction.total
    );

    for line in &transaction.items {
        if let Some(product) = store.product(line.product_id) {
            println!("  {:<24} stock left {}", product.name, product.stock);
        }
    }
}
