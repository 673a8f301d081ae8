//! Pricing
//!
//! Line pricing with tiered bundle prices. Everything here is pure and
//! infallible: arithmetic happens on minor units and saturates instead of
//! overflowing.

use rusty_money::{Money, iso};

use crate::products::{Amount, Product};

/// Minor units per whole Rupiah
const MINOR_PER_RUPIAH: i64 = 100;

/// Build an amount from whole Rupiah
pub fn rupiah(whole: i64) -> Amount {
    Money::from_minor(whole.saturating_mul(MINOR_PER_RUPIAH), iso::IDR)
}

/// Calculates the total for `quantity` units of `product`.
///
/// When the product has a bundle tier and `quantity` reaches its threshold,
/// every complete bundle is charged at the bundle price and the remainder at
/// the unit price. Otherwise all units are charged at the unit price.
pub fn line_total(product: &Product, quantity: u32) -> Amount {
    Money::from_minor(line_total_minor(product, quantity), product.currency())
}

/// Whether `quantity` units of `product` are priced with its bundle tier
pub fn bundle_applies(product: &Product, quantity: u32) -> bool {
    product
        .bundle_tier()
        .is_some_and(|(threshold, _)| quantity >= threshold)
}

fn line_total_minor(product: &Product, quantity: u32) -> i64 {
    let unit = product.price.to_minor_units();

    match product.bundle_tier() {
        Some((threshold, bundle_price)) if quantity >= threshold => {
            let bundles = quantity / threshold;
            let in_bundles = bundles.saturating_mul(threshold);
            let remaining = quantity % threshold;

            times(bundle_price.to_minor_units(), in_bundles)
                .saturating_add(times(unit, remaining))
        }
        _ => times(unit, quantity),
    }
}

fn times(minor: i64, quantity: u32) -> i64 {
    minor.saturating_mul(i64::from(quantity))
}
