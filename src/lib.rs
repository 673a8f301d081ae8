//! Kasir
//!
//! Kasir is the pricing core of a point-of-sale register: a stock-bounded
//! cart, bundle pricing, discount code resolution, order totals and a
//! checkout submitter that sends at most one order at a time.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod discounts;
pub mod fixtures;
pub mod ids;
pub mod memory;
pub mod pricing;
pub mod products;
pub mod register;
pub mod totals;
