//! Order Totals
//!
//! Subtotal, discount and grand total of an order. The figures are a preview;
//! the transaction sink prices the order again when it is submitted.

use rusty_money::{Money, iso::Currency};

use crate::{
    cart::Cart,
    discounts::{Discount, DiscountScope},
    pricing::{bundle_applies, line_total},
    products::{Amount, Product, ProductId},
};

/// A priced order line
#[derive(Debug, Clone, PartialEq)]
pub struct LineTotal {
    /// Product on the line
    pub product_id: ProductId,

    /// Product name
    pub name: String,

    /// Units on the line
    pub quantity: u32,

    /// Unit price before bundle pricing
    pub unit_price: Amount,

    /// Line total after bundle pricing
    pub total: Amount,

    /// Whether the bundle tier priced part of the line
    pub bundled: bool,
}

impl LineTotal {
    /// Price `quantity` units of `product`
    pub fn price(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            quantity,
            unit_price: product.price,
            total: line_total(product, quantity),
            bundled: bundle_applies(product, quantity),
        }
    }
}

/// Totals of an order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    lines: Vec<LineTotal>,
    subtotal: Amount,
    discount_amount: Amount,
    grand_total: Amount,
}

impl OrderTotals {
    /// Price every cart line and apply `discount`.
    ///
    /// A storewide discount reduces the whole subtotal; an individual-item
    /// discount only reduces the lines of its product, and nothing when that
    /// product is not in the cart.
    pub fn calculate(cart: &Cart, discount: Option<&Discount>) -> Self {
        let lines = cart
            .items()
            .iter()
            .map(|item| LineTotal::price(&item.product, item.quantity))
            .collect();

        Self::from_lines(cart.currency(), lines, discount)
    }

    /// Totals for lines that are already priced
    pub fn from_lines(
        currency: &'static Currency,
        lines: Vec<LineTotal>,
        discount: Option<&Discount>,
    ) -> Self {
        let subtotal = sum_minor(lines.iter());

        let discount_minor = discount.map_or(0, |discount| {
            let applicable = match discount.scope() {
                DiscountScope::AllItems => subtotal,
                DiscountScope::Product(product) => {
                    sum_minor(lines.iter().filter(|line| line.product_id == product))
                }
            };

            discount.amount_off_minor(applicable)
        });

        Self {
            lines,
            subtotal: Money::from_minor(subtotal, currency),
            discount_amount: Money::from_minor(discount_minor, currency),
            grand_total: Money::from_minor(subtotal.saturating_sub(discount_minor), currency),
        }
    }

    /// Priced lines in cart order
    pub fn lines(&self) -> &[LineTotal] {
        &self.lines
    }

    /// Sum of all line totals
    pub fn subtotal(&self) -> Amount {
        self.subtotal
    }

    /// Amount taken off by the discount
    pub fn discount_amount(&self) -> Amount {
        self.discount_amount
    }

    /// Amount payable
    pub fn grand_total(&self) -> Amount {
        self.grand_total
    }
}

fn sum_minor<'l>(lines: impl Iterator<Item = &'l LineTotal>) -> i64 {
    lines.fold(0, |acc, line| acc.saturating_add(line.total.to_minor_units()))
}
