use serde::{Deserialize, Serialize};

use super::item::QuotationItem;

/// Aggregate money figures over a set of items.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: f64,
    pub total_discount: f64,
    pub total_tax: f64,
    pub service_charges: f64,
    pub grand_total: f64,
}

impl Totals {
    pub fn from_items<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a QuotationItem>,
    {
        let mut t = Totals::default();
        for item in items {
            let b = item.breakdown();
            t.subtotal += b.subtotal;
            t.total_discount += b.discount_amount;
            t.total_tax += b.tax_amount;
            t.service_charges += b.service_charges;
        }
        t.grand_total = t.subtotal - t.total_discount + t.total_tax + t.service_charges;
        t
    }
}

/// Totals restricted to one title, in title order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleTotals {
    pub title_id: String,
    pub title: String,
    pub item_count: usize,
    pub totals: Totals,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotation::item::{PrintVisibility, RateKind};

    fn item(qty: u32, rate: f64, discount: f64, tax: f64, charges: f64) -> QuotationItem {
        let mut it = QuotationItem::new("t1", PrintVisibility::default());
        it.quantity = qty;
        it.rate = rate;
        it.discount = discount;
        it.tax = tax;
        it.service_charges = charges;
        it.recalculate();
        it
    }

    #[test]
    fn hardware_example() {
        let items = [item(2, 100.0, 10.0, 0.0, 0.0), item(1, 50.0, 0.0, 5.0, 0.0)];
        let t = Totals::from_items(&items);
        assert!((t.subtotal - 250.0).abs() < 1e-9);
        assert!((t.total_discount - 20.0).abs() < 1e-9);
        assert!((t.total_tax - 2.5).abs() < 1e-9);
        assert!((t.grand_total - 232.5).abs() < 1e-9);
        let sum_of_amounts: f64 = items.iter().map(|i| i.amount()).sum();
        assert!((t.grand_total - sum_of_amounts).abs() < 1e-9);
    }

    #[test]
    fn grand_total_identity_holds_with_fixed_figures() {
        let mut a = item(3, 40.0, 15.0, 7.0, 12.0);
        a.discount_type = RateKind::Fixed;
        a.tax_type = RateKind::Fixed;
        a.recalculate();
        let b = item(5, 9.99, 12.5, 18.0, 0.0);
        let t = Totals::from_items([&a, &b]);
        let expected = t.subtotal - t.total_discount + t.total_tax + t.service_charges;
        assert!((t.grand_total - expected).abs() < 1e-9);
        assert!((t.grand_total - (a.amount() + b.amount())).abs() < 1e-9);
    }

    #[test]
    fn empty_set_is_zero() {
        let t = Totals::from_items(std::iter::empty());
        assert_eq!(t, Totals::default());
    }
}
