use serde::{Deserialize, Serialize};

/// How a discount or tax figure is applied to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    #[default]
    Percentage,
    Fixed,
}

pub type DiscountType = RateKind;
pub type TaxType = RateKind;

fn default_true() -> bool {
    true
}

/// Which columns of a title's table are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintVisibility {
    #[serde(default = "default_true")]
    pub item_id: bool,
    #[serde(default = "default_true")]
    pub product: bool,
    #[serde(default = "default_true")]
    pub sku: bool,
    #[serde(default = "default_true")]
    pub description: bool,
    #[serde(default = "default_true")]
    pub images: bool,
    #[serde(default = "default_true")]
    pub quantity: bool,
    #[serde(default = "default_true")]
    pub rate: bool,
    #[serde(default = "default_true")]
    pub discount: bool,
    #[serde(default = "default_true")]
    pub tax: bool,
    #[serde(default = "default_true")]
    pub service_charges: bool,
    #[serde(default = "default_true")]
    pub amount: bool,
}

impl Default for PrintVisibility {
    fn default() -> Self {
        Self {
            item_id: true,
            product: true,
            sku: true,
            description: true,
            images: true,
            quantity: true,
            rate: true,
            discount: true,
            tax: true,
            service_charges: true,
            amount: true,
        }
    }
}

/// Intermediate figures of the per-line formula.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineBreakdown {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub taxable_amount: f64,
    pub tax_amount: f64,
    pub service_charges: f64,
    pub amount: f64,
}

pub fn line_breakdown(
    quantity: u32,
    rate: f64,
    discount: f64,
    discount_type: DiscountType,
    tax: f64,
    tax_type: TaxType,
    service_charges: f64,
) -> LineBreakdown {
    let subtotal = f64::from(quantity) * rate;
    let discount_amount = match discount_type {
        RateKind::Percentage => subtotal * discount / 100.0,
        RateKind::Fixed => discount,
    };
    let taxable_amount = subtotal - discount_amount;
    let tax_amount = match tax_type {
        RateKind::Percentage => taxable_amount * tax / 100.0,
        RateKind::Fixed => tax,
    };
    LineBreakdown {
        subtotal,
        discount_amount,
        taxable_amount,
        tax_amount,
        service_charges,
        amount: taxable_amount + tax_amount + service_charges,
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationItem {
    pub id: String,
    pub title_id: String,
    /// Display code such as `1.2`.
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub tax_type: TaxType,
    #[serde(default)]
    pub service_charges: f64,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub print_visibility: PrintVisibility,
}

impl QuotationItem {
    pub(crate) fn new(title_id: &str, print_visibility: PrintVisibility) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title_id: title_id.to_string(),
            item_id: String::new(),
            product_id: String::new(),
            product_name: String::new(),
            sku: String::new(),
            description: String::new(),
            quantity: 1,
            rate: 0.0,
            discount: 0.0,
            discount_type: RateKind::Percentage,
            tax: 0.0,
            tax_type: RateKind::Percentage,
            service_charges: 0.0,
            amount: 0.0,
            images: Vec::new(),
            print_visibility,
        }
    }

    /// Derived; kept equal to the line formula by every command.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn breakdown(&self) -> LineBreakdown {
        line_breakdown(
            self.quantity,
            self.rate,
            self.discount,
            self.discount_type,
            self.tax,
            self.tax_type,
            self.service_charges,
        )
    }

    pub(crate) fn recalculate(&mut self) {
        self.amount = self.breakdown().amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn percentage_discount_then_tax() {
        let b = line_breakdown(2, 100.0, 10.0, RateKind::Percentage, 0.0, RateKind::Percentage, 0.0);
        assert!(approx(b.subtotal, 200.0));
        assert!(approx(b.discount_amount, 20.0));
        assert!(approx(b.amount, 180.0));

        let b = line_breakdown(1, 50.0, 0.0, RateKind::Percentage, 5.0, RateKind::Percentage, 0.0);
        assert!(approx(b.tax_amount, 2.5));
        assert!(approx(b.amount, 52.5));
    }

    #[test]
    fn tax_applies_to_discounted_amount() {
        let b = line_breakdown(4, 25.0, 20.0, RateKind::Percentage, 10.0, RateKind::Percentage, 0.0);
        assert!(approx(b.taxable_amount, 80.0));
        assert!(approx(b.tax_amount, 8.0));
        assert!(approx(b.amount, 88.0));
    }

    #[test]
    fn fixed_figures_and_service_charges() {
        let b = line_breakdown(3, 10.0, 5.0, RateKind::Fixed, 2.0, RateKind::Fixed, 25.0);
        assert!(approx(b.discount_amount, 5.0));
        assert!(approx(b.tax_amount, 2.0));
        assert!(approx(b.amount, 30.0 - 5.0 + 2.0 + 25.0));
    }

    #[test]
    fn missing_visibility_flags_default_to_visible() {
        let v: PrintVisibility = serde_json::from_str(r#"{"sku":false}"#).unwrap();
        assert!(!v.sku);
        assert!(v.amount && v.images && v.item_id);
    }

    #[test]
    fn stored_amount_is_not_trusted_until_recalculated() {
        let mut item: QuotationItem = serde_json::from_str(
            r#"{"id":"i1","titleId":"t1","quantity":2,"rate":100,"discount":10,"amount":999}"#,
        )
        .unwrap();
        assert_eq!(item.discount_type, RateKind::Percentage);
        item.recalculate();
        assert!(approx(item.amount(), 180.0));
    }
}
