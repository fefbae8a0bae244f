use super::item::{DiscountType, QuotationItem, TaxType};
use super::Quotation;
use crate::catalog::Catalog;
use crate::{QuotationError, Result};

/// A single field edit on an item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemUpdate {
    Quantity(u32),
    Rate(f64),
    Discount(f64),
    DiscountType(DiscountType),
    Tax(f64),
    TaxType(TaxType),
    ServiceCharges(f64),
    ProductName(String),
    Sku(String),
    Description(String),
}

/// Result of binding a product to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductSelection {
    /// The item now carries the product's catalog fields.
    Assigned,
    /// The same title already had this product; the edited item was folded into `into`.
    Merged { into: String },
}

fn non_negative(field: &str, v: f64) -> Result<f64> {
    if !v.is_finite() || v < 0.0 {
        return Err(QuotationError::validation(format!(
            "{field} must be a non-negative number."
        )));
    }
    Ok(v)
}

impl Quotation {
    /// Appends a default item under the title and returns its id.
    pub fn add_item(&mut self, title_id: &str) -> Result<String> {
        let visibility = self
            .title(title_id)
            .map(|t| t.print_visibility)
            .ok_or_else(|| QuotationError::not_found("title", title_id))?;
        let mut item = QuotationItem::new(title_id, visibility);
        item.recalculate();
        let id = item.id.clone();
        self.items.push(item);
        self.renumber_items();
        self.refresh_totals();
        self.touch();
        Ok(id)
    }

    pub fn update_item(&mut self, item_id: &str, update: ItemUpdate) -> Result<()> {
        let item = self.item_mut(item_id)?;
        match update {
            ItemUpdate::Quantity(q) => item.quantity = q,
            ItemUpdate::Rate(v) => item.rate = non_negative("Rate", v)?,
            ItemUpdate::Discount(v) => item.discount = non_negative("Discount", v)?,
            ItemUpdate::DiscountType(t) => item.discount_type = t,
            ItemUpdate::Tax(v) => item.tax = non_negative("Tax", v)?,
            ItemUpdate::TaxType(t) => item.tax_type = t,
            ItemUpdate::ServiceCharges(v) => item.service_charges = non_negative("Service charges", v)?,
            ItemUpdate::ProductName(v) => item.product_name = v,
            ItemUpdate::Sku(v) => item.sku = v,
            ItemUpdate::Description(v) => item.description = v,
        }
        item.recalculate();
        self.refresh_totals();
        self.touch();
        Ok(())
    }

    /// Binds `product_id` to the item, merging into an existing row of the
    /// same product under the same title when there is one.
    pub async fn select_product<C>(&mut self, item_id: &str, product_id: &str, catalog: &C) -> Result<ProductSelection>
    where
        C: Catalog + ?Sized,
    {
        let product = catalog
            .product(product_id)
            .await?
            .ok_or_else(|| QuotationError::not_found("product", product_id))?;

        let (title_id, incoming_qty) = {
            let item = self
                .item(item_id)
                .ok_or_else(|| QuotationError::not_found("item", item_id))?;
            (item.title_id.clone(), item.quantity.max(1))
        };

        let existing = self
            .items
            .iter()
            .position(|i| i.id != item_id && i.title_id == title_id && i.product_id == product.id);

        if let Some(idx) = existing {
            let target = &mut self.items[idx];
            target.quantity = target.quantity.saturating_add(incoming_qty);
            target.recalculate();
            let into = target.id.clone();

            self.items.retain(|i| i.id != item_id);
            self.drop_service_state(item_id);
            tracing::debug!(item_id, into = %into, product_id = %product.id, "merged duplicate product row");

            self.renumber_items();
            self.refresh_totals();
            self.touch();
            return Ok(ProductSelection::Merged { into });
        }

        self.service_cache.services_for(&product.id, catalog).await?;
        self.drop_service_state(item_id);

        let item = self.item_mut(item_id)?;
        item.product_id = product.id.clone();
        item.product_name = product.name.clone();
        item.sku = product.sku.clone();
        item.rate = product.selling_price.max(0.0);
        item.description = product.description.clone();
        item.images = product.images.clone();
        item.service_charges = 0.0;
        item.recalculate();

        self.refresh_totals();
        self.touch();
        Ok(ProductSelection::Assigned)
    }

    pub fn remove_item(&mut self, item_id: &str) -> Result<()> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| QuotationError::not_found("item", item_id))?;
        self.items.remove(pos);
        self.drop_service_state(item_id);
        self.renumber_items();
        self.refresh_totals();
        self.touch();
        Ok(())
    }

    pub fn clear_sku(&mut self, item_id: &str) -> Result<()> {
        self.item_mut(item_id)?.sku.clear();
        self.touch();
        Ok(())
    }

    /// Replaces the item's image references; blank entries are dropped.
    pub fn set_item_images(&mut self, item_id: &str, images: Vec<String>) -> Result<()> {
        let item = self.item_mut(item_id)?;
        item.images = images
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self.touch();
        Ok(())
    }

    pub fn clear_images(&mut self, item_id: &str) -> Result<()> {
        self.item_mut(item_id)?.images.clear();
        self.touch();
        Ok(())
    }

    pub fn remove_image(&mut self, item_id: &str, index: usize) -> Result<()> {
        let item = self.item_mut(item_id)?;
        if index >= item.images.len() {
            return Err(QuotationError::validation(format!(
                "Image {index} does not exist on this item."
            )));
        }
        item.images.remove(index);
        self.touch();
        Ok(())
    }

    pub(crate) fn item_mut(&mut self, item_id: &str) -> Result<&mut QuotationItem> {
        self.items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| QuotationError::not_found("item", item_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, Product, ProductService};
    use crate::quotation::RateKind;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new().with_products([
            Product {
                id: "router".into(),
                name: "Router".into(),
                selling_price: 100.0,
                description: "Dual band router".into(),
                sku: "RT-1".into(),
                images: vec!["https://img.test/router.png".into()],
                services: vec![ProductService {
                    service_id: "install".into(),
                    service_name: "Installation".into(),
                    price: 25.0,
                }],
            },
            Product {
                id: "cable".into(),
                name: "Cable".into(),
                selling_price: 5.0,
                description: String::new(),
                sku: "CB-1".into(),
                images: vec![],
                services: vec![],
            },
        ])
    }

    #[test]
    fn amount_follows_every_field_edit() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();

        q.update_item(&i, ItemUpdate::Quantity(2)).unwrap();
        q.update_item(&i, ItemUpdate::Rate(100.0)).unwrap();
        assert!((q.item(&i).unwrap().amount() - 200.0).abs() < 1e-9);

        q.update_item(&i, ItemUpdate::Discount(10.0)).unwrap();
        assert!((q.item(&i).unwrap().amount() - 180.0).abs() < 1e-9);

        q.update_item(&i, ItemUpdate::DiscountType(RateKind::Fixed)).unwrap();
        assert!((q.item(&i).unwrap().amount() - 190.0).abs() < 1e-9);

        q.update_item(&i, ItemUpdate::Tax(5.0)).unwrap();
        q.update_item(&i, ItemUpdate::ServiceCharges(3.0)).unwrap();
        let it = q.item(&i).unwrap();
        let b = it.breakdown();
        assert!((it.amount() - (b.taxable_amount + b.tax_amount + it.service_charges)).abs() < 1e-9);
        assert!((q.totals().grand_total - it.amount()).abs() < 1e-9);
    }

    #[test]
    fn negative_figures_are_rejected() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        assert!(matches!(
            q.update_item(&i, ItemUpdate::Rate(-1.0)),
            Err(QuotationError::Validation(_))
        ));
        assert!(q.update_item(&i, ItemUpdate::Tax(f64::NAN)).is_err());
    }

    #[tokio::test]
    async fn selecting_a_product_copies_catalog_fields() {
        let catalog = catalog();
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();

        let outcome = q.select_product(&i, "router", &catalog).await.unwrap();
        assert_eq!(outcome, ProductSelection::Assigned);

        let it = q.item(&i).unwrap();
        assert_eq!(it.product_name, "Router");
        assert_eq!(it.sku, "RT-1");
        assert_eq!(it.images.len(), 1);
        assert!((it.amount() - 100.0).abs() < 1e-9);
        assert_eq!(q.available_services(&i).len(), 1);
    }

    #[tokio::test]
    async fn same_product_in_same_title_merges_quantities() {
        let catalog = catalog();
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let first = q.add_item(&t).unwrap();
        q.select_product(&first, "router", &catalog).await.unwrap();
        q.update_item(&first, ItemUpdate::Quantity(2)).unwrap();

        let second = q.add_item(&t).unwrap();
        q.update_item(&second, ItemUpdate::Quantity(3)).unwrap();
        let outcome = q.select_product(&second, "router", &catalog).await.unwrap();

        assert_eq!(outcome, ProductSelection::Merged { into: first.clone() });
        assert!(q.item(&second).is_none());
        let routers: Vec<_> = q.items_in(&t).filter(|i| i.product_id == "router").collect();
        assert_eq!(routers.len(), 1);
        assert_eq!(routers[0].quantity, 5);
        assert!((routers[0].amount() - 500.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unset_quantity_merges_as_one() {
        let catalog = catalog();
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let first = q.add_item(&t).unwrap();
        q.select_product(&first, "cable", &catalog).await.unwrap();
        let second = q.add_item(&t).unwrap();
        q.update_item(&second, ItemUpdate::Quantity(0)).unwrap();
        q.select_product(&second, "cable", &catalog).await.unwrap();
        assert_eq!(q.item(&first).unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn products_in_different_titles_are_not_merged() {
        let catalog = catalog();
        let mut q = Quotation::new("QT-1");
        let hw = q.add_title();
        let extra = q.add_title();
        let a = q.add_item(&hw).unwrap();
        let b = q.add_item(&extra).unwrap();
        q.select_product(&a, "router", &catalog).await.unwrap();
        let outcome = q.select_product(&b, "router", &catalog).await.unwrap();
        assert_eq!(outcome, ProductSelection::Assigned);
        assert_eq!(q.items().len(), 2);
        assert_eq!(catalog.service_lookups(), 1);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let catalog = catalog();
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        let err = q.select_product(&i, "nope", &catalog).await.unwrap_err();
        assert!(matches!(err, QuotationError::NotFound { kind: "product", .. }));
    }

    #[test]
    fn field_clears_keep_the_row() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        q.update_item(&i, ItemUpdate::Sku("SKU-9".into())).unwrap();
        q.item_mut(&i).unwrap().images = vec!["a".into(), "b".into(), "c".into()];

        q.remove_image(&i, 1).unwrap();
        assert_eq!(q.item(&i).unwrap().images, vec!["a".to_string(), "c".to_string()]);
        assert!(q.remove_image(&i, 5).is_err());

        q.clear_images(&i).unwrap();
        q.clear_sku(&i).unwrap();
        let it = q.item(&i).unwrap();
        assert!(it.images.is_empty());
        assert!(it.sku.is_empty());
        assert_eq!(q.items().len(), 1);
    }

    #[test]
    fn remove_item_renumbers_display_codes() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let a = q.add_item(&t).unwrap();
        let b = q.add_item(&t).unwrap();
        let c = q.add_item(&t).unwrap();
        assert_eq!(q.item(&c).unwrap().item_id, "1.3");
        q.remove_item(&a).unwrap();
        assert_eq!(q.item(&b).unwrap().item_id, "1.1");
        assert_eq!(q.item(&c).unwrap().item_id, "1.2");
        assert!(q.remove_item(&a).is_err());
    }
}
