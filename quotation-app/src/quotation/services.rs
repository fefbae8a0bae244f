use std::collections::HashMap;

use super::Quotation;
use crate::catalog::{Catalog, ProductService};
use crate::Result;

/// Marks a description the service toggles are allowed to rewrite.
pub const AUTO_DESCRIPTION_PREFIX: &str = "We implement these services";

/// Services known per product id, fetched once and reused across items.
#[derive(Debug, Clone, Default)]
pub struct ServiceCache {
    by_product: HashMap<String, Vec<ProductService>>,
}

impl ServiceCache {
    pub async fn services_for<C>(&mut self, product_id: &str, catalog: &C) -> Result<Vec<ProductService>>
    where
        C: Catalog + ?Sized,
    {
        if let Some(hit) = self.by_product.get(product_id) {
            return Ok(hit.clone());
        }
        let services = catalog.services_for_product(product_id).await?;
        self.by_product.insert(product_id.to_string(), services.clone());
        Ok(services)
    }

    pub fn cached(&self, product_id: &str) -> Option<&[ProductService]> {
        self.by_product.get(product_id).map(Vec::as_slice)
    }
}

/// Description text listing the chosen services, empty when none are chosen.
pub fn auto_description(services: &[ProductService]) -> String {
    if services.is_empty() {
        return String::new();
    }
    let names = services
        .iter()
        .map(|s| s.service_name.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    format!("{AUTO_DESCRIPTION_PREFIX}: {names}.")
}

fn is_auto_description(description: &str) -> bool {
    let d = description.trim();
    d.is_empty() || d.starts_with(AUTO_DESCRIPTION_PREFIX)
}

impl Quotation {
    /// Services the item's product offers, as cached by the last product selection.
    pub fn available_services(&self, item_id: &str) -> &[ProductService] {
        self.item(item_id)
            .and_then(|i| self.service_cache.cached(&i.product_id))
            .unwrap_or(&[])
    }

    pub fn is_service_selected(&self, item_id: &str, service_id: &str) -> bool {
        self.selected_services
            .get(item_id)
            .and_then(|m| m.get(service_id))
            .copied()
            .unwrap_or(false)
    }

    pub fn service_details(&self, item_id: &str) -> &[ProductService] {
        self.service_details
            .get(item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Attaches or detaches an add-on service and adjusts the item's charges.
    pub fn toggle_service(&mut self, item_id: &str, service: &ProductService, selected: bool) -> Result<()> {
        // Fail before touching the maps when the item is gone.
        self.item_mut(item_id)?;

        self.selected_services
            .entry(item_id.to_string())
            .or_default()
            .insert(service.service_id.clone(), selected);

        let details = self.service_details.entry(item_id.to_string()).or_default();
        let present = details.iter().position(|s| s.service_id == service.service_id);
        let delta = match (selected, present) {
            (true, None) => {
                details.push(service.clone());
                service.price
            }
            (false, Some(pos)) => {
                let removed = details.remove(pos);
                -removed.price
            }
            _ => 0.0,
        };
        let generated = auto_description(details);

        let item = self.item_mut(item_id)?;
        item.service_charges = (item.service_charges + delta).max(0.0);
        if is_auto_description(&item.description) {
            item.description = generated;
        }
        item.recalculate();

        self.refresh_totals();
        self.touch();
        Ok(())
    }

    /// Drops every selected service of the item and zeroes its charges.
    pub fn clear_services(&mut self, item_id: &str) -> Result<()> {
        let item = self.item_mut(item_id)?;
        item.service_charges = 0.0;
        if item.description.trim().starts_with(AUTO_DESCRIPTION_PREFIX) {
            item.description.clear();
        }
        item.recalculate();
        self.drop_service_state(item_id);
        self.refresh_totals();
        self.touch();
        Ok(())
    }

    pub(crate) fn drop_service_state(&mut self, item_id: &str) {
        self.selected_services.remove(item_id);
        self.service_details.remove(item_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotation::ItemUpdate;

    fn svc(id: &str, name: &str, price: f64) -> ProductService {
        ProductService {
            service_id: id.into(),
            service_name: name.into(),
            price,
        }
    }

    #[test]
    fn toggle_on_then_off_restores_charges() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        let install = svc("install", "Installation", 25.0);

        q.toggle_service(&i, &install, true).unwrap();
        assert!((q.item(&i).unwrap().service_charges - 25.0).abs() < 1e-9);
        assert!(q.is_service_selected(&i, "install"));
        assert_eq!(q.service_details(&i).len(), 1);

        q.toggle_service(&i, &install, false).unwrap();
        let it = q.item(&i).unwrap();
        assert_eq!(it.service_charges, 0.0);
        assert!(q.service_details(&i).is_empty());
        assert!(!q.is_service_selected(&i, "install"));
    }

    #[test]
    fn repeated_toggles_never_go_negative() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        let s = svc("s", "Support", 40.0);

        q.toggle_service(&i, &s, true).unwrap();
        q.toggle_service(&i, &s, true).unwrap();
        assert!((q.item(&i).unwrap().service_charges - 40.0).abs() < 1e-9);

        q.update_item(&i, ItemUpdate::ServiceCharges(10.0)).unwrap();
        q.toggle_service(&i, &s, false).unwrap();
        q.toggle_service(&i, &s, false).unwrap();
        assert_eq!(q.item(&i).unwrap().service_charges, 0.0);
    }

    #[test]
    fn description_is_generated_only_when_not_hand_written() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let auto = q.add_item(&t).unwrap();
        let manual = q.add_item(&t).unwrap();
        q.update_item(&manual, ItemUpdate::Description("Bespoke wiring".into())).unwrap();

        let a = svc("a", "Installation", 10.0);
        let b = svc("b", "Training", 15.0);
        for id in [&auto, &manual] {
            q.toggle_service(id, &a, true).unwrap();
            q.toggle_service(id, &b, true).unwrap();
        }

        assert_eq!(
            q.item(&auto).unwrap().description,
            "We implement these services: Installation, Training."
        );
        assert_eq!(q.item(&manual).unwrap().description, "Bespoke wiring");

        q.toggle_service(&auto, &a, false).unwrap();
        assert_eq!(q.item(&auto).unwrap().description, "We implement these services: Training.");
        q.toggle_service(&auto, &b, false).unwrap();
        assert_eq!(q.item(&auto).unwrap().description, "");
    }

    #[test]
    fn charges_flow_into_amount_and_totals() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        q.update_item(&i, ItemUpdate::Rate(100.0)).unwrap();
        q.toggle_service(&i, &svc("s", "Setup", 25.0), true).unwrap();
        assert!((q.item(&i).unwrap().amount() - 125.0).abs() < 1e-9);
        assert!((q.totals().service_charges - 25.0).abs() < 1e-9);
        assert!((q.totals().grand_total - 125.0).abs() < 1e-9);
    }

    #[test]
    fn clear_services_empties_state() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        q.toggle_service(&i, &svc("s", "Setup", 25.0), true).unwrap();
        q.clear_services(&i).unwrap();
        let it = q.item(&i).unwrap();
        assert_eq!(it.service_charges, 0.0);
        assert!(it.description.is_empty());
        assert!(q.service_details(&i).is_empty());
        assert!(!q.is_service_selected(&i, "s"));
    }

    #[test]
    fn removing_an_item_forgets_its_services() {
        let mut q = Quotation::new("QT-1");
        let t = q.add_title();
        let i = q.add_item(&t).unwrap();
        q.toggle_service(&i, &svc("s", "Setup", 25.0), true).unwrap();
        q.remove_item(&i).unwrap();
        assert!(q.service_details(&i).is_empty());
        assert!(q.toggle_service(&i, &svc("s", "Setup", 25.0), true).is_err());
    }
}
