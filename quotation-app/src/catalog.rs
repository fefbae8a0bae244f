//! Product and customer records the quotation builder reads from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductService {
    pub service_id: String,
    pub service_name: String,
    #[serde(default, alias = "total")]
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub selling_price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub services: Vec<ProductService>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub designation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub company_name: String,
    #[serde(default)]
    pub primary_contact: PrimaryContact,
}

/// Lookup side of the product and customer collections.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, id: &str) -> Result<Option<Product>>;

    async fn customer(&self, id: &str) -> Result<Option<Customer>>;

    /// Add-on services attachable to items of this product.
    async fn services_for_product(&self, product_id: &str) -> Result<Vec<ProductService>> {
        Ok(self
            .product(product_id)
            .await?
            .map(|p| p.services)
            .unwrap_or_default())
    }
}

/// In-process catalog, used for catalog files loaded by the CLI and in tests.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: HashMap<String, Product>,
    customers: HashMap<String, Customer>,
    service_lookups: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(mut self, products: impl IntoIterator<Item = Product>) -> Self {
        for p in products {
            self.products.insert(p.id.clone(), p);
        }
        self
    }

    pub fn with_customers(mut self, customers: impl IntoIterator<Item = Customer>) -> Self {
        for c in customers {
            self.customers.insert(c.id.clone(), c);
        }
        self
    }

    /// Number of service lookups served so far.
    pub fn service_lookups(&self) -> usize {
        self.service_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn product(&self, id: &str) -> Result<Option<Product>> {
        Ok(self.products.get(id).cloned())
    }

    async fn customer(&self, id: &str) -> Result<Option<Customer>> {
        Ok(self.customers.get(id).cloned())
    }

    async fn services_for_product(&self, product_id: &str) -> Result<Vec<ProductService>> {
        self.service_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .products
            .get(product_id)
            .map(|p| p.services.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_price_accepts_total_alias() {
        let s: ProductService =
            serde_json::from_str(r#"{"serviceId":"s1","serviceName":"Installation","total":25}"#).unwrap();
        assert_eq!(s.price, 25.0);
    }

    #[tokio::test]
    async fn memory_catalog_counts_service_lookups() {
        let catalog = MemoryCatalog::new().with_products([Product {
            id: "p1".into(),
            name: "Router".into(),
            selling_price: 100.0,
            description: String::new(),
            sku: "RT-1".into(),
            images: vec![],
            services: vec![ProductService {
                service_id: "s1".into(),
                service_name: "Installation".into(),
                price: 25.0,
            }],
        }]);

        let services = catalog.services_for_product("p1").await.unwrap();
        assert_eq!(services.len(), 1);
        assert!(catalog.services_for_product("missing").await.unwrap().is_empty());
        assert_eq!(catalog.service_lookups(), 2);
    }
}
