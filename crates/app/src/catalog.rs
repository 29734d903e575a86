//! Product catalog boundary.
//!
//! The catalog itself is maintained elsewhere; the engines only need a name,
//! a unit and the default minimum stock per product, so this is a thin
//! read-mostly registry rather than an aggregate.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use shopledger_core::ProductId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub unit: String,
    /// Default low-stock minimum; `0` disables alerting for the product.
    pub min_stock: i64,
}

#[derive(Default)]
pub struct ProductCatalog {
    products: RwLock<HashMap<ProductId, ProductInfo>>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, product_id: ProductId, info: ProductInfo) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product_id, info);
        }
    }

    pub fn get(&self, product_id: ProductId) -> Option<ProductInfo> {
        self.products
            .read()
            .ok()
            .and_then(|products| products.get(&product_id).cloned())
    }

    /// Default minimum for alerting; unknown products default to no alerting.
    pub fn min_stock(&self, product_id: ProductId) -> i64 {
        self.get(product_id).map(|info| info.min_stock).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_product_has_no_minimum() {
        let catalog = ProductCatalog::new();
        assert_eq!(catalog.min_stock(ProductId::new()), 0);
    }

    #[test]
    fn upsert_overwrites() {
        let catalog = ProductCatalog::new();
        let id = ProductId::new();
        catalog.upsert(id, ProductInfo { name: "Rice".into(), unit: "bag".into(), min_stock: 5 });
        catalog.upsert(id, ProductInfo { name: "Rice".into(), unit: "bag".into(), min_stock: 8 });
        assert_eq!(catalog.min_stock(id), 8);
    }
}
