use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use stockline_core::{ProductId, Quantity};

/// Product identity as seen by the inventory core: id plus reorder band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
    pub reorder_min: Quantity,
    pub reorder_max: Quantity,
}

/// Read-only product lookup.
///
/// Implementations may be backed by anything (the surrounding application
/// owns product data); the core only asks for identity and thresholds.
pub trait ProductCatalog: Send + Sync {
    fn get_product(&self, product_id: ProductId) -> Option<ProductRef>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn get_product(&self, product_id: ProductId) -> Option<ProductRef> {
        (**self).get_product(product_id)
    }
}

/// In-memory catalog for wiring and tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductRef>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, product: ProductRef) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product.id, product);
        }
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn get_product(&self, product_id: ProductId) -> Option<ProductRef> {
        self.products
            .read()
            .ok()
            .and_then(|products| products.get(&product_id).cloned())
    }
}
