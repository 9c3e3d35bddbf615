// In-memory product catalog
mod product;

pub use product::{gen_product_code, is_alphanumeric, round_price, Product};

use crate::error::CatalogError;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct Catalog {
    items: RwLock<Vec<Product>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { items: RwLock::new(Vec::new()) }
    }

    pub fn with_demo_data() -> Self {
        crate::log::info("loading dummy data...");
        let c = Catalog::new();
        c.write().extend([
            Product::new("A12T-4GH7-QPL9-3N4M", "Lettuce", 3.46),
            Product::new("E5T6-9UI3-TH15-QR88", "Peach", 2.99),
            Product::new("YRT6-72AS-K736-L4AR", "Green Pepper", 0.79),
            Product::new("TQ4C-VV6T-75ZX-1RMR", "Gala Apple", 3.59),
        ]);
        crate::log::info("dummy data loaded");
        c
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Product>> {
        match self.items.read() {
            Ok(g) => g,
            Err(poisoned) => {
                crate::log::warn("catalog: lock recovered after panic");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Product>> {
        match self.items.write() {
            Ok(g) => g,
            Err(poisoned) => {
                crate::log::warn("catalog: lock recovered after panic");
                poisoned.into_inner()
            }
        }
    }

    /// Case-insensitive substring match on the product name.
    pub fn search(&self, name: &str) -> Vec<Product> {
        let needle = name.to_lowercase();
        self.read()
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn get(&self, code: &str) -> Option<Product> {
        if code.is_empty() {
            return None;
        }
        self.read().iter().find(|p| p.code.eq_ignore_ascii_case(code)).cloned()
    }

    /// Validates every product, then assigns codes and rounds prices.
    /// Nothing is stored if any product is invalid.
    pub fn put(&self, mut items: Vec<Product>) -> Result<Vec<Product>, Vec<CatalogError>> {
        let errs: Vec<CatalogError> = items
            .iter()
            .filter(|p| !is_alphanumeric(&p.name))
            .map(|p| CatalogError::NotAlphanumeric(p.name.clone()))
            .collect();
        if !errs.is_empty() {
            return Err(errs);
        }
        for p in items.iter_mut() {
            p.code = gen_product_code();
            p.price = round_price(p.price, 2);
        }
        self.write().extend(items.iter().cloned());
        Ok(items)
    }

    pub fn del(&self, code: &str) -> Result<(), CatalogError> {
        if code.is_empty() {
            return Err(CatalogError::InvalidCode);
        }
        self.write().retain(|p| !p.code.eq_ignore_ascii_case(code));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
