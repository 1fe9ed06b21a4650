use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{Product, StringSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationPath(pub Vec<Product>);

impl MigrationPath {
    pub fn products(&self) -> &[Product] {
        &self.0
    }

    pub fn is_available(&self) -> bool {
        self.0.iter().all(|product| product.available)
    }

    pub fn base_product(&self) -> Option<&Product> {
        self.0.iter().find(|product| product.is_base)
    }

    pub fn sort(&mut self, installed: &StringSet) {
        sort_migration_products(&mut self.0, installed);
    }
}

impl From<Vec<Product>> for MigrationPath {
    fn from(products: Vec<Product>) -> Self {
        Self(products)
    }
}

/// Stable sort: base products, then products not yet installed, then
/// installed products. `installed` holds triplet strings.
pub fn sort_migration_products(products: &mut [Product], installed: &StringSet) {
    products.sort_by_key(|product| {
        if product.is_base {
            0u8
        } else if !installed.contains(&product.to_triplet()) {
            1
        } else {
            2
        }
    });
}

/// Compares `VERSION[-RELEASE]` strings on their version part. A missing
/// segment counts as zero.
pub fn compare_editions(left: &str, right: &str) -> Ordering {
    let left = version_part(left);
    let right = version_part(right);
    let left_segments: Vec<&str> = left.split('.').collect();
    let right_segments: Vec<&str> = right.split('.').collect();

    for index in 0..left_segments.len().max(right_segments.len()) {
        let a = left_segments.get(index).copied().unwrap_or("0");
        let b = right_segments.get(index).copied().unwrap_or("0");
        let ordering = match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn version_part(edition: &str) -> &str {
    edition.split('-').next().unwrap_or(edition)
}
