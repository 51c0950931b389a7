use std::collections::HashMap;

use crate::domain::catalog::{CatalogEntry, RegionalPrice};

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_code: HashMap<String, usize>,
}

impl Catalog {
    /// Later entries with a repeated code shadow earlier ones.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let by_code =
            entries.iter().enumerate().map(|(index, entry)| (entry.code.clone(), index)).collect();
        Self { entries, by_code }
    }

    pub fn find(&self, code: &str) -> Option<&CatalogEntry> {
        self.by_code.get(code).map(|index| &self.entries[*index])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Regional unit rates keyed by (catalog code, region).
#[derive(Clone, Debug, Default)]
pub struct PriceBook {
    prices: HashMap<(String, String), RegionalPrice>,
}

impl PriceBook {
    /// When a code has several rows for one region, the latest `effective_date` wins.
    pub fn new(prices: Vec<RegionalPrice>) -> Self {
        let mut book: HashMap<(String, String), RegionalPrice> = HashMap::new();
        for price in prices {
            let key = (price.line_item_code.clone(), price.region_id.clone());
            match book.get(&key) {
                Some(existing) if existing.effective_date > price.effective_date => {}
                _ => {
                    book.insert(key, price);
                }
            }
        }
        Self { prices: book }
    }

    pub fn find(&self, code: &str, region_id: &str) -> Option<&RegionalPrice> {
        self.prices.get(&(code.to_string(), region_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
