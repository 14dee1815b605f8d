//! Products and promotions per store

use super::types::{Offering, Promotion, Store};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInventory {
    pub store_id: i64,
    pub name: String,
    pub product_count: usize,
    pub promotion_count: usize,
}

/// Join counts keyed by `store_id`, in the stores' input order
///
/// Promotions or offerings pointing at an unknown store are skipped.
pub fn store_inventory(stores: &[Store], promotions: &[Promotion], offerings: &[Offering]) -> Vec<StoreInventory> {
    let mut counts: HashMap<i64, (usize, usize)> = stores.iter().map(|s| (s.id, (0, 0))).collect();

    let mut orphans = 0usize;
    for offering in offerings {
        match counts.get_mut(&offering.store_id) {
            Some(c) => c.0 += 1,
            None => orphans += 1,
        }
    }
    for promo in promotions {
        match counts.get_mut(&promo.store_id) {
            Some(c) => c.1 += 1,
            None => orphans += 1,
        }
    }
    if orphans > 0 {
        log::debug!("{} inventory rows reference unknown stores", orphans);
    }

    stores
        .iter()
        .map(|s| {
            let (products, promos) = counts.get(&s.id).copied().unwrap_or((0, 0));
            StoreInventory {
                store_id: s.id,
                name: s.name.clone(),
                product_count: products,
                promotion_count: promos,
            }
        })
        .collect()
}
