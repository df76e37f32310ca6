use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One side's standing offer in a trade session. Items are keyed by item
/// id with a positive quantity; `BTreeMap` keeps serialized offers (and
/// audit log entries) stable for snapshots/tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub items: BTreeMap<String, u32>,
    pub credits: u64,
}

impl Offer {
    pub fn add_item(&mut self, item: &str, qty: u32) {
        *self.items.entry(item.to_string()).or_insert(0) += qty;
    }

    /// Returns `false` (no-op) if removing `qty` would underflow the
    /// currently offered quantity.
    pub fn remove_item(&mut self, item: &str, qty: u32) -> bool {
        let Some(current) = self.items.get_mut(item) else {
            return false;
        };
        if *current < qty {
            return false;
        }
        *current -= qty;
        if *current == 0 {
            self.items.remove(item);
        }
        true
    }

    pub fn set_credits(&mut self, credits: u64) {
        self.credits = credits;
    }
}
