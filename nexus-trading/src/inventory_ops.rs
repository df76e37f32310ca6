//! Minimal structural access into the opaque `inventory` JSON blob on a
//! `PlayerRecord` (the item catalog itself is out of scope, but trade
//! execution still has to read/adjust quantities). The shape assumed here
//! is the simplest one that supports that: an array of `{"item": <id>,
//! "qty": <u64>}` objects.

use serde_json::{json, Value};

#[must_use]
pub fn item_qty(inventory: &Value, item: &str) -> u64 {
    inventory
        .as_array()
        .into_iter()
        .flatten()
        .find(|entry| entry.get("item").and_then(Value::as_str) == Some(item))
        .and_then(|entry| entry.get("qty"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Adjusts `item`'s quantity by `delta`. Returns `false` without mutating
/// `inventory` if the adjustment would underflow below zero.
pub fn adjust_item(inventory: &mut Value, item: &str, delta: i64) -> bool {
    let current = item_qty(inventory, item) as i64;
    let next = current + delta;
    if next < 0 {
        return false;
    }

    let entries = inventory
        .as_array_mut()
        .expect("inventory is always a JSON array");

    if let Some(entry) = entries
        .iter_mut()
        .find(|entry| entry.get("item").and_then(Value::as_str) == Some(item))
    {
        entry["qty"] = json!(next);
    } else if next > 0 {
        entries.push(json!({ "item": item, "qty": next }));
    }

    entries.retain(|entry| entry.get("qty").and_then(Value::as_u64) != Some(0));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_adds_new_item_entry() {
        let mut inv = Value::Array(vec![]);
        assert!(adjust_item(&mut inv, "sword", 2));
        assert_eq!(item_qty(&inv, "sword"), 2);
    }

    #[test]
    fn adjust_rejects_underflow() {
        let mut inv = json!([{"item": "sword", "qty": 1}]);
        assert!(!adjust_item(&mut inv, "sword", -2));
        assert_eq!(item_qty(&inv, "sword"), 1);
    }

    #[test]
    fn adjust_to_zero_removes_entry() {
        let mut inv = json!([{"item": "sword", "qty": 2}]);
        assert!(adjust_item(&mut inv, "sword", -2));
        assert_eq!(item_qty(&inv, "sword"), 0);
        assert!(inv.as_array().unwrap().is_empty());
    }
}
