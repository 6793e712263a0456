//! Latest-wins reduction within one poll cycle.

use std::collections::HashMap;

use crate::domain::Observation;

/// Collapse entities sharing a subject key to exactly one per key.
///
/// The survivor has the greatest reference timestamp. An entity without a
/// timestamp loses to any entity with one; among entities that all lack one,
/// or that share the same timestamp, the first seen is kept. Output keeps
/// the order in which each key was first seen.
pub fn dedup_latest<T: Observation>(items: Vec<T>) -> Vec<T> {
    let mut slots: Vec<T> = Vec::with_capacity(items.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());

    for item in items {
        match index.get(item.subject_key()) {
            None => {
                index.insert(item.subject_key().to_string(), slots.len());
                slots.push(item);
            }
            Some(&pos) => {
                // None < Some(_) for Option ordering, so undated entries lose.
                if item.reference_time() > slots[pos].reference_time() {
                    slots[pos] = item;
                }
            }
        }
    }

    slots
}
