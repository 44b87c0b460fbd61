//! Merge raw hits across sources by link.

use std::collections::HashMap;

use eventfeed_shared::RawHit;

/// Collapse hits to one entry per link.
///
/// Each link keeps the slot of its first occurrence and the fields of its
/// last occurrence.
pub fn dedupe_hits(hits: Vec<RawHit>) -> Vec<RawHit> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(hits.len());
    let mut unique: Vec<RawHit> = Vec::with_capacity(hits.len());

    for hit in hits {
        match slots.get(&hit.link) {
            Some(&slot) => unique[slot] = hit,
            None => {
                slots.insert(hit.link.clone(), unique.len());
                unique.push(hit);
            }
        }
    }

    unique
}
