//! # Payload Merging
//!
//! Downstream tasks receive the outputs of every ancestor, with each output
//! key namespaced as `"{task_id}__{key}"`. Two tasks can both emit `status`
//! or `result` without ever clobbering each other; consumers address
//! upstream values explicitly (`extract__rows`, `score__result`).

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Separator between the producing task's id and its output key
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Merge upstream task outputs into a single mapping with namespaced keys.
///
/// The result is key-sorted, so merge order never affects the outcome.
pub fn merge_payloads(upstream: &HashMap<String, Map<String, Value>>) -> Map<String, Value> {
    let mut merged = Map::new();
    for (task_id, output) in upstream {
        for (key, value) in output {
            merged.insert(
                format!("{task_id}{NAMESPACE_SEPARATOR}{key}"),
                value.clone(),
            );
        }
    }
    merged
}
