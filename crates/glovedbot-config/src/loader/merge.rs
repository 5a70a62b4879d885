//! JSON merge for layered configuration.

use serde_json::Value;

/// Merge `overlay` into `base`; objects merge key by key, anything else replaces.
///
/// Arrays are replaced wholesale, so a higher layer's `example_conversations`
/// fully supersedes a lower one's.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
