//! Identity and shallow-merge semantics shared by every list item
//!
//! Server payloads are partial JSON objects. Merging goes through `serde_json::Value` so that
//! payload fields win over the local copy while fields the payload omits are left untouched.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// An embedded sub-object addressed by `nested-item-updated` events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nested<'a> {
    /// Field name of the sub-object in the item's wire representation
    pub field: &'static str,
    /// Identity of the sub-object
    pub id: &'a str,
}

/// An element of a paginated list
pub trait Item: Clone + Serialize + DeserializeOwned + Send + 'static {
    fn id(&self) -> &str;

    /// The embedded sub-object, when the item has one and it is present
    fn nested(&self) -> Option<Nested<'_>> {
        None
    }
}

/// Partial payload delivered by the server, keyed by wire field names
pub type Payload = Map<String, Value>;

/// Wire name some server records use for `id`
const ID_ALIAS: &str = "_id";

/// Read the `id` (or `_id`) field of a payload
pub fn payload_id(payload: &Payload) -> Option<&str> {
    payload
        .get("id")
        .or_else(|| payload.get(ID_ALIAS))
        .and_then(Value::as_str)
}

/// Copy payload fields over `target`. `_id` is written as `id` so the merged object never
/// carries both spellings.
fn merge_into(target: &mut Map<String, Value>, payload: &Payload) {
    for (key, value) in payload {
        let key = if key == ID_ALIAS { "id" } else { key.as_str() };
        target.insert(key.to_string(), value.clone());
    }
}

/// Shallow-merge `payload` over `item`; payload fields win.
///
/// Returns `None` when the merged object no longer deserializes as `T` (e.g. a payload with
/// a mistyped field), in which case the caller keeps the original item.
pub fn merge_item<T: Item>(item: &T, payload: &Payload) -> Option<T> {
    let Ok(Value::Object(mut object)) = serde_json::to_value(item) else {
        return None;
    };
    merge_into(&mut object, payload);
    match serde_json::from_value(Value::Object(object)) {
        Ok(merged) => Some(merged),
        Err(e) => {
            tracing::warn!("Ignoring payload for item {}: {e}", item.id());
            None
        }
    }
}

/// Shallow-merge `payload` into the item's nested sub-object only.
///
/// Sibling fields of the item are untouched. Returns `None` when the item has no nested
/// sub-object (the absent case) or the merged result is not a valid `T`.
pub fn merge_nested<T: Item>(item: &T, payload: &Payload) -> Option<T> {
    let nested = item.nested()?;
    let Ok(Value::Object(mut object)) = serde_json::to_value(item) else {
        return None;
    };
    let Some(Value::Object(sub)) = object.get_mut(nested.field) else {
        return None;
    };
    merge_into(sub, payload);
    match serde_json::from_value(Value::Object(object)) {
        Ok(merged) => Some(merged),
        Err(e) => {
            tracing::warn!(
                "Ignoring nested payload for {}.{}: {e}",
                item.id(),
                nested.field
            );
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::testing::{card, Job};
    use super::*;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_merge_item_payload_wins() {
        let item = card(7);
        let merged = merge_item(&item, &payload(json!({"id": "7", "status": "completed"})))
            .expect("valid merge");

        assert_eq!(merged.status.as_deref(), Some("completed"));
        assert_eq!(merged.title, item.title);
    }

    #[test]
    fn test_merge_item_uses_wire_names() {
        let merged = merge_item(&card(1), &payload(json!({"liked": true, "likeCount": 6})))
            .expect("valid merge");

        assert!(merged.liked);
        assert_eq!(merged.like_count, 6);
    }

    #[test]
    fn test_merge_item_rejects_mistyped_payload() {
        assert_eq!(merge_item(&card(1), &payload(json!({"likeCount": "many"}))), None);
    }

    #[test]
    fn test_merge_nested_leaves_siblings() {
        let mut item = card(3);
        item.status = Some("draft".to_string());
        item.job = Some(Job {
            id: "a1".to_string(),
            status: "pending".to_string(),
        });

        let merged = merge_nested(&item, &payload(json!({"id": "a1", "status": "completed"})))
            .expect("valid merge");

        assert_eq!(
            merged.job,
            Some(Job {
                id: "a1".to_string(),
                status: "completed".to_string(),
            })
        );
        assert_eq!(merged.status.as_deref(), Some("draft"));
    }

    #[test]
    fn test_merge_nested_absent() {
        assert_eq!(merge_nested(&card(3), &payload(json!({"id": "a1"}))), None);
    }

    #[test]
    fn test_payload_id() {
        assert_eq!(payload_id(&payload(json!({"id": "9"}))), Some("9"));
        assert_eq!(payload_id(&payload(json!({"_id": "9"}))), Some("9"));
        assert_eq!(payload_id(&payload(json!({"id": 9}))), None);
    }

    #[test]
    fn test_merge_item_accepts_underscore_id() {
        let merged = merge_item(
            &card(4),
            &payload(json!({"_id": "4", "status": "completed"})),
        )
        .expect("valid merge");

        assert_eq!(merged.id, "4");
        assert_eq!(merged.status.as_deref(), Some("completed"));
    }

    #[test]
    fn test_merge_nested_accepts_underscore_id() {
        let mut item = card(5);
        item.job = Some(Job {
            id: "a5".to_string(),
            status: "pending".to_string(),
        });

        let merged = merge_nested(&item, &payload(json!({"_id": "a5", "status": "failed"})))
            .expect("valid merge");

        assert_eq!(merged.job.map(|job| job.status), Some("failed".to_string()));
    }
}
