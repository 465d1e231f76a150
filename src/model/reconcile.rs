//! Applying out-of-band realtime updates to list state
//!
//! Reconciliation only ever patches existing items. It never touches the page counter,
//! `has_more`, the loading flag or item order, so it commutes with pagination: an update
//! applied before or after a page merge yields the same items.

use crate::model::{
    item::{merge_nested, payload_id, Item, Payload},
    list::ListState,
};

/// An update pushed by the server over the socket
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Partial or full item payload identified by its `id`
    ItemUpdated(Payload),
    /// Partial payload of a sub-object embedded in an item, identified by the sub-object's `id`
    NestedItemUpdated(Payload),
}

impl RealtimeEvent {
    /// The id carried by the payload
    pub fn id(&self) -> Option<&str> {
        match self {
            RealtimeEvent::ItemUpdated(payload) | RealtimeEvent::NestedItemUpdated(payload) => {
                payload_id(payload)
            }
        }
    }
}

/// Apply `event` to `list`. Returns whether an item changed.
pub fn apply<T: Item>(list: &mut ListState<T>, event: &RealtimeEvent) -> bool {
    let Some(id) = event.id() else {
        tracing::warn!("Ignoring realtime event without id");
        return false;
    };
    match event {
        RealtimeEvent::ItemUpdated(payload) => list.merge(id, payload),
        RealtimeEvent::NestedItemUpdated(payload) => {
            let Some(item) = list.find_by_nested(id) else {
                return false;
            };
            let Some(merged) = merge_nested(item, payload) else {
                return false;
            };
            let item_id = item.id().to_string();
            list.patch(&item_id, move |_| merged)
        }
    }
}
