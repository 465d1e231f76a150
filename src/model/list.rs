//! Paginated collection state
//!
//! `ListState` coordinates three children, following the same orchestration style as
//! the rest of the model layer:
//! - `Pagination` tracks page numbers, `has_more` and the in-flight fetch
//! - `Sentinel` turns viewport visibility into "load the next page" crossings
//! - `ListQuery`/`FilterEpoch` identify which criteria produced the items
//!
//! `update` never performs I/O. When a message requires a fetch it returns a `FetchRequest`
//! that the owner executes and answers with `Message::PageLoaded` or `Message::PageFailed`
//! carrying the same ticket. Any answer whose ticket is not the one in flight is discarded,
//! which covers both responses from a previous filter epoch and responses to a fetch that
//! was superseded by a refresh.

pub mod filter;
pub mod pagination;
pub mod sentinel;

use std::collections::HashSet;

use crate::{
    error::Error,
    model::item::{merge_item, Item, Payload},
};

pub use self::{
    filter::{FilterEpoch, ListQuery},
    pagination::Ticket,
};
use self::{
    pagination::{Message as PaginationMessage, Pagination},
    sentinel::{Message as SentinelMessage, Sentinel},
};

/// Default number of items per page
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// One page of results as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
}

/// A fetch the owner of the list must execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: Ticket,
    pub page: u32,
    pub limit: u32,
    pub query: ListQuery,
    pub epoch: FilterEpoch,
}

/// What happened to the list as a result of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A page was merged; `added` counts genuinely new items
    PageMerged { page: u32, added: usize },
    /// A response arrived for a fetch that is no longer current
    Discarded,
    /// The in-flight fetch failed and the page can be retried
    Failed(Error),
    /// Nothing changed
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    /// The owning surface was mounted and wants its first page
    Mounted,
    /// The trailing marker entered or left the viewport
    SentinelVisibilityChanged(bool),
    /// Filter, sort or search criteria changed
    FilterChanged(ListQuery),
    /// The user asked to reload from the first page
    RefreshRequested,
    /// The user asked to retry the page that failed
    RetryRequested,
    /// A fetch resolved successfully
    PageLoaded { ticket: Ticket, page: Page<T> },
    /// A fetch failed
    PageFailed { ticket: Ticket, error: Error },
}

#[derive(Debug, Clone)]
pub struct ListState<T> {
    items: Vec<T>,
    ids: HashSet<String>,
    query: ListQuery,
    epoch: FilterEpoch,
    pagination: Pagination,
    sentinel: Sentinel,
    error: Option<Error>,
    limit: u32,
    next_ticket: u64,
    // Incremented on every observable change
    revision: u64,
}

impl<T: Item> Default for ListState<T> {
    fn default() -> Self {
        Self::new(ListQuery::default(), DEFAULT_PAGE_LIMIT)
    }
}

impl<T: Item> ListState<T> {
    pub fn new(query: ListQuery, limit: u32) -> Self {
        Self {
            items: Vec::new(),
            ids: HashSet::new(),
            epoch: query.epoch(),
            query,
            pagination: Pagination::new(),
            sentinel: Sentinel::new(),
            error: None,
            limit: limit.max(1),
            next_ticket: 0,
            revision: 0,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn page(&self) -> u32 {
        self.pagination.page()
    }

    pub fn has_more(&self) -> bool {
        self.pagination.has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.pagination.is_loading()
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn epoch(&self) -> &FilterEpoch {
        &self.epoch
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// The last fetch failure, cleared by the next successful page
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the trailing marker should be rendered at all
    pub fn is_sentinel_rendered(&self) -> bool {
        self.has_more()
    }

    /// The first page loaded and came back empty
    pub fn is_empty_state(&self) -> bool {
        self.items.is_empty()
            && !self.has_more()
            && !self.is_loading()
            && self.pagination.loaded_page() >= 1
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.pagination.is_current(ticket)
    }

    pub fn update(&mut self, message: Message<T>) -> (Outcome, Option<FetchRequest>) {
        match message {
            Message::Mounted => {
                if self.is_loading() || self.pagination.loaded_page() > 0 {
                    return (Outcome::Unchanged, None);
                }
                let page = self.pagination.next_page();
                (Outcome::Unchanged, Some(self.request(page)))
            }
            Message::SentinelVisibilityChanged(visible) => {
                let crossed = self
                    .sentinel
                    .update(SentinelMessage::VisibilityChanged(visible));
                if !crossed || !self.has_more() || self.is_loading() {
                    return (Outcome::Unchanged, None);
                }
                let page = self.pagination.next_page();
                (Outcome::Unchanged, Some(self.request(page)))
            }
            Message::FilterChanged(query) => {
                let epoch = query.epoch();
                if epoch == self.epoch {
                    return (Outcome::Unchanged, None);
                }
                tracing::debug!("Filter epoch changed to {}", epoch.as_str());
                // Reset before the new epoch's first request is minted so no page of the
                // old epoch can be merged afterwards.
                self.reset();
                self.query = query;
                self.epoch = epoch;
                (Outcome::Unchanged, Some(self.request(1)))
            }
            Message::RefreshRequested => {
                self.reset();
                (Outcome::Unchanged, Some(self.request(1)))
            }
            Message::RetryRequested => {
                if self.error.is_none() || self.is_loading() {
                    return (Outcome::Unchanged, None);
                }
                let page = self.pagination.next_page();
                (Outcome::Unchanged, Some(self.request(page)))
            }
            Message::PageLoaded { ticket, page } => {
                if !self.is_current(ticket) {
                    tracing::debug!("Discarding stale page {}", page.current_page);
                    return (Outcome::Discarded, None);
                }
                let requested = self.pagination.page();
                let added = if requested == 1 {
                    self.replace(page.items)
                } else {
                    self.append(page.items)
                };
                self.pagination.update(PaginationMessage::PageLoaded {
                    ticket,
                    current_page: page.current_page,
                    total_pages: page.total_pages,
                });
                self.error = None;
                self.touch();
                (
                    Outcome::PageMerged {
                        page: requested,
                        added,
                    },
                    None,
                )
            }
            Message::PageFailed { ticket, error } => {
                if !self.is_current(ticket) {
                    return (Outcome::Discarded, None);
                }
                tracing::error!("{error}");
                self.pagination
                    .update(PaginationMessage::PageFailed { ticket });
                self.error = Some(error.clone());
                self.touch();
                (Outcome::Failed(error), None)
            }
        }
    }

    /// Shorthand for `Message::Mounted`
    pub fn start(&mut self) -> Option<FetchRequest> {
        self.update(Message::Mounted).1
    }

    /// Shorthand for `Message::RefreshRequested`
    pub fn refresh(&mut self) -> Option<FetchRequest> {
        self.update(Message::RefreshRequested).1
    }

    /// Shorthand for `Message::RetryRequested`
    pub fn retry(&mut self) -> Option<FetchRequest> {
        self.update(Message::RetryRequested).1
    }

    /// Insert a newly created item at the top. Returns `false` if it is already listed.
    pub fn prepend(&mut self, item: T) -> bool {
        if !self.ids.insert(item.id().to_string()) {
            return false;
        }
        self.items.insert(0, item);
        self.touch();
        true
    }

    /// Replace the item with `id` by `updater(item)`. Returns `false` when no such item.
    pub fn patch<F>(&mut self, id: &str, updater: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let Some(slot) = self.items.iter_mut().find(|item| item.id() == id) else {
            return false;
        };
        let updated = updater(slot);
        if updated.id() != id {
            tracing::warn!("Refusing patch that changes identity of {id}");
            return false;
        }
        *slot = updated;
        self.touch();
        true
    }

    /// Shallow-merge a server payload into the item with `id`
    pub fn merge(&mut self, id: &str, payload: &Payload) -> bool {
        let Some(merged) = self.get(id).and_then(|item| merge_item(item, payload)) else {
            return false;
        };
        self.patch(id, move |_| merged)
    }

    /// Remove the item with `id`, returning it
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        self.ids.remove(id);
        let removed = self.items.remove(index);
        self.touch();
        Some(removed)
    }

    /// Find the item whose nested sub-object has `nested_id`
    pub fn find_by_nested(&self, nested_id: &str) -> Option<&T> {
        self.items
            .iter()
            .find(|item| item.nested().is_some_and(|nested| nested.id == nested_id))
    }

    fn request(&mut self, page: u32) -> FetchRequest {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pagination
            .update(PaginationMessage::PageRequested { ticket, page });
        self.touch();
        FetchRequest {
            ticket,
            page,
            limit: self.limit,
            query: self.query.clone(),
            epoch: self.epoch.clone(),
        }
    }

    fn reset(&mut self) {
        self.items.clear();
        self.ids.clear();
        self.error = None;
        self.pagination.update(PaginationMessage::Reset);
        self.touch();
    }

    fn replace(&mut self, items: Vec<T>) -> usize {
        self.items.clear();
        self.ids.clear();
        self.append(items)
    }

    fn append(&mut self, items: Vec<T>) -> usize {
        let before = self.items.len();
        for item in items {
            if self.ids.insert(item.id().to_string()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
