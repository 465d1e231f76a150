//! A mounted list surface
//!
//! `ListSurface` owns one `ListState` and executes the effects it asks for: page fetches,
//! item mutations and a realtime session. Every effect runs on its own task and reports back
//! through a channel; results are applied in `next`/`settle`, one at a time, so the list is
//! only ever mutated from the owner's task.
//!
//! Unmounting cancels the liveness token shared by every spawned task. Nothing queued before
//! or resolved after that point reaches the state.

use std::any::Any;
use std::future::{self, Future};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    infrastructure::{
        api::{ItemMutations, Mutation, PageSource, Resource},
        auth::{AuthSession, TokenRefresher},
        realtime::{RealtimeConfig, RealtimeHandle, RealtimeSession},
        socket::SocketTransport,
    },
    model::{
        edit::{EditOutcome, Message as EditMessage, PendingEdit},
        item::{merge_nested, Item, Payload},
        list::{FetchRequest, ListQuery, ListState, Message, Outcome, Page, Ticket},
        reconcile::{self, RealtimeEvent},
        session::ConnectionState,
    },
};

/// What `next` applied to the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceUpdate {
    PageMerged { page: u32, added: usize },
    PageFailed(Error),
    /// A page arrived for a fetch that was superseded
    StaleDiscarded,
    Reconciled { id: String, changed: bool },
    Mutated { id: String, changed: bool },
    Created { id: String },
    Removed { id: String },
    MutationFailed(Error),
    /// The realtime session stopped; only fetching keeps the list current
    RealtimeEnded,
}

impl SurfaceUpdate {
    /// The failure this update reports. A discarded page reports `StaleResponse`.
    pub fn error(&self) -> Option<Error> {
        match self {
            SurfaceUpdate::PageFailed(error) | SurfaceUpdate::MutationFailed(error) => {
                Some(error.clone())
            }
            SurfaceUpdate::StaleDiscarded => Some(Error::StaleResponse),
            _ => None,
        }
    }
}

/// How a confirmed mutation payload is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Fields,
    Nested,
    Remove,
}

enum Completion<T> {
    Page {
        ticket: Ticket,
        result: Result<Page<T>>,
    },
    Mutation {
        id: String,
        target: Target,
        result: Result<Payload>,
    },
    Created {
        parent_id: String,
        result: Result<Payload>,
    },
}

pub struct ListSurface<T, S> {
    state: ListState<T>,
    source: Arc<S>,
    alive: CancellationToken,
    tx: mpsc::UnboundedSender<Completion<T>>,
    rx: mpsc::UnboundedReceiver<Completion<T>>,
    /// Spawned fetches and mutations whose completion has not been applied yet
    outstanding: usize,
    realtime: Option<RealtimeHandle>,
}

impl<T: Item, S: PageSource<T>> ListSurface<T, S> {
    pub fn new(source: S, query: ListQuery, limit: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: ListState::new(query, limit),
            source: Arc::new(source),
            alive: CancellationToken::new(),
            tx,
            rx,
            outstanding: 0,
            realtime: None,
        }
    }

    pub fn state(&self) -> &ListState<T> {
        &self.state
    }

    pub fn is_mounted(&self) -> bool {
        !self.alive.is_cancelled()
    }

    /// Whether fetches or mutations are still running
    pub fn is_busy(&self) -> bool {
        self.outstanding > 0
    }

    pub fn realtime_state(&self) -> Option<ConnectionState> {
        self.realtime.as_ref().map(RealtimeHandle::state)
    }

    /// Request the first page
    pub fn mount(&mut self) {
        self.send(Message::Mounted);
    }

    pub fn sentinel_visibility_changed(&mut self, visible: bool) {
        self.send(Message::SentinelVisibilityChanged(visible));
    }

    pub fn set_query(&mut self, query: ListQuery) {
        self.send(Message::FilterChanged(query));
    }

    pub fn refresh(&mut self) {
        self.send(Message::RefreshRequested);
    }

    pub fn retry(&mut self) {
        self.send(Message::RetryRequested);
    }

    fn send(&mut self, message: Message<T>) {
        if !self.is_mounted() {
            return;
        }
        let (_, request) = self.state.update(message);
        if let Some(request) = request {
            self.fetch(request);
        }
    }

    fn fetch(&mut self, request: FetchRequest) {
        tracing::debug!("Fetching page {} of {}", request.page, request.epoch.as_str());
        let source = Arc::clone(&self.source);
        let (ticket, page) = (request.ticket, request.page);
        self.spawn(
            async move {
                let result = source.fetch_page(request).await;
                Completion::Page { ticket, result }
            },
            move |message| Completion::Page {
                ticket,
                result: Err(Error::Fetch { page, message }),
            },
        );
    }

    /// Local patch, e.g. a denormalized counter derived from another surface
    pub fn patch<F>(&mut self, id: &str, updater: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        self.is_mounted() && self.state.patch(id, updater)
    }

    /// Run `mutation` against the server and apply the confirmed result
    pub fn mutate<M: ItemMutations>(
        &mut self,
        api: &Arc<M>,
        resource: Resource,
        id: &str,
        mutation: Mutation,
    ) {
        if !self.is_mounted() {
            return;
        }
        let target = if mutation == Mutation::Delete {
            Target::Remove
        } else if mutation.targets_nested() {
            Target::Nested
        } else {
            Target::Fields
        };
        let api = Arc::clone(api);
        let id = id.to_string();
        let failed_id = id.clone();
        self.spawn(
            async move {
                let result = api.mutate(resource, &id, mutation).await;
                Completion::Mutation { id, target, result }
            },
            move |message| Completion::Mutation {
                id: failed_id.clone(),
                target,
                result: Err(Error::Mutation {
                    id: failed_id,
                    message,
                }),
            },
        );
    }

    /// Start saving `edit`. Returns the edit's outcome; nothing is sent unless it is `Save`.
    pub fn save_edit<M: ItemMutations>(
        &mut self,
        api: &Arc<M>,
        resource: Resource,
        edit: &mut PendingEdit,
    ) -> EditOutcome {
        let outcome = edit.update(EditMessage::SaveStarted);
        if let EditOutcome::Save(text) = &outcome {
            self.mutate(
                api,
                resource,
                edit.item_id(),
                Mutation::Edit { text: text.clone() },
            );
        }
        outcome
    }

    /// Post a new child item and show it at the top once the server confirms it
    pub fn create<M: ItemMutations>(
        &mut self,
        api: &Arc<M>,
        resource: Resource,
        parent_id: &str,
        text: &str,
    ) {
        if !self.is_mounted() {
            return;
        }
        let api = Arc::clone(api);
        let parent_id = parent_id.to_string();
        let failed_id = parent_id.clone();
        let text = text.to_string();
        self.spawn(
            async move {
                let result = api.create(resource, &parent_id, &text).await;
                Completion::Created { parent_id, result }
            },
            move |message| Completion::Created {
                parent_id: failed_id.clone(),
                result: Err(Error::Mutation {
                    id: failed_id,
                    message,
                }),
            },
        );
    }

    /// Open a realtime session bound to this surface's lifetime
    pub fn connect_realtime<Tr, R>(
        &mut self,
        transport: Tr,
        auth: AuthSession,
        refresher: Arc<R>,
        config: RealtimeConfig,
    ) where
        Tr: SocketTransport,
        R: TokenRefresher,
    {
        if !self.is_mounted() {
            return;
        }
        let handle =
            RealtimeSession::spawn(transport, auth, refresher, config, self.alive.child_token());
        self.attach_realtime(handle);
    }

    /// Deliver the events of `handle` to this surface, replacing any previous session
    pub fn attach_realtime(&mut self, handle: RealtimeHandle) {
        if self.is_mounted() {
            self.realtime = Some(handle);
        }
    }

    /// Run `work` on its own task. A panicking task still reports back, through `failed`, so
    /// that `outstanding` always drains.
    fn spawn<F, E>(&mut self, work: F, failed: E)
    where
        F: Future<Output = Completion<T>> + Send + 'static,
        E: FnOnce(String) -> Completion<T> + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.tx.clone();
        let alive = self.alive.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = alive.cancelled() => {}
                outcome = AssertUnwindSafe(work).catch_unwind() => {
                    let completion = outcome.unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        tracing::error!("List task panicked: {message}");
                        failed(message)
                    });
                    let _ = tx.send(completion);
                }
            }
        });
    }

    /// Wait for the next fetch, mutation or realtime event and apply it.
    ///
    /// Returns `None` once unmounted, or when nothing is outstanding and no realtime session
    /// is attached.
    pub async fn next(&mut self) -> Option<SurfaceUpdate> {
        loop {
            if !self.is_mounted() || (self.outstanding == 0 && self.realtime.is_none()) {
                return None;
            }
            let update = tokio::select! {
                biased;
                () = self.alive.cancelled() => return None,
                Some(completion) = self.rx.recv(), if self.outstanding > 0 => {
                    self.complete(completion)
                }
                event = next_realtime(&mut self.realtime) => match event {
                    Some(event) => Some(self.reconcile(&event)),
                    None => {
                        self.realtime = None;
                        Some(SurfaceUpdate::RealtimeEnded)
                    }
                },
            };
            if update.is_some() {
                return update;
            }
        }
    }

    /// Apply completions until no fetch or mutation is outstanding. Realtime events stay
    /// queued for `next`.
    pub async fn settle(&mut self) -> Vec<SurfaceUpdate> {
        let mut updates = Vec::new();
        while self.is_mounted() && self.outstanding > 0 {
            let completion = tokio::select! {
                biased;
                () = self.alive.cancelled() => break,
                completion = self.rx.recv() => completion,
            };
            let Some(completion) = completion else {
                break;
            };
            updates.extend(self.complete(completion));
        }
        updates
    }

    /// Cancel everything in flight and close the realtime session
    pub async fn unmount(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.alive.cancel();
        self.rx.close();
        self.outstanding = 0;
        if let Some(mut realtime) = self.realtime.take() {
            realtime.shutdown().await;
        }
        tracing::debug!("List surface unmounted");
    }

    fn complete(&mut self, completion: Completion<T>) -> Option<SurfaceUpdate> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if !self.is_mounted() {
            return None;
        }
        match completion {
            Completion::Page { ticket, result } => {
                let message = match result {
                    Ok(page) => Message::PageLoaded { ticket, page },
                    Err(error) => Message::PageFailed { ticket, error },
                };
                match self.state.update(message).0 {
                    Outcome::PageMerged { page, added } => {
                        Some(SurfaceUpdate::PageMerged { page, added })
                    }
                    Outcome::Failed(error) => Some(SurfaceUpdate::PageFailed(error)),
                    Outcome::Discarded => Some(SurfaceUpdate::StaleDiscarded),
                    Outcome::Unchanged => None,
                }
            }
            Completion::Mutation { id, target, result } => match result {
                Ok(payload) => Some(self.apply_confirmed(id, target, &payload)),
                Err(error) => {
                    tracing::error!("{error}");
                    Some(SurfaceUpdate::MutationFailed(error))
                }
            },
            Completion::Created { parent_id, result } => {
                let created = result.and_then(|payload| {
                    serde_json::from_value::<T>(Value::Object(payload)).map_err(|e| {
                        Error::Mutation {
                            id: parent_id.clone(),
                            message: e.to_string(),
                        }
                    })
                });
                match created {
                    Ok(item) => {
                        let id = item.id().to_string();
                        self.state.prepend(item);
                        Some(SurfaceUpdate::Created { id })
                    }
                    Err(error) => {
                        tracing::error!("{error}");
                        Some(SurfaceUpdate::MutationFailed(error))
                    }
                }
            }
        }
    }

    fn apply_confirmed(
        &mut self,
        id: String,
        target: Target,
        payload: &Payload,
    ) -> SurfaceUpdate {
        match target {
            Target::Fields => {
                let changed = self.state.merge(&id, payload);
                SurfaceUpdate::Mutated { id, changed }
            }
            Target::Nested => {
                let merged = self
                    .state
                    .get(&id)
                    .and_then(|item| merge_nested(item, payload));
                let changed = merged.is_some_and(|merged| self.state.patch(&id, move |_| merged));
                SurfaceUpdate::Mutated { id, changed }
            }
            Target::Remove => {
                self.state.remove(&id);
                SurfaceUpdate::Removed { id }
            }
        }
    }

    fn reconcile(&mut self, event: &RealtimeEvent) -> SurfaceUpdate {
        let changed = reconcile::apply(&mut self.state, event);
        SurfaceUpdate::Reconciled {
            id: event.id().unwrap_or_default().to_string(),
            changed,
        }
    }
}

impl<T, S> Drop for ListSurface<T, S> {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}

async fn next_realtime(realtime: &mut Option<RealtimeHandle>) -> Option<RealtimeEvent> {
    match realtime {
        Some(handle) => handle.recv().await,
        None => future::pending().await,
    }
}
