//! The socket lifecycle driver
//!
//! `RealtimeSession::spawn` runs one socket session on its own task: make sure the access
//! token is not about to expire, connect, forward `item-updated` / `nested-item-updated`
//! payloads as [`RealtimeEvent`]s, refresh and reopen the transport when the server reports an
//! expired token, and reconnect a bounded number of times after losing the connection.
//! Cancelling the handle's token always tears the session down, whatever state it is in.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    infrastructure::{
        auth::{self, AccessToken, AuthSession, TokenRefresher},
        socket::{SocketConnection, SocketEvent, SocketTransport, Subscriptions},
    },
    model::{
        reconcile::RealtimeEvent,
        session::{ConnectionState, Directive, Message, SocketSession, DEFAULT_MAX_ATTEMPTS},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Refresh before connecting when the token expires within this window
    pub refresh_lead: Duration,
    pub max_attempts: u32,
    /// Base delay between reconnection attempts, multiplied by the attempt number
    pub backoff: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            refresh_lead: Duration::from_secs(60),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(500),
        }
    }
}

impl From<&Config> for RealtimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            refresh_lead: config.token_refresh_lead(),
            max_attempts: config.max_reconnect_attempts,
            backoff: config.reconnect_backoff(),
        }
    }
}

/// The owning side of a running session
#[derive(Debug)]
pub struct RealtimeHandle {
    events: mpsc::UnboundedReceiver<RealtimeEvent>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RealtimeHandle {
    /// The next realtime event. `None` once the session ended or was cancelled; events queued
    /// before cancellation are never delivered after it.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the session and wait for the driver task to release the socket
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.events.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Realtime task ended abnormally: {e}");
            }
        }
    }

    /// Whether the driver task has stopped
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a connected phase ended
enum Exit {
    Cancelled,
    Lost,
    TokenExpired,
}

pub struct RealtimeSession<T: SocketTransport, R: TokenRefresher> {
    transport: T,
    auth: AuthSession,
    refresher: Arc<R>,
    config: RealtimeConfig,
    session: SocketSession,
    subscriptions: Subscriptions,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl<T: SocketTransport, R: TokenRefresher> RealtimeSession<T, R> {
    /// Start a session on the current runtime. `cancel` is the owner's liveness token; the
    /// session stops as soon as it is cancelled.
    pub fn spawn(
        transport: T,
        auth: AuthSession,
        refresher: Arc<R>,
        config: RealtimeConfig,
        cancel: CancellationToken,
    ) -> RealtimeHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let mut subscriptions = Subscriptions::new();
        for (event, kind) in [
            (
                SocketEvent::ItemUpdated,
                RealtimeEvent::ItemUpdated as fn(_) -> RealtimeEvent,
            ),
            (SocketEvent::NestedItemUpdated, RealtimeEvent::NestedItemUpdated),
        ] {
            let tx = events_tx.clone();
            subscriptions.on(
                event,
                Box::new(move |data: &Value| match data {
                    Value::Object(payload) => {
                        let _ = tx.send(kind(payload.clone()));
                    }
                    _ => tracing::warn!("Ignoring {event} without object payload"),
                }),
            );
        }

        let session = Self {
            transport,
            auth,
            refresher,
            config,
            session: SocketSession::new(config.max_attempts),
            subscriptions,
            state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(session.run());

        RealtimeHandle {
            events: events_rx,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        let mut reauthenticating = false;
        while let Some(mut connection) = self.open(reauthenticating).await {
            reauthenticating = false;
            match self.pump(&mut connection).await {
                Exit::Cancelled => {
                    connection.close().await;
                    break;
                }
                Exit::Lost => {
                    tracing::info!("Socket connection lost");
                    let directive = self.step(Message::ConnectionLost);
                    if !self.wait_before_reconnect(directive).await {
                        break;
                    }
                }
                Exit::TokenExpired => {
                    connection.close().await;
                    if self.step(Message::AuthExpired) != Directive::RefreshToken {
                        tracing::warn!("Socket token keeps expiring, giving up realtime updates");
                        break;
                    }
                    if !self.refresh().await {
                        break;
                    }
                    reauthenticating = true;
                }
            }
        }
        self.shutdown();
    }

    /// Connect, retrying with backoff. `None` when the session gave up or was cancelled.
    ///
    /// The token is read from the shared session before every attempt, so a token replaced
    /// elsewhere while disconnected is the one presented.
    async fn open(&mut self, reauthenticating: bool) -> Option<T::Connection> {
        let mut retrying = false;
        loop {
            let token = self.current_token().await?;
            if retrying || !reauthenticating {
                self.step(Message::ConnectStarted);
            }
            let result = tokio::select! {
                () = self.cancel.cancelled() => return None,
                result = self.transport.connect(&token) => result,
            };
            match result {
                Ok(connection) => {
                    self.step(if reauthenticating {
                        Message::Reauthenticated
                    } else {
                        Message::ConnectSucceeded
                    });
                    return Some(connection);
                }
                Err(e) => {
                    tracing::warn!("Socket connect failed: {e}");
                    let directive = self.step(Message::ConnectFailed);
                    if !self.wait_before_reconnect(directive).await {
                        return None;
                    }
                    retrying = true;
                }
            }
        }
    }

    /// A token that is not about to expire, refreshing through the collaborator when needed
    async fn current_token(&mut self) -> Option<AccessToken> {
        let lead = self.config.refresh_lead;
        let result = tokio::select! {
            () = self.cancel.cancelled() => return None,
            result = auth::ensure_fresh(&self.auth, self.refresher.as_ref(), lead) => result,
        };
        match result {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!("Realtime updates disabled, no usable token: {e}");
                self.step(Message::RefreshFailed);
                None
            }
        }
    }

    async fn pump(&mut self, connection: &mut T::Connection) -> Exit {
        loop {
            let frame = tokio::select! {
                () = self.cancel.cancelled() => return Exit::Cancelled,
                frame = connection.next_frame() => frame,
            };
            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    tracing::warn!("Socket error: {e}");
                    return Exit::Lost;
                }
                None => return Exit::Lost,
            };
            if frame.is_token_expired() {
                tracing::info!("Socket token expired, reauthenticating");
                return Exit::TokenExpired;
            }
            if frame.kind() == Some(SocketEvent::AuthError) {
                tracing::warn!("Socket auth error: {}", frame.data);
                continue;
            }
            if self.subscriptions.dispatch(&frame) > 0 {
                self.step(Message::EventReceived);
            }
        }
    }

    /// Replace the expired token in the shared session. `false` when no token was obtained.
    async fn refresh(&mut self) -> bool {
        let result = tokio::select! {
            () = self.cancel.cancelled() => return false,
            result = auth::refresh(&self.auth, self.refresher.as_ref()) => result,
        };
        if let Err(e) = result {
            tracing::warn!("Socket reauthentication failed: {e}");
            self.step(Message::RefreshFailed);
            return false;
        }
        true
    }

    /// Sleep before the next attempt. `false` when there is no next attempt.
    async fn wait_before_reconnect(&mut self, directive: Directive) -> bool {
        let Directive::Reconnect { attempt } = directive else {
            tracing::warn!("Giving up realtime updates after repeated socket failures");
            return false;
        };
        let delay = self.config.backoff.saturating_mul(attempt);
        tracing::debug!("Reconnecting in {delay:?} (attempt {attempt})");
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    fn step(&mut self, message: Message) -> Directive {
        let directive = self.session.update(message);
        let state = self.session.state();
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        directive
    }

    /// Release every handler and report the session as disconnected
    fn shutdown(&mut self) {
        self.step(Message::Unmounted);
        self.subscriptions.clear();
        tracing::debug!("Realtime session closed");
    }
}
