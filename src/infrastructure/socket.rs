//! Socket transport and the event handler registry
//!
//! Frames are JSON text messages `{"event": <name>, "data": <payload>}`. The connection
//! authenticates with `{"auth": {"token": <bearer>}}` as its first frame.

use std::fmt;
use std::future::Future;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{AsRefStr, Display, EnumString};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::{
    error::{Error, Result},
    infrastructure::auth::AccessToken,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum SocketEvent {
    #[strum(serialize = "item-updated")]
    ItemUpdated,
    #[strum(serialize = "nested-item-updated")]
    NestedItemUpdated,
    #[strum(serialize = "auth_error")]
    AuthError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: SocketEvent, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    /// The known event this frame carries, if any
    pub fn kind(&self) -> Option<SocketEvent> {
        self.event.parse().ok()
    }

    /// Whether an `auth_error` frame reports an expired token
    pub fn is_token_expired(&self) -> bool {
        if self.kind() != Some(SocketEvent::AuthError) {
            return false;
        }
        let reason = match &self.data {
            Value::String(message) => message.as_str(),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("reason"))
                .and_then(Value::as_str)
                .unwrap_or_default(),
            _ => "",
        };
        reason.to_ascii_lowercase().contains("expired")
    }
}

/// One open socket
pub trait SocketConnection: Send + 'static {
    /// The next frame, or `None` once the peer closed the connection
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame>>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens authenticated socket connections
pub trait SocketTransport: Send + Sync + 'static {
    type Connection: SocketConnection;

    fn connect(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SocketTransport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self, token: &AccessToken) -> Result<WsConnection> {
        let (mut stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Socket(e.to_string()))?;
        let auth = json!({ "auth": { "token": token.expose() } });
        stream
            .send(Message::Text(auth.to_string()))
            .await
            .map_err(|e| Error::Socket(e.to_string()))?;
        tracing::debug!("Socket connected to {}", self.url);
        Ok(WsConnection { stream })
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection").finish_non_exhaustive()
    }
}

impl SocketConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<Frame>(&text) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(e) => tracing::warn!("Ignoring malformed socket frame: {e}"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(Error::Socket(e.to_string()))),
            }
        }
        None
    }

    async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("Socket close: {e}");
        }
    }
}

pub type Handler = Box<dyn FnMut(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

/// Registered `(event, handler)` pairs. Slots are never reused, so a stale `HandlerId`
/// can never remove someone else's handler.
#[derive(Default)]
pub struct Subscriptions {
    slots: Vec<Option<(SocketEvent, Handler)>>,
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().flatten().map(|(event, _)| event))
            .finish()
    }
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event: SocketEvent, handler: Handler) -> HandlerId {
        self.slots.push(Some((event, handler)));
        HandlerId(self.slots.len() - 1)
    }

    pub fn off(&mut self, id: HandlerId) -> bool {
        self.slots
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    /// Run every handler registered for the frame's event. Returns how many ran.
    pub fn dispatch(&mut self, frame: &Frame) -> usize {
        let Some(kind) = frame.kind() else {
            tracing::debug!("No handler for socket event {}", frame.event);
            return 0;
        };
        let mut delivered = 0;
        for (event, handler) in self.slots.iter_mut().flatten() {
            if *event == kind {
                handler(&frame.data);
                delivered += 1;
            }
        }
        delivered
    }

    /// Drop every handler
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
