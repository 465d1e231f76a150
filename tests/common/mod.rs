//! In-memory collaborators for driving surfaces and realtime sessions without a network
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch, Notify};

use dreamsync::{
    error::{Error, Result},
    infrastructure::{
        api::{ItemMutations, Mutation, PageSource, Resource},
        auth::{AccessToken, TokenRefresher},
        realtime::RealtimeConfig,
        socket::{Frame, SocketConnection, SocketEvent, SocketTransport},
    },
    model::{
        comment::{Comment, Reply},
        dream::Dream,
        item::{Item, Payload},
        list::{FetchRequest, ListQuery, Page},
        post::Post,
        session::ConnectionState,
    },
};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn dream(id: impl ToString) -> Dream {
    let id = id.to_string();
    serde_json::from_value(json!({
        "id": id,
        "title": format!("Dream {id}"),
        "analysis": {"id": format!("a{id}"), "status": "processing"}
    }))
    .expect("valid dream")
}

pub fn dreams(ids: impl IntoIterator<Item = u32>) -> Vec<Dream> {
    ids.into_iter().map(dream).collect()
}

pub fn ids<T: Item>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.id().to_string()).collect()
}

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn fast_realtime() -> RealtimeConfig {
    RealtimeConfig {
        refresh_lead: Duration::from_secs(60),
        max_attempts: 2,
        backoff: Duration::from_millis(1),
    }
}

type PageKey = (String, u32);

/// Page source answering from a script keyed by filter epoch and page number.
///
/// A page with several scripted responses answers them in order and repeats the last one.
/// A gated page does not answer until `open` is called for it.
pub struct ScriptedPages<T> {
    responses: Mutex<HashMap<PageKey, VecDeque<Result<Page<T>>>>>,
    gates: Mutex<HashMap<PageKey, Arc<Notify>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl<T: Item> Default for ScriptedPages<T> {
    fn default() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

fn key(query: &ListQuery, page: u32) -> PageKey {
    (query.epoch().as_str().to_string(), page)
}

impl<T: Item> ScriptedPages<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn page(&self, query: &ListQuery, page: u32, total_pages: u32, items: Vec<T>) {
        self.respond(
            query,
            page,
            Ok(Page {
                items,
                current_page: page,
                total_pages,
            }),
        );
    }

    pub fn fail(&self, query: &ListQuery, page: u32) {
        self.respond(
            query,
            page,
            Err(Error::Fetch {
                page,
                message: "connection reset".to_string(),
            }),
        );
    }

    /// Reject the page as if the access token had expired
    pub fn expire(&self, query: &ListQuery, page: u32) {
        self.respond(query, page, Err(Error::AuthExpired("jwt expired".to_string())));
    }

    fn respond(&self, query: &ListQuery, page: u32, response: Result<Page<T>>) {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(key(query, page))
            .or_default()
            .push_back(response);
    }

    pub fn gate(&self, query: &ListQuery, page: u32) {
        self.gates
            .lock()
            .expect("gates lock")
            .insert(key(query, page), Arc::new(Notify::new()));
    }

    pub fn open(&self, query: &ListQuery, page: u32) {
        if let Some(gate) = self.gates.lock().expect("gates lock").get(&key(query, page)) {
            gate.notify_one();
        }
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .map(|request| request.page)
            .collect()
    }

    fn answer(&self, request: &FetchRequest) -> Result<Page<T>> {
        let mut responses = self.responses.lock().expect("responses lock");
        let Some(queue) = responses.get_mut(&key(&request.query, request.page)) else {
            return Err(Error::Fetch {
                page: request.page,
                message: "not scripted".to_string(),
            });
        };
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.unwrap_or(Err(Error::Fetch {
            page: request.page,
            message: "not scripted".to_string(),
        }))
    }
}

/// Shares one script between a test and the surface owning the source
pub struct SharedPages<T>(pub Arc<ScriptedPages<T>>);

impl<T: Item> PageSource<T> for SharedPages<T> {
    async fn fetch_page(&self, request: FetchRequest) -> Result<Page<T>> {
        self.0
            .requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let gate = self
            .0
            .gates
            .lock()
            .expect("gates lock")
            .get(&key(&request.query, request.page))
            .cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.0.answer(&request)
    }
}

/// Mutation API answering from a queue of responses
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<VecDeque<Result<Payload>>>,
    calls: Mutex<Vec<(Resource, String, Option<Mutation>)>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, value: Value) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(payload(value)));
    }

    pub fn reject(&self, id: &str) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Err(Error::Mutation {
                id: id.to_string(),
                message: "forbidden".to_string(),
            }));
    }

    pub fn expire(&self) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Err(Error::AuthExpired("jwt expired".to_string())));
    }

    pub fn calls(&self) -> Vec<(Resource, String, Option<Mutation>)> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next(&self, resource: Resource, id: &str, mutation: Option<Mutation>) -> Result<Payload> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((resource, id.to_string(), mutation));
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or(Ok(Payload::new()))
    }
}

impl ItemMutations for FakeApi {
    async fn mutate(&self, resource: Resource, id: &str, mutation: Mutation) -> Result<Payload> {
        self.next(resource, id, Some(mutation))
    }

    async fn create(&self, resource: Resource, parent_id: &str, _text: &str) -> Result<Payload> {
        self.next(resource, parent_id, None)
    }
}

/// Shares one `FakeApi` between a test and a wrapper owning it
pub struct SharedApi(pub Arc<FakeApi>);

impl ItemMutations for SharedApi {
    async fn mutate(&self, resource: Resource, id: &str, mutation: Mutation) -> Result<Payload> {
        self.0.mutate(resource, id, mutation).await
    }

    async fn create(&self, resource: Resource, parent_id: &str, text: &str) -> Result<Payload> {
        self.0.create(resource, parent_id, text).await
    }
}

/// Page source whose fetches panic
pub struct PanickingPages;

impl PageSource<Dream> for PanickingPages {
    async fn fetch_page(&self, request: FetchRequest) -> Result<Page<Dream>> {
        panic!("malformed page {}", request.page)
    }
}

/// Refresher issuing `fresh-1`, `fresh-2`, ... valid for an hour, or always failing
pub struct FakeRefresher {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeRefresher {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for FakeRefresher {
    async fn refresh(&self) -> Result<AccessToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(Error::SessionLost("refresh token revoked".to_string()));
        }
        Ok(AccessToken::new(
            format!("fresh-{n}"),
            Some(Utc::now() + chrono::Duration::hours(1)),
        ))
    }
}

pub fn token_expiring_in(seconds: i64) -> AccessToken {
    named_token("current", seconds)
}

pub fn named_token(name: &str, seconds: i64) -> AccessToken {
    AccessToken::new(name, Some(Utc::now() + chrono::Duration::seconds(seconds)))
}

enum Connect {
    Accept(mpsc::UnboundedReceiver<Frame>),
    Refuse,
}

/// Transport whose connections are fed by the test.
///
/// Each `accept` scripts one successful connect and returns the sender that feeds it;
/// dropping that sender drops the connection. Unscripted connects are refused.
#[derive(Clone, Default)]
pub struct FakeTransport {
    script: Arc<Mutex<VecDeque<Connect>>>,
    tokens: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    observed: Arc<Mutex<Option<watch::Receiver<ConnectionState>>>>,
    states_at_connect: Arc<Mutex<Vec<ConnectionState>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self) -> mpsc::UnboundedSender<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script
            .lock()
            .expect("script lock")
            .push_back(Connect::Accept(rx));
        tx
    }

    pub fn refuse(&self) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Connect::Refuse);
    }

    /// Tokens presented by every connect attempt, in order
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().expect("tokens lock").clone()
    }

    pub fn connects(&self) -> usize {
        self.tokens().len()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Record the session state seen by every later connect attempt
    pub fn observe(&self, states: watch::Receiver<ConnectionState>) {
        *self.observed.lock().expect("observed lock") = Some(states);
    }

    pub fn states_at_connect(&self) -> Vec<ConnectionState> {
        self.states_at_connect
            .lock()
            .expect("states lock")
            .clone()
    }
}

pub struct FakeConnection {
    frames: mpsc::UnboundedReceiver<Frame>,
    closed: Arc<AtomicUsize>,
}

impl SocketConnection for FakeConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl SocketTransport for FakeTransport {
    type Connection = FakeConnection;

    async fn connect(&self, token: &AccessToken) -> Result<FakeConnection> {
        self.tokens
            .lock()
            .expect("tokens lock")
            .push(token.expose().to_string());
        if let Some(states) = self.observed.lock().expect("observed lock").as_ref() {
            let state = *states.borrow();
            self.states_at_connect
                .lock()
                .expect("states lock")
                .push(state);
        }
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Connect::Accept(frames)) => Ok(FakeConnection {
                frames,
                closed: Arc::clone(&self.closed),
            }),
            Some(Connect::Refuse) | None => Err(Error::Socket("connection refused".to_string())),
        }
    }
}

pub fn item_updated(value: Value) -> Frame {
    Frame::new(SocketEvent::ItemUpdated, value)
}

pub fn nested_item_updated(value: Value) -> Frame {
    Frame::new(SocketEvent::NestedItemUpdated, value)
}

pub fn token_expired() -> Frame {
    Frame::new(SocketEvent::AuthError, json!({"message": "jwt expired"}))
}

pub fn post(id: impl ToString) -> Post {
    let id = id.to_string();
    serde_json::from_value(json!({
        "id": id,
        "caption": format!("Post {id}"),
        "likeCount": 4,
        "commentCount": 2
    }))
    .expect("valid post")
}

pub fn comment(id: impl ToString, reply_ids: &[&str]) -> Comment {
    let id = id.to_string();
    serde_json::from_value(json!({
        "id": id,
        "postId": "p1",
        "text": format!("Comment {id}"),
        "replyCount": reply_ids.len(),
        "replyIds": reply_ids
    }))
    .expect("valid comment")
}

pub fn reply(id: impl ToString) -> Reply {
    let id = id.to_string();
    serde_json::from_value(json!({
        "id": id,
        "commentId": "c1",
        "text": format!("Reply {id}")
    }))
    .expect("valid reply")
}
