//! REST endpoints consumed by list surfaces
//!
//! Every paginated endpoint answers `{ <items>: [...], currentPage, totalPages }` where the
//! name of the items field differs per surface. Single-item mutations answer with the
//! updated item or just the updated fields, which callers merge into list state.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::{
    error::{Error, Result},
    infrastructure::auth::{self, AuthSession, TokenRefresher},
    model::{
        item::{Item, Payload},
        list::{FetchRequest, Page},
    },
};

/// Supplies pages for one list surface
pub trait PageSource<T: Item>: Send + Sync + 'static {
    fn fetch_page(&self, request: FetchRequest) -> impl Future<Output = Result<Page<T>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Resource {
    Dreams,
    Posts,
    Comments,
    Replies,
}

impl Resource {
    /// Key under which single-item responses wrap the item
    fn singular(self) -> &'static str {
        match self {
            Resource::Dreams => "dream",
            Resource::Posts => "post",
            Resource::Comments => "comment",
            Resource::Replies => "reply",
        }
    }

    /// Wire name of the editable text field
    fn text_field(self) -> &'static str {
        match self {
            Resource::Dreams => "content",
            Resource::Posts => "caption",
            Resource::Comments | Resource::Replies => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ToggleLike,
    ToggleBookmark,
    Edit { text: String },
    Delete,
    /// Answers with the item's nested analysis record
    RetryAnalysis,
}

impl Mutation {
    /// Whether the confirmed payload belongs to the nested sub-object rather than the item
    pub fn targets_nested(&self) -> bool {
        matches!(self, Mutation::RetryAnalysis)
    }
}

/// Single-item actions. Each resolves to the server's confirmed fields.
pub trait ItemMutations: Send + Sync + 'static {
    fn mutate(
        &self,
        resource: Resource,
        id: &str,
        mutation: Mutation,
    ) -> impl Future<Output = Result<Payload>> + Send;

    /// Create a child item (a comment under a post, a reply under a comment)
    fn create(
        &self,
        resource: Resource,
        parent_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<Payload>> + Send;
}

/// Thin reqwest wrapper carrying the base URL and the shared auth session
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    auth: AuthSession,
}

impl HttpApi {
    pub fn new(client: reqwest::Client, base_url: &str, auth: AuthSession) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.get() {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Send `builder` with the current token. A 401 is reported as `Error::AuthExpired`;
    /// every other failure goes through `failed`.
    async fn send_json<F>(&self, builder: reqwest::RequestBuilder, failed: F) -> Result<Value>
    where
        F: Fn(String) -> Error,
    {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if let Some(error) = status_error(status) {
            return Err(match error {
                StatusError::Unauthorized(message) => Error::AuthExpired(message),
                StatusError::Other(message) => failed(message),
            });
        }
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&body).map_err(|e| failed(e.to_string()))
    }

    /// Page source for `path` whose envelope lists items under `items_field`
    pub fn pages<T: Item>(
        &self,
        path: impl Into<String>,
        items_field: &'static str,
    ) -> HttpPageSource<T> {
        HttpPageSource {
            api: self.clone(),
            path: path.into(),
            items_field,
            _item: PhantomData,
        }
    }
}

impl ItemMutations for HttpApi {
    async fn mutate(&self, resource: Resource, id: &str, mutation: Mutation) -> Result<Payload> {
        let item_url = self.url(&format!("{resource}/{id}"));
        let builder = match &mutation {
            Mutation::ToggleLike => self.client.put(format!("{item_url}/like")),
            Mutation::ToggleBookmark => self.client.put(format!("{item_url}/bookmark")),
            Mutation::Edit { text } => {
                let mut body = Map::new();
                body.insert(resource.text_field().to_string(), Value::from(text.as_str()));
                self.client.put(item_url).json(&body)
            }
            Mutation::Delete => self.client.delete(item_url),
            Mutation::RetryAnalysis => self.client.post(format!("{item_url}/analysis/retry")),
        };
        tracing::debug!("{mutation:?} {resource}/{id}");
        let failed = |message: String| Error::Mutation {
            id: id.to_string(),
            message,
        };
        let value = self.send_json(builder, failed).await?;
        if mutation.targets_nested() {
            return Ok(analysis_payload(value));
        }
        Ok(into_payload(value, resource))
    }

    async fn create(&self, resource: Resource, parent_id: &str, text: &str) -> Result<Payload> {
        let path = match resource {
            Resource::Comments => format!("posts/{parent_id}/comments"),
            Resource::Replies => format!("comments/{parent_id}/replies"),
            Resource::Dreams | Resource::Posts => resource.to_string(),
        };
        let mut body = Map::new();
        body.insert(resource.text_field().to_string(), Value::from(text));
        let failed = |message: String| Error::Mutation {
            id: parent_id.to_string(),
            message,
        };
        let value = self
            .send_json(self.client.post(self.url(&path)).json(&body), failed)
            .await?;
        Ok(into_payload(value, resource))
    }
}

enum StatusError {
    Unauthorized(String),
    Other(String),
}

fn status_error(status: reqwest::StatusCode) -> Option<StatusError> {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Some(StatusError::Unauthorized(format!("server responded {status}")));
    }
    (!status.is_success()).then(|| StatusError::Other(format!("server responded {status}")))
}

/// Wraps an API so that a request rejected with an expired token is sent once more after
/// refreshing the shared session. A failed refresh, or a second rejection, ends the session.
#[derive(Debug)]
pub struct Reauthenticating<A, R> {
    inner: A,
    auth: AuthSession,
    refresher: Arc<R>,
}

impl<A, R: TokenRefresher> Reauthenticating<A, R> {
    pub fn new(inner: A, auth: AuthSession, refresher: Arc<R>) -> Self {
        Self {
            inner,
            auth,
            refresher,
        }
    }

    async fn send<V, F, Fut>(&self, request: F) -> Result<V>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let reason = match request().await {
            Err(Error::AuthExpired(reason)) => reason,
            other => return other,
        };
        tracing::info!("Access token rejected ({reason}), refreshing");
        auth::refresh(&self.auth, self.refresher.as_ref()).await?;
        match request().await {
            Err(Error::AuthExpired(reason)) => {
                self.auth.clear();
                Err(Error::SessionLost(reason))
            }
            other => other,
        }
    }
}

impl<T, S, R> PageSource<T> for Reauthenticating<S, R>
where
    T: Item,
    S: PageSource<T>,
    R: TokenRefresher,
{
    async fn fetch_page(&self, request: FetchRequest) -> Result<Page<T>> {
        self.send(|| self.inner.fetch_page(request.clone())).await
    }
}

impl<A: ItemMutations, R: TokenRefresher> ItemMutations for Reauthenticating<A, R> {
    async fn mutate(&self, resource: Resource, id: &str, mutation: Mutation) -> Result<Payload> {
        self.send(|| self.inner.mutate(resource, id, mutation.clone()))
            .await
    }

    async fn create(&self, resource: Resource, parent_id: &str, text: &str) -> Result<Payload> {
        self.send(|| self.inner.create(resource, parent_id, text))
            .await
    }
}

/// Unwrap `{ "<resource>": {...} }` responses; non-object bodies carry no fields
fn into_payload(value: Value, resource: Resource) -> Payload {
    match value {
        Value::Object(mut map) => match map.remove(resource.singular()) {
            Some(Value::Object(item)) => item,
            Some(other) => {
                map.insert(resource.singular().to_string(), other);
                map
            }
            None => map,
        },
        _ => Map::new(),
    }
}

/// The analysis record of a retry response. The server may answer with the dream, the
/// record itself or nothing; an accepted retry without a record means the job is pending.
fn analysis_payload(value: Value) -> Payload {
    let mut map = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(Value::Object(analysis)) = map.remove("analysis") {
        return analysis;
    }
    if let Some(Value::Object(dream)) = map.remove("dream") {
        return analysis_payload(Value::Object(dream));
    }
    if !map.contains_key("status") {
        map = Map::new();
        map.insert("status".to_string(), Value::from("pending"));
    }
    map
}

/// Decode a paginated envelope
pub fn parse_page<T: Item>(
    value: Value,
    items_field: &str,
) -> std::result::Result<Page<T>, String> {
    let Value::Object(mut envelope) = value else {
        return Err("page envelope is not an object".to_string());
    };
    let items = envelope
        .remove(items_field)
        .ok_or_else(|| format!("page envelope has no `{items_field}` field"))?;
    let items: Vec<T> = serde_json::from_value(items).map_err(|e| e.to_string())?;
    let counter = |name: &str| {
        envelope
            .get(name)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| format!("page envelope has no valid `{name}`"))
    };
    Ok(Page {
        items,
        current_page: counter("currentPage")?,
        total_pages: counter("totalPages")?,
    })
}

/// Paginated GET endpoint
#[derive(Debug)]
pub struct HttpPageSource<T> {
    api: HttpApi,
    path: String,
    items_field: &'static str,
    _item: PhantomData<fn() -> T>,
}

impl<T: Item> PageSource<T> for HttpPageSource<T> {
    async fn fetch_page(&self, request: FetchRequest) -> Result<Page<T>> {
        let mut params = vec![
            ("page".to_string(), request.page.to_string()),
            ("limit".to_string(), request.limit.to_string()),
        ];
        params.extend(request.query.to_params());
        let builder = self.api.client.get(self.api.url(&self.path)).query(&params);
        let fetch_error = |message: String| Error::Fetch {
            page: request.page,
            message,
        };
        let value = self.api.send_json(builder, fetch_error).await?;
        parse_page(value, self.items_field).map_err(fetch_error)
    }
}
