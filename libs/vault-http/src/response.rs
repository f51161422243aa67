//! Success responses: `{ data, meta, links? }` envelopes with a correlation
//! token in `meta` and opt-in conditional GET support based on weak entity
//! tags.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH, LOCATION};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tower_http::request_id::RequestId;
use vault_errors::Problem;

use crate::error::ApiError;
use crate::request_id::{CorrelationHeader, X_REQUEST_ID, resolve_request_id};
use crate::sender::{SendContext, send_problem};

pub const APPLICATION_JSON_UTF8: &str = "application/json; charset=utf-8";

/// Top-level envelope keys that `extend` never overwrites.
const RESERVED_KEYS: [&str; 3] = ["data", "meta", "links"];

pub type Links = BTreeMap<String, String>;

/// Request extension merged into the `meta` of every envelope.
#[derive(Debug, Clone, Default)]
pub struct BaseMeta(pub Map<String, Value>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub request_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pagination fields added to `meta` by list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub has_more: bool,
    pub next_cursor: Option<String>,
    /// `None` when the total is unknown; serialized as `null`.
    pub total_count: Option<u64>,
}

impl PageMeta {
    fn into_entries(self) -> Map<String, Value> {
        let mut entries = Map::new();
        entries.insert("has_more".to_owned(), Value::Bool(self.has_more));
        if let Some(cursor) = self.next_cursor {
            entries.insert("next_cursor".to_owned(), Value::String(cursor));
        }
        entries.insert(
            "total_count".to_owned(),
            self.total_count.map_or(Value::Null, Value::from),
        );
        entries
    }
}

/// `W/"<hex sha256>"` of a serialized body.
#[must_use]
pub fn weak_etag(body: &[u8]) -> String {
    format!("W/\"{}\"", hex::encode(Sha256::digest(body)))
}

/// Builds success responses for one request.
///
/// Extracted in handlers; builder methods consume and return `self`, and a
/// terminal method (`ok`, `created`, `list`, ...) produces the response.
#[derive(Debug, Clone)]
pub struct Responder {
    request_id: String,
    correlation_header: HeaderName,
    method: Method,
    if_none_match: Option<HeaderValue>,
    conditional: bool,
    base_meta: Map<String, Value>,
    status: StatusCode,
    meta: Map<String, Value>,
    links: Option<Links>,
    extra: Map<String, Value>,
    headers: HeaderMap,
}

impl<S> FromRequestParts<S> for Responder
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_header = parts
            .extensions
            .get::<CorrelationHeader>()
            .map_or(X_REQUEST_ID, |h| h.0.clone());
        let request_id = resolve_request_id(&parts.extensions, &parts.headers, &correlation_header);
        if parts.extensions.get::<RequestId>().is_none()
            && let Ok(value) = HeaderValue::from_str(&request_id)
        {
            parts.extensions.insert(RequestId::new(value));
        }

        let mut responder = Self::new(request_id);
        responder.correlation_header = correlation_header;
        responder.method = parts.method.clone();
        responder.if_none_match = parts.headers.get(IF_NONE_MATCH).cloned();
        if let Some(BaseMeta(base)) = parts.extensions.get::<BaseMeta>() {
            responder.base_meta.clone_from(base);
        }
        Ok(responder)
    }
}

impl Responder {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            correlation_header: X_REQUEST_ID,
            method: Method::GET,
            if_none_match: None,
            conditional: false,
            base_meta: Map::new(),
            status: StatusCode::OK,
            meta: Map::new(),
            links: None,
            extra: Map::new(),
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Status used by [`Responder::send`].
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Merge entries into `meta`. `request_id` cannot be overridden.
    #[must_use]
    pub fn meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta.extend(meta);
        self
    }

    #[must_use]
    pub fn meta_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn links(mut self, links: Links) -> Self {
        self.links = Some(links);
        self
    }

    #[must_use]
    pub fn link(mut self, rel: impl Into<String>, href: impl Into<String>) -> Self {
        self.links
            .get_or_insert_with(Links::new)
            .insert(rel.into(), href.into());
        self
    }

    /// Add a top-level envelope field. `data`, `meta` and `links` are ignored.
    #[must_use]
    pub fn extend(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "ignoring reserved envelope key");
        } else {
            self.extra.insert(key, value.into());
        }
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn cache_control(self, value: &str) -> Self {
        self.try_header(CACHE_CONTROL, value)
    }

    #[must_use]
    pub fn location(self, uri: &str) -> Self {
        self.try_header(LOCATION, uri)
    }

    /// Answer GET and HEAD requests conditionally: a 200 carries a weak
    /// `ETag` fingerprint of its body, and becomes a bodiless 304 when the
    /// request's `If-None-Match` equals it. Other methods are never
    /// short-circuited.
    #[must_use]
    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    /// Use a caller-computed validator instead of the body fingerprint.
    /// Implies [`Responder::conditional`] for GET and HEAD.
    #[must_use]
    pub fn etag(self, tag: &str) -> Self {
        self.try_header(ETAG, tag)
    }

    fn try_header(self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => self.header(name, value),
            Err(_) => {
                tracing::warn!(header = %name, "dropping invalid header value");
                self
            }
        }
    }

    /// The envelope `data` would be sent in.
    #[must_use]
    pub fn envelope<T>(&self, data: T) -> Envelope<T> {
        let mut extra = Map::new();
        for (key, value) in self.base_meta.iter().chain(&self.meta) {
            if key != "request_id" {
                extra.insert(key.clone(), value.clone());
            }
        }
        Envelope {
            data,
            meta: Meta {
                request_id: self.request_id.clone(),
                extra,
            },
            links: self.links.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Send `data` with the status set via [`Responder::status`] (200 by default).
    #[must_use]
    pub fn send<T: Serialize>(self, data: T) -> Response {
        let status = self.status;
        self.finish(status, &data)
    }

    /// 200
    #[must_use]
    pub fn ok<T: Serialize>(self, data: T) -> Response {
        self.finish(StatusCode::OK, &data)
    }

    /// 201, with `Location` when given.
    #[must_use]
    pub fn created<T: Serialize>(self, data: T, location: Option<&str>) -> Response {
        let this = if let Some(uri) = location {
            self.location(uri)
        } else {
            self
        };
        this.finish(StatusCode::CREATED, &data)
    }

    /// 202, with `Location` when given.
    #[must_use]
    pub fn accepted<T: Serialize>(self, data: T, location: Option<&str>) -> Response {
        let this = if let Some(uri) = location {
            self.location(uri)
        } else {
            self
        };
        this.finish(StatusCode::ACCEPTED, &data)
    }

    /// 204: no body, no envelope.
    #[must_use]
    pub fn no_content(self) -> Response {
        let mut headers = self.headers;
        echo_request_id(&mut headers, &self.correlation_header, &self.request_id);
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        *response.headers_mut() = headers;
        response
    }

    /// 200 list response with pagination fields in `meta`.
    #[must_use]
    pub fn list<T: Serialize>(self, items: Vec<T>, page: PageMeta) -> Response {
        self.meta(page.into_entries()).ok(items)
    }

    /// Like [`Responder::list`], projecting every item first.
    #[must_use]
    pub fn list_map<I, T, U, F>(self, items: I, page: PageMeta, project: F) -> Response
    where
        I: IntoIterator<Item = T>,
        F: FnMut(T) -> U,
        U: Serialize,
    {
        self.list(items.into_iter().map(project).collect(), page)
    }

    /// Emit a problem document directly, with this request's correlation token.
    #[must_use]
    pub fn problem(mut self, problem: Problem) -> Response {
        let problem = if problem.request_id.is_some() {
            problem
        } else {
            problem.with_request_id(self.request_id.as_str())
        };
        let ctx = SendContext {
            request_id: Some((&self.correlation_header, &self.request_id)),
            auth_challenge: None,
        };
        let headers = std::mem::take(&mut self.headers);
        send_problem(&problem, headers, &ctx)
    }

    fn finish<T: Serialize>(self, status: StatusCode, data: &T) -> Response {
        let body = match serde_json::to_vec(&self.envelope(data)) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(request_id = %self.request_id, error = %err, "failed to serialize response payload");
                return ApiError::from(err).into_response();
            }
        };

        let mut headers = self.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON_UTF8));
        echo_request_id(&mut headers, &self.correlation_header, &self.request_id);

        let safe = matches!(self.method, Method::GET | Method::HEAD);
        if status == StatusCode::OK && safe {
            if self.conditional
                && !headers.contains_key(ETAG)
                && let Ok(tag) = HeaderValue::from_str(&weak_etag(&body))
            {
                headers.insert(ETAG, tag);
            }
            if let Some(tag) = headers.get(ETAG)
                && self.if_none_match.as_ref() == Some(tag)
            {
                headers.remove(CONTENT_TYPE);
                return build(StatusCode::NOT_MODIFIED, headers, Vec::new());
            }
        }
        build(status, headers, body)
    }
}

fn echo_request_id(headers: &mut HeaderMap, name: &HeaderName, request_id: &str) {
    if headers.contains_key(name) {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(name.clone(), value);
    }
}

fn build(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
