#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router};
use axum::body::{Body, to_bytes};
use axum::extract::{ConnectInfo, Path};
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tower::ServiceExt;
use validator::Validate;
use vault_http::prelude::*;
use vault_http::{ErrorHandler, ErrorHandlerConfig, not_found_fallback, problem_middleware};

pub const LOCALHOST: &str = "127.0.0.1";
pub const STRANGER: &str = "203.0.113.7";

#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(email(message = "Must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
#[error("store unavailable: password=hunter2")]
pub struct StoreError {
    #[source]
    pub source: std::io::Error,
}

async fn create_user(r: Responder, ValidatedJson(user): ValidatedJson<NewUser>) -> Response {
    r.created(json!({ "email": user.email }), Some("/v1/users/1"))
}

async fn get_item(r: Responder, Path(id): Path<u32>) -> ApiResult {
    if id == 404 {
        return Err(VaultError::not_found()
            .with_detail("Item 404 does not exist.")
            .into());
    }
    Ok(r.conditional().ok(json!({ "id": id, "name": "alpha" })))
}

async fn replace_item(r: Responder, Path(id): Path<u32>) -> Response {
    r.conditional().ok(json!({ "id": id, "name": "alpha" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn boom() -> ApiResult {
    Err(StoreError {
        source: std::io::Error::other("connection reset by peer"),
    }
    .into())
}

async fn login() -> ApiResult {
    Err(VaultError::unauthorized().into())
}

async fn legacy_login() -> Response {
    (
        [(WWW_AUTHENTICATE, "Basic realm=\"legacy\"")],
        ApiError::from(VaultError::unauthorized()),
    )
        .into_response()
}

async fn list_items(r: Responder) -> Response {
    r.link("next", "/v1/items?cursor=c_2").list(
        vec![json!({ "id": 1 }), json!({ "id": 2 })],
        PageMeta {
            has_more: true,
            next_cursor: Some("c_2".to_owned()),
            total_count: None,
        },
    )
}

async fn remove_item(r: Responder) -> Response {
    r.no_content()
}

/// Router with every demo route behind the error middleware.
pub fn app(config: &ErrorHandlerConfig) -> Router {
    let handler = Arc::new(ErrorHandler::new(config).expect("valid config"));
    Router::new()
        .route("/v1/users", post(create_user))
        .route("/v1/items", get(list_items))
        .route(
            "/v1/items/{id}",
            get(get_item).put(replace_item).delete(remove_item),
        )
        .route("/v1/health", get(health))
        .route("/v1/boom", get(boom))
        .route("/v1/login", post(login))
        .route("/v1/legacy-login", post(legacy_login))
        .fallback(not_found_fallback)
        .layer(from_fn_with_state(handler, problem_middleware))
}

/// Attach the peer address the server would have recorded.
pub fn from_peer(mut req: Request<Body>, ip: &str) -> Request<Body> {
    let addr = SocketAddr::new(ip.parse().unwrap(), 40_000);
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn call(app: Router, req: Request<Body>) -> Reply {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        headers,
        body,
    }
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
