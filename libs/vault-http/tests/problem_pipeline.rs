#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{LOCALHOST, STRANGER, app, call, from_peer};
use serde_json::json;
use tracing_test::traced_test;
use vault_http::{EnvMode, ErrorHandlerConfig};

fn production() -> ErrorHandlerConfig {
    ErrorHandlerConfig::default()
}

fn development() -> ErrorHandlerConfig {
    ErrorHandlerConfig {
        env: EnvMode::Development,
        ..ErrorHandlerConfig::default()
    }
}

fn signup(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/users")
        .header("content-type", "application/json")
        .header("x-request-id", "req_A")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn validation_failure_in_production_has_params_and_no_debug() {
    let req = from_peer(
        signup(r#"{"email":"not-an-email","password":"short"}"#),
        LOCALHOST,
    );
    let reply = call(app(&production()), req).await;

    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        reply.header("content-type"),
        Some("application/problem+json; charset=utf-8")
    );
    let body = &reply.body;
    assert_eq!(body["code"], "VAULT.REQUEST.VALIDATION_FAILED");
    assert_eq!(body["type"], "https://docs.vault.dev/errors/request#validation");
    assert_eq!(body["instance"], "/v1/users#req_A");
    assert_eq!(body["request_id"], "req_A");
    assert_eq!(body["retryable"], false);
    assert_eq!(
        body["invalid_params"],
        json!([
            {"name": "email", "reason": "Must be a valid email address.", "code": "email"},
            {"name": "password", "reason": "Password must be at least 8 characters.", "code": "length"}
        ])
    );
    assert!(body.get("debug").is_none());
}

#[tokio::test]
async fn development_adds_bounded_debug_to_the_same_validation_body() {
    let body = r#"{"email":"not-an-email","password":"short"}"#;
    let prod = call(app(&production()), from_peer(signup(body), LOCALHOST)).await;

    let config = ErrorHandlerConfig {
        max_stack_lines: Some(2),
        ..development()
    };
    let mut dev = call(app(&config), from_peer(signup(body), LOCALHOST)).await;

    assert_eq!(dev.status, StatusCode::UNPROCESSABLE_ENTITY);
    let debug = dev.body.as_object_mut().unwrap().remove("debug").unwrap();
    assert_eq!(dev.body, prod.body);
    assert_eq!(debug["env"], "development");
    assert_eq!(debug["error_name"], "ValidationError");
    let stack = debug["stack"].as_str().unwrap();
    assert!(stack.starts_with("ValidationError: "));
    assert_eq!(stack.lines().count(), 2);
}

#[tokio::test]
async fn development_allow_listed_caller_gets_bounded_debug() {
    let config = ErrorHandlerConfig {
        max_stack_lines: Some(3),
        include_causes: 1,
        ..development()
    };
    let reply = call(app(&config), from_peer(get("/v1/boom"), LOCALHOST)).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    let debug = &reply.body["debug"];
    assert_eq!(debug["env"], "development");
    assert_eq!(debug["error_name"], "StoreError");
    let stack = debug["stack"].as_str().unwrap();
    assert!(stack.starts_with("StoreError: store unavailable"));
    assert_eq!(stack.lines().count(), 3);
    assert_eq!(debug["causes"], json!(["connection reset by peer"]));
    assert_eq!(debug["route"], json!({"method": "GET", "path": "/v1/boom"}));
    assert!(debug["hint"].as_str().unwrap().contains("debug is enabled"));
    assert!(debug["ts"].is_string());
}

#[tokio::test]
async fn unknown_failure_is_a_generic_retryable_500() {
    let reply = call(app(&production()), from_peer(get("/v1/boom"), LOCALHOST)).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["code"], "VAULT.SERVER.ERROR");
    assert_eq!(reply.body["detail"], "Something went wrong");
    assert_eq!(reply.body["retryable"], true);
    assert_eq!(reply.body["docs"], "https://status.vault.dev/incidents");
    assert!(reply.body.get("debug").is_none());
    assert!(!reply.body.to_string().contains("hunter2"));
}

#[tokio::test]
async fn production_debug_needs_header_and_allowed_caller() {
    let with_header = |ip| {
        let mut req = get("/v1/boom");
        req.headers_mut()
            .insert("x-vault-debug", "1".parse().unwrap());
        from_peer(req, ip)
    };

    let reply = call(app(&production()), with_header(LOCALHOST)).await;
    assert_eq!(reply.body["debug"]["env"], "production");
    assert!(reply.body["debug"].get("stack").is_none());

    let reply = call(app(&production()), with_header(STRANGER)).await;
    assert!(reply.body.get("debug").is_none());

    let reply = call(app(&production()), from_peer(get("/v1/boom"), LOCALHOST)).await;
    assert!(reply.body.get("debug").is_none());
}

#[tokio::test]
async fn disabled_debug_wins_even_in_development() {
    let config = ErrorHandlerConfig {
        disable_debug: true,
        ..development()
    };
    let reply = call(app(&config), from_peer(get("/v1/boom"), LOCALHOST)).await;
    assert!(reply.body.get("debug").is_none());
}

#[tokio::test]
async fn missing_peer_address_is_not_allow_listed() {
    let reply = call(app(&development()), get("/v1/boom")).await;
    assert!(reply.body.get("debug").is_none());
}

#[tokio::test]
async fn problem_responses_carry_security_headers() {
    let reply = call(app(&production()), get("/v1/items/404")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["detail"], "Item 404 does not exist.");
    assert_eq!(reply.header("cache-control"), Some("no-store"));
    assert_eq!(reply.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(
        reply.header("content-security-policy"),
        Some("default-src 'none'")
    );
    assert_eq!(reply.header("x-frame-options"), Some("DENY"));
}

#[tokio::test]
async fn unauthorized_gets_default_challenge() {
    let req = Request::builder()
        .method("POST")
        .uri("/v1/login")
        .body(Body::empty())
        .unwrap();
    let reply = call(app(&production()), req).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        reply.header("www-authenticate"),
        Some(r#"Bearer realm="vault", error="invalid_token""#)
    );
    assert_eq!(reply.body["code"], "VAULT.AUTH.INVALID_CREDENTIALS");
}

#[tokio::test]
async fn handler_set_challenge_is_preserved() {
    let req = Request::builder()
        .method("POST")
        .uri("/v1/legacy-login")
        .body(Body::empty())
        .unwrap();
    let reply = call(app(&production()), req).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.header("www-authenticate"), Some("Basic realm=\"legacy\""));
}

#[tokio::test]
async fn correlation_token_is_echoed_or_synthesized() {
    let mut req = get("/v1/items/404");
    req.headers_mut()
        .insert("x-request-id", "req_inbound".parse().unwrap());
    let reply = call(app(&production()), req).await;
    assert_eq!(reply.header("x-request-id"), Some("req_inbound"));
    assert_eq!(reply.body["instance"], "/v1/items/404#req_inbound");

    let reply = call(app(&production()), get("/v1/items/404")).await;
    let echoed = reply.header("x-request-id").unwrap();
    assert!(echoed.starts_with("req_"));
    assert_eq!(reply.body["request_id"], echoed);
}

#[tokio::test]
async fn custom_correlation_header_is_used() {
    let config = ErrorHandlerConfig {
        request_id_header: "x-correlation-id".to_owned(),
        ..production()
    };
    let mut req = get("/v1/items/404");
    req.headers_mut()
        .insert("x-correlation-id", "corr_9".parse().unwrap());
    let reply = call(app(&config), req).await;
    assert_eq!(reply.header("x-correlation-id"), Some("corr_9"));
    assert_eq!(reply.body["request_id"], "corr_9");
}

#[tokio::test]
async fn unmatched_route_falls_back_to_not_found() {
    let reply = call(app(&production()), get("/v2/nothing?x=1")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["code"], "VAULT.RESOURCE.NOT_FOUND");
    assert_eq!(reply.body["detail"], "No route matches GET /v2/nothing?x=1");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let reply = call(app(&production()), signup("{\"email\":")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], "VAULT.REQUEST.BAD");
    assert_eq!(reply.body["detail"], "Invalid JSON payload");
    assert_eq!(reply.body["retryable"], true);
}

#[tokio::test]
#[traced_test]
async fn server_errors_are_logged_once_at_error_level() {
    let _reply = call(app(&production()), get("/v1/boom")).await;
    assert!(logs_contain("request failed"));
    assert!(logs_contain("VAULT.SERVER.ERROR"));
    logs_assert(|lines: &[&str]| {
        match lines
            .iter()
            .filter(|line| line.contains("request failed"))
            .count()
        {
            1 => Ok(()),
            n => Err(format!("expected one failure log line, got {n}")),
        }
    });
}

#[tokio::test]
#[traced_test]
async fn client_errors_are_logged_at_warn_level() {
    let _reply = call(app(&production()), get("/v1/items/404")).await;
    assert!(logs_contain("request rejected"));
    assert!(!logs_contain("request failed"));
}
