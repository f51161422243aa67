//! Low-level sender: the only place that writes problem response headers.

use axum::body::Body;
use axum::response::Response;
use http::header::{
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_SECURITY_POLICY, CONTENT_TYPE, TRANSFER_ENCODING,
    WWW_AUTHENTICATE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use vault_errors::{APPLICATION_PROBLEM_JSON, Problem};

/// Emitted when a problem document cannot be serialized.
const FALLBACK_PROBLEM: &str = concat!(
    r#"{"type":"https://docs.vault.dev/errors/server#internal","#,
    r#""title":"Internal Server Error","status":500,"detail":"Something went wrong","#,
    r#""instance":"","code":"VAULT.SERVER.ERROR","request_id":null,"retryable":true,"#,
    r#""docs":"https://status.vault.dev/incidents","invalid_params":null,"meta":null}"#
);

/// Per-request inputs of the sender.
#[derive(Debug, Clone, Copy)]
pub struct SendContext<'a> {
    /// Correlation header to echo and its value.
    pub request_id: Option<(&'a HeaderName, &'a str)>,
    /// Challenge for 401 responses that carry no `WWW-Authenticate` yet.
    pub auth_challenge: Option<&'a HeaderValue>,
}

impl SendContext<'_> {
    /// No correlation echo and no challenge.
    #[must_use]
    pub const fn bare() -> Self {
        Self {
            request_id: None,
            auth_challenge: None,
        }
    }
}

/// Write `problem` as `application/problem+json`.
///
/// `inherited` holds headers already present on the failed response; they are
/// kept unless they collide with the uniform problem headers.
#[must_use]
pub fn send_problem(problem: &Problem, mut inherited: HeaderMap, ctx: &SendContext<'_>) -> Response {
    let (status, body) = match serde_json::to_vec(problem) {
        Ok(body) => (problem.status, body),
        Err(err) => {
            tracing::error!(error = %err, code = %problem.code, "failed to serialize problem document");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                FALLBACK_PROBLEM.as_bytes().to_vec(),
            )
        }
    };

    inherited.remove(CONTENT_LENGTH);
    inherited.remove(TRANSFER_ENCODING);

    inherited.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    inherited.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    inherited.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );
    inherited.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    inherited.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_PROBLEM_JSON));

    if let Some((name, id)) = ctx.request_id
        && !inherited.contains_key(name)
    {
        match HeaderValue::from_str(id) {
            Ok(value) => {
                inherited.insert(name.clone(), value);
            }
            Err(_) => tracing::warn!(request_id = %id, "request id is not a valid header value"),
        }
    }

    if status == StatusCode::UNAUTHORIZED
        && let Some(challenge) = ctx.auth_challenge
        && !inherited.contains_key(WWW_AUTHENTICATE)
    {
        inherited.insert(WWW_AUTHENTICATE, challenge.clone());
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = inherited;
    response
}
