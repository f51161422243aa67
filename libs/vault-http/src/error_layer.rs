//! Centralized error mapping for Axum
//!
//! Handlers and extractors fail with [`ApiError`]. Its `IntoResponse` parks
//! the failure on the response; [`problem_middleware`] picks it up and renders
//! the final Problem+JSON document with the request context, the debug gate
//! and the configured diagnostics bounds. Rendering never fails.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, MatchedPath, OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use http::{HeaderMap, HeaderValue, Method};
use tower_http::request_id::RequestId;
use validator::ValidationErrors;
use vault_errors::{DebugInfo, DebugRoute, Problem, VaultError, instance_for};

use crate::config::{ConfigError, ErrorHandlerConfig, Settings};
use crate::diagnostics::Diagnostics;
use crate::error::{ApiError, PendingFailure};
use crate::gate::DebugGate;
use crate::request_id::{CorrelationHeader, resolve_request_id};
use crate::sender::{SendContext, send_problem};
use crate::validation::invalid_params_from;

pub const DEBUG_HINT: &str = "You are seeing this because debug is enabled. Disable in production.";

const INVALID_JSON_DETAIL: &str = "Invalid JSON payload";

/// Map any failure onto the taxonomy.
///
/// Taxonomy values are taken as is, `validator` failures become `Validation`,
/// body-parse rejections become `BadRequest`, everything else is `Internal`
/// with the original message kept out of `detail`.
pub(crate) fn classify(failure: &ApiError) -> VaultError {
    if let Some(err) = failure.downcast_ref::<VaultError>() {
        return err.clone();
    }
    if let Some(errors) = failure.downcast_ref::<ValidationErrors>() {
        let params = invalid_params_from(errors);
        if !params.is_empty() {
            return VaultError::validation(params);
        }
    }
    if failure.downcast_ref::<JsonRejection>().is_some() {
        return VaultError::bad_request().with_detail(INVALID_JSON_DETAIL);
    }
    VaultError::internal(failure.to_string())
}

/// Name for `debug.error_name`: the taxonomy name, or the Rust type name for
/// failures that only ended up as `Internal` by fallback.
fn error_name(failure: &ApiError, classified: &VaultError) -> &'static str {
    match classified {
        VaultError::Internal { .. } if failure.downcast_ref::<VaultError>().is_none() => {
            failure.type_name()
        }
        _ => classified.error_name(),
    }
}

/// Request data captured before the inner service runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Path and query as received (outer `OriginalUri` when nested).
    pub path: String,
    /// Matched route template, or the plain path when no route matched.
    pub route: String,
    pub request_id: String,
    pub caller: Option<IpAddr>,
    pub debug_opt_in: bool,
}

impl RequestContext {
    /// `instance` of the problem document.
    #[must_use]
    pub fn instance(&self) -> String {
        instance_for(&self.path, Some(&self.request_id))
    }
}

/// Immutable error rendering state, shared as `Arc<ErrorHandler>`.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    settings: Settings,
    gate: DebugGate,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

impl ErrorHandler {
    /// # Errors
    /// Returns `ConfigError` if the configuration does not resolve.
    pub fn new(config: &ErrorHandlerConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_settings(config.resolve()?))
    }

    #[must_use]
    pub fn from_settings(settings: Settings) -> Self {
        let gate = DebugGate::from_settings(&settings);
        Self { settings, gate }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn gate(&self) -> &DebugGate {
        &self.gate
    }

    /// Capture the request context and pin the correlation token on the
    /// request, so that the handler's `Responder` reports the same token.
    pub fn capture(&self, req: &mut Request) -> RequestContext {
        let uri = req
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| req.uri(), |original| &original.0);
        let path = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_owned(), |pq| pq.as_str().to_owned());
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| uri.path().to_owned(), |m| m.as_str().to_owned());
        let request_id = resolve_request_id(
            req.extensions(),
            req.headers(),
            &self.settings.request_id_header,
        );
        let caller = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let debug_opt_in = self.gate.header_opt_in(req.headers());
        let method = req.method().clone();

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            req.extensions_mut().insert(RequestId::new(value));
        }
        req.extensions_mut()
            .insert(CorrelationHeader(self.settings.request_id_header.clone()));

        RequestContext {
            method,
            path,
            route,
            request_id,
            caller,
            debug_opt_in,
        }
    }

    /// Build the problem document for `failure`. Reads the clock only for
    /// `debug.ts`.
    #[must_use]
    pub fn render(&self, failure: &ApiError, ctx: &RequestContext) -> Problem {
        let classified = classify(failure);
        let problem = classified.to_problem(&ctx.instance(), Some(&ctx.request_id));
        if !self.gate.evaluate(ctx.caller, ctx.debug_opt_in) {
            return problem;
        }
        problem.with_debug(self.debug_info(failure, error_name(failure, &classified), ctx))
    }

    fn debug_info(&self, failure: &ApiError, error_name: &str, ctx: &RequestContext) -> DebugInfo {
        let diagnostics = Diagnostics::extract(
            failure,
            error_name,
            self.settings.max_stack_lines,
            self.settings.include_causes,
        );
        DebugInfo {
            env: self.settings.env.as_str().to_owned(),
            error_name: diagnostics.error_name,
            stack: self.settings.include_stack.then_some(diagnostics.stack),
            causes: (self.settings.include_causes > 0).then_some(diagnostics.causes),
            hint: DEBUG_HINT.to_owned(),
            route: DebugRoute {
                method: ctx.method.to_string(),
                path: ctx.route.clone(),
            },
            ts: Utc::now(),
        }
    }

    /// Render, log once, and send. `inherited` are headers already set on the
    /// failed response.
    #[must_use]
    pub fn respond(&self, failure: &ApiError, ctx: &RequestContext, inherited: HeaderMap) -> Response {
        let problem = self.render(failure, ctx);
        log_failure(failure, &problem, ctx);
        let send_ctx = SendContext {
            request_id: Some((&self.settings.request_id_header, &ctx.request_id)),
            auth_challenge: Some(&self.settings.auth_challenge),
        };
        send_problem(&problem, inherited, &send_ctx)
    }
}

fn log_failure(failure: &ApiError, problem: &Problem, ctx: &RequestContext) {
    let status = problem.status.as_u16();
    if problem.status.is_server_error() {
        tracing::error!(
            request_id = %ctx.request_id,
            code = %problem.code,
            status,
            method = %ctx.method,
            route = %ctx.route,
            error = %format_args!("{failure:#}"),
            "request failed"
        );
    } else {
        tracing::warn!(
            request_id = %ctx.request_id,
            code = %problem.code,
            status,
            method = %ctx.method,
            route = %ctx.route,
            "request rejected"
        );
    }
}

/// Terminal error middleware.
///
/// Renders parked failures with the request context. Other responses pass
/// through, gaining the correlation header when the handler set none.
///
/// ```ignore
/// let handler = Arc::new(ErrorHandler::new(&config)?);
/// let app = Router::new()
///     .route("/v1/users", post(create_user))
///     .fallback(not_found_fallback)
///     .layer(axum::middleware::from_fn_with_state(handler, problem_middleware));
/// ```
pub async fn problem_middleware(
    State(handler): State<Arc<ErrorHandler>>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = handler.capture(&mut req);
    let mut response = next.run(req).await;
    let Some(PendingFailure(failure)) = response.extensions_mut().remove::<PendingFailure>() else {
        let name = &handler.settings().request_id_header;
        if !response.headers().contains_key(name)
            && let Ok(value) = HeaderValue::from_str(&ctx.request_id)
        {
            response.headers_mut().insert(name.clone(), value);
        }
        return response;
    };
    let (parts, _placeholder) = response.into_parts();
    handler.respond(&failure, &ctx, parts.headers)
}

/// Router fallback: `404` for any unmatched route.
#[allow(clippy::unused_async)]
pub async fn not_found_fallback(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_owned(), |pq| pq.as_str().to_owned());
    VaultError::not_found()
        .with_detail(format!("No route matches {method} {target}"))
        .into()
}
