//! HTTP side of the Vault error-response pipeline
//!
//! Handlers return [`ApiResult`] and fail with anything convertible into
//! [`ApiError`]. The [`problem_middleware`] renders every failure as an
//! `application/problem+json` document, attaching a `debug` block only when
//! the [`DebugGate`] allows it. Successful responses go through [`Responder`],
//! which wraps payloads in `{ data, meta, links? }` envelopes.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod error_layer;
pub mod gate;
pub mod request_id;
pub mod response;
pub mod sender;
pub mod validation;

pub use config::{ConfigError, EnvMode, ErrorHandlerConfig, Settings};
pub use diagnostics::Diagnostics;
pub use error::{ApiError, ApiResult};
pub use error_layer::{ErrorHandler, RequestContext, not_found_fallback, problem_middleware};
pub use gate::{DebugGate, should_show_debug};
pub use request_id::{MakeVaultRequestId, X_REQUEST_ID, resolve_request_id};
pub use response::{
    APPLICATION_JSON_UTF8, BaseMeta, Envelope, Links, Meta, PageMeta, Responder, weak_etag,
};
pub use sender::{SendContext, send_problem};
pub use validation::{ValidatedJson, invalid_params_from};

/// Common imports for handler modules
pub mod prelude {
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::response::{PageMeta, Responder};
    pub use crate::validation::ValidatedJson;

    pub use vault_errors::{InvalidParam, Problem, VaultError};

    pub use axum::{http::StatusCode, response::IntoResponse};
}
