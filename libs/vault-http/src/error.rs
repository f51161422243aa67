//! The polymorphic failure value returned by handlers.
//!
//! `ApiError` accepts any error through `?`. It does not decide its wire
//! representation: rendering happens once, in the error middleware, where
//! the request context and configuration are known.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use vault_errors::VaultError;

use crate::error_layer::classify;
use crate::sender::{SendContext, send_problem};

/// Standard result type for handlers.
pub type ApiResult<T = Response> = Result<T, ApiError>;

pub struct ApiError {
    inner: anyhow::Error,
    type_name: &'static str,
    backtrace: Backtrace,
}

/// Failure waiting in the response extensions for the error middleware.
#[derive(Clone)]
pub(crate) struct PendingFailure(pub(crate) Arc<ApiError>);

impl<E> From<E> for ApiError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self {
            inner: anyhow::Error::new(err),
            type_name: short_type_name(std::any::type_name::<E>()),
            backtrace: Backtrace::force_capture(),
        }
    }
}

impl ApiError {
    /// Wrap an `anyhow::Error`. Taxonomy values inside it are still recognised.
    #[must_use]
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let type_name = if err.is::<VaultError>() {
            "VaultError"
        } else {
            "Error"
        };
        Self {
            inner: err,
            type_name,
            backtrace: Backtrace::force_capture(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        VaultError::internal(message).into()
    }

    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// The failure followed by its causes.
    pub fn chain(&self) -> anyhow::Chain<'_> {
        self.inner.chain()
    }

    /// Unqualified type name of the wrapped error.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiError")
            .field("type_name", &self.type_name)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.inner)
        } else {
            write!(f, "{}", self.inner)
        }
    }
}

/// Emits a context-free problem document and parks the failure in the
/// response extensions. The error middleware replaces it with the fully
/// rendered document.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let problem = classify(&self).to_problem("", None);
        let mut response = send_problem(&problem, http::HeaderMap::new(), &SendContext::bare());
        response
            .extensions_mut()
            .insert(PendingFailure(Arc::new(self)));
        response
    }
}

/// `validator::types::ValidationErrors` -> `ValidationErrors`
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
