//! Vault error taxonomy
//!
//! `VaultError` is the closed set of failures the API reports with a precise
//! code. Each variant maps to exactly one catalog entry, so the status, code
//! and type URI of a problem document are fixed by the variant alone.
//! Anything else that reaches the HTTP layer is reported as `Internal`.

use http::StatusCode;

use crate::catalog::{self, ErrDef};
use crate::problem::{InvalidParam, Problem};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Not Found")]
    NotFound { detail: Option<String> },

    #[error("Invalid request parameters")]
    Validation {
        invalid_params: Vec<InvalidParam>,
        detail: Option<String>,
    },

    #[error("Invalid credentials")]
    Unauthorized { detail: Option<String> },

    #[error("Bad Request")]
    BadRequest { detail: Option<String> },

    /// The message is kept for logs and diagnostics and never reaches `detail`.
    #[error("{message}")]
    Internal { message: String },
}

impl VaultError {
    #[must_use]
    pub fn not_found() -> Self {
        Self::NotFound { detail: None }
    }

    #[must_use]
    pub fn validation(invalid_params: Vec<InvalidParam>) -> Self {
        Self::Validation {
            invalid_params,
            detail: None,
        }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::Unauthorized { detail: None }
    }

    #[must_use]
    pub fn bad_request() -> Self {
        Self::BadRequest { detail: None }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Override the user-facing detail. Has no effect on `Internal`, whose
    /// detail is always the catalog's generic text.
    #[must_use]
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        let detail = Some(detail.into());
        match self {
            Self::NotFound { .. } => Self::NotFound { detail },
            Self::Validation { invalid_params, .. } => Self::Validation {
                invalid_params,
                detail,
            },
            Self::Unauthorized { .. } => Self::Unauthorized { detail },
            Self::BadRequest { .. } => Self::BadRequest { detail },
            internal @ Self::Internal { .. } => internal,
        }
    }

    /// Catalog entry for this variant.
    #[must_use]
    pub fn def(&self) -> &'static ErrDef {
        match self {
            Self::NotFound { .. } => &catalog::NOT_FOUND,
            Self::Validation { .. } => &catalog::VALIDATION_FAILED,
            Self::Unauthorized { .. } => &catalog::INVALID_CREDENTIALS,
            Self::BadRequest { .. } => &catalog::BAD_REQUEST,
            Self::Internal { .. } => &catalog::SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.def().status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.def().code
    }

    /// Name reported in `debug.error_name`.
    #[must_use]
    pub fn error_name(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFoundError",
            Self::Validation { .. } => "ValidationError",
            Self::Unauthorized { .. } => "AuthError",
            Self::BadRequest { .. } => "BadRequestError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// User-safe detail text.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::NotFound { detail }
            | Self::Validation { detail, .. }
            | Self::Unauthorized { detail }
            | Self::BadRequest { detail } => {
                detail.as_deref().unwrap_or(self.def().default_detail)
            }
            Self::Internal { .. } => self.def().default_detail,
        }
    }

    #[must_use]
    pub fn invalid_params(&self) -> Option<&[InvalidParam]> {
        match self {
            Self::Validation { invalid_params, .. } => Some(invalid_params),
            _ => None,
        }
    }

    /// Build the public problem document for this failure.
    ///
    /// Pure: the same failure, instance and request id always give the same document.
    pub fn to_problem(&self, instance: &str, request_id: Option<&str>) -> Problem {
        let mut problem = self.def().as_problem(self.detail()).with_instance(instance);
        if let Some(rid) = request_id {
            problem = problem.with_request_id(rid);
        }
        if let Some(params) = self.invalid_params() {
            problem = problem.with_invalid_params(params.to_vec());
        }
        problem
    }
}
