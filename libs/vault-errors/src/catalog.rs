//! Static error catalog: one `ErrDef` per taxonomy variant

use crate::problem::Problem;
use http::StatusCode;

/// Static error definition from catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    pub status: u16,
    pub title: &'static str,
    pub code: &'static str,
    pub type_url: &'static str,
    pub retryable: bool,
    pub docs: Option<&'static str>,
    /// Detail used when the failure does not override it.
    pub default_detail: &'static str,
}

impl ErrDef {
    /// Convert this error definition into a Problem with the given detail
    #[inline]
    pub fn as_problem(&self, detail: impl Into<String>) -> Problem {
        // Invalid codes never appear in the catalog; 500 is the fallback
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let problem = Problem::new(status, self.title, detail.into())
            .with_code(self.code)
            .with_type(self.type_url)
            .with_retryable(self.retryable);
        if let Some(docs) = self.docs {
            problem.with_docs(docs)
        } else {
            problem
        }
    }
}

pub const NOT_FOUND: ErrDef = ErrDef {
    status: 404,
    title: "Not Found",
    code: "VAULT.RESOURCE.NOT_FOUND",
    type_url: "https://docs.vault.dev/errors/not-found",
    retryable: false,
    docs: None,
    default_detail: "The requested resource was not found.",
};

pub const VALIDATION_FAILED: ErrDef = ErrDef {
    status: 422,
    title: "Unprocessable Entity",
    code: "VAULT.REQUEST.VALIDATION_FAILED",
    type_url: "https://docs.vault.dev/errors/request#validation",
    retryable: false,
    docs: None,
    default_detail: "Some fields failed validation.",
};

pub const INVALID_CREDENTIALS: ErrDef = ErrDef {
    status: 401,
    title: "Invalid credentials",
    code: "VAULT.AUTH.INVALID_CREDENTIALS",
    type_url: "https://docs.vault.dev/errors/auth#invalid-credentials",
    retryable: false,
    docs: Some("https://docs.vault.dev/auth#troubleshooting"),
    default_detail: "The email or password is incorrect.",
};

pub const BAD_REQUEST: ErrDef = ErrDef {
    status: 400,
    title: "Bad Request",
    code: "VAULT.REQUEST.BAD",
    type_url: "https://docs.vault.dev/errors/request#bad-request",
    retryable: true,
    docs: Some("https://docs.vault.dev/errors/request"),
    default_detail: "The request could not be understood or was missing required parameters.",
};

pub const SERVER_ERROR: ErrDef = ErrDef {
    status: 500,
    title: "Internal Server Error",
    code: "VAULT.SERVER.ERROR",
    type_url: "https://docs.vault.dev/errors/server#internal",
    retryable: true,
    docs: Some("https://status.vault.dev/incidents"),
    default_detail: "Something went wrong",
};
