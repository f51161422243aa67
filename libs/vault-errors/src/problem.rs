//! RFC 7807 problem documents with Vault extensions (pure data model, no HTTP framework dependencies)

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

/// Content type for problem documents.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json; charset=utf-8";

/// Custom serializer for `StatusCode` to u16
#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

/// Custom deserializer for `StatusCode` from u16
fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

/// Canonical failure representation sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[cfg_attr(
    feature = "utoipa",
    schema(title = "Problem", description = "RFC 7807 problem document with Vault extensions")
)]
#[must_use]
pub struct Problem {
    /// Stable URI identifying the error category.
    #[serde(rename = "type")]
    pub type_url: String,
    /// A short, human-readable label.
    pub title: String,
    /// The HTTP status code. Serializes as u16.
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    #[cfg_attr(feature = "utoipa", schema(value_type = u16))]
    pub status: StatusCode,
    /// User-safe explanation of this occurrence.
    pub detail: String,
    /// Request path, optionally suffixed with `#<request_id>`.
    pub instance: String,
    /// Machine-stable code, e.g. `VAULT.REQUEST.VALIDATION_FAILED`.
    pub code: String,
    /// Correlation token of the failed request.
    pub request_id: Option<String>,
    /// Whether a retry might succeed.
    pub retryable: Option<bool>,
    /// Remediation docs.
    pub docs: Option<String>,
    /// One entry per rejected field, validation failures only.
    pub invalid_params: Option<Vec<InvalidParam>>,
    /// Safe, non-sensitive extras.
    #[cfg_attr(feature = "utoipa", schema(value_type = Option<Object>))]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
    /// Diagnostics, attached only when the debug gate allows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[cfg_attr(feature = "utoipa", schema(title = "InvalidParam"))]
pub struct InvalidParam {
    /// Dotted field path, e.g. "email" or "address.city"
    pub name: String,
    /// Human-readable reason
    pub reason: String,
    /// Machine-readable issue code
    pub code: String,
}

impl InvalidParam {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        reason: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
            code: code.into(),
        }
    }
}

/// Diagnostics block. Not part of the stable public contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[cfg_attr(feature = "utoipa", schema(title = "ProblemDebug"))]
pub struct DebugInfo {
    pub env: String,
    pub error_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<String>>,
    pub hint: String,
    pub route: DebugRoute,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct DebugRoute {
    pub method: String,
    pub path: String,
}

impl Problem {
    /// Create a new Problem with the given status, title, and detail.
    ///
    /// The status is serialized as `u16`.
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status,
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
            request_id: None,
            retryable: None,
            docs: None,
            invalid_params: None,
            meta: None,
            debug: None,
        }
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn with_docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = Some(docs.into());
        self
    }

    pub fn with_invalid_params(mut self, params: Vec<InvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Map<String, serde_json::Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_debug(mut self, debug: DebugInfo) -> Self {
        self.debug = Some(debug);
        self
    }
}
