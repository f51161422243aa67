//! Normalization of `validator` failures into invalid params, and a JSON
//! extractor that validates its payload.

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};
use vault_errors::InvalidParam;

use crate::error::ApiError;

/// Flatten `validator` errors into one entry per offending field.
///
/// Nested structs and list items become dotted paths (`address.city`,
/// `items.0.name`). Entries are sorted by path; errors of the same field keep
/// their declaration order.
#[must_use]
pub fn invalid_params_from(errors: &ValidationErrors) -> Vec<InvalidParam> {
    let mut params = Vec::new();
    collect("", errors, &mut params);
    params.sort_by(|a, b| a.name.cmp(&b.name));
    params
}

fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<InvalidParam>) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, field);
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.extend(field_errors.iter().map(|e| {
                    let reason = e
                        .message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string);
                    InvalidParam::new(path.clone(), reason, e.code.to_string())
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(&format!("{path}.{index}"), inner, out);
                }
            }
        }
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_owned()
    } else {
        format!("{prefix}.{field}")
    }
}

/// JSON body extractor that also runs `Validate`.
///
/// Malformed bodies fail as bad requests; validation failures carry the
/// `validator` error into the error middleware, which reports them as 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}
