//! Core error types for the Vault API
//!
//! This crate provides pure data types for error handling, with no dependencies
//! on HTTP frameworks. It includes:
//! - Problem documents (`Problem`) with the Vault extensions
//! - The static error catalog (`ErrDef`)
//! - The error taxonomy (`VaultError`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod error;
pub mod problem;

// Re-export commonly used types
pub use catalog::ErrDef;
pub use error::VaultError;
pub use problem::{APPLICATION_PROBLEM_JSON, DebugInfo, DebugRoute, InvalidParam, Problem};

/// Build the `instance` of a problem document: the request path, suffixed
/// with `#<request_id>` when a correlation token is known.
#[must_use]
pub fn instance_for(path: &str, request_id: Option<&str>) -> String {
    match request_id {
        Some(rid) if !rid.is_empty() => format!("{path}#{rid}"),
        _ => path.to_owned(),
    }
}
