//! Correlation token helpers.
//!
//! The token is normally assigned upstream (a proxy or `SetRequestIdLayer`).
//! A `req_<uuid>` token is synthesized only when none was supplied.

use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Name of the correlation header configured for this request, inserted by
/// the error middleware so that responders echo the same header.
#[derive(Debug, Clone)]
pub struct CorrelationHeader(pub HeaderName);

/// `MakeRequestId` for `tower_http::request_id::SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeVaultRequestId;

impl MakeRequestId for MakeVaultRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&synthesize_request_id())
            .ok()
            .map(RequestId::new)
    }
}

#[must_use]
pub fn synthesize_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4())
}

/// Correlation token for a request: the `RequestId` extension, then the
/// inbound header, then a freshly synthesized token.
#[must_use]
pub fn resolve_request_id(
    extensions: &Extensions,
    headers: &HeaderMap,
    header: &HeaderName,
) -> String {
    extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| headers.get(header).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(synthesize_request_id, ToOwned::to_owned)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn synthesized_ids_are_prefixed_and_unique() {
        let a = synthesize_request_id();
        let b = synthesize_request_id();
        assert!(a.starts_with("req_"));
        assert_ne!(a, b);
    }

    #[test]
    fn inbound_header_is_used() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        let id = resolve_request_id(&Extensions::new(), &headers, &X_REQUEST_ID);
        assert_eq!(id, "abc-123");
    }

    #[test]
    fn extension_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("from-header"));
        let mut ext = Extensions::new();
        ext.insert(RequestId::new(HeaderValue::from_static("from-layer")));
        assert_eq!(resolve_request_id(&ext, &headers, &X_REQUEST_ID), "from-layer");
    }

    #[test]
    fn custom_header_name_is_honoured() {
        let header = HeaderName::from_static("x-correlation-id");
        let mut headers = HeaderMap::new();
        headers.insert(header.clone(), HeaderValue::from_static("corr-1"));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("ignored"));
        assert_eq!(resolve_request_id(&Extensions::new(), &headers, &header), "corr-1");
    }

    #[test]
    fn blank_header_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("  "));
        let id = resolve_request_id(&Extensions::new(), &headers, &X_REQUEST_ID);
        assert!(id.starts_with("req_"));
    }

    #[test]
    fn make_request_id_produces_header_value() {
        let req = Request::builder().body(()).unwrap();
        let id = MakeVaultRequestId.make_request_id(&req).unwrap();
        assert!(id.header_value().to_str().unwrap().starts_with("req_"));
    }
}
