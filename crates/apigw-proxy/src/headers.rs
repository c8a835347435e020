//! Header handling for forwarded requests and responses

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Injected upstream header naming the resolved service
pub const GATEWAY_SERVICE_HEADER: &str = "x-gateway-service";
/// Injected upstream header naming the resolved subject id
pub const GATEWAY_USER_HEADER: &str = "x-gateway-user";

/// Connection-scoped headers that must not cross the proxy
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers listed in `Connection` are hop-by-hop too
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Headers to send upstream.
///
/// Drops `host`, hop-by-hop headers and `content-length` (the client
/// recomputes it). Caller-supplied identification headers are always
/// dropped; the gateway's own are set when they encode.
pub(crate) fn upstream_request_headers(original: &HeaderMap, service: &str, subject: &str) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(GATEWAY_SERVICE_HEADER);
    headers.remove(GATEWAY_USER_HEADER);

    if let Ok(value) = HeaderValue::from_str(service) {
        headers.insert(HeaderName::from_static(GATEWAY_SERVICE_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(subject) {
        headers.insert(HeaderName::from_static(GATEWAY_USER_HEADER), value);
    }
    headers
}

/// Headers to return downstream from an upstream response
pub(crate) fn downstream_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    strip_hop_by_hop(&mut headers);
    headers
}
