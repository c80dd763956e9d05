//! Permissive CORS decoration for local development.
//!
//! Every response gets the same three headers, stamped after the inner
//! service has already decided status and body. The layers never inspect
//! the request or the response, so error responses are decorated exactly
//! like successful ones.

use axum::Router;
use axum::http::{HeaderValue, header};
use tower_http::set_header::SetResponseHeaderLayer;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Wrap `router` so all three CORS headers appear on every response.
pub fn apply(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_values_are_wire_legal() {
        // from_static panics on values that cannot go on the wire.
        for value in [ALLOW_ORIGIN, ALLOW_METHODS, ALLOW_HEADERS] {
            let _ = HeaderValue::from_static(value);
        }
    }
}
