//! The concrete HTTP request/response shapes this crate speaks.
//!
//! engine.io does not own the listener or the router (spec: "only the
//! handler contract is specified") but it does need *some* concrete body
//! type to read requests from and write responses with. `via`'s own server
//! stack is built on `hyper` + `hyper-util`, so this crate is mountable
//! behind any `hyper`-based server (which includes `via`, axum, and plain
//! `hyper::server::conn::http1`).

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;

/// An inbound HTTP request as delivered by a `hyper` server.
///
pub type Request = http::Request<Incoming>;

/// The body type used for every outbound response.
///
pub type ResponseBody = Full<Bytes>;

/// An outbound HTTP response.
///
pub type Response = http::Response<ResponseBody>;

pub fn text_response(status: http::StatusCode, body: impl Into<Bytes>) -> Response {
    http::Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .expect("status and empty header map are always valid")
}

pub fn empty_response(status: http::StatusCode) -> Response {
    text_response(status, Bytes::new())
}

/// Renders an [`Error`](crate::error::Error) as the HTTP status it carries,
/// falling back to 500 for kinds the spec doesn't assign one to.
///
pub fn error_response(error: &crate::error::Error) -> Response {
    empty_response(error.status().unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR))
}
