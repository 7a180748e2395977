//! `x-request-id` generation.

use axum::http::{HeaderValue, Request};
use certify_id::RequestId;
use tower_http::request_id::{self, MakeRequestId};

/// Tags requests that arrive without an `x-request-id` with a fresh `req_<ulid>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<request_id::RequestId> {
        HeaderValue::from_str(&RequestId::new().to_string())
            .ok()
            .map(request_id::RequestId::new)
    }
}
