//! [`HandleResult`]/[`FullResponse`]: the handler-contract response shape.
//! `null`/`false` (not handled) collapse into a single
//! `NotHandled` variant — both tell the caller "try the next candidate",
//! and Rust has no use for two ways to say it.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use http::{HeaderMap, StatusCode};

/// What a request handler decided to do with a request.
pub enum HandleResult {
 /// Not handled; the caller may try the next candidate.
 NotHandled,
 /// Handled, with a synthesized default response.
 HandledDefault,
 /// An explicit response to send.
 Full(FullResponse),
}

/// A streamed or buffered response body.
pub enum Body {
 Empty,
 Bytes(Bytes),
 Stream(BoxStream<'static, std::io::Result<Bytes>>),
}

/// An explicit response produced by a handler.
pub struct FullResponse {
 pub status: StatusCode,
 pub headers: HeaderMap,
 pub body: Body,
 /// A pre-formatted `Cache-Control` value, if the handler wants one.
 pub cache_control: Option<String>,
}

impl FullResponse {
 pub fn new(status: StatusCode) -> Self {
 FullResponse {
 status,
 headers: HeaderMap::new(),
 body: Body::Empty,
 cache_control: None,
 }
 }

 pub fn with_body(mut self, body: Bytes) -> Self {
 self.body = Body::Bytes(body);
 self
 }

 /// Validates the `status`/`body` combination against the HTTP body
 /// allowance rules, as required whenever a [`FullResponse`] is finally
 /// serialized. Returns `false` for e.g. a `204` carrying a non-empty
 /// body.
 pub fn is_body_allowance_valid(&self) -> bool {
 let forbids_body = matches!(
 self.status.as_u16(),
 100..=199 | 204 | 304
 );
 if forbids_body {
 return matches!(self.body, Body::Empty);
 }
 true
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn no_content_with_empty_body_is_valid() {
 let resp = FullResponse::new(StatusCode::NO_CONTENT);
 assert!(resp.is_body_allowance_valid());
 }

 #[test]
 fn no_content_with_body_is_invalid() {
 let resp = FullResponse::new(StatusCode::NO_CONTENT).with_body(Bytes::from_static(b"x"));
 assert!(!resp.is_body_allowance_valid());
 }

 #[test]
 fn ok_with_body_is_valid() {
 let resp = FullResponse::new(StatusCode::OK).with_body(Bytes::from_static(b"x"));
 assert!(resp.is_body_allowance_valid());
 }
}
