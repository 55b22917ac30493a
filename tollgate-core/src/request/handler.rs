//! [`RequestHandler`]: the uniform contract every application (router or
//! leaf handler) implements.
//!
//! A handler is config-driven and resolved by name at application-tree
//! build time, so handlers are stored and called through `Rc<dyn
//! RequestHandler>` rather than a generic `service_async::Service` —
//! unlike the protocol stack, this tree is heterogeneous and assembled
//! from string class names at reload time, which is exactly what a
//! trait object is for. Boxing the future is the plain, idiomatic way to
//! make that dyn-safe.

use std::future::Future;
use std::pin::Pin;

use crate::error::Error;

use super::{Dispatch, HandleResult, Request};

/// A base-class wrapper enforces the return-value shape, turning an
/// accidental missing response into a protocol error: here that's simply
/// the fact that `handle_request` can only ever produce a
/// [`HandleResult`] or an [`Error`] — there is no third, malformed case
/// for a caller to guard against.
pub trait RequestHandler {
 fn handle_request<'a>(
 &'a self,
 request: &'a Request,
 dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>>;
}

/// Runs `handler` and folds a panic into the same failure path a thrown
/// exception takes: the endpoint translates it to a 5xx and logs, rather
/// than letting it unwind into the caller.
pub async fn call_handler_catching_panics(
 handler: &(dyn RequestHandler + '_),
 request: &Request,
 dispatch: &Dispatch,
) -> Result<HandleResult, Error> {
 use futures_util::FutureExt;
 match std::panic::AssertUnwindSafe(handler.handle_request(request, dispatch))
 .catch_unwind()
 .await
 {
 Ok(result) => result,
 Err(payload) => {
 let msg = if let Some(s) = payload.downcast_ref::<&str>() {
 s.to_string()
 } else if let Some(s) = payload.downcast_ref::<String>() {
 s.clone()
 } else {
 "handler panicked".to_string()
 };
 Err(Error::HandlerFailure(anyhow::anyhow!(msg)))
 }
 }
}

#[cfg(test)]
mod tests {
 use std::rc::Rc;

 use crate::path::PathKey;

 use super::*;

 struct PanicHandler;

 impl RequestHandler for PanicHandler {
 fn handle_request<'a>(
 &'a self,
 _request: &'a Request,
 _dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 Box::pin(async { panic!("boom") })
 }
 }

 struct OkHandler;

 impl RequestHandler for OkHandler {
 fn handle_request<'a>(
 &'a self,
 _request: &'a Request,
 _dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 Box::pin(async { Ok(HandleResult::HandledDefault) })
 }
 }

 fn sample_request() -> Request {
 Request::new(
 "GET",
 "example.com",
 80,
 "127.0.0.1:1".parse().unwrap(),
 PathKey::root(),
 "",
 "http-1.1",
 "r1",
 http::HeaderMap::new(),
 )
 }

 #[monoio::test]
 async fn panic_becomes_handler_failure() {
 let h: Rc<dyn RequestHandler> = Rc::new(PanicHandler);
 let req = sample_request();
 let dispatch = Dispatch::fresh(PathKey::root());
 let err = call_handler_catching_panics(&*h, &req, &dispatch)
 .await
 .unwrap_err();
 assert!(matches!(err, Error::HandlerFailure(_)));
 }

 #[monoio::test]
 async fn ok_handler_passes_through() {
 let h: Rc<dyn RequestHandler> = Rc::new(OkHandler);
 let req = sample_request();
 let dispatch = Dispatch::fresh(PathKey::root());
 let result = call_handler_catching_panics(&*h, &req, &dispatch)
 .await
 .unwrap();
 assert!(matches!(result, HandleResult::HandledDefault));
 }
}
