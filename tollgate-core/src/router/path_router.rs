//! [`PathRouter`]: dispatches on `dispatch.extra` against a [`PathMap`]
//! built from `pathSpec → applicationName` bindings.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::error::Error;
use crate::path::{PathKey, PathMap};
use crate::request::{call_handler_catching_panics, Dispatch, HandleResult, Request, RequestHandler};

/// A single `pathSpec → handler` binding, already resolved from its
/// configured application name to a live handler.
pub struct PathRouterEntry {
 pub path: PathKey,
 pub handler: Rc<dyn RequestHandler>,
}

pub struct PathRouter {
 map: PathMap<Rc<dyn RequestHandler>>,
}

impl PathRouter {
 /// Builds the router's `PathMap` from resolved entries. Fails if two
 /// entries bind the identical `(path, wildcard)` pair.
 pub fn new(entries: impl IntoIterator<Item = PathRouterEntry>) -> Result<Self, Error> {
 let mut map = PathMap::new();
 for entry in entries {
 map.add(&entry.path, entry.handler)?;
 }
 Ok(PathRouter { map })
 }
}

impl RequestHandler for PathRouter {
 /// Walks `find_with_fallback(dispatch.extra)` closest-match-first,
 /// shifting the matched prefix into `dispatch.base` before calling
 /// each candidate, and stops at the first non-`NotHandled` result.
 fn handle_request<'a>(
 &'a self,
 request: &'a Request,
 dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 Box::pin(async move {
 for found in self.map.find_with_fallback(dispatch.extra()) {
 // `FindResult::matched_key` carries the wildcard flag of
 // the binding that matched; `Dispatch::shift` requires a
 // non-wildcard `matched` key, since `base` never carries
 // one.
 let matched = found.matched_key.with_wildcard(false);
 let sub = dispatch.shift(&matched, &found.remainder);
 let result =
 call_handler_catching_panics(&**found.value, request, &sub).await?;
 if !matches!(result, HandleResult::NotHandled) {
 return Ok(result);
 }
 }
 Ok(HandleResult::NotHandled)
 })
 }
}

#[cfg(test)]
mod tests {
 use std::cell::RefCell;

 use http::HeaderMap;

 use crate::path::parse_url_path;

 use super::*;

 struct Recorder {
 name: &'static str,
 result: HandleResult,
 calls: Rc<RefCell<Vec<&'static str>>>,
 }

 impl RequestHandler for Recorder {
 fn handle_request<'a>(
 &'a self,
 _request: &'a Request,
 _dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 self.calls.borrow_mut().push(self.name);
 let result = match &self.result {
 HandleResult::NotHandled => HandleResult::NotHandled,
 HandleResult::HandledDefault => HandleResult::HandledDefault,
 HandleResult::Full(_) => unreachable!("tests don't need Full here"),
 };
 Box::pin(async move { Ok(result) })
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
 HeaderMap::new(),
 )
 }

 /// PathRouter with a wildcard at the root, shadowed by more specific
 /// entries: `/*→A, /x/*→C, /x→D`.
 #[monoio::test]
 async fn wildcard_chain_tries_closest_match_first() {
 let calls = Rc::new(RefCell::new(Vec::new()));
 let mk = |name: &'static str| Recorder {
 name,
 result: HandleResult::NotHandled,
 calls: calls.clone(),
 };
 let router = PathRouter::new([
 PathRouterEntry {
 path: parse_url_path("/*"),
 handler: Rc::new(mk("A")),
 },
 PathRouterEntry {
 path: parse_url_path("/x/*"),
 handler: Rc::new(mk("C")),
 },
 PathRouterEntry {
 path: parse_url_path("/x"),
 handler: Rc::new(mk("D")),
 },
 ])
 .unwrap();

 let req = sample_request();
 let dispatch = Dispatch::fresh(parse_url_path("/x/y"));
 let result = router.handle_request(&req, &dispatch).await.unwrap();
 assert!(matches!(result, HandleResult::NotHandled));
 // "/x/y" has no exact binding; closest wildcard is "/x/*", then "/*".
 assert_eq!(*calls.borrow(), vec!["C", "A"]);
 }

 #[monoio::test]
 async fn exact_match_wins_over_wildcard_and_stops_the_chain() {
 let calls = Rc::new(RefCell::new(Vec::new()));
 let router = PathRouter::new([
 PathRouterEntry {
 path: parse_url_path("/*"),
 handler: Rc::new(Recorder {
 name: "A",
 result: HandleResult::NotHandled,
 calls: calls.clone(),
 }),
 },
 PathRouterEntry {
 path: parse_url_path("/x"),
 handler: Rc::new(Recorder {
 name: "D",
 result: HandleResult::HandledDefault,
 calls: calls.clone(),
 }),
 },
 ])
 .unwrap();

 let req = sample_request();
 let dispatch = Dispatch::fresh(parse_url_path("/x"));
 let result = router.handle_request(&req, &dispatch).await.unwrap();
 assert!(matches!(result, HandleResult::HandledDefault));
 assert_eq!(*calls.borrow(), vec!["D"]);
 }

 #[monoio::test]
 async fn shifted_sub_dispatch_base_grows_by_matched_prefix() {
 struct CaptureBase {
 seen: Rc<RefCell<Option<PathKey>>>,
 }
 impl RequestHandler for CaptureBase {
 fn handle_request<'a>(
 &'a self,
 _request: &'a Request,
 dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 *self.seen.borrow_mut() = Some(dispatch.base().clone());
 Box::pin(async { Ok(HandleResult::HandledDefault) })
 }
 }

 let seen = Rc::new(RefCell::new(None));
 let router = PathRouter::new([PathRouterEntry {
 path: parse_url_path("/x/*"),
 handler: Rc::new(CaptureBase { seen: seen.clone() }),
 }])
 .unwrap();

 let req = sample_request();
 let dispatch = Dispatch::fresh(parse_url_path("/x/y/z"));
 router.handle_request(&req, &dispatch).await.unwrap();
 assert_eq!(seen.borrow().as_ref().unwrap().canonical(), "/x");
 }
}
