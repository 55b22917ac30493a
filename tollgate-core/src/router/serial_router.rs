//! [`SerialRouter`]: tries an ordered list of handlers, stopping at the
//! first non-`NotHandled` result. Used to compose
//! middleware-like chains, e.g. rate-limit → real handler.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::error::Error;
use crate::request::{call_handler_catching_panics, Dispatch, HandleResult, Request, RequestHandler};

pub struct SerialRouter {
 chain: Vec<Rc<dyn RequestHandler>>,
}

impl SerialRouter {
 pub fn new(chain: impl IntoIterator<Item = Rc<dyn RequestHandler>>) -> Self {
 SerialRouter {
 chain: chain.into_iter().collect(),
 }
 }
}

impl RequestHandler for SerialRouter {
 fn handle_request<'a>(
 &'a self,
 request: &'a Request,
 dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 Box::pin(async move {
 for handler in &self.chain {
 let result = call_handler_catching_panics(&**handler, request, dispatch).await?;
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
 use http::HeaderMap;

 use crate::path::PathKey;

 use super::*;

 struct Fixed(HandleResultKind);

 #[derive(Clone, Copy)]
 enum HandleResultKind {
 NotHandled,
 HandledDefault,
 }

 impl RequestHandler for Fixed {
 fn handle_request<'a>(
 &'a self,
 _request: &'a Request,
 _dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 let result = match self.0 {
 HandleResultKind::NotHandled => HandleResult::NotHandled,
 HandleResultKind::HandledDefault => HandleResult::HandledDefault,
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

 #[monoio::test]
 async fn stops_at_first_handled_result() {
 let router = SerialRouter::new([
 Rc::new(Fixed(HandleResultKind::NotHandled)) as Rc<dyn RequestHandler>,
 Rc::new(Fixed(HandleResultKind::HandledDefault)),
 Rc::new(Fixed(HandleResultKind::NotHandled)),
 ]);
 let req = sample_request();
 let dispatch = Dispatch::fresh(PathKey::root());
 let result = router.handle_request(&req, &dispatch).await.unwrap();
 assert!(matches!(result, HandleResult::HandledDefault));
 }

 #[monoio::test]
 async fn all_not_handled_yields_not_handled() {
 let router = SerialRouter::new([
 Rc::new(Fixed(HandleResultKind::NotHandled)) as Rc<dyn RequestHandler>,
 Rc::new(Fixed(HandleResultKind::NotHandled)),
 ]);
 let req = sample_request();
 let dispatch = Dispatch::fresh(PathKey::root());
 let result = router.handle_request(&req, &dispatch).await.unwrap();
 assert!(matches!(result, HandleResult::NotHandled));
 }
}
