//! [`SuffixRouter`]: dispatches on the last component of `dispatch.extra`
//! by matching it against the longest configured suffix.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use regex::Regex;

use crate::error::Error;
use crate::request::{Dispatch, HandleResult, Request, RequestHandler};

/// A single `suffix → applicationName` binding, already resolved to a
/// live handler. `suffix` is either exactly `"*"` (match everything) or
/// starts with `"*"` (e.g. `"*.tar.gz"`).
pub struct SuffixRouterEntry {
 pub suffix: String,
 pub handler: Rc<dyn RequestHandler>,
}

pub struct SuffixRouter {
 /// One combined, end-anchored regex with a named group per entry
 /// (`s0`, `s1`, ...). A leading `(?:.)` forbids the match from
 /// consuming the entire name — there must be at least one character
 /// before the suffix. Because every alternative shares that single
 /// leading-character requirement and all are anchored at `$`, the
 /// engine's leftmost-match scan always lands on the longest
 /// satisfiable suffix first, with no need to order the alternatives
 /// by hand.
 pattern: Regex,
 handlers: Vec<Rc<dyn RequestHandler>>,
 handle_files: bool,
 handle_directories: bool,
}

impl SuffixRouter {
 pub fn new(
 entries: impl IntoIterator<Item = SuffixRouterEntry>,
 handle_files: bool,
 handle_directories: bool,
 ) -> Result<Self, Error> {
 if !handle_files && !handle_directories {
 return Err(Error::ConfigInvalid(
 "SuffixRouter requires handleFiles or handleDirectories".into(),
 ));
 }
 let mut handlers = Vec::new();
 let mut alts = Vec::new();
 for (i, entry) in entries.into_iter().enumerate() {
 let literal = entry.suffix.strip_prefix('*').unwrap_or(&entry.suffix);
 alts.push(format!("(?P<s{i}>{})", regex::escape(literal)));
 handlers.push(entry.handler);
 }
 if handlers.is_empty() {
 return Err(Error::ConfigInvalid("SuffixRouter has no entries".into()));
 }
 let full = format!("(?:.)(?:{})$", alts.join("|"));
 let pattern = Regex::new(&full)
 .map_err(|e| Error::ConfigInvalid(format!("invalid suffix pattern: {e}")))?;
 Ok(SuffixRouter {
 pattern,
 handlers,
 handle_files,
 handle_directories,
 })
 }

 fn matched_handler(&self, name: &str) -> Option<&Rc<dyn RequestHandler>> {
 let caps = self.pattern.captures(name)?;
 for (i, handler) in self.handlers.iter().enumerate() {
 if caps.name(&format!("s{i}")).is_some() {
 return Some(handler);
 }
 }
 None
 }
}

impl RequestHandler for SuffixRouter {
 fn handle_request<'a>(
 &'a self,
 request: &'a Request,
 dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 Box::pin(async move {
 let components = dispatch.extra().components();
 let Some(last) = components.last() else {
 return Ok(HandleResult::NotHandled);
 };
 let is_directory = last.is_empty();
 if is_directory && !self.handle_directories {
 return Ok(HandleResult::NotHandled);
 }
 if !is_directory && !self.handle_files {
 return Ok(HandleResult::NotHandled);
 }
 let name = if is_directory {
 components
 .iter()
 .rev()
 .nth(1)
 .map(|s| s.as_ref())
 .unwrap_or("")
 } else {
 last.as_ref()
 };
 match self.matched_handler(name) {
 Some(handler) => {
 crate::request::call_handler_catching_panics(&**handler, request, dispatch)
 .await
 }
 None => Ok(HandleResult::NotHandled),
 }
 })
 }
}

#[cfg(test)]
mod tests {
 use http::HeaderMap;

 use crate::path::{parse_url_path, PathKey};

 use super::*;

 fn recorder(name: &'static str) -> Rc<dyn RequestHandler> {
 struct R(&'static str);
 impl RequestHandler for R {
 fn handle_request<'a>(
 &'a self,
 _request: &'a Request,
 _dispatch: &'a Dispatch,
 ) -> Pin<Box<dyn Future<Output = Result<HandleResult, Error>> + 'a>> {
 let _ = self.0;
 Box::pin(async { Ok(HandleResult::HandledDefault) })
 }
 }
 Rc::new(R(name))
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

 fn router() -> SuffixRouter {
 SuffixRouter::new(
 [
 SuffixRouterEntry {
 suffix: "*.tar.gz".into(),
 handler: recorder("T"),
 },
 SuffixRouterEntry {
 suffix: "*.gz".into(),
 handler: recorder("G"),
 },
 SuffixRouterEntry {
 suffix: "*".into(),
 handler: recorder("X"),
 },
 ],
 true,
 false,
 )
 .unwrap()
 }

 #[monoio::test]
 async fn longest_suffix_wins() {
 let r = router();
 let req = sample_request();
 for (path, expect_handled) in [("/a/b/c.tar.gz", true), ("/a/b/c.gz", true), ("/a/b/c.txt", true)] {
 let dispatch = Dispatch::fresh(parse_url_path(path));
 let result = r.handle_request(&req, &dispatch).await.unwrap();
 assert_eq!(matches!(result, HandleResult::HandledDefault), expect_handled);
 }
 }

 #[monoio::test]
 async fn directory_is_not_handled_when_handle_directories_is_false() {
 let r = router();
 let req = sample_request();
 let dispatch = Dispatch::fresh(parse_url_path("/a/b/"));
 let result = r.handle_request(&req, &dispatch).await.unwrap();
 assert!(matches!(result, HandleResult::NotHandled));
 }

 #[monoio::test]
 async fn bare_name_with_no_prefix_does_not_match_its_own_suffix() {
 let r = SuffixRouter::new(
 [SuffixRouterEntry {
 suffix: "*.gz".into(),
 handler: recorder("G"),
 }],
 true,
 false,
 )
 .unwrap();
 let req = sample_request();
 // The whole last component IS the suffix with nothing preceding it.
 let dispatch = Dispatch::fresh(parse_url_path("/.gz"));
 let result = r.handle_request(&req, &dispatch).await.unwrap();
 assert!(matches!(result, HandleResult::NotHandled));
 }
}
