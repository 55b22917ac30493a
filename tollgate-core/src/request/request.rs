//! [`Request`]: the immutable value synthesized once a request's head has
//! been parsed. Lives from the start of parsing until its
//! response has been fully flushed or the connection errors.

use std::net::SocketAddr;

use http::HeaderMap;

use crate::path::PathKey;

/// A single `name=value` cookie pair, in the order it appeared in the
/// `Cookie` header.
#[derive(Debug, Clone)]
pub struct Cookie {
 pub name: String,
 pub value: String,
}

#[derive(Debug, Clone)]
pub struct Request {
 /// Lowercased HTTP method (`get`, `post`, ...).
 method: String,
 /// The `Host`/`:authority` name, without port.
 host: String,
 port: u16,
 /// The remote peer's address:port this connection was accepted from.
 origin: SocketAddr,
 pathname: PathKey,
 /// Raw query string, without the leading `?`.
 search: String,
 /// e.g. `http-1.1`, `http-2`.
 protocol: &'static str,
 /// Opaque short id, unique within this process's lifetime.
 request_id: String,
 cookies: Vec<Cookie>,
 /// Case-preserving storage, case-insensitive lookup (`http::HeaderMap`
 /// already gives us both).
 headers: HeaderMap,
}

impl Request {
 #[allow(clippy::too_many_arguments)]
 pub fn new(
 method: impl Into<String>,
 host: impl Into<String>,
 port: u16,
 origin: SocketAddr,
 pathname: PathKey,
 search: impl Into<String>,
 protocol: &'static str,
 request_id: impl Into<String>,
 headers: HeaderMap,
 ) -> Self {
 let cookies = parse_cookies(headers.get(http::header::COOKIE));
 Request {
 method: method.into().to_ascii_lowercase(),
 host: host.into(),
 port,
 origin,
 pathname,
 search: search.into(),
 protocol,
 request_id: request_id.into(),
 cookies,
 headers,
 }
 }

 pub fn method(&self) -> &str {
 &self.method
 }

 pub fn host(&self) -> &str {
 &self.host
 }

 pub fn port(&self) -> u16 {
 self.port
 }

 pub fn origin(&self) -> SocketAddr {
 self.origin
 }

 pub fn pathname(&self) -> &PathKey {
 &self.pathname
 }

 pub fn search(&self) -> &str {
 &self.search
 }

 pub fn protocol(&self) -> &'static str {
 self.protocol
 }

 pub fn request_id(&self) -> &str {
 &self.request_id
 }

 pub fn cookies(&self) -> &[Cookie] {
 &self.cookies
 }

 pub fn headers(&self) -> &HeaderMap {
 &self.headers
 }
}

fn parse_cookies(header: Option<&http::HeaderValue>) -> Vec<Cookie> {
 let Some(header) = header else {
 return Vec::new();
 };
 let Ok(raw) = header.to_str() else {
 return Vec::new();
 };
 raw.split(';')
 .filter_map(|pair| {
 let pair = pair.trim();
 let (name, value) = pair.split_once('=')?;
 Some(Cookie {
 name: name.trim().to_string(),
 value: value.trim().to_string(),
 })
 })
 .collect()
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn method_is_lowercased() {
 let req = Request::new(
 "GET",
 "example.com",
 443,
 "127.0.0.1:1234".parse().unwrap(),
 PathKey::root(),
 "",
 "http-1.1",
 "r1",
 HeaderMap::new(),
 );
 assert_eq!(req.method(), "get");
 }

 #[test]
 fn cookies_are_parsed_in_order() {
 let mut headers = HeaderMap::new();
 headers.insert(http::header::COOKIE, "a=1; b=2".parse().unwrap());
 let req = Request::new(
 "GET",
 "example.com",
 443,
 "127.0.0.1:1234".parse().unwrap(),
 PathKey::root(),
 "",
 "http-1.1",
 "r1",
 headers,
 );
 let names: Vec<_> = req.cookies().iter().map(|c| c.name.as_str()).collect();
 assert_eq!(names, vec!["a", "b"]);
 }

 #[test]
 fn header_lookup_is_case_insensitive() {
 let mut headers = HeaderMap::new();
 headers.insert("X-Custom", "v".parse().unwrap());
 let req = Request::new(
 "GET",
 "example.com",
 443,
 "127.0.0.1:1234".parse().unwrap(),
 PathKey::root(),
 "",
 "http-1.1",
 "r1",
 headers,
 );
 assert_eq!(req.headers().get("x-custom").unwrap(), "v");
 }
}
