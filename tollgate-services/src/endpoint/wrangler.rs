//! HTTP/1.1 and HTTP/2 protocol wranglers.
//!
//! Both decode a request head, drain its body, dispatch to the endpoint's
//! application tree, and encode the response. [`Request`] carries no body
//! field — unlike a proxying wrangler there is never a reason
//! to stream a request body through to a handler, so draining happens as
//! a plain sequential step between decode and dispatch rather than
//! concurrently with handler execution.
//!
//! Forced abort is not handled in here: [`super::NetworkEndpoint`]'s
//! accept loop races the whole per-connection future driving these
//! wranglers against a [`Canceller`](tollgate_core::util::Canceller)
//! waiter, so dropping that race closes the socket out from under
//! whichever await point a connection happens to be suspended at.

use std::cell::Cell;
use std::net::SocketAddr;
use std::rc::Rc;

use bytes::Bytes;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use http::StatusCode;
use monoio::io::{sink::SinkExt, AsyncReadRent, AsyncWriteRent, Split, Splitable};
use monoio_http::common::body::{Body as HttpBodyApi, FixedBody, HttpBody, StreamHint};
use monoio_http::h1::codec::decoder::{FillPayload, RequestDecoder};
use monoio_http::h1::codec::encoder::GenericEncoder;
use monoio_http::h2::server::SendResponse;
use tollgate_core::path::parse_url_path;
use tollgate_core::request::{
 call_handler_catching_panics, Body, Dispatch, FullResponse, HandleResult, Request,
 RequestHandler,
};
use tollgate_core::AnyError;
use tracing::{error, info, warn};

/// Per-endpoint identity a wrangler needs to synthesize a [`Request`]
/// that the wire format itself doesn't carry — its `host`/`port` fall
/// back to the endpoint's own binding when a request has no `Host`
/// header to read them from.
pub struct RequestContext {
 pub application: Rc<dyn RequestHandler>,
 pub default_port: u16,
 pub protocol: &'static str,
 /// Flipped by the endpoint once its drain sequence has begun; checked
 /// between keep-alive iterations and between h2 streams so a draining
 /// endpoint stops picking up new work without having to touch
 /// frame-level close-notify/GOAWAY plumbing.
 pub stopping: Rc<Cell<bool>>,
 next_request_id: Cell<u64>,
}

impl RequestContext {
 pub fn new(application: Rc<dyn RequestHandler>, default_port: u16, protocol: &'static str, stopping: Rc<Cell<bool>>) -> Self {
 RequestContext {
 application,
 default_port,
 protocol,
 stopping,
 next_request_id: Cell::new(0),
 }
 }

 fn next_request_id(&self) -> String {
 let id = self.next_request_id.get();
 self.next_request_id.set(id + 1);
 format!("{id:x}")
 }

 fn build_request(&self, parts: &http::request::Parts, origin: SocketAddr) -> Request {
 let (host, port) = host_and_port(parts.headers.get(http::header::HOST), self.default_port);
 Request::new(
 parts.method.as_str(),
 host,
 port,
 origin,
 parse_url_path(parts.uri.path()),
 parts.uri.query().unwrap_or(""),
 self.protocol,
 self.next_request_id(),
 parts.headers.clone(),
 )
 }

 async fn dispatch(&self, request: &Request) -> HandleResult {
 let dispatch = Dispatch::fresh(request.pathname().clone());
 match call_handler_catching_panics(&*self.application, request, &dispatch).await {
 Ok(result) => result,
 Err(err) => {
 error!(request_id = request.request_id(), "handler failed: {err}");
 let status = if self.stopping.get() {
 StatusCode::SERVICE_UNAVAILABLE
 } else {
 StatusCode::INTERNAL_SERVER_ERROR
 };
 HandleResult::Full(FullResponse::new(status))
 }
 }
 }
}

fn host_and_port(host_header: Option<&http::HeaderValue>, default_port: u16) -> (String, u16) {
 let Some(raw) = host_header.and_then(|v| v.to_str().ok()) else {
 return (String::new(), default_port);
 };
 match raw.rsplit_once(':') {
 Some((host, port)) => match port.parse() {
 Ok(port) => (host.to_string(), port),
 Err(_) => (raw.to_string(), default_port),
 },
 None => (raw.to_string(), default_port),
 }
}

/// Turns a [`HandleResult`] into the wire response, validating
/// [`FullResponse::is_body_allowance_valid`] and falling back to a `500`
/// if a handler violated it.
fn into_wire_response(result: HandleResult) -> http::Response<HttpBody> {
 match result {
 HandleResult::NotHandled => fixed_response(StatusCode::NOT_FOUND, Bytes::new()),
 HandleResult::HandledDefault => fixed_response(StatusCode::OK, Bytes::new()),
 HandleResult::Full(resp) => {
 if !resp.is_body_allowance_valid() {
 warn!("handler returned a body where {} forbids one", resp.status);
 return fixed_response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new());
 }
 let mut builder = http::Response::builder().status(resp.status);
 *builder.headers_mut().unwrap() = resp.headers;
 let body = match resp.body {
 Body::Empty => HttpBody::fixed_body(None),
 Body::Bytes(bytes) => HttpBody::fixed_body(Some(bytes)),
 // No application in scope streams a response body; buffering
 // here keeps the wrangler from needing a StreamHint::Stream
 // write path it would never otherwise exercise.
 Body::Stream(_) => HttpBody::fixed_body(Some(Bytes::new())),
 };
 builder.body(body).unwrap_or_else(|_| fixed_response(StatusCode::INTERNAL_SERVER_ERROR, Bytes::new()))
 }
 }
}

fn fixed_response(status: StatusCode, body: Bytes) -> http::Response<HttpBody> {
 http::Response::builder()
 .status(status)
 .header(http::header::CONTENT_LENGTH, body.len())
 .body(HttpBody::fixed_body(Some(body)))
 .expect("status/header values are always valid")
}

/// Runs the HTTP/1.1 request loop for one accepted connection (used for
/// both plaintext `http` and, after a TLS handshake, `https` endpoints).
pub async fn h1_serve<S>(stream: S, origin: SocketAddr, ctx: &RequestContext) -> Result<(), AnyError>
where
 S: Split + AsyncReadRent + AsyncWriteRent,
{
 let (reader, writer) = stream.into_split();
 let mut decoder = RequestDecoder::new(reader);
 let mut encoder = GenericEncoder::new(writer);

 loop {
 let decoded = decoder.next().await;
 let req = match decoded {
 Some(Ok(req)) => req,
 Some(Err(err)) => {
 warn!("connection {origin}: decode request header failed: {err}");
 break;
 }
 None => break,
 };
 let (parts, _) = req.into_parts();
 let request = ctx.build_request(&parts, origin);

 if let Err(err) = decoder.fill_payload().await {
 warn!("connection {origin}: draining request body failed: {err}");
 break;
 }

 let result = ctx.dispatch(&request).await;
 let response = into_wire_response(result);
 if let Err(err) = encoder.send_and_flush(response).await {
 warn!("connection {origin}: writing response failed: {err}");
 break;
 }

 if ctx.stopping.get() {
 info!("connection {origin}: endpoint draining, not accepting another request");
 break;
 }
 }
 Ok(())
}

async fn h2_send_response(response: http::Response<HttpBody>, mut response_handle: SendResponse<Bytes>) {
 let (mut parts, mut body) = response.into_parts();
 parts.headers.remove(http::header::CONNECTION);
 let response = http::Response::from_parts(parts, ());

 match body.stream_hint() {
 StreamHint::None => {
 if let Err(e) = response_handle.send_response(response, true) {
 error!("h2 response send failed: {e:?}");
 }
 }
 StreamHint::Fixed | StreamHint::Stream => {
 let mut send_stream = match response_handle.send_response(response, false) {
 Ok(s) => s,
 Err(e) => {
 error!("h2 response send failed: {e:?}");
 return;
 }
 };
 if let Some(Ok(data)) = body.next_data().await {
 let _ = send_stream.send_data(data, true);
 } else {
 let _ = send_stream.send_data(Bytes::new(), true);
 }
 }
 }
}

/// Runs the HTTP/2 session wrangler for one accepted connection (always
/// cleartext h2c per its three-way `protocol` split — `https` speaks
/// HTTP/1.1 after its TLS handshake, `http2` speaks HTTP/2 without one).
/// Every stream becomes its own request/response future, driven
/// independently through two `FuturesUnordered` queues, registered in the
/// endpoint's live-set separately from the TCP connection itself.
pub async fn h2_serve<S>(stream: S, origin: SocketAddr, ctx: &RequestContext) -> Result<(), AnyError>
where
 S: Split + AsyncReadRent + AsyncWriteRent + Unpin + 'static,
{
 let mut connection = monoio_http::h2::server::Builder::new()
 .initial_window_size(1_000_000)
 .max_concurrent_streams(1000)
 .handshake::<S, Bytes>(stream)
 .await?;
 info!("connection {origin}: h2 handshake complete");

 let (tx, mut rx) = local_sync::mpsc::unbounded::channel();
 monoio::spawn(async move {
 while let Some(result) = connection.accept().await {
 if tx.send(result).is_err() {
 break;
 }
 }
 });

 let mut backend = FuturesUnordered::new();
 let mut frontend = FuturesUnordered::new();
 loop {
 if ctx.stopping.get() && backend.is_empty() && frontend.is_empty() {
 break;
 }
 monoio::select! {
 Some(Ok((request, response_handle))) = rx.recv() => {
 let (parts, mut body) = request.into_parts();
 if ctx.stopping.get() {
 // Draining: refuse new streams with a 503 rather than
 // silently dropping them.
 frontend.push(h2_send_response(
 fixed_response(StatusCode::SERVICE_UNAVAILABLE, Bytes::new()),
 response_handle,
 ));
 continue;
 }
 let request_value = ctx.build_request(&parts, origin);
 backend.push(async move {
 while let Some(Ok(_)) = body.next_data().await {}
 (ctx.dispatch(&request_value).await, response_handle)
 });
 }
 Some((result, response_handle)) = backend.next() => {
 frontend.push(h2_send_response(into_wire_response(result), response_handle));
 }
 Some(_) = frontend.next() => {}
 else => break,
 }
 }
 info!("connection {origin}: h2 session complete");
 Ok(())
}
