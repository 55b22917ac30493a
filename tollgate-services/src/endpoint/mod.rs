//! [`NetworkEndpoint`]: the per-listener component tying protocol
//! detection, TLS termination, connection-rate-limiting, and the
//! application tree together.
//!
//! Three concerns live here that don't belong in the wrangler itself:
//! accepting connections (with an optional connection-rate grant per
//! accept), tracking live connections so `stop` can drain them, and
//! the two-phase drain sequence (ask politely, then force). The
//! protocol loops themselves are in [`wrangler`].

mod wrangler;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use monoio::io::stream::Stream;
use native_tls::Identity;
use serde::Deserialize;
use service_async::{MakeService, Param, Service};
use tracing::{info, warn};

use tollgate_core::component::{BaseComponent, ControlContext};
use tollgate_core::error::Error;
use tollgate_core::host::HostManager;
use tollgate_core::listener::{AcceptedAddr, Listener, ListenerBuilder};
use tollgate_core::ratelimit::TokenBucket;
use tollgate_core::request::RequestHandler;
use tollgate_core::util::Canceller;
use tollgate_core::AnyError;

use crate::tls::{SniCertResolver, TlsConfig, UnifiedTlsFactory, UnifiedTlsService};
use wrangler::{h1_serve, h2_serve, RequestContext};

/// Which wire protocol an endpoint speaks. `Https` always
/// carries HTTP/1.1 after its TLS handshake; `Http2` is always cleartext
/// h2c. A single endpoint never needs both, so there is no fourth
/// "TLS + HTTP/2" combination to model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
 Http,
 Https,
 Http2,
}

/// The raw, `serde`-deserializable shape of an endpoint's configuration
/// element. Reference fields (`*_ref`) are names a [`crate::warehouse`]-
/// style assembler resolves into live objects before binding an
/// [`EndpointConfig`] and calling [`BaseComponent::init`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSpec {
 pub address: String,
 pub port: u16,
 pub protocol: Protocol,
 #[serde(default)]
 pub host_names: Vec<String>,
 #[serde(default)]
 pub rate_limiter_ref: Option<String>,
 #[serde(default)]
 pub access_log_ref: Option<String>,
 pub application_ref: String,
 #[serde(default)]
 pub drain_grace_ms: Option<u64>,
}

impl EndpointSpec {
 pub fn drain_grace(&self) -> Duration {
 Duration::from_millis(self.drain_grace_ms.unwrap_or(250))
 }

 pub fn bind_addr(&self) -> Result<SocketAddr, Error> {
 format!("{}:{}", self.address, self.port)
 .parse()
 .map_err(|e| Error::ConfigInvalid(format!("invalid endpoint address: {e}")))
 }
}

/// The fully resolved configuration a [`NetworkEndpoint`] is bound to,
/// applied after the assembler has turned `EndpointSpec`'s `*_ref` names
/// into live objects. `hosts` is only meaningful for `Protocol::Https` —
/// this endpoint's TLS backend is always the SNI/rustls path fed by
/// [`HostManager`]; `native-tls`'s single-identity backend remains
/// available at [`crate::tls::NativeTlsService`] for a caller that wants
/// it directly, but no endpoint configuration field selects it.
pub struct EndpointConfig {
 pub spec: EndpointSpec,
 pub application: Rc<dyn RequestHandler>,
 pub rate_limiter: Option<TokenBucket>,
 pub hosts: Option<Rc<HostManager>>,
}

struct EndpointTlsParam(TlsConfig<Arc<SniCertResolver>, Identity>);

impl Param<TlsConfig<Arc<SniCertResolver>, Identity>> for EndpointTlsParam {
 fn param(&self) -> TlsConfig<Arc<SniCertResolver>, Identity> {
 self.0.clone()
 }
}

/// A service dispatching an accepted (and, for `https`, already
/// TLS-terminated) stream to the h1 or h2 protocol loop, per the
/// endpoint's static protocol choice — the wrangler a connection gets is
/// a property of the endpoint, not negotiated per connection.
#[derive(Clone)]
struct WranglerService {
 ctx: Rc<RequestContext>,
 use_h2: bool,
}

impl<S> Service<(S, AcceptedAddr)> for WranglerService
where
 S: monoio::io::Split + monoio::io::AsyncReadRent + monoio::io::AsyncWriteRent + Unpin + 'static,
{
 type Response = ();
 type Error = AnyError;

 async fn call(&self, (stream, addr): (S, AcceptedAddr)) -> Result<(), AnyError> {
 let origin = socket_addr(&addr);
 if self.use_h2 {
 h2_serve(stream, origin, &self.ctx).await
 } else {
 h1_serve(stream, origin, &self.ctx).await
 }
 }
}

/// `WranglerService` has no reload-time parameters of its own — it's
/// built once per endpoint bind and cloned cheaply (an `Rc` and a bool)
/// — so it is trivially its own [`MakeService`] factory, the way the
/// innermost stage of a `service_async` layer stack always has to be
/// something implementing `MakeService`.
impl MakeService for WranglerService {
 type Service = Self;
 type Error = AnyError;

 fn make_via_ref(&self, _old: Option<&Self::Service>) -> Result<Self::Service, Self::Error> {
 Ok(self.clone())
 }
}

fn socket_addr(addr: &AcceptedAddr) -> SocketAddr {
 match addr {
 AcceptedAddr::Tcp(a) => *a,
 #[cfg(unix)]
 // Unix-domain peers have no IP/port identity; its `origin`
 // field is inherently TCP-shaped, so this is the documented
 // stand-in for "no remote address" rather than a real peer.
 AcceptedAddr::Unix(_) => ([0, 0, 0, 0], 0).into(),
 }
}

/// Per-connection/session bookkeeping the accept loop needs to drain: a
/// unique id for the live-set, and a [`Canceller`] that forcibly aborts
/// the connection if it's still running once `drainGraceMs` expires.
struct LiveSet {
 next_id: Cell<u64>,
 conns: RefCell<HashMap<u64, Canceller>>,
}

impl LiveSet {
 fn new() -> Self {
 LiveSet {
 next_id: Cell::new(0),
 conns: RefCell::new(HashMap::new()),
 }
 }

 fn insert(&self, canceller: Canceller) -> u64 {
 let id = self.next_id.get();
 self.next_id.set(id + 1);
 self.conns.borrow_mut().insert(id, canceller);
 id
 }

 fn remove(&self, id: u64) {
 self.conns.borrow_mut().remove(&id);
 }

 fn len(&self) -> usize {
 self.conns.borrow().len()
 }

 fn abort_all(&self) {
 for (_, canceller) in self.conns.borrow_mut().drain() {
 canceller.cancel();
 }
 }
}

/// Config-derived state that lives from `_init` through however many
/// `_start`/`_stop` cycles follow without a re-`init` — the base
/// component contract allows a component to restart without a fresh
/// config bind.
struct Bound {
 config: EndpointConfig,
 tls_service: Rc<UnifiedTlsService<WranglerService>>,
 stopping: Rc<Cell<bool>>,
 live: Rc<LiveSet>,
}

pub struct NetworkEndpoint {
 ctx: ControlContext,
 bound: RefCell<Option<Bound>>,
 /// Built fresh every `_start` rather than kept in `Bound`:
 /// [`Canceller::cancel`] is a one-way latch, so reusing one across a
 /// stop/start cycle would make the new accept loop see itself as
 /// already cancelled before it ever polls.
 accept_cancel: RefCell<Option<Canceller>>,
 /// A socket carried over from a predecessor endpoint of identical
 /// `{address, port, protocol}`, consumed by the next `_start` instead
 /// of binding fresh.
 retained: RefCell<Option<Listener>>,
}

impl NetworkEndpoint {
 pub fn new(name: &str) -> Self {
 NetworkEndpoint {
 ctx: ControlContext::root(name, "NetworkEndpoint"),
 bound: RefCell::new(None),
 accept_cancel: RefCell::new(None),
 retained: RefCell::new(None),
 }
 }

 /// Hands this endpoint a listening socket salvaged from its
 /// predecessor during a reload. Must be called before
 /// [`BaseComponent::start`].
 pub fn adopt_listener(&self, listener: Listener) {
 *self.retained.borrow_mut() = Some(listener);
 }

 /// Takes this endpoint's listening socket for hand-off to a successor
 /// endpoint of identical binding, after a `stop(will_reload = true)`.
 /// Returns `None` if the endpoint never started or already gave its
 /// socket away.
 pub fn take_retained(&self) -> Option<Listener> {
 self.retained.borrow_mut().take()
 }

 pub fn live_connection_count(&self) -> usize {
 self.bound
 .borrow()
 .as_ref()
 .map_or(0, |b| b.live.len())
 }

 /// This endpoint's `(address, protocol)` binding, once bound — used by
 /// a warehouse-style assembler to recognize a same-binding successor
 /// eligible for socket hand-off.
 pub fn binding(&self) -> Option<(SocketAddr, Protocol)> {
 let bound = self.bound.borrow();
 let bound = bound.as_ref()?;
 bound.config.spec.bind_addr().ok().map(|addr| (addr, bound.config.spec.protocol))
 }

 /// Stops this endpoint with `will_reload = true` and hands back its
 /// retained listener, for a warehouse-style assembler performing the
 /// socket hand-off. Logs and returns `None` if `stop` itself fails
 /// (e.g. called on a non-running endpoint).
 pub async fn stop_for_reload_and_take_listener(&self) -> Option<Listener> {
 if let Err(e) = self.stop(true).await {
 warn!("{}: stop for reload failed: {e}", self.ctx.name_path_string());
 return None;
 }
 self.take_retained()
 }
}

impl BaseComponent for NetworkEndpoint {
 type Config = EndpointConfig;

 fn control(&self) -> &ControlContext {
 &self.ctx
 }

 async fn _init(&self, config: EndpointConfig) -> Result<(), Error> {
 if config.spec.protocol == Protocol::Https && config.hosts.is_none() {
 return Err(Error::ConfigInvalid(
 "https endpoint requires at least one bound host".into(),
 ));
 }
 let stopping = Rc::new(Cell::new(false));
 let tls_service = Rc::new(build_tls_service(&config, stopping.clone())?);
 *self.bound.borrow_mut() = Some(Bound {
 tls_service,
 stopping,
 live: Rc::new(LiveSet::new()),
 config,
 });
 Ok(())
 }

 async fn _start(&self) -> Result<(), Error> {
 let listener = match self.retained.borrow_mut().take() {
 Some(listener) => listener,
 None => {
 let bind_addr = self
 .bound
 .borrow()
 .as_ref()
 .expect("init runs before start")
 .config
 .spec
 .bind_addr()?;
 let opts = monoio::net::ListenerOpts::default();
 ListenerBuilder::bind_tcp(bind_addr, opts)
 .and_then(|b| b.build())
 .map_err(Error::IoError)?
 }
 };

 let bound_ref = self.bound.borrow();
 let bound = bound_ref.as_ref().expect("init runs before start");
 bound.stopping.set(false);
 let tls_service = bound.tls_service.clone();
 let live = bound.live.clone();
 let rate_limiter = bound.config.rate_limiter.clone();
 let name = self.ctx.name_path_string();
 drop(bound_ref);

 let accept_cancel = Canceller::new();
 *self.accept_cancel.borrow_mut() = Some(accept_cancel.clone());

 monoio::spawn(accept_loop(
 name, listener, tls_service, rate_limiter, live, accept_cancel,
 ));
 Ok(())
 }

 async fn _stop(&self, will_reload: bool) -> Result<(), Error> {
 let (stopping, live, drain_grace) = {
 let bound_ref = self.bound.borrow();
 let bound = bound_ref.as_ref().expect("stop runs only while running");
 (
 bound.stopping.clone(),
 bound.live.clone(),
 bound.config.spec.drain_grace(),
 )
 };
 let accept_cancel = self
 .accept_cancel
 .borrow_mut()
 .take()
 .expect("stop runs only while running");

 // Step 1: stop accepting new connections. Step 2 ("send
 // close-notify/GOAWAY") is realized by flipping `stopping`, which
 // every wrangler checks between units of work instead of the
 // endpoint reaching into frame-level connection control.
 accept_cancel.cancel();
 stopping.set(true);

 // Step 3: wait up to drainGraceMs for the live-set to empty.
 let waited = monoio::time::timeout(drain_grace, wait_for_drain(&live)).await;
 if waited.is_err() {
 info!(
 "{}: drain grace expired with {} live connection(s), aborting",
 self.ctx.name_path_string(),
 live.len()
 );
 // Step 4: forcefully abort what's left.
 live.abort_all();
 }

 if will_reload {
 // Leave the listener in `retained` for a same-binding
 // successor to adopt; nothing else to release here since its
 // accept task has already exited.
 } else {
 *self.retained.borrow_mut() = None;
 }
 Ok(())
 }
}

async fn wait_for_drain(live: &LiveSet) {
 while live.len() > 0 {
 monoio::time::sleep(Duration::from_millis(10)).await;
 }
}

fn build_tls_service(
 config: &EndpointConfig,
 stopping: Rc<Cell<bool>>,
) -> Result<UnifiedTlsService<WranglerService>, Error> {
 let use_h2 = config.spec.protocol == Protocol::Http2;
 let ctx = Rc::new(RequestContext::new(
 config.application.clone(),
 config.spec.port,
 if use_h2 { "http-2" } else { "http-1.1" },
 stopping,
 ));
 let wrangler = WranglerService { ctx, use_h2 };

 let tls_config = match (&config.spec.protocol, &config.hosts) {
 (Protocol::Https, Some(hosts)) => {
 let resolver = SniCertResolver::build(hosts)
 .map_err(|e| Error::ConfigInvalid(format!("TLS material invalid: {e}")))?;
 TlsConfig::Rustls(Arc::new(resolver))
 }
 _ => TlsConfig::None,
 };

 let factory = UnifiedTlsFactory::<WranglerService>::layer().layer(&EndpointTlsParam(tls_config), wrangler);
 factory
 .make_via_ref(None)
 .map_err(|e: AnyError| Error::ConfigInvalid(format!("TLS service construction failed: {e}")))
}

#[allow(clippy::too_many_arguments)]
async fn accept_loop(
 name: String,
 mut listener: Listener,
 tls_service: Rc<UnifiedTlsService<WranglerService>>,
 rate_limiter: Option<TokenBucket>,
 live: Rc<LiveSet>,
 accept_cancel: Canceller,
) {
 loop {
 let stop_waiter = accept_cancel.waiter();
 monoio::select! {
 _ = stop_waiter => break,
 accepted = listener.next() => {
 match accepted {
 Some(Ok((stream, addr))) => {
 if let Some(bucket) = &rate_limiter {
 let grant_waiter = accept_cancel.waiter();
 let granted = monoio::select! {
 _ = grant_waiter => false,
 grant = bucket.request_grant(1.0) => grant.granted,
 };
 if !granted {
 continue;
 }
 }

 let hard_abort = Canceller::new();
 let id = live.insert(hard_abort.clone());
 let tls_service = tls_service.clone();
 let live = live.clone();
 let name = name.clone();
 monoio::spawn(async move {
 let abort_waiter = hard_abort.waiter();
 monoio::select! {
 _ = abort_waiter => {
 info!("{name}: connection {id} forcefully aborted during drain");
 }
 result = tls_service.call((stream, addr)) => {
 if let Err(e) = result {
 warn!("{name}: connection {id} ended with an error: {e}");
 }
 }
 }
 live.remove(id);
 });
 }
 Some(Err(e)) => warn!("{name}: accept failed: {e}"),
 None => break,
 }
 }
 }
 }
}
