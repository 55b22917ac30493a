//! [`Warehouse`]: the top system. Owns the four managers —
//! hosts, services, applications, endpoints — and drives the ordered
//! start/stop sequence and the reload protocol across them.
//!
//! Only the endpoint manager has genuine lifecycle: a [`NetworkEndpoint`]
//! owns a bound socket and an accept-loop task, so it alone goes through
//! [`BaseComponent`]'s `init`/`start`/`stop`. Hosts, services
//! ([`TokenBucket`]), and applications (the three router classes) are
//! immutable-after-construction value objects with nothing to release —
//! so their managers are just maps, rebuilt wholesale each reload.
//! In-flight requests keep the old objects alive through their own `Rc`
//! clones; nothing explicit drains them.

mod classes;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::{info, warn};

use tollgate_core::component::BaseComponent;
use tollgate_core::config::Config as RawConfig;
use tollgate_core::error::Error;
use tollgate_core::host::HostManager;
use tollgate_core::ratelimit::TokenBucket;
use tollgate_core::request::RequestHandler;

use crate::endpoint::{EndpointConfig, NetworkEndpoint};

/// How long [`Warehouse::stop`]/[`Warehouse::reload`] waits, after every
/// endpoint has finished its own drain, before logging that an
/// application is still referenced by a lingering request. No
/// core-scope application holds a resource that actually needs
/// releasing, so this is a diagnostic upper bound, not a hard cutoff —
/// unlike an endpoint's `drainGraceMs`, nothing is force-aborted when it
/// expires.
const APPLICATION_DRAIN_GRACE: Duration = Duration::from_millis(250);

struct Built {
 hosts: Rc<HostManager>,
 services: HashMap<String, TokenBucket>,
 applications: HashMap<String, Rc<dyn RequestHandler>>,
 endpoints: HashMap<String, Rc<NetworkEndpoint>>,
}

/// Per-process (per-worker-thread, in the multi-threaded runtime) owner
/// of one running configuration. A fresh `Warehouse` holds nothing until
/// [`Warehouse::start`] is called.
pub struct Warehouse {
 state: RefCell<Option<Built>>,
}

impl Default for Warehouse {
 fn default() -> Self {
 Self::new()
 }
}

impl Warehouse {
 pub fn new() -> Self {
 Warehouse { state: RefCell::new(None) }
 }

 pub fn is_running(&self) -> bool {
 self.state.borrow().is_some()
 }

 /// Validates `raw` fully and, if valid, starts every element from
 /// nothing: services → applications → endpoints. Hosts have no start
 /// step of their own, they're data the other three consult.
 pub async fn start(&self, raw: RawConfig) -> Result<(), Error> {
 if self.state.borrow().is_some() {
 return Err(Error::IllegalState("warehouse already started".into()));
 }
 let built = assemble(&raw).await?;
 *self.state.borrow_mut() = Some(built);
 Ok(())
 }

 /// Stops every endpoint (racing each endpoint's own `drainGraceMs`),
 /// then waits [`APPLICATION_DRAIN_GRACE`] for applications, then
 /// drops services last and unconditionally.
 pub async fn stop(&self) -> Result<(), Error> {
 let Some(built) = self.state.borrow_mut().take() else {
 return Err(Error::IllegalState("warehouse not running".into()));
 };
 stop_endpoints(built.endpoints.values(), false).await;
 wait_and_warn_if_referenced(&built.applications, APPLICATION_DRAIN_GRACE).await;
 drop(built.services);
 drop(built.hosts);
 Ok(())
 }

 /// Runs the five-step reload protocol: parse/validate, diff by
 /// `(class, name)`, stop what's removed or rebound, start what's new,
 /// swap. Step 1 is the only point a reload can fail outright; past it,
 /// problems are logged and the reload proceeds best-effort.
 pub async fn reload(&self, raw: RawConfig) -> Result<(), Error> {
 let previous = self
 .state
 .borrow()
 .as_ref()
 .map(|b| b.endpoints.clone())
 .ok_or_else(|| Error::IllegalState("warehouse not running".into()))?;

 // Step 1: parse/validate by fully assembling the replacement,
 // without touching anything live yet. A failure here leaves the
 // running system completely untouched.
 let (built, handed_off) = assemble_for_reload(&raw, &previous).await?;

 // Steps 2-4 already happened inside `assemble_for_reload`:
 // unchanged `(address, port, protocol)` endpoints stopped their
 // predecessor and adopted its socket (recorded in `handed_off`),
 // new endpoints were freshly bound, and every endpoint's
 // `init`+`start` ran against the new application/service/host
 // graph.
 let previous = self.state.borrow_mut().take().expect("checked above");

 // Step 3 (continued): stop every predecessor endpoint not
 // already retired by the hand-off above — either its binding
 // changed, or it simply isn't present in the new config.
 stop_endpoints(
 previous
 .endpoints
 .iter()
 .filter(|(name, _)| !handed_off.contains(*name))
 .map(|(_, ep)| ep),
 true,
 )
 .await;
 wait_and_warn_if_referenced(&previous.applications, APPLICATION_DRAIN_GRACE).await;
 drop(previous.services);
 drop(previous.hosts);

 // Step 5: new connections see the new graph from this point;
 // requests already in flight against `previous.applications`
 // keep running against the `Rc` clone they captured at dispatch
 // time, independent of this swap.
 *self.state.borrow_mut() = Some(built);
 Ok(())
 }
}

async fn stop_endpoints<'a>(endpoints: impl Iterator<Item = &'a Rc<NetworkEndpoint>>, will_reload: bool) {
 for endpoint in endpoints {
 if let Err(e) = endpoint.stop(will_reload).await {
 warn!("endpoint stop failed: {e}");
 }
 }
}

/// Applications have no explicit stop; this only reports whether one is
/// still referenced (by an in-flight request's `Rc` clone) once the
/// grace window has passed. Nothing here force-releases them.
async fn wait_and_warn_if_referenced(applications: &HashMap<String, Rc<dyn RequestHandler>>, grace: Duration) {
 monoio::time::sleep(grace).await;
 for (name, handler) in applications {
 if Rc::strong_count(handler) > 1 {
 info!("application {name:?} still referenced after its drain grace window");
 }
 }
}

/// Builds every element of `raw` into a fresh [`Built`] snapshot,
/// validating as it goes (step 1). Used for the very first
/// [`Warehouse::start`], where there is no predecessor to hand a socket
/// off from.
async fn assemble(raw: &RawConfig) -> Result<Built, Error> {
 assemble_inner(raw, None).await.map(|(built, _)| built)
}

/// Same as [`assemble`], but against a running predecessor: an endpoint
/// whose `(address, port, protocol)` is unchanged from a same-named
/// predecessor stops that predecessor and adopts its socket instead of
/// binding fresh. Returns the set of predecessor names retired this way,
/// so the caller knows not to stop them again.
async fn assemble_for_reload(
 raw: &RawConfig,
 previous: &HashMap<String, Rc<NetworkEndpoint>>,
) -> Result<(Built, std::collections::HashSet<String>), Error> {
 assemble_inner(raw, Some(previous)).await
}

async fn assemble_inner(
 raw: &RawConfig,
 previous: Option<&HashMap<String, Rc<NetworkEndpoint>>>,
) -> Result<(Built, std::collections::HashSet<String>), Error> {
 let hosts = Rc::new(classes::build_hosts(&raw.hosts)?);
 let services = classes::build_services(&raw.services)?;
 let applications = classes::build_applications(&raw.applications)?;

 let mut seen_names = std::collections::HashSet::new();
 let mut handed_off = std::collections::HashSet::new();
 let mut endpoints = HashMap::with_capacity(raw.endpoints.len());
 for element in &raw.endpoints {
 classes::validate_name(&element.name, &mut seen_names)?;
 if element.class != "NetworkEndpoint" {
 return Err(Error::ConfigInvalid(format!(
 "endpoint {:?}: unknown class {:?}",
 element.name, element.class
 )));
 }
 let spec: crate::endpoint::EndpointSpec = tollgate_core::component::bind_config(element.fields.clone())?;
 let config = bind_endpoint(spec, &hosts, &services, &applications)?;
 let bind_addr = config.spec.bind_addr()?;
 let protocol = config.spec.protocol;

 let endpoint = Rc::new(NetworkEndpoint::new(&element.name));
 if let Some(previous) = previous {
 if let Some(predecessor) = previous.get(&element.name) {
 if predecessor.binding() == Some((bind_addr, protocol)) {
 if let Some(listener) = predecessor.stop_for_reload_and_take_listener().await {
 endpoint.adopt_listener(listener);
 }
 handed_off.insert(element.name.clone());
 }
 }
 }

 endpoint.init(config).await?;
 endpoint.start(None).await?;
 endpoints.insert(element.name.clone(), endpoint);
 }

 Ok((Built { hosts, services, applications, endpoints }, handed_off))
}

/// Validates `raw` the way [`Warehouse::start`] would, short of
/// actually binding a socket or loading TLS material: builds hosts,
/// services, and applications, and resolves every endpoint's `*_ref`
/// fields against them. This is the same check a pending reload runs
/// before ever reaching a worker thread.
pub fn validate(raw: &RawConfig) -> Result<(), Error> {
 let hosts = Rc::new(classes::build_hosts(&raw.hosts)?);
 let services = classes::build_services(&raw.services)?;
 let applications = classes::build_applications(&raw.applications)?;

 let mut seen_names = std::collections::HashSet::new();
 for element in &raw.endpoints {
 classes::validate_name(&element.name, &mut seen_names)?;
 if element.class != "NetworkEndpoint" {
 return Err(Error::ConfigInvalid(format!(
 "endpoint {:?}: unknown class {:?}",
 element.name, element.class
 )));
 }
 let spec: crate::endpoint::EndpointSpec = tollgate_core::component::bind_config(element.fields.clone())?;
 bind_endpoint(spec, &hosts, &services, &applications)?;
 }
 Ok(())
}

fn bind_endpoint(
 spec: crate::endpoint::EndpointSpec,
 hosts: &Rc<HostManager>,
 services: &HashMap<String, TokenBucket>,
 applications: &HashMap<String, Rc<dyn RequestHandler>>,
) -> Result<EndpointConfig, Error> {
 let application = applications
 .get(&spec.application_ref)
 .cloned()
 .ok_or_else(|| Error::NotFound(format!("application {:?}", spec.application_ref)))?;

 let rate_limiter = match &spec.rate_limiter_ref {
 Some(name) => Some(
 services
 .get(name)
 .cloned()
 .ok_or_else(|| Error::NotFound(format!("service {name:?}")))?,
 ),
 None => None,
 };

 let bound_hosts = match spec.protocol {
 crate::endpoint::Protocol::Https => Some(if spec.host_names.is_empty() {
 hosts.clone()
 } else {
 Rc::new(hosts.make_subset(&spec.host_names))
 }),
 _ => None,
 };

 Ok(EndpointConfig { spec, application, rate_limiter, hosts: bound_hosts })
}

#[cfg(test)]
mod tests {
 use super::*;
 use tollgate_core::config::Element;

 fn element(name: &str, class: &str, fields: serde_json::Value) -> Element {
 Element { name: name.to_string(), class: class.to_string(), fields }
 }

 fn config_with_endpoint(port: u16) -> RawConfig {
 RawConfig {
 runtime: Default::default(),
 hosts: vec![],
 services: vec![],
 applications: vec![element("root", "SerialRouter", serde_json::json!({"chain": []}))],
 endpoints: vec![element(
 "main",
 "NetworkEndpoint",
 serde_json::json!({
 "address": "127.0.0.1",
 "port": port,
 "protocol": "http",
 "application_ref": "root",
 }),
 )],
 }
 }

 #[test]
 fn validate_accepts_a_well_formed_config_without_binding_anything() {
 validate(&config_with_endpoint(0)).unwrap();
 }

 #[test]
 fn validate_rejects_a_dangling_application_ref() {
 let mut config = config_with_endpoint(0);
 config.endpoints[0].fields["application_ref"] = serde_json::json!("missing");
 let err = validate(&config).unwrap_err();
 assert!(matches!(err, Error::NotFound(_)));
 }

 #[monoio::test]
 async fn start_then_stop_lifecycle() {
 let warehouse = Warehouse::new();
 assert!(!warehouse.is_running());
 warehouse.start(config_with_endpoint(0)).await.unwrap();
 assert!(warehouse.is_running());
 warehouse.stop().await.unwrap();
 assert!(!warehouse.is_running());
 }

 #[monoio::test]
 async fn start_twice_is_illegal_state() {
 let warehouse = Warehouse::new();
 warehouse.start(config_with_endpoint(0)).await.unwrap();
 let err = warehouse.start(config_with_endpoint(0)).await.unwrap_err();
 assert!(matches!(err, Error::IllegalState(_)));
 warehouse.stop().await.unwrap();
 }

 #[monoio::test]
 async fn stop_or_reload_before_start_is_illegal_state() {
 let warehouse = Warehouse::new();
 assert!(matches!(warehouse.stop().await.unwrap_err(), Error::IllegalState(_)));
 assert!(matches!(
 warehouse.reload(config_with_endpoint(0)).await.unwrap_err(),
 Error::IllegalState(_)
 ));
 }

 #[monoio::test]
 async fn reload_rejects_unknown_application_class_and_leaves_system_running() {
 let warehouse = Warehouse::new();
 warehouse.start(config_with_endpoint(0)).await.unwrap();

 let mut bad = config_with_endpoint(0);
 bad.applications = vec![element("root", "Bogus", serde_json::json!({}))];
 let err = warehouse.reload(bad).await.unwrap_err();
 assert!(matches!(err, Error::ConfigInvalid(_)));
 // step 1 failed: the running system is untouched.
 assert!(warehouse.is_running());

 warehouse.stop().await.unwrap();
 }

 #[monoio::test]
 async fn reload_swapping_only_the_application_keeps_the_endpoint_bound() {
 let warehouse = Warehouse::new();
 warehouse.start(config_with_endpoint(0)).await.unwrap();
 let bind_addr_before = {
 let state = warehouse.state.borrow();
 state.as_ref().unwrap().endpoints["main"].binding()
 };

 let mut next = config_with_endpoint(0);
 next.applications = vec![
 element("leaf", "SerialRouter", serde_json::json!({"chain": []})),
 element("root", "SerialRouter", serde_json::json!({"chain": ["leaf"]})),
 ];
 warehouse.reload(next).await.unwrap();

 let bind_addr_after = {
 let state = warehouse.state.borrow();
 state.as_ref().unwrap().endpoints["main"].binding()
 };
 // names, addresses, and protocols are unchanged across the reload,
 // so the new endpoint's socket was handed off, not rebound.
 assert_eq!(bind_addr_before.map(|(_, p)| p), bind_addr_after.map(|(_, p)| p));

 warehouse.stop().await.unwrap();
 }
}
