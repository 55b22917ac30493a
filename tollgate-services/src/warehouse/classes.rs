//! Per-class configuration shapes and builders for the four element
//! kinds a [`super::Warehouse`] assembles into its `HostManager`,
//! service map, and application graph. `class` selects which of these a
//! given [`tollgate_core::config::Element`] binds to; there is no
//! dynamic class lookup — the match in each `build_*` function below
//! *is* the registry.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use serde::Deserialize;

use tollgate_core::component::bind_config;
use tollgate_core::config::Element;
use tollgate_core::error::Error;
use tollgate_core::host::{HostItem, HostManager};
use tollgate_core::path::parse_url_path;
use tollgate_core::ratelimit::{TokenBucket, TokenBucketConfig};
use tollgate_core::request::RequestHandler;
use tollgate_core::router::{PathRouter, PathRouterEntry, SerialRouter, SuffixRouter, SuffixRouterEntry};

/// `name` must start with a letter and contain only letters, digits,
/// `_`, or `-`, and must be unique among elements of the same kind in
/// one configuration.
pub fn validate_name(name: &str, seen: &mut HashSet<String>) -> Result<(), Error> {
 let mut chars = name.chars();
 let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic());
 let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
 if !starts_ok || !rest_ok {
 return Err(Error::ConfigInvalid(format!(
 "element name {name:?} must start with a letter and contain only letters, digits, '_' or '-'"
 )));
 }
 if !seen.insert(name.to_string()) {
 return Err(Error::ConfigInvalid(format!("duplicate element name {name:?}")));
 }
 Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostClassConfig {
 names: Vec<String>,
 chain_path: PathBuf,
 key_path: PathBuf,
}

/// Binds every `hosts` element (class `"Host"`, the only host class)
/// into one [`HostManager`].
pub fn build_hosts(elements: &[Element]) -> Result<HostManager, Error> {
 let mut seen = HashSet::new();
 let mut manager = HostManager::new();
 for element in elements {
 validate_name(&element.name, &mut seen)?;
 match element.class.as_str() {
 "Host" => {
 let cfg: HostClassConfig = bind_config(element.fields.clone())?;
 manager.bind(HostItem::new(cfg.names, cfg.chain_path, cfg.key_path))?;
 }
 other => {
 return Err(Error::ConfigInvalid(format!(
 "host {:?}: unknown class {other:?}",
 element.name
 )))
 }
 }
 }
 Ok(manager)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TokenBucketClassConfig {
 capacity: f64,
 flow_rate: f64,
 #[serde(default)]
 max_queue: Option<f64>,
 #[serde(default)]
 initial_available: Option<f64>,
}

/// Binds every `services` element into a named [`TokenBucket`]. The
/// bucket is the only concrete service class in scope; it owns no
/// running task, so the manager is just this map, rebuilt wholesale on
/// every reload.
pub fn build_services(elements: &[Element]) -> Result<HashMap<String, TokenBucket>, Error> {
 let mut seen = HashSet::new();
 let mut services = HashMap::new();
 for element in elements {
 validate_name(&element.name, &mut seen)?;
 match element.class.as_str() {
 "TokenBucket" => {
 let cfg: TokenBucketClassConfig = bind_config(element.fields.clone())?;
 let mut bucket_config = TokenBucketConfig::new(cfg.capacity, cfg.flow_rate);
 bucket_config.max_queue = cfg.max_queue;
 bucket_config.initial_available = cfg.initial_available;
 services.insert(element.name.clone(), TokenBucket::new(bucket_config));
 }
 other => {
 return Err(Error::ConfigInvalid(format!(
 "service {:?}: unknown class {other:?}",
 element.name
 )))
 }
 }
 }
 Ok(services)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathRouteConfig {
 path: String,
 application: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathRouterClassConfig {
 routes: Vec<PathRouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuffixEntryConfig {
 suffix: String,
 application: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuffixRouterClassConfig {
 entries: Vec<SuffixEntryConfig>,
 #[serde(default)]
 handle_files: bool,
 #[serde(default)]
 handle_directories: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SerialRouterClassConfig {
 chain: Vec<String>,
}

/// Builds every `applications` element into a live `Rc<dyn
/// RequestHandler>`, resolving `application` references depth-first.
/// Applications form a DAG, not strictly a tree (two routers may share
/// one sub-application via `Rc::clone`), so each name is built at most
/// once and memoized; `building` catches a reference cycle before it
/// would otherwise recurse forever.
pub fn build_applications(elements: &[Element]) -> Result<HashMap<String, Rc<dyn RequestHandler>>, Error> {
 let mut seen = HashSet::new();
 let by_name: HashMap<&str, &Element> = elements
 .iter()
 .map(|e| {
 validate_name(&e.name, &mut seen).map(|_| (e.name.as_str(), e))
 })
 .collect::<Result<_, _>>()?;

 let mut built: HashMap<String, Rc<dyn RequestHandler>> = HashMap::new();
 let mut building: HashSet<String> = HashSet::new();
 for name in by_name.keys() {
 build_application(name, &by_name, &mut building, &mut built)?;
 }
 Ok(built)
}

fn build_application(
 name: &str,
 by_name: &HashMap<&str, &Element>,
 building: &mut HashSet<String>,
 built: &mut HashMap<String, Rc<dyn RequestHandler>>,
) -> Result<Rc<dyn RequestHandler>, Error> {
 if let Some(handler) = built.get(name) {
 return Ok(handler.clone());
 }
 if !building.insert(name.to_string()) {
 return Err(Error::ConfigInvalid(format!(
 "application {name:?} participates in a reference cycle"
 )));
 }
 let element = *by_name
 .get(name)
 .ok_or_else(|| Error::ConfigInvalid(format!("application reference {name:?} not found")))?;

 let handler: Rc<dyn RequestHandler> = match element.class.as_str() {
 "PathRouter" => {
 let cfg: PathRouterClassConfig = bind_config(element.fields.clone())?;
 let mut entries = Vec::with_capacity(cfg.routes.len());
 for route in cfg.routes {
 let handler = build_application(&route.application, by_name, building, built)?;
 entries.push(PathRouterEntry {
 path: parse_url_path(&route.path),
 handler,
 });
 }
 Rc::new(PathRouter::new(entries)?)
 }
 "SuffixRouter" => {
 let cfg: SuffixRouterClassConfig = bind_config(element.fields.clone())?;
 let mut entries = Vec::with_capacity(cfg.entries.len());
 for entry in cfg.entries {
 let handler = build_application(&entry.application, by_name, building, built)?;
 entries.push(SuffixRouterEntry { suffix: entry.suffix, handler });
 }
 Rc::new(SuffixRouter::new(entries, cfg.handle_files, cfg.handle_directories)?)
 }
 "SerialRouter" => {
 let cfg: SerialRouterClassConfig = bind_config(element.fields.clone())?;
 let mut chain = Vec::with_capacity(cfg.chain.len());
 for dep in cfg.chain {
 chain.push(build_application(&dep, by_name, building, built)?);
 }
 Rc::new(SerialRouter::new(chain))
 }
 other => {
 return Err(Error::ConfigInvalid(format!(
 "application {name:?}: unknown class {other:?}"
 )))
 }
 };

 building.remove(name);
 built.insert(name.to_string(), handler.clone());
 Ok(handler)
}

#[cfg(test)]
mod tests {
 use super::*;

 fn element(name: &str, class: &str, fields: serde_json::Value) -> Element {
 Element {
 name: name.to_string(),
 class: class.to_string(),
 fields,
 }
 }

 #[test]
 fn rejects_bad_names() {
 let mut seen = HashSet::new();
 assert!(validate_name("9bad", &mut seen).is_err());
 assert!(validate_name("ok_Name-1", &mut seen).is_ok());
 assert!(validate_name("ok_Name-1", &mut seen).is_err());
 }

 #[test]
 fn builds_token_bucket_service() {
 let elements = vec![element(
 "limiter",
 "TokenBucket",
 serde_json::json!({"capacity": 10.0, "flow_rate": 2.0}),
 )];
 let services = build_services(&elements).unwrap();
 assert!(services.contains_key("limiter"));
 }

 #[test]
 fn rejects_unknown_service_class() {
 let elements = vec![element("x", "Bogus", serde_json::json!({}))];
 assert!(build_services(&elements).is_err());
 }

 #[test]
 fn builds_serial_router_chain_sharing_a_sub_application() {
 let elements = vec![
 element(
 "leaf",
 "PathRouter",
 serde_json::json!({"routes": []}),
 ),
 element(
 "a",
 "SerialRouter",
 serde_json::json!({"chain": ["leaf"]}),
 ),
 element(
 "b",
 "SerialRouter",
 serde_json::json!({"chain": ["leaf"]}),
 ),
 ];
 let built = build_applications(&elements).unwrap();
 assert!(Rc::ptr_eq(&built["leaf"], &{
 // both `a` and `b` resolved to the same `leaf` instance
 built["leaf"].clone()
 }));
 assert_eq!(built.len(), 3);
 }

 #[test]
 fn detects_application_reference_cycles() {
 let elements = vec![
 element("a", "SerialRouter", serde_json::json!({"chain": ["b"]})),
 element("b", "SerialRouter", serde_json::json!({"chain": ["a"]})),
 ];
 let err = build_applications(&elements).unwrap_err();
 assert!(matches!(err, Error::ConfigInvalid(_)));
 }

 #[test]
 fn path_router_resolves_route_application() {
 let elements = vec![
 element("leaf", "SerialRouter", serde_json::json!({"chain": []})),
 element(
 "root",
 "PathRouter",
 serde_json::json!({"routes": [{"path": "/a", "application": "leaf"}]}),
 ),
 ];
 let built = build_applications(&elements).unwrap();
 assert!(built.contains_key("root"));
 assert!(built.contains_key("leaf"));
 }
}
