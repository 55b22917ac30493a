//! [`HostManager`]: the per-hostname TLS secure-context resolver.
//! Certificate/key material loads lazily, on first use, from paths
//! declared in the component's bound configuration.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::path::{parse_host_spec, PathKey, PathMap};

/// A single bound host entry. `names` may include wildcard specs
/// (`*.example.com`); `chain_path`/`key_path` are read lazily the first
/// time [`HostItem::secure_context`] is called.
pub struct HostItem {
    pub names: Vec<String>,
    chain_path: PathBuf,
    key_path: PathBuf,
    loaded: RefCell<Option<Rc<SecureContext>>>,
}

/// An opaque handle consumed by the TLS engine — here, the parsed
/// certificate chain and private key bytes a `ServerConfig`/`Identity`
/// builder expects. What exactly it contains is a detail of the TLS
/// backend in use (`tollgate-services`'s rustls/native-tls wranglers);
/// `HostManager` only resolves *which* one applies to a given name.
pub struct SecureContext {
    pub chain_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl HostItem {
    pub fn new(names: Vec<String>, chain_path: PathBuf, key_path: PathBuf) -> Self {
        HostItem {
            names,
            chain_path,
            key_path,
            loaded: RefCell::new(None),
        }
    }

    /// Returns the cached context, loading it from disk on first call.
    pub fn secure_context(&self) -> std::io::Result<Rc<SecureContext>> {
        if let Some(ctx) = self.loaded.borrow().as_ref() {
            return Ok(ctx.clone());
        }
        let chain_pem = std::fs::read(&self.chain_path)?;
        let key_pem = std::fs::read(&self.key_path)?;
        let ctx = Rc::new(SecureContext { chain_pem, key_pem });
        *self.loaded.borrow_mut() = Some(ctx.clone());
        Ok(ctx)
    }
}

/// Resolves inbound server names (SNI) to a [`HostItem`]'s secure
/// context, by longest-match over reversed-hostname [`PathKey`]s.
pub struct HostManager {
    hosts: PathMap<Rc<HostItem>>,
}

impl Default for HostManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HostManager {
    pub fn new() -> Self {
        HostManager {
            hosts: PathMap::new(),
        }
    }

    /// Binds `item` under each of its own `names`. Later bindings for a
    /// name spec already bound fail at the `PathMap` layer, surfaced to
    /// the caller (the warehouse's config-diff step) as a construction
    /// error.
    pub fn bind(&mut self, item: HostItem) -> Result<(), crate::error::Error> {
        let item = Rc::new(item);
        for name in &item.names {
            let key = parse_host_spec(name);
            self.hosts.add(&key, item.clone())?;
        }
        Ok(())
    }

    /// Resolves the secure context for a server name. Invalid server
    /// names never fail outright; they simply yield `None` so the TLS
    /// layer can fall back to a default or reject the handshake.
    pub fn find_context(&self, server_name: &str) -> Option<Rc<SecureContext>> {
        let key = parse_host_spec(server_name);
        let found = self.hosts.find(&key)?;
        found.value.secure_context().ok()
    }

    /// Builds a restricted [`HostManager`] covering only the names
    /// matched by `names` (`makeSubset`, used when an endpoint
    /// declares a restricted host list).
    pub fn make_subset(&self, names: &[String]) -> HostManager {
        let mut merged = PathMap::new();
        for name in names {
            let key = parse_host_spec(name);
            let subtree = self.hosts.find_subtree(&key);
            for (k, v) in subtree.iter() {
                let _ = merged.add(&k, v.clone());
            }
        }
        HostManager { hosts: merged }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Deterministic preorder iteration over every bound `(name, item)`
    /// pair, used to build an eager SNI certificate resolver snapshot
    /// from the otherwise lazily-loaded items (`tollgate-services`'s
    /// rustls wrangler).
    pub fn iter(&self) -> impl Iterator<Item = (PathKey, &Rc<HostItem>)> {
        self.hosts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn item(names: &[&str]) -> HostItem {
        HostItem::new(
            names.iter().map(|s| s.to_string()).collect(),
            PathBuf::from("/nonexistent/chain.pem"),
            PathBuf::from("/nonexistent/key.pem"),
        )
    }

    #[test]
    fn finds_exact_before_wildcard() {
        let mut hm = HostManager::new();
        hm.bind(item(&["*.example.com"])).unwrap();
        hm.bind(item(&["api.example.com"])).unwrap();
        // Both items fail to load (no files on disk), but the selection
        // itself (which PathMap entry wins) doesn't depend on that.
        let key = parse_host_spec("api.example.com");
        let found = hm.hosts.find(&key).unwrap();
        assert!(!found.value.names.contains(&"*.example.com".to_string()));
    }

    #[test]
    fn unknown_name_yields_none() {
        let hm = HostManager::new();
        assert!(hm.find_context("nope.example.com").is_none());
    }

    #[test]
    fn make_subset_only_keeps_matching_names() {
        let mut hm = HostManager::new();
        hm.bind(item(&["api.example.com"])).unwrap();
        hm.bind(item(&["other.net"])).unwrap();
        let subset = hm.make_subset(&["*.example.com".to_string()]);
        assert!(!subset.is_empty());
        let key = parse_host_spec("other.net");
        assert!(subset.hosts.find(&key).is_none());
    }
}
