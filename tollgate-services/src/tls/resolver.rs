//! [`SniCertResolver`]: an eager, thread-confined snapshot of a
//! [`HostManager`] turned into parsed `rustls` certificate material.
//!
//! `HostManager`/`HostItem` use `Rc`/`RefCell` for lazy, single-threaded
//! loading, which can't satisfy `rustls::server::ResolvesServerCert`'s
//! `Send + Sync` bound even under a thread-per-core runtime where it's
//! never actually shared across threads. Building this resolver once,
//! eagerly, from already-parsed `Arc`-only certificate material sidesteps
//! that entirely — no `unsafe impl Send` required.

use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use tollgate_core::host::HostManager;
use tollgate_core::Error;
use tollgate_core::path::{parse_host_spec, PathMap};

pub struct SniCertResolver {
 by_name: PathMap<Arc<CertifiedKey>>,
}

impl SniCertResolver {
 /// Walks every bound host in `hosts`, loading and parsing its
 /// certificate chain and private key. Fails if any bound host's
 /// material can't be read or parsed — this runs once, at TLS service
 /// construction/reload time, matching `RustlsServiceFactory`'s
 /// `make_via_ref`.
 pub fn build(hosts: &HostManager) -> Result<Self, Error> {
 let mut by_name = PathMap::new();
 for (key, item) in hosts.iter() {
 let ctx = item
 .secure_context()
 .map_err(|e| Error::ConfigInvalid(format!("{}: {e}", item.names.join(","))))?;
 let certified = parse_certified_key(&ctx.chain_pem, &ctx.key_pem)?;
 by_name.add(&key, Arc::new(certified))?;
 }
 Ok(SniCertResolver { by_name })
 }
}

impl ResolvesServerCert for SniCertResolver {
 fn resolve(&self, client_hello: ClientHello) -> Option<Arc<CertifiedKey>> {
 let name = client_hello.server_name()?;
 let key = parse_host_spec(name);
 self.by_name.find(&key).map(|found| found.value.clone())
 }
}

fn parse_certified_key(chain_pem: &[u8], key_pem: &[u8]) -> Result<CertifiedKey, Error> {
 let certs = rustls_pemfile::certs(&mut &chain_pem[..])
 .map_err(|e| Error::ConfigInvalid(format!("invalid certificate PEM: {e}")))?
 .into_iter()
 .map(rustls::Certificate)
 .collect::<Vec<_>>();
 if certs.is_empty() {
 return Err(Error::ConfigInvalid("certificate chain is empty".into()));
 }
 let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &key_pem[..])
 .map_err(|e| Error::ConfigInvalid(format!("invalid private key PEM: {e}")))?;
 let key = keys
 .pop()
 .ok_or_else(|| Error::ConfigInvalid("no PKCS#8 private key found".into()))?;
 let key = rustls::PrivateKey(key);
 let signing_key = rustls::sign::any_supported_type(&key)
 .map_err(|e| Error::ConfigInvalid(format!("unsupported private key: {e}")))?;
 Ok(CertifiedKey::new(certs, signing_key))
}
