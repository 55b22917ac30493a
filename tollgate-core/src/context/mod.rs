//! The per-connection typed context map, threaded through the
//! `service_async` stack from the accept loop down to the protocol
//! wrangler: each network connection has its own logical task, realized
//! as a `certain_map`-typed bundle rather than a grab-bag struct.

use keys::PeerAddr;

pub mod keys;

certain_map::certain_map! {
 #[derive(Debug, Clone)]
 #[default(EmptyContext)]
 pub struct Context {
 peer_addr: PeerAddr,
 }
}

#[cfg(test)]
mod test {
 use std::net::SocketAddr;

 use certain_map::ParamSet;
 use service_async::ParamRef;

 use super::{keys::*, Context};
 use crate::listener::AcceptedAddr;

 #[test]
 pub fn test_add_entries_to_context() {
 let ctx = Context::new();
 let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
 let peer_addr = PeerAddr::from(AcceptedAddr::from(addr));
 let ctx = ctx.param_set(peer_addr);
 match ParamRef::<PeerAddr>::param_ref(&ctx).0 {
 AcceptedAddr::Tcp(socket_addr) => assert_eq!(addr, socket_addr),
 _ => unreachable!(),
 }
 }
}
