use std::fmt::Display;
use std::sync::Arc;

use monoio::io::{AsyncReadRent, AsyncWriteRent};
use monoio_rustls::{ServerTlsStream, TlsAcceptor};
use rustls::ServerConfig;
use service_async::{
 layer::{layer_fn, FactoryLayer},
 MakeService, Param, Service,
};
use tollgate_core::listener::Accept;
use tollgate_core::AnyError;

use super::resolver::SniCertResolver;

type RustlsAccept<Stream, SocketAddr> = (ServerTlsStream<Stream>, SocketAddr);

pub struct RustlsService<T> {
 acceptor: TlsAcceptor,
 inner: T,
}

impl<T, S, A> Service<Accept<S, A>> for RustlsService<T>
where
 T: Service<RustlsAccept<S, A>>,
 T::Error: Into<AnyError> + Display,
 S: AsyncReadRent + AsyncWriteRent,
{
 type Response = T::Response;
 type Error = AnyError;

 async fn call(&self, (stream, addr): Accept<S, A>) -> Result<Self::Response, Self::Error> {
 let stream = self.acceptor.accept(stream).await?;
 self.inner.call((stream, addr)).await.map_err(Into::into)
 }
}

pub struct RustlsServiceFactory<F> {
 config: Arc<ServerConfig>,
 inner: F,
}

impl<F> RustlsServiceFactory<F> {
 /// `C` supplies the already-bound [`HostManager`](tollgate_core::host::HostManager)
 /// this endpoint's certificates are resolved from by SNI at handshake
 /// time.
 pub fn layer<C>() -> impl FactoryLayer<C, F, Factory = Self>
 where
 C: Param<Arc<SniCertResolver>>,
 {
 layer_fn::<C, _, _, _>(|c, inner| {
 let resolver = c.param();
 let config = ServerConfig::builder()
 .with_safe_defaults()
 .with_no_client_auth()
 .with_cert_resolver(resolver);
 RustlsServiceFactory {
 config: Arc::new(config),
 inner,
 }
 })
 }
}

impl<F> MakeService for RustlsServiceFactory<F>
where
 F: MakeService,
{
 type Service = RustlsService<F::Service>;
 type Error = F::Error;

 fn make_via_ref(&self, old: Option<&Self::Service>) -> Result<Self::Service, Self::Error> {
 let acceptor = TlsAcceptor::from(self.config.clone());
 Ok(RustlsService {
 acceptor,
 inner: self.inner.make_via_ref(old.map(|o| &o.inner))?,
 })
 }
}
