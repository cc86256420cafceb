use super::Router;
use crate::request::PeerAddress;
use crate::{Endpoint, ProteusError, ServerConfig};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

impl Router {
    /// Serves the router on the configured address until the termination
    /// signal (if any) fires.
    ///
    /// The listening socket is opened with the configured backlog; HTTP/2
    /// is accepted next to HTTP/1.1 unless disabled.
    ///
    /// # Errors
    /// Fails if the address is invalid, the socket cannot be bound, the
    /// route table cannot be compiled, or the engine fails.
    ///
    /// # Examples
    /// ```rust,no_run
    /// # use proteus::*;
    /// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
    /// let mut http = proteus::http();
    /// http.get("/", |_| async { Response::text("hello, world!") })?;
    /// http.listen(&ServerConfig::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn listen(mut self, config: &ServerConfig) -> Result<(), ProteusError> {
        let address: SocketAddr = config
            .address
            .parse()
            .map_err(|_| ProteusError::InvalidAddress(config.address.clone()))?;
        self.prepare()?;

        let socket = if address.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(ProteusError::Listen)?;
        socket.set_reuseaddr(true).map_err(ProteusError::Listen)?;
        socket.bind(address).map_err(ProteusError::Listen)?;
        let listener = socket.listen(config.backlog).map_err(ProteusError::Listen)?;
        let incoming = hyper::server::conn::AddrIncoming::from_listener(listener)
            .map_err(ProteusError::HyperServer)?;

        log::info!(
            "listen({}, http2: {}, backlog: {})",
            address,
            config.http2,
            config.backlog
        );

        if log::log_enabled!(log::Level::Trace) {
            for route in self.routes() {
                log::trace!(
                    "route: {} {} ({:?})",
                    route.verb(),
                    route.path,
                    route.pattern.regex()
                );
            }
        }

        let termination = self.terminate.take();
        let termination = async {
            match termination {
                Some(mut rx) => loop {
                    if *rx.borrow() {
                        log::info!("termination requested, draining connections");
                        break;
                    }
                    match rx.changed().await {
                        Ok(_) => continue,
                        Err(_) => futures::future::pending().await,
                    }
                },
                None => futures::future::pending().await,
            }
        };

        let this = Arc::pin(self);

        hyper::server::Server::builder(incoming)
            .http1_only(!config.http2)
            .http1_max_buf_size(config.effective_buffer_size())
            .serve(hyper::service::make_service_fn(
                |v: &hyper::server::conn::AddrStream| {
                    let router = this.clone();
                    let service = RouterService(router, v.remote_addr());
                    async move { Ok::<_, std::convert::Infallible>(service) }
                },
            ))
            .with_graceful_shutdown(termination)
            .await
            .map_err(ProteusError::HyperServer)?;

        Ok(())
    }
}

#[derive(Clone)]
struct RouterService(Pin<Arc<Router>>, std::net::SocketAddr);

type RouterFuture<R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send + 'static>>;

impl tower::Service<hyper::Request<hyper::Body>> for RouterService {
    type Response = hyper::Response<hyper::Body>;
    type Error = anyhow::Error;
    type Future = RouterFuture<Self::Response, Self::Error>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut request: hyper::Request<hyper::Body>) -> Self::Future {
        let this = (self.0).clone();
        request.extensions_mut().insert(PeerAddress(self.1));
        Box::pin(async move { this.as_ref().apply(request.into()).await.map(Into::into) })
    }
}
