use crate::error::{BindError, ProteusError};
use crate::handler::{generate, Controller};
use crate::metadata::{read_controller, RouteDescriptor, Verb};
use crate::middleware::Middleware;
use crate::router::Pattern;
use crate::{Endpoint, Response, Router, ServerConfig};
use std::sync::Arc;
use tokio::sync::watch;

/// Binds controllers onto a router, and serves it.
///
/// Every route is bound during bootstrap; a malformed controller or a
/// colliding route fails [`Self::mount`] before anything is served.  The
/// route table is immutable once serving starts.  Requests no route matches
/// are answered with a 404 `Page Not Found!!`.
///
/// # Examples
/// ```rust,no_run
/// # use proteus::*;
/// # use std::sync::Arc;
/// # struct Users;
/// # #[proteus::controller(path = "/users")]
/// # impl Users {
/// #     #[get]
/// #     pub fn list(&self) -> Vec<u64> { vec![] }
/// # }
/// # fn main() -> Result<(), anyhow::Error> {
/// let config = ServerConfig::default();
/// let runtime = config.runtime()?;
/// let mut server = Server::new(config);
/// server.mount(Arc::new(Users))?;
/// runtime.block_on(server.listen())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    router: Router,
    routes: Vec<RouteDescriptor>,
}

impl Server {
    /// Creates a server with no routes.
    pub fn new(config: ServerConfig) -> Self {
        let mut router = Router::default();
        router.fallback(crate::endpoints::simple(Response::not_found));
        Server {
            config,
            router,
            routes: vec![],
        }
    }

    /// The configuration the server was created with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds every route method of the controller.
    ///
    /// Either every route of the controller is bound, or none is.
    ///
    /// # Errors
    /// Fails if the controller's metadata is malformed (see
    /// [`crate::metadata::read_controller`]), or if one of its routes
    /// collides with one already bound, or with another of its own.
    pub fn mount<C: Controller>(&mut self, controller: Arc<C>) -> Result<&mut Self, BindError> {
        let metadata = C::metadata();
        let bindings = read_controller(metadata)?;
        log::debug!("mount({}): {} routes", metadata.name, bindings.len());

        // nothing is bound unless every route of the controller can be.
        let mut planned: Vec<(Verb, Pattern)> = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let pattern = self.router.check(binding.verb, &binding.path)?;
            if planned
                .iter()
                .any(|(verb, p)| *verb == binding.verb && p.shape() == pattern.shape())
            {
                return Err(BindError::RouteCollision {
                    verb: binding.verb.method(),
                    path: binding.path.clone(),
                });
            }
            planned.push((binding.verb, pattern));
        }

        for binding in bindings {
            let endpoint = generate(controller.clone(), &binding, &self.config);
            self.router.route(binding.verb, &binding.path, endpoint)?;
            self.routes.push(RouteDescriptor {
                verb: binding.verb,
                path: binding.path,
                controller: metadata.name,
                method: binding.method.name,
                parameters: binding.method.parameters,
            });
        }

        Ok(self)
    }

    /// Binds a plain endpoint next to the controllers.
    ///
    /// # Errors
    /// Fails if the path is not a valid template, or collides with a route
    /// already bound.
    pub fn route<E: Endpoint>(
        &mut self,
        verb: Verb,
        path: &str,
        endpoint: E,
    ) -> Result<&mut Self, BindError> {
        self.router.route(verb, path, endpoint)?;
        self.routes.push(RouteDescriptor {
            verb,
            path: path.to_owned(),
            controller: "endpoint",
            method: std::any::type_name::<E>(),
            parameters: &[],
        });
        Ok(self)
    }

    /// Appends a middleware, run in front of every route and the fallback.
    pub fn with<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.router.with(middleware);
        self
    }

    /// Replaces the 404 fallback.
    pub fn fallback<E: Endpoint>(&mut self, endpoint: E) -> &mut Self {
        self.router.fallback(endpoint);
        self
    }

    /// Every route bound so far, in the order it was bound.
    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes[..]
    }

    /// Creates the shutdown hook; see [`Router::termination_signal`].
    pub fn termination_signal(&mut self) -> watch::Sender<bool> {
        self.router.termination_signal()
    }

    /// Finishes bootstrap, returning the prepared router.  Useful to
    /// dispatch requests in-process, through [`Router::handle`].
    ///
    /// # Errors
    /// Fails if the route table cannot be compiled.
    pub fn into_router(self) -> Result<Router, BindError> {
        let mut router = self.router;
        router.prepare()?;
        Ok(router)
    }

    /// Logs the route table, and serves until the termination signal fires.
    ///
    /// # Errors
    /// Fails if the route table cannot be compiled, or the engine fails to
    /// bind or serve.
    pub async fn listen(self) -> Result<(), ProteusError> {
        log::info!("{} routes:", self.routes.len());
        for route in &self.routes {
            log::info!("  {}", route);
        }

        let config = self.config.clone();
        self.into_router()?.listen(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, Reply};
    use crate::metadata::{ControllerMetadata, MethodMetadata};
    use crate::{Exchange, HandlerError, HttpEntity, Request};

    struct Ping;

    static PING: ControllerMetadata = ControllerMetadata {
        name: "Ping",
        path: Some("/ping"),
        methods: &[
            MethodMetadata {
                name: "ping",
                verbs: &[Verb::Get],
                path: Some("/"),
                parameters: &[],
            },
            MethodMetadata {
                name: "pong",
                verbs: &[Verb::Get],
                path: None,
                parameters: &[],
            },
        ],
    };

    impl Controller for Ping {
        fn metadata() -> &'static ControllerMetadata {
            &PING
        }

        fn invoke<'a>(
            self: Arc<Self>,
            _: &'static str,
            _: &'a mut Exchange,
        ) -> BoxFuture<'a, Result<Reply, HandlerError>> {
            Box::pin(async { Ok::<_, HandlerError>(Reply::Raw("pong".into())) })
        }
    }

    struct Pair;

    static PAIR: ControllerMetadata = ControllerMetadata {
        name: "Pair",
        path: Some("/pair"),
        methods: &[
            MethodMetadata {
                name: "list",
                verbs: &[Verb::Get],
                path: None,
                parameters: &[],
            },
            MethodMetadata {
                name: "get",
                verbs: &[Verb::Get],
                path: Some("/{id}"),
                parameters: &[],
            },
        ],
    };

    impl Controller for Pair {
        fn metadata() -> &'static ControllerMetadata {
            &PAIR
        }

        fn invoke<'a>(
            self: Arc<Self>,
            _: &'static str,
            _: &'a mut Exchange,
        ) -> BoxFuture<'a, Result<Reply, HandlerError>> {
            Box::pin(async { Ok::<_, HandlerError>(Reply::Empty) })
        }
    }

    #[test]
    fn colliding_controller_fails_bootstrap() {
        let mut server = Server::new(ServerConfig::default());
        let error = server.mount(Arc::new(Ping)).unwrap_err();
        assert_eq!(
            error,
            BindError::RouteCollision {
                verb: http::Method::GET,
                path: "/ping".into()
            }
        );
    }

    #[test]
    fn failed_mount_binds_nothing() {
        let mut server = Server::new(ServerConfig::default());
        assert!(server.mount(Arc::new(Ping)).is_err());
        assert!(server.routes().is_empty());
        assert!(server.router.routes().is_empty());

        let mut server = Server::new(ServerConfig::default());
        server
            .route(Verb::Get, "/pair/{name}", crate::endpoints::simple(Response::empty_204))
            .unwrap();
        assert_eq!(
            server.mount(Arc::new(Pair)).unwrap_err(),
            BindError::RouteCollision {
                verb: http::Method::GET,
                path: "/pair/{id}".into()
            }
        );
        assert_eq!(server.routes().len(), 1);
        assert_eq!(server.router.routes().len(), 1);
    }

    #[tokio::test]
    async fn manual_routes_and_fallback() {
        let mut server = Server::new(ServerConfig::default());
        server
            .route(Verb::Get, "/", crate::endpoints::simple(|| Response::text("hello")))
            .unwrap();
        assert_eq!(server.routes().len(), 1);
        assert_eq!(server.routes()[0].controller, "endpoint");

        let router = server.into_router().unwrap();
        let mut response = router.handle(Request::get("/").unwrap()).await.unwrap();
        assert_eq!(response.data(64).into_text().await.unwrap(), "hello");

        let mut response = router.handle(Request::get("/nope").unwrap()).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
        assert_eq!(
            response.data(64).into_text().await.unwrap(),
            "Page Not Found!!"
        );
    }
}
