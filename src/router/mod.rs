mod pattern;
mod route;
mod service;

pub(crate) use self::pattern::Pattern;
pub(crate) use self::route::Route;
use crate::endpoint::Endpoint;
use crate::error::BindError;
use crate::metadata::Verb;
use crate::middleware::Middleware;
use crate::{Request, Response};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;

/// An HTTP router.
///
/// Maps `(verb, path template)` pairs onto endpoints.  Templates use
/// `/segment/{name}` captures, optionally typed as `{name:type}`:
///
/// - none / `str` / `s` / `string`: anything but `/`;
/// - `int`: an optionally signed integer;
/// - `uint`: an unsigned integer;
/// - `path`: anything, including `/`;
/// - `uuid`: an RFC 4122 UUID;
/// - `oext`: an optional `.extension`.
///
/// When several templates match a path, literal segments win over
/// captures, whatever the registration order.
///
/// Routes are registered during bootstrap, then [`Self::prepare`]d; the
/// table is never modified while serving.  A request no route matches goes
/// to the fallback endpoint, which answers 404 unless replaced.
///
/// # Examples
/// ```rust
/// # use proteus::*;
/// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
/// let mut http = proteus::http();
/// http.get("/users/{id:uint}", |request: Request| async move {
///     Response::text(format!("user {}", request.fragment_str("id").unwrap_or("?")))
/// })?;
/// assert!(http.get("/users/{user:uint}", endpoints::simple(Response::empty_204)).is_err());
/// http.prepare()?;
///
/// let mut response = http.handle(Request::get("/users/42")?).await?;
/// assert_eq!(response.data(64).into_text().await?, "user 42");
/// let response = http.handle(Request::get("/users/ada")?).await?;
/// assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
/// # Ok(())
/// # }
/// ```
pub struct Router {
    regex: regex::RegexSet,
    routes: Vec<Arc<Route>>,
    middleware: Vec<Pin<Box<dyn Middleware>>>,
    fallback: Option<Pin<Box<dyn Endpoint>>>,
    terminate: Option<watch::Receiver<bool>>,
}

impl Default for Router {
    fn default() -> Self {
        Router {
            regex: regex::RegexSet::empty(),
            middleware: vec![],
            routes: vec![],
            fallback: None,
            terminate: None,
        }
    }
}

macro_rules! method {
    ($($(#[$m:meta])* $v:vis fn $n:ident = $verb:expr;)+) => {
        $(
            $(#[$m])* $v fn $n<E: Endpoint>(&mut self, path: &str, endpoint: E) -> Result<&mut Self, BindError> {
                self.route($verb, path, endpoint)
            }
        )+
    };
}

impl Router {
    /// Compiles the route table into the matcher used by [`Self::handle`].
    /// Must be called after the last route is registered.
    ///
    /// # Errors
    /// Fails if the combined matcher grows past the regex size limits.
    pub fn prepare(&mut self) -> Result<(), BindError> {
        let patterns = self
            .routes
            .iter()
            .map(|route| route.pattern.regex().as_str());
        self.regex = regex::RegexSet::new(patterns).map_err(|e| BindError::InvalidPath {
            path: "(route table)".to_owned(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// The registered routes, in registration order.
    pub(crate) fn routes(&self) -> &[Arc<Route>] {
        &self.routes[..]
    }

    /// Registers an endpoint for the given verb and path template.
    ///
    /// # Errors
    /// Fails with [`BindError::RouteCollision`] if a route with the same verb
    /// and template shape is already registered, and with
    /// [`BindError::InvalidPath`] if the template does not compile.
    pub fn route<E: Endpoint>(
        &mut self,
        verb: Verb,
        path: &str,
        endpoint: E,
    ) -> Result<&mut Self, BindError> {
        let pattern = self.check(verb, path)?;

        log::trace!("route: {} {} ({})", verb, path, pattern.regex());
        self.routes.push(Arc::new(Route::new(
            verb,
            path.to_owned(),
            pattern,
            Box::pin(endpoint),
        )));
        Ok(self)
    }

    /// Compiles the template, and checks it against the registered routes,
    /// without registering anything.
    pub(crate) fn check(&self, verb: Verb, path: &str) -> Result<Pattern, BindError> {
        let pattern = Pattern::new(path)?;

        if let Some(existing) = self.routes.iter().find(|r| r.collides(verb, &pattern)) {
            log::debug!("{} {} collides with {}", verb, path, existing.path);
            return Err(BindError::RouteCollision {
                verb: verb.method(),
                path: path.to_owned(),
            });
        }

        Ok(pattern)
    }

    method![
        /// Registers a GET endpoint; see [`Self::route`].
        pub fn get = Verb::Get;
        /// Registers a POST endpoint; see [`Self::route`].
        pub fn post = Verb::Post;
        /// Registers a PUT endpoint; see [`Self::route`].
        pub fn put = Verb::Put;
        /// Registers a DELETE endpoint; see [`Self::route`].
        pub fn delete = Verb::Delete;
        /// Registers an OPTIONS endpoint; see [`Self::route`].
        pub fn options = Verb::Options;
        /// Registers a HEAD endpoint; see [`Self::route`].
        pub fn head = Verb::Head;
        /// Registers a PATCH endpoint; see [`Self::route`].
        pub fn patch = Verb::Patch;
    ];

    /// Appends a middleware, run in front of every endpoint (including the
    /// fallback).
    pub fn with<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.middleware.push(Box::pin(middleware));
        self
    }

    /// Replaces the endpoint for requests no route matches.
    pub fn fallback<E: Endpoint>(&mut self, endpoint: E) -> &mut Self {
        self.fallback = Some(Box::pin(endpoint));
        self
    }

    /// Creates a termination signal for [`Self::listen`].  Sending `true`
    /// stops accepting connections, and lets in-flight requests finish.
    pub fn termination_signal(&mut self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        self.terminate = Some(rx);
        tx
    }

    /// Dispatches a request in-process, without a listener.
    ///
    /// # Errors
    /// Fails if the endpoint failed without a response, e.g. because the
    /// exchange was aborted.
    pub async fn handle(&self, request: Request) -> Result<Response, anyhow::Error> {
        Pin::new(self).apply(request).await
    }

    /// The route for the given path and method.  If several match, the most
    /// specific one wins (see [`Pattern::specificity`]); among equally
    /// specific routes, the one registered last.
    pub(crate) fn lookup(&self, path: &str, method: &http::Method) -> Option<Arc<Route>> {
        self.regex
            .matches(path)
            .into_iter()
            .map(|i| (i, &self.routes[i]))
            .filter(|(_, r)| r.matches(method))
            .min_by(|(i, a), (j, b)| {
                a.pattern
                    .specificity()
                    .cmp(b.pattern.specificity())
                    .then(j.cmp(i))
            })
            .map(|(_, r)| r.clone())
    }

    fn fallback_endpoint(&self) -> Option<Pin<&dyn Endpoint>> {
        self.fallback.as_ref().map(Pin::as_ref)
    }
}

#[async_trait]
impl crate::Endpoint for Router {
    async fn apply(self: Pin<&Self>, mut request: Request) -> Result<Response, anyhow::Error> {
        let route = self.lookup(request.uri().path(), request.method());
        if let Some(route) = &route {
            if let Some(fragment) =
                crate::request::fragment::Fragment::new(request.uri().path(), route)
            {
                request.extensions_mut().insert(fragment);
            }
        }

        let endpoint = {
            let route_endpoint = || route.as_ref().map(|e| e.endpoint().as_ref());
            let fallback_endpoint = || self.fallback_endpoint();
            route_endpoint()
                .or_else(fallback_endpoint)
                .unwrap_or_else(default_endpoint)
        };
        log::trace!("{} {} --> {:?}", request.method(), request.uri(), endpoint);
        let next = crate::middleware::Next::new(&self.middleware[..], endpoint);
        next.apply(request).await
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("regex", &self.regex)
            .field("routes", &self.routes)
            .finish()
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_ENDPOINT: crate::endpoints::SyncEndpoint<fn(Request) -> Response> = crate::endpoints::SyncEndpoint(|_| Response::not_found());
    static ref DEFAULT_ENDPOINT_PIN: Pin<&'static (dyn Endpoint + Unpin + 'static)> = Pin::new(&*DEFAULT_ENDPOINT);
}

// 'r can be anything _up to and including_ 'static, and this makes it play
// nice with unwrap_or_else.
pub(crate) fn default_endpoint<'r>() -> Pin<&'r dyn Endpoint> {
    *DEFAULT_ENDPOINT_PIN
}
