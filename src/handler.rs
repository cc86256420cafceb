//! Request handlers generated for controller methods.
//!
//! The `#[controller]` macro implements [`Controller`] for an `impl` block:
//! its [`Controller::invoke`] runs the extractors for one method's
//! parameters, in declaration order, calls the method, and classifies what
//! it returned as a [`Reply`].  [`generate`] wraps that into an endpoint the
//! router can dispatch to.

use crate::endpoints::ScopeEndpoint;
use crate::error::HandlerError;
use crate::metadata::{Binding, ControllerMetadata, MethodMetadata};
use crate::middleware::BodyReader;
use crate::{Endpoint, Exchange, Request, Response, ServerConfig};
use bytes::Bytes;
use std::pin::Pin;
use std::sync::Arc;

pub use futures::future::BoxFuture;

/// A set of route methods, bound to the router by [`crate::Server::mount`].
///
/// Implemented by the `#[controller]` attribute macro; implementing it by
/// hand is possible, but the metadata and the dispatch in
/// [`Self::invoke`] have to agree.
pub trait Controller: Send + Sync + 'static {
    /// What the controller's `impl` block declared.
    fn metadata() -> &'static ControllerMetadata
    where
        Self: Sized;

    /// Extracts the parameters of the named method from the exchange, calls
    /// it, and classifies its return value.
    fn invoke<'a>(
        self: Arc<Self>,
        method: &'static str,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Reply, HandlerError>>;
}

/// What a controller method returned, ready to be written.
#[derive(Debug)]
pub enum Reply {
    /// Nothing; answered with an empty 200.
    Empty,
    /// Raw bytes, written verbatim without a content type.
    Raw(Bytes),
    /// An encoded JSON document.
    Json(Bytes),
    /// A complete response.
    Response(Response),
}

impl Reply {
    /// Encodes a structured value as JSON.
    ///
    /// # Errors
    /// Fails with [`HandlerError::Internal`] if the value cannot be encoded.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Reply, HandlerError> {
        serde_json::to_vec(value)
            .map(|bytes| Reply::Json(bytes.into()))
            .map_err(|e| HandlerError::Internal(e.into()))
    }

    /// Turns the reply into the response written to the client.
    pub fn into_response(self) -> Response {
        match self {
            Reply::Empty => Response::empty_200(),
            Reply::Raw(bytes) => Response::bytes(bytes),
            Reply::Json(bytes) => Response::json_bytes(bytes),
            Reply::Response(response) => response,
        }
    }
}

/// The error for a method name the controller does not dispatch.  Only
/// reachable if the metadata and the dispatch disagree.
#[doc(hidden)]
pub fn unknown_method(controller: &'static str, method: &str) -> HandlerError {
    HandlerError::Internal(anyhow::anyhow!(
        "controller `{}` has no route method `{}`",
        controller,
        method
    ))
}

/// The endpoint for one controller method.
///
/// Builds the [`Exchange`], invokes the method, and maps the outcome:
///
/// - a response written to the exchange's sink wins over the return value;
/// - [`HandlerError::BadInput`] is a 400 with the message as its body;
/// - [`HandlerError::Internal`] is a 500 with a fixed body, and is logged
///   with its full chain;
/// - [`HandlerError::Aborted`] writes nothing, and fails the exchange.
pub struct RouteHandler<C> {
    controller: Arc<C>,
    method: &'static MethodMetadata,
    strict_optional_bodies: bool,
}

impl<C: Controller> RouteHandler<C> {
    /// Creates the handler for the given method of the controller.
    pub fn new(controller: Arc<C>, method: &'static MethodMetadata) -> Self {
        RouteHandler {
            controller,
            method,
            strict_optional_bodies: false,
        }
    }

    /// Whether optional bodies that fail to decode are a 400.
    #[must_use]
    pub fn with_strict_optional_bodies(mut self, strict: bool) -> Self {
        self.strict_optional_bodies = strict;
        self
    }

    fn name(&self) -> (&'static str, &'static str) {
        (C::metadata().name, self.method.name)
    }
}

#[async_trait]
impl<C: Controller> Endpoint for RouteHandler<C> {
    async fn apply(self: Pin<&Self>, request: Request) -> Result<Response, anyhow::Error> {
        let (controller, method) = self.name();
        let mut exchange = Exchange::from_request(request)
            .with_strict_optional_bodies(self.strict_optional_bodies);

        let result = self
            .controller
            .clone()
            .invoke(self.method.name, &mut exchange)
            .await;

        match result {
            Ok(reply) => Ok(exchange
                .take_response()
                .unwrap_or_else(|| reply.into_response())),
            Err(HandlerError::BadInput(e)) => {
                log::debug!("{}::{}: bad input: {}", controller, method, e);
                Ok(Response::bad_request(e.message()))
            }
            Err(HandlerError::Aborted) => {
                log::debug!("{}::{}: exchange closed by peer", controller, method);
                Err(HandlerError::Aborted.into())
            }
            Err(HandlerError::Internal(e)) => {
                log::error!("{}::{}: {:?}", controller, method, e);
                Ok(Response::internal_error())
            }
        }
    }

    fn describe(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (controller, method) = self.name();
        write!(f, "{}::{}", controller, method)
    }
}

impl<C: Controller> std::fmt::Debug for RouteHandler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandler")
            .field("controller", &C::metadata().name)
            .field("method", &self.method.name)
            .field("strict_optional_bodies", &self.strict_optional_bodies)
            .finish()
    }
}

/// Produces the endpoint for one bound controller method.
///
/// Routes that read the body (a body verb, or a body or file parameter) are
/// scoped behind a [`BodyReader`] bounded by
/// [`ServerConfig::max_request_size`]; the rest run the handler directly.
pub fn generate<C: Controller>(
    controller: Arc<C>,
    binding: &Binding,
    config: &ServerConfig,
) -> ScopeEndpoint {
    let handler = RouteHandler::new(controller, binding.method)
        .with_strict_optional_bodies(config.strict_optional_bodies);
    let mut scope = crate::endpoints::scope();

    if binding.method.reads_body(binding.verb) {
        log::trace!(
            "{}::{}: reading body first",
            C::metadata().name,
            binding.method.name
        );
        scope.with(BodyReader::new(config.max_request_size));
    }

    scope.then(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BadInput;
    use crate::metadata::{ParameterSpec, SourceKind, TypeDescriptor, Verb};
    use crate::{extract, HttpEntity};

    struct Echo;

    static ECHO: ControllerMetadata = ControllerMetadata {
        name: "Echo",
        path: Some("/echo"),
        methods: &[
            MethodMetadata {
                name: "count",
                verbs: &[Verb::Get],
                path: None,
                parameters: &[ParameterSpec {
                    name: "n",
                    source: SourceKind::Query,
                    target: TypeDescriptor::Int32,
                    required: true,
                    default: None,
                }],
            },
            MethodMetadata {
                name: "upload",
                verbs: &[Verb::Post],
                path: None,
                parameters: &[],
            },
        ],
    };

    impl Controller for Echo {
        fn metadata() -> &'static ControllerMetadata {
            &ECHO
        }

        fn invoke<'a>(
            self: Arc<Self>,
            method: &'static str,
            exchange: &'a mut Exchange,
        ) -> BoxFuture<'a, Result<Reply, HandlerError>> {
            Box::pin(async move {
                match method {
                    "count" => {
                        let n = extract::query::integer(exchange, "n")?;
                        match n {
                            0 => Ok(Reply::Empty),
                            1 => Err(HandlerError::Internal(anyhow::anyhow!("secret"))),
                            2 => Err(HandlerError::Aborted),
                            3 => {
                                exchange.respond(Response::empty_204())?;
                                Ok(Reply::Json(Bytes::from_static(b"{}")))
                            }
                            _ => Reply::json(&serde_json::json!({ "n": n })),
                        }
                    }
                    "upload" => Ok(Reply::Raw(extract::body::bytes(exchange)?)),
                    other => Err(unknown_method("Echo", other)),
                }
            })
        }
    }

    fn handler(method: usize) -> RouteHandler<Echo> {
        RouteHandler::new(Arc::new(Echo), &ECHO.methods[method])
    }

    async fn call(method: usize, request: Request) -> Result<Response, anyhow::Error> {
        let handler = handler(method);
        Pin::new(&handler).apply(request).await
    }

    #[tokio::test]
    async fn maps_outcomes() {
        let mut response = call(0, Request::get("/echo?n=abc").unwrap()).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
        assert!(response.data(128).into_text().await.unwrap().contains("`n`"));

        let response = call(0, Request::get("/echo?n=0").unwrap()).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);

        let mut response = call(0, Request::get("/echo?n=1").unwrap()).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.data(128).into_text().await.unwrap();
        assert!(!body.contains("secret"));

        assert!(call(0, Request::get("/echo?n=2").unwrap()).await.is_err());

        let response = call(0, Request::get("/echo?n=3").unwrap()).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::NO_CONTENT);

        let mut response = call(0, Request::get("/echo?n=42").unwrap()).await.unwrap();
        assert_eq!(
            response.header(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.data(64).into_text().await.unwrap(), r#"{"n":42}"#);
    }

    #[tokio::test]
    async fn generated_scope_reads_body() {
        let config = ServerConfig::default();
        let binding = Binding {
            verb: Verb::Post,
            path: "/echo".into(),
            method: &ECHO.methods[1],
        };
        let endpoint = generate(Arc::new(Echo), &binding, &config);
        assert_eq!(endpoint.depth(), 1);

        let request = Request::post("/echo")
            .unwrap()
            .with_header("content-length", "5")
            .unwrap()
            .with_body("hello");
        let mut response = Pin::new(&endpoint).apply(request).await.unwrap();
        assert!(response.content_type().is_none());
        assert_eq!(response.data(64).into_text().await.unwrap(), "hello");

        let binding = Binding {
            verb: Verb::Get,
            path: "/echo".into(),
            method: &ECHO.methods[0],
        };
        assert_eq!(generate(Arc::new(Echo), &binding, &config).depth(), 0);
    }

    #[test]
    fn bad_input_converts() {
        let error: HandlerError = BadInput::missing("n").into();
        assert!(matches!(error, HandlerError::BadInput(_)));
        assert!(format!("{:?}", handler(0)).contains("count"));
    }
}
