use crate::middleware::{Middleware, Next};
use crate::{Endpoint, Request, Response};
use std::pin::Pin;

/// Builds a [`ScopeEndpoint`]; see [`crate::endpoints::scope`].
#[derive(Default, Debug)]
pub struct ScopeEndpointBuilder(Vec<Pin<Box<dyn Middleware>>>);

impl ScopeEndpointBuilder {
    /// Adds a middleware in front of the endpoint.  Middleware runs in the
    /// order it was added.
    pub fn with<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.0.push(Box::pin(middleware));
        self
    }

    /// Finishes the scope with the given endpoint.
    pub fn then<E: Endpoint>(&mut self, endpoint: E) -> ScopeEndpoint {
        ScopeEndpoint {
            middleware: std::mem::take(&mut self.0),
            endpoint: Box::pin(endpoint),
        }
    }
}

/// An endpoint with its own middleware, run after the router's.
///
/// Generated handlers for routes that read the body are scoped behind
/// [`crate::middleware::BodyReader`], so only those routes pay for it.
#[derive(Debug)]
pub struct ScopeEndpoint {
    middleware: Vec<Pin<Box<dyn Middleware>>>,
    endpoint: Pin<Box<dyn Endpoint>>,
}

impl ScopeEndpoint {
    /// The number of middleware in front of the endpoint.
    pub fn depth(&self) -> usize {
        self.middleware.len()
    }
}

#[async_trait]
impl Endpoint for ScopeEndpoint {
    async fn apply(self: Pin<&Self>, request: Request) -> Result<Response, anyhow::Error> {
        let next = Next::new(&self.middleware[..], self.endpoint.as_ref());
        next.apply(request).await
    }
}
