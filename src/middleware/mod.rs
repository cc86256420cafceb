//! Pre-defined middleware.
//!
//! Middleware wraps an endpoint; it can inspect or modify the request before
//! passing it on through [`Next`], and the response on the way back out.
//!
//! ```rust
//! # use proteus::*;
//! let mut http = proteus::http();
//! http.with(proteus::middleware::TraceMiddleware::new());
//! ```

mod body;
mod trace;

pub use self::body::BodyReader;
pub use self::trace::TraceMiddleware;
use crate::{Endpoint, Request, Response};
use std::fmt::Debug;
use std::pin::Pin;

#[derive(Copy, Clone, Debug)]
/// The rest of the middleware chain, ending in the endpoint.
pub struct Next<'a> {
    middleware: &'a [Pin<Box<dyn Middleware>>],
    endpoint: Pin<&'a dyn Endpoint>,
}

#[async_trait]
/// A step in front of an endpoint.
pub trait Middleware: Debug + Send + Sync + 'static {
    /// Handles the request, usually by calling `next.apply(request)`.
    #[must_use]
    async fn apply(
        self: Pin<&Self>,
        request: Request,
        next: Next<'_>,
    ) -> Result<Response, anyhow::Error>;
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        middleware: &'a [Pin<Box<dyn Middleware>>],
        endpoint: Pin<&'a dyn Endpoint>,
    ) -> Self {
        Next {
            middleware,
            endpoint,
        }
    }

    /// Runs the rest of the chain.
    ///
    /// # Errors
    /// Propagates the error of whichever middleware or endpoint failed.
    pub async fn apply(self, request: Request) -> Result<Response, anyhow::Error> {
        if let Some((current, next)) = self.middleware.split_first() {
            let new = Next {
                middleware: next,
                endpoint: self.endpoint,
            };
            current.as_ref().apply(request, new).await
        } else {
            self.endpoint.apply(request).await
        }
    }
}
