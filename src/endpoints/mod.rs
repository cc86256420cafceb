//! Pre-defined endpoints.
//!
//! Most routes are generated from controllers; these cover the rest, such
//! as a plain greeting on `/` registered next to them:
//!
//! ```rust
//! # use proteus::*;
//! # fn main() -> Result<(), anyhow::Error> {
//! let mut http = proteus::http();
//! http.get("/", proteus::endpoints::simple(|| Response::text("hello, world")))?;
//! # Ok(())
//! # }
//! ```

mod scope;
mod sync;

pub use self::scope::{ScopeEndpoint, ScopeEndpointBuilder};
pub(crate) use self::sync::SyncEndpoint;
use crate::response::IntoResponse;
use crate::{Endpoint, Request};

/// Creates an endpoint from a synchronous function of the request.
pub fn sync<F, Res>(func: F) -> impl Endpoint
where
    F: Fn(Request) -> Res + Send + Sync + 'static,
    Res: IntoResponse + Send + 'static,
{
    SyncEndpoint(func)
}

/// Creates an endpoint from a synchronous function that ignores the
/// request.
pub fn simple<F, Res>(func: F) -> impl Endpoint
where
    F: Fn() -> Res + Send + Sync + 'static,
    Res: IntoResponse + Send + 'static,
{
    sync::<_, Res>(move |_| func())
}

/// Starts a scope: middleware that applies to one endpoint only.
///
/// # Examples
/// ```rust
/// # use proteus::*;
/// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
/// let endpoint = proteus::endpoints::scope()
///     .with(proteus::middleware::BodyReader::new(1024))
///     .then(proteus::endpoints::simple(Response::empty_204));
/// let mut http = proteus::http();
/// http.post("/", endpoint)?;
/// http.prepare()?;
/// let response = http.handle(Request::post("/")?.with_body("hi")).await?;
/// assert_eq!(response.status(), http::StatusCode::NO_CONTENT);
/// # Ok(())
/// # }
/// ```
pub fn scope() -> ScopeEndpointBuilder {
    ScopeEndpointBuilder::default()
}
