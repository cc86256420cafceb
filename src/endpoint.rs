use crate::request::Request;
use crate::response::IntoResponse;
use crate::Response;
use std::future::Future;
use std::pin::Pin;

/// An HTTP request handler.
///
/// Everything the router dispatches to is an endpoint: the handlers
/// generated for controller methods, the fallback, and manually registered
/// closures.  Any `Fn(Request) -> impl Future<Output = impl IntoResponse>`
/// is an endpoint.
///
/// # Examples
/// ```rust
/// # use proteus::*;
/// async fn hello(_: Request) -> Response {
///     Response::text("hello, world")
/// }
///
/// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
/// let mut http = proteus::http();
/// http.get("/", hello)?;
/// http.prepare()?;
/// let response = http.handle(Request::get("/")?).await?;
/// assert_eq!(response.status(), http::StatusCode::OK);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    /// Handles the request.  An `Err` is handed to the HTTP engine as-is,
    /// which closes the connection without writing a response; endpoints
    /// that want the client to see an error return an error response
    /// instead.
    #[must_use]
    async fn apply(self: Pin<&Self>, request: Request) -> Result<Response, anyhow::Error>;

    #[doc(hidden)]
    fn describe(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", std::any::type_name::<Self>())
    }
}

impl std::fmt::Debug for dyn Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.describe(f)
    }
}

#[async_trait]
impl<Res, F, Fut> Endpoint for F
where
    F: Fn(Request) -> Fut + Sync + Send + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoResponse + Send + 'static,
{
    async fn apply(self: Pin<&Self>, request: Request) -> Result<Response, anyhow::Error> {
        self(request).await.into_response()
    }
}
