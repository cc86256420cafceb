use std::pin::Pin;

use crate::endpoint::Endpoint;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// An endpoint around a synchronous function.  The function runs inline on
/// the worker that received the request, so it must not block.
pub struct SyncEndpoint<F>(pub(crate) F);

#[async_trait]
impl<F, Res> Endpoint for SyncEndpoint<F>
where
    F: Fn(Request) -> Res + Send + Sync + 'static,
    Res: IntoResponse + Send + 'static,
{
    async fn apply(self: Pin<&Self>, request: Request) -> Result<Response, anyhow::Error> {
        (self.0)(request).into_response()
    }
}
