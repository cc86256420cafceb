use crate::HttpEntity;

#[derive(Debug)]
#[must_use]
/// An HTTP response.
///
/// Wraps an `http::Response<hyper::Body>`, with constructors for the
/// responses the framework writes itself.
pub struct Response(http::Response<hyper::Body>);

macro_rules! forward {
    () => {};
    (
        $(#[$m:meta])* $v:vis fn $name:ident(&self $(, $pn:ident: $pt:ty)*) -> $ret:ty;
        $($tail:tt)*
    ) => {
        $(#[$m])* $v fn $name(&self $(, $pn: $pt)*) -> $ret {
            (self.0).$name($($pn),*)
        }

        forward! { $($tail)* }
    };

    (
        $(#[$m:meta])* $v:vis fn $name:ident(&mut self $(, $pn:ident: $pt:ty)*) -> $ret:ty;
        $($tail:tt)*
    ) => {
        $(#[$m])* $v fn $name(&mut self $(, $pn: $pt)*) -> $ret {
            (self.0).$name($($pn),*)
        }

        forward! { $($tail)* }
    }
}

impl Response {
    /// Creates an empty response with a status code of 200.
    ///
    /// # Examples
    /// ```rust
    /// # use proteus::*;
    /// let response = Response::empty_200();
    /// assert_eq!(response.status(), http::StatusCode::OK);
    /// ```
    pub fn empty_200() -> Self {
        Self::empty_status(http::StatusCode::OK)
    }

    /// Creates an empty response with a status code of 204.
    pub fn empty_204() -> Self {
        Self::empty_status(http::StatusCode::NO_CONTENT)
    }

    /// Creates an empty response with a status code of 404.
    pub fn empty_404() -> Self {
        Self::empty_status(http::StatusCode::NOT_FOUND)
    }

    /// Creates an empty response with a status code of 500.
    pub fn empty_500() -> Self {
        Self::empty_status(http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Creates an empty response with the given status code.
    pub fn empty_status(status: http::StatusCode) -> Self {
        Response::default().with_status(status)
    }

    /// The response for a request no route matched: a 404, with the body
    /// `Page Not Found!!` as `text/plain`.
    ///
    /// # Examples
    /// ```rust
    /// # use proteus::*;
    /// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
    /// let mut response = Response::not_found();
    /// assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
    /// assert_eq!(response.content_type(), Some(mime::TEXT_PLAIN));
    /// assert_eq!(response.data(64).into_text().await?, "Page Not Found!!");
    /// # Ok(())
    /// # }
    /// ```
    pub fn not_found() -> Self {
        Response::plain(http::StatusCode::NOT_FOUND, "Page Not Found!!")
    }

    /// A 400, with the given reason as a `text/plain` body.
    pub fn bad_request<V: Into<String>>(reason: V) -> Self {
        Response::plain(http::StatusCode::BAD_REQUEST, reason.into())
    }

    /// A 413, for bodies over the configured maximum.
    pub fn payload_too_large() -> Self {
        Response::plain(http::StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    }

    /// A 500.  The body is fixed; the cause never leaks into it.
    pub fn internal_error() -> Self {
        Response::plain(
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )
    }

    fn plain<B: Into<hyper::Body>>(status: http::StatusCode, body: B) -> Self {
        Response::default()
            .with_status(status)
            .with_content_type("text/plain")
            .with_body(body)
    }

    /// Creates a response with the given text as its body, and a
    /// content-type of `text/plain; charset=utf-8`.
    pub fn text<V: Into<String>>(body: V) -> Self {
        Response::default()
            .with_content_type("text/plain; charset=utf-8")
            .with_body(body.into())
    }

    /// Creates a 200 with the given bytes as its body, and no content-type.
    pub fn bytes<V: Into<bytes::Bytes>>(body: V) -> Self {
        Response::default().with_body(body.into())
    }

    /// Creates a 200 with the given value serialized as JSON, and a
    /// content-type of `application/json`.
    ///
    /// # Errors
    /// Fails if the value cannot be serialized.
    pub fn json<V: serde::Serialize + ?Sized>(body: &V) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_vec(body)?;
        Ok(Response::json_bytes(value.into()))
    }

    /// A 200 with an already encoded JSON document as its body.
    pub(crate) fn json_bytes(body: bytes::Bytes) -> Self {
        Response::default()
            .with_content_type("application/json")
            .with_body(body)
    }

    fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.0.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(content_type),
        );
        self
    }

    /// Sets the status code of the response.
    pub fn set_status<S: Into<http::StatusCode>>(&mut self, status: S) {
        *self.0.status_mut() = status.into();
    }

    /// Sets the status code of the response, consuming `self`.
    pub fn with_status<S: Into<http::StatusCode>>(mut self, status: S) -> Self {
        self.set_status(status);
        self
    }

    forward! {
        /// Returns the status code of the response.
        #[inline]
        pub fn status(&self) -> http::StatusCode;
        /// Returns a reference to the associated extensions.
        #[inline]
        pub fn extensions(&self) -> &http::Extensions;
        /// Returns a mutable reference to the associated extensions.
        #[inline]
        pub fn extensions_mut(&mut self) -> &mut http::Extensions;
    }
}

impl crate::HttpEntity for Response {
    #[inline]
    fn body_mut(&mut self) -> &mut hyper::Body {
        self.0.body_mut()
    }

    #[inline]
    fn headers(&self) -> &http::HeaderMap<http::HeaderValue> {
        self.0.headers()
    }

    #[inline]
    fn headers_mut(&mut self) -> &mut http::HeaderMap<http::HeaderValue> {
        self.0.headers_mut()
    }
}

impl Default for Response {
    fn default() -> Self {
        Response(http::Response::new(hyper::Body::empty()))
    }
}

impl From<http::Response<hyper::Body>> for Response {
    fn from(hy: http::Response<hyper::Body>) -> Self {
        Response(hy)
    }
}

impl From<Response> for http::Response<hyper::Body> {
    fn from(this: Response) -> Self {
        this.0
    }
}

/// Converts a type into a [`Response`].
///
/// Implemented for responses and results of responses, so that plain
/// closures can act as endpoints.
pub trait IntoResponse {
    /// Performs the conversion.
    ///
    /// # Errors
    /// Fails if the value itself was an error.
    fn into_response(self) -> Result<Response, anyhow::Error>;
}

impl IntoResponse for Response {
    fn into_response(self) -> Result<Response, anyhow::Error> {
        Ok(self)
    }
}

impl<R, E> IntoResponse for Result<R, E>
where
    R: IntoResponse,
    E: Into<anyhow::Error>,
{
    fn into_response(self) -> Result<Response, anyhow::Error> {
        self.map_err(Into::into).and_then(IntoResponse::into_response)
    }
}

impl IntoResponse for std::convert::Infallible {
    fn into_response(self) -> Result<Response, anyhow::Error> {
        match self {}
    }
}
