use crate::data::DataStream;

/// A HTTP Entity.
///
/// This is either a request or a response.  It covers what the two share:
/// headers, and a body that can be replaced or read out under a limit.
pub trait HttpEntity: Sized {
    /// Returns a mutable reference to the body of the entity.  Every other
    /// body method goes through this one.
    fn body_mut(&mut self) -> &mut hyper::Body;

    /// Replaces the body of the entity, dropping the previous one in place.
    fn set_body<I: Into<hyper::Body>>(&mut self, body: I) -> &mut Self {
        *self.body_mut() = body.into();
        self
    }

    /// Replaces the body of the entity, consuming `self`.
    ///
    /// # Examples
    /// ```rust
    /// # use proteus::*;
    /// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
    /// let mut response = Response::default().with_body("foo");
    /// let body = hyper::body::to_bytes(response.take_body()).await?;
    /// assert_eq!(&body[..], b"foo");
    /// # Ok(())
    /// # }
    /// ```
    fn with_body<I: Into<hyper::Body>>(mut self, body: I) -> Self {
        *self.body_mut() = body.into();
        self
    }

    /// Takes the body out of the entity, leaving an empty one behind; a
    /// second read of the body sees nothing.
    fn take_body(&mut self) -> hyper::Body {
        std::mem::replace(self.body_mut(), hyper::Body::empty())
    }

    /// Takes the body out of the entity as a [`DataStream`] that reads at
    /// most `limit` bytes.
    ///
    /// # Examples
    /// ```rust
    /// # use proteus::*;
    /// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
    /// let mut response = Response::text("hello, world");
    /// let data = response.data(1_000).into_bytes().await?;
    /// assert_eq!(&data[..], b"hello, world");
    /// let mut response = Response::text("hello, world");
    /// assert!(response.data(1).into_bytes().await.is_err());
    /// # Ok(())
    /// # }
    /// ```
    fn data(&mut self, limit: u64) -> DataStream {
        DataStream::new(self.take_body(), limit)
    }

    /// Returns a reference to the associated header field map.
    fn headers(&self) -> &http::HeaderMap<http::HeaderValue>;

    /// Returns a mutable reference to the associated header field map.
    fn headers_mut(&mut self) -> &mut http::HeaderMap<http::HeaderValue>;

    /// Retrieves the first value of the given header.
    fn header<H: http::header::AsHeaderName>(&self, key: H) -> Option<&http::HeaderValue> {
        self.headers().get(key)
    }

    /// Sets the given header to the given value, replacing any previous
    /// values.
    ///
    /// # Errors
    /// If the given value cannot be converted into a header value, this will
    /// return an error.
    fn set_header<H, V>(&mut self, key: H, value: V) -> Result<(), http::Error>
    where
        H: http::header::IntoHeaderName,
        V: TryInto<http::HeaderValue>,
        http::Error: From<<V as TryInto<http::HeaderValue>>::Error>,
    {
        self.headers_mut().insert(key, value.try_into()?);
        Ok(())
    }

    /// Sets the given header, consuming `self`.  Otherwise, this acts the
    /// same as [`Self::set_header`].
    ///
    /// # Errors
    /// If the given value cannot be converted into a header value, this will
    /// return an error.
    fn with_header<H, V>(mut self, key: H, value: V) -> Result<Self, http::Error>
    where
        H: http::header::IntoHeaderName,
        V: TryInto<http::HeaderValue>,
        http::Error: From<<V as TryInto<http::HeaderValue>>::Error>,
    {
        self.headers_mut().insert(key, value.try_into()?);
        Ok(self)
    }

    /// The raw `Content-Type` of the entity, if present and valid UTF-8.
    fn content_type_str(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE)?.to_str().ok()
    }

    /// The `Content-Type` of the entity, parsed as a mime; `None` if the
    /// header is missing or malformed.
    fn content_type(&self) -> Option<mime::Mime> {
        self.content_type_str()?.parse::<mime::Mime>().ok()
    }
}
