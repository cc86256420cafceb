pub(crate) mod fragment;

pub use self::fragment::Fragment;
use std::convert::TryFrom;
use std::str::FromStr;

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

macro_rules! construct {
    () => {};
    ($($(#[$m:meta])* $v:vis fn $method:ident = $action:expr;)+) => {
        $($(#[$m])* $v fn $method<U>(uri: U) -> Result<Self, http::Error>
        where
            http::Uri: TryFrom<U>,
            <http::Uri as TryFrom<U>>::Error: Into<http::Error>
        {
            Self::from_method(uri, $action)
        })+
    };
}

/// The peer address of a connection, inserted by the listening service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct PeerAddress(pub(crate) std::net::SocketAddr);

#[derive(Debug)]
/// Represents an HTTP request, as seen by the router and its middleware.
///
/// Controller methods never see this type directly; the generated handler
/// turns it into an [`crate::Exchange`] first.
///
/// # Examples
/// ```rust
/// # use proteus::*;
/// let request = Request::post("/users?notify=true").unwrap()
///     .with_header("Content-Type", "application/json").unwrap()
///     .with_body(r#"{"id":7}"#);
/// assert_eq!(request.method(), http::Method::POST);
/// assert_eq!(request.content_type(), Some(mime::APPLICATION_JSON));
/// ```
pub struct Request(http::Request<hyper::Body>);

impl Request {
    construct! {
        /// Creates a new GET request for the given URI.
        ///
        /// # Examples
        /// ```rust
        /// # use proteus::*;
        /// let request = Request::get("https://example.com/a").unwrap();
        /// assert_eq!(request.method(), http::Method::GET);
        /// ```
        pub fn get = http::Method::GET;
        /// Creates a new POST request for the given URI.
        pub fn post = http::Method::POST;
        /// Creates a new PUT request for the given URI.
        pub fn put = http::Method::PUT;
        /// Creates a new DELETE request for the given URI.
        pub fn delete = http::Method::DELETE;
        /// Creates a new OPTIONS request for the given URI.
        pub fn options = http::Method::OPTIONS;
        /// Creates a new HEAD request for the given URI.
        pub fn head = http::Method::HEAD;
        /// Creates a new PATCH request for the given URI.
        pub fn patch = http::Method::PATCH;
    }

    /// Creates a new request with the given method and URI, and an empty
    /// body.
    ///
    /// # Errors
    /// Fails if the URI is invalid.
    pub fn from_method<U>(uri: U, method: http::Method) -> Result<Self, http::Error>
    where
        http::Uri: TryFrom<U>,
        <http::Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        http::request::Builder::new()
            .method(method)
            .uri(uri)
            .body(hyper::Body::empty())
            .map(Request)
    }

    /// Retrieves a named path capture from the request, then attempts to
    /// parse it.
    pub fn fragment<I: FromStr>(&self, name: &str) -> Option<I> {
        self.fragment_str(name).and_then(|s| s.parse().ok())
    }

    /// Retrieves a named path capture from the request.  Only present once
    /// the request has been routed.
    ///
    /// # Examples
    /// ```rust
    /// # use proteus::*;
    /// async fn greet(request: Request) -> Response {
    ///     Response::text(format!("hello, {}", request.fragment_str("target").unwrap_or("?")))
    /// }
    ///
    /// # #[tokio::main] async fn main() -> Result<(), anyhow::Error> {
    /// let mut http = proteus::http();
    /// http.get("/hello/{target}", greet)?;
    /// http.prepare()?;
    /// let mut response = http.handle(Request::get("/hello/foo")?).await?;
    /// assert_eq!(response.data(512).into_text().await?, "hello, foo");
    /// # Ok(())
    /// # }
    /// ```
    pub fn fragment_str(&self, name: &str) -> Option<&str> {
        self.ext::<Fragment>()?.name(name)
    }

    /// The address of the peer, if the request came in through
    /// [`crate::Router::listen`].
    pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        Some(self.ext::<PeerAddress>()?.0)
    }

    /// Retrieves a specific extension from the extensions map.
    pub fn ext<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions().get::<T>()
    }

    /// Sets the value of the specific extension in the extensions map.
    pub fn set_ext<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.extensions_mut().insert(value);
        self
    }

    /// Sets the value of the specific extension, consuming `self`.
    ///
    /// # Examples
    /// ```rust
    /// # use proteus::*;
    /// let request = Request::get("/").unwrap().with_ext(123u32);
    /// assert_eq!(request.ext::<u32>(), Some(&123u32));
    /// ```
    #[must_use]
    pub fn with_ext<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.set_ext(value);
        self
    }

    /// Removes the specific extension from the extensions map.
    pub fn remove_ext<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions_mut().remove::<T>()
    }

    /// Splits the request into its head and body.
    pub fn into_parts(self) -> (http::request::Parts, hyper::Body) {
        self.0.into_parts()
    }

    forward! {
        /// Returns a reference to the associated URI.
        #[inline]
        pub fn uri(&self) -> &http::Uri;
        /// Returns a reference to the associated HTTP method.
        #[inline]
        pub fn method(&self) -> &http::Method;
        /// Returns a reference to the associated extensions.
        #[inline]
        pub fn extensions(&self) -> &http::Extensions;
        /// Returns a mutable reference to the associated extensions.
        #[inline]
        pub fn extensions_mut(&mut self) -> &mut http::Extensions;
    }
}

impl crate::HttpEntity for Request {
    #[inline]
    fn body_mut(&mut self) -> &mut hyper::Body {
        self.0.body_mut()
    }

    #[inline]
    fn headers(&self) -> &http::HeaderMap {
        self.0.headers()
    }

    #[inline]
    fn headers_mut(&mut self) -> &mut http::HeaderMap {
        self.0.headers_mut()
    }
}

impl From<http::Request<hyper::Body>> for Request {
    fn from(r: http::Request<hyper::Body>) -> Self {
        Request(r)
    }
}

impl From<Request> for http::Request<hyper::Body> {
    fn from(r: Request) -> Self {
        r.0
    }
}
