//! The per-request view handed to generated handlers and controllers.

use crate::codec::Codec;
use crate::metadata::SourceKind;
use crate::request::{Fragment, PeerAddress};
use crate::{ProteusError, Request, Response};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempPath;

/// The full body of a request, read before the handler ran.
///
/// Inserted as a request extension by [`crate::middleware::BodyReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyAttachment(pub Bytes);

/// A file part of a `multipart/form-data` body, spooled to disk.
///
/// The spool file is deleted when this value is dropped, i.e. at the end of
/// the request, unless the controller persists it with [`Self::persist`].
#[derive(Debug)]
pub struct UploadedFile {
    path: TempPath,
    file_name: Option<String>,
    content_type: Option<mime::Mime>,
    size: u64,
}

impl UploadedFile {
    /// Wraps an already spooled file.
    pub fn new(path: TempPath, file_name: Option<String>, content_type: Option<mime::Mime>) -> Self {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        UploadedFile {
            path,
            file_name,
            content_type,
            size,
        }
    }

    pub(crate) fn spooled(
        path: TempPath,
        file_name: Option<String>,
        content_type: Option<mime::Mime>,
        size: u64,
    ) -> Self {
        UploadedFile {
            path,
            file_name,
            content_type,
            size,
        }
    }

    /// The path of the spool file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name the client sent, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The content type of the part, if any.
    pub fn content_type(&self) -> Option<&mime::Mime> {
        self.content_type.as_ref()
    }

    /// The size of the spooled file, in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Moves the spool file to `target`, keeping it past the request.
    ///
    /// # Errors
    /// Fails if the file could not be moved.
    pub fn persist<P: AsRef<Path>>(self, target: P) -> Result<(), ProteusError> {
        self.path
            .persist(target)
            .map_err(|e| ProteusError::Io(e.error))
    }
}

/// A single value of a form.
#[derive(Debug)]
pub enum FormValue {
    /// A text field.
    Text(String),
    /// An uploaded file.
    File(UploadedFile),
}

/// The parsed fields of a `multipart/form-data` or
/// `application/x-www-form-urlencoded` body, in the order they were sent.
#[derive(Debug, Default)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    /// Creates an empty form.
    pub fn new() -> Self {
        FormData::default()
    }

    /// Appends a field.
    pub fn push<N: Into<String>>(&mut self, name: N, value: FormValue) -> &mut Self {
        self.fields.push((name.into(), value));
        self
    }

    /// The first value sent under the given name.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The first text field under the given name.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .find_map(|(_, value)| match value {
                FormValue::Text(text) => Some(&text[..]),
                FormValue::File(_) => None,
            })
    }

    /// The first uploaded file under the given name.
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .find_map(|(_, value)| match value {
                FormValue::File(file) => Some(file),
                FormValue::Text(_) => None,
            })
    }

    /// Every value sent under the given name.
    pub fn all<'f>(&'f self, name: &'f str) -> impl Iterator<Item = &'f FormValue> + 'f {
        self.fields
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One HTTP exchange: the routed request, and the sink for its response.
///
/// Built by the generated handler once the body has been read.  The path
/// map holds the named captures of the matched route, and the query map
/// the percent-decoded query string; the two are kept apart, so a path
/// capture and a query parameter of the same name never shadow each other.
///
/// # Examples
/// ```rust
/// # use proteus::*;
/// # fn main() -> Result<(), anyhow::Error> {
/// let exchange = Exchange::from_request(Request::get("/users?limit=5&limit=6")?)
///     .with_path_param("id", "42");
/// assert_eq!(exchange.query_param("limit"), Some("5"));
/// assert_eq!(exchange.path_param("id"), Some("42"));
/// assert_eq!(exchange.path_param("limit"), None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Exchange {
    method: http::Method,
    uri: http::Uri,
    headers: http::HeaderMap,
    extensions: http::Extensions,
    path: HashMap<String, String>,
    query: HashMap<String, Vec<String>>,
    body: Option<Bytes>,
    form: Option<FormData>,
    strict_optional_bodies: bool,
    response: Option<Response>,
}

impl Exchange {
    /// Builds the exchange for a routed request.  The body attachment and
    /// form data are taken out of the request's extensions; the raw body
    /// stream itself is dropped.
    pub fn from_request(request: Request) -> Self {
        let (mut parts, _) = request.into_parts();
        let path = parts
            .extensions
            .get::<Fragment>()
            .map(|fragment| {
                fragment
                    .named()
                    .map(|(k, v)| (k.to_owned(), decode_capture(v)))
                    .collect()
            })
            .unwrap_or_default();
        let query = parse_query(parts.uri.query());
        let body = parts.extensions.remove::<BodyAttachment>().map(|b| b.0);
        let form = parts.extensions.remove::<FormData>();

        Exchange {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            extensions: parts.extensions,
            path,
            query,
            body,
            form,
            strict_optional_bodies: false,
            response: None,
        }
    }

    /// Adds a path parameter.
    #[must_use]
    pub fn with_path_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.path.insert(key.into(), value.into());
        self
    }

    /// Adds a header.
    ///
    /// # Errors
    /// Fails if the value is not a valid header value.
    pub fn with_header<H, V>(mut self, key: H, value: V) -> Result<Self, http::Error>
    where
        H: http::header::IntoHeaderName,
        V: TryInto<http::HeaderValue>,
        http::Error: From<<V as TryInto<http::HeaderValue>>::Error>,
    {
        self.headers.append(key, value.try_into()?);
        Ok(self)
    }

    /// Sets the body attachment.
    #[must_use]
    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the form data.
    #[must_use]
    pub fn with_form(mut self, form: FormData) -> Self {
        self.form = Some(form);
        self
    }

    /// Whether an optional body that fails to decode is an error (`true`),
    /// or treated as absent (`false`, the default).
    #[must_use]
    pub fn with_strict_optional_bodies(mut self, strict: bool) -> Self {
        self.strict_optional_bodies = strict;
        self
    }

    /// The method of the request.
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// The URI of the request.
    pub fn uri(&self) -> &http::Uri {
        &self.uri
    }

    /// The headers of the request.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// The extensions of the request.
    pub fn extensions(&self) -> &http::Extensions {
        &self.extensions
    }

    /// The extensions of the request, mutably.
    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.extensions
    }

    /// The address of the peer, when served through a listener.
    pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        self.extensions.get::<PeerAddress>().map(|p| p.0)
    }

    /// A named capture of the matched route.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path.get(name).map(String::as_str)
    }

    /// The first value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params(name).first().map(String::as_str)
    }

    /// Every value of a query parameter, in order.
    pub fn query_params(&self, name: &str) -> &[String] {
        self.query.get(name).map_or(&[][..], |v| &v[..])
    }

    /// The first value of a header.  A value that is not visible ASCII is
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Looks up a named value in the given source.  Empty values are absent;
    /// sources that are not name-addressed always yield `None`.
    pub fn lookup(&self, source: SourceKind, name: &str) -> Option<&str> {
        let value = match source {
            SourceKind::Path => self.path_param(name),
            SourceKind::Query => self.query_param(name),
            SourceKind::Header => self.header(name),
            SourceKind::Body | SourceKind::FormFile | SourceKind::Exchange => None,
        };

        value.filter(|v| !v.is_empty())
    }

    /// The raw `Content-Type` of the request.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// The codec for the request body.
    pub fn codec(&self) -> Codec {
        Codec::negotiate(self.content_type())
    }

    /// The body attachment.  `None` if the body was never read, which is
    /// the case for routes that neither use a body verb nor extract one.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The parsed form, if the body was a form.
    pub fn form(&self) -> Option<&FormData> {
        self.form.as_ref()
    }

    /// Whether optional bodies are decoded strictly.
    pub fn strict_optional_bodies(&self) -> bool {
        self.strict_optional_bodies
    }

    /// Writes the response.  The sink accepts exactly one response; once
    /// written, it takes precedence over whatever the handler returns.
    ///
    /// # Errors
    /// Returns [`ProteusError::ResponseAlreadySent`] if a response was
    /// already written.
    ///
    /// # Examples
    /// ```rust
    /// # use proteus::*;
    /// # fn main() -> Result<(), anyhow::Error> {
    /// let mut exchange = Exchange::from_request(Request::get("/")?);
    /// exchange.respond(Response::empty_204())?;
    /// assert!(exchange.respond(Response::empty_200()).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn respond(&mut self, response: Response) -> Result<(), ProteusError> {
        if self.response.is_some() {
            return Err(ProteusError::ResponseAlreadySent);
        }

        self.response = Some(response);
        Ok(())
    }

    /// Whether a response was written to the sink.
    pub fn has_responded(&self) -> bool {
        self.response.is_some()
    }

    /// Takes the written response out of the sink.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }
}

/// Percent-decodes a path capture.  Unlike the query string, `+` is kept
/// as is.
fn decode_capture(value: &str) -> String {
    percent_encoding::percent_decode_str(value)
        .decode_utf8_lossy()
        .into_owned()
}

fn parse_query(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        map.entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    map
}
