//! Extractors over the request body.
//!
//! The body must have been read before the handler runs; generated handlers
//! for routes that extract a body are always scoped behind
//! [`crate::middleware::BodyReader`].

use crate::codec::Codec;
use crate::error::BadInput;
use crate::Exchange;
use bytes::Bytes;
use serde::de::DeserializeOwned;

/// Decodes the body with the codec negotiated from its `Content-Type`.
///
/// # Errors
/// Fails with `Invalid JSON` or `Invalid XML` if the body is absent or does
/// not decode.
///
/// # Examples
/// ```rust
/// # use proteus::*;
/// #[derive(Debug, serde::Deserialize)]
/// struct User { id: i64 }
///
/// # fn main() -> Result<(), anyhow::Error> {
/// let exchange = Exchange::from_request(Request::post("/users")?)
///     .with_header("content-type", "application/json")?
///     .with_body(r#"{"id":7}"#);
/// let user: User = proteus::extract::body::model(&exchange)?;
/// assert_eq!(user.id, 7);
///
/// let exchange = exchange.with_body("{");
/// let error = proteus::extract::body::model::<User>(&exchange).unwrap_err();
/// assert_eq!(error.to_string(), "Invalid JSON");
/// # Ok(())
/// # }
/// ```
pub fn model<T: DeserializeOwned>(exchange: &Exchange) -> Result<T, BadInput> {
    decode(exchange, exchange.codec())
}

/// Decodes the body as JSON, whatever its `Content-Type`.
///
/// # Errors
/// Fails with `Invalid JSON` if the body is absent or does not decode.
pub fn json<T: DeserializeOwned>(exchange: &Exchange) -> Result<T, BadInput> {
    decode(exchange, Codec::Json)
}

/// Decodes the body as XML, whatever its `Content-Type`.
///
/// # Errors
/// Fails with `Invalid XML` if the body is absent or does not decode.
pub fn xml<T: DeserializeOwned>(exchange: &Exchange) -> Result<T, BadInput> {
    decode(exchange, Codec::Xml)
}

fn decode<T: DeserializeOwned>(exchange: &Exchange, codec: Codec) -> Result<T, BadInput> {
    let body = exchange.body().map_or(&[][..], |b| &b[..]);
    codec.decode(body)
}

/// The raw body.
///
/// # Errors
/// Fails if the body was never read.
pub fn bytes(exchange: &Exchange) -> Result<Bytes, BadInput> {
    exchange.body().cloned().ok_or_else(|| BadInput::missing("body"))
}

/// Decodes the body if there is one.  An absent or empty body is `None`.
///
/// A body that does not decode is `None` as well, unless the exchange is
/// strict about optional bodies, in which case it is the same error as
/// [`model`].
///
/// # Errors
/// Only in strict mode, if the body does not decode.
pub fn optional_model<T: DeserializeOwned>(exchange: &Exchange) -> Result<Option<T>, BadInput> {
    let body = match exchange.body() {
        Some(body) if !body.is_empty() => body,
        _ => return Ok(None),
    };

    match exchange.codec().decode(body) {
        Ok(value) => Ok(Some(value)),
        Err(e) if exchange.strict_optional_bodies() => Err(e),
        Err(e) => {
            log::debug!("optional body treated as absent: {}", e);
            Ok(None)
        }
    }
}

/// The raw body, if there is a non-empty one.
pub fn optional_bytes(exchange: &Exchange) -> Option<Bytes> {
    exchange.body().filter(|b| !b.is_empty()).cloned()
}
