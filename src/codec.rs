//! Request body codecs.
//!
//! Both codecs are stateless wrappers around serde, and so are safe to share
//! across every worker.  Only request bodies are negotiated; structured
//! replies are always written as JSON.

use crate::error::BadInput;
use serde::de::DeserializeOwned;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// A body codec, chosen per request from its content type.
pub enum Codec {
    /// `application/json`, through `serde_json`.
    Json,
    /// `application/xml`, through `quick-xml`.
    Xml,
}

impl Codec {
    /// Picks the codec for the given `Content-Type`.  A content type that
    /// contains `application/json` selects JSON; one that contains
    /// `application/xml` selects XML; anything else (including no content
    /// type at all) falls back to JSON.
    ///
    /// # Examples
    /// ```rust
    /// use proteus::Codec;
    /// assert_eq!(Codec::negotiate(Some("application/xml; charset=utf-8")), Codec::Xml);
    /// assert_eq!(Codec::negotiate(Some("text/plain")), Codec::Json);
    /// assert_eq!(Codec::negotiate(None), Codec::Json);
    /// ```
    pub fn negotiate(content_type: Option<&str>) -> Codec {
        match content_type {
            Some(v) if v.contains(mime::APPLICATION_JSON.essence_str()) => Codec::Json,
            Some(v) if v.contains("application/xml") => Codec::Xml,
            _ => Codec::Json,
        }
    }

    /// The name of the codec, as used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Json => "JSON",
            Codec::Xml => "XML",
        }
    }

    /// The error reported when a body cannot be decoded with this codec,
    /// i.e. `Invalid JSON` or `Invalid XML`.
    pub fn invalid(self) -> BadInput {
        BadInput::new(format!("Invalid {}", self.name()))
    }

    /// Decodes the given bytes into a value.
    ///
    /// # Errors
    /// Returns [`Codec::invalid`] if the bytes are not a valid encoding of
    /// `T`.  The underlying codec error is logged at debug.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, BadInput> {
        let result = match self {
            Codec::Json => serde_json::from_slice(bytes).map_err(anyhow::Error::from),
            Codec::Xml => std::str::from_utf8(bytes)
                .map_err(anyhow::Error::from)
                .and_then(|text| quick_xml::de::from_str(text).map_err(anyhow::Error::from)),
        };

        result.map_err(|e| {
            log::debug!("decode({}): {}", self.name(), e);
            self.invalid()
        })
    }
}
