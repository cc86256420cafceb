//! Typed extraction of named values from an [`Exchange`].
//!
//! Every extractor comes in two flavours.  Required extractors fail with
//! [`BadInput`] when the value is absent, empty, or does not convert.
//! Optional extractors never fail: absent, empty, and malformed values all
//! come back as `None`.  For bodies the leniency can be switched off per
//! server, see [`crate::ServerConfig::strict_optional_bodies`].
//!
//! ```rust
//! # use proteus::*;
//! use proteus::extract::query;
//! # fn main() -> Result<(), anyhow::Error> {
//! let exchange = Exchange::from_request(Request::get("/users?limit=10&page=x")?);
//! assert_eq!(query::integer(&exchange, "limit")?, 10);
//! assert!(query::integer(&exchange, "page").is_err());
//! assert_eq!(query::optional::integer(&exchange, "page"), None);
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod file;

pub use self::file::FileBytes;
use crate::error::BadInput;
use crate::metadata::{SourceKind, TypeDescriptor};
use crate::Exchange;
use chrono::{DateTime, Utc};

/// A type that can be converted from a single textual parameter value.
pub trait FromParam: Sized {
    /// What the value is expected to look like, for error messages.
    const EXPECTED: &'static str;

    /// Converts the value; `None` if it is not a valid representation.
    fn from_param(value: &str) -> Option<Self>;
}

impl FromParam for String {
    const EXPECTED: &'static str = "a string";

    fn from_param(value: &str) -> Option<Self> {
        Some(value.to_owned())
    }
}

macro_rules! from_str_param {
    ($($ty:ty => $expected:expr;)+) => {
        $(impl FromParam for $ty {
            const EXPECTED: &'static str = $expected;

            fn from_param(value: &str) -> Option<Self> {
                value.parse().ok()
            }
        })+
    };
}

from_str_param! {
    i32 => "a 32-bit integer";
    i64 => "a 64-bit integer";
}

macro_rules! float_param {
    ($($ty:ty),+) => {
        $(impl FromParam for $ty {
            const EXPECTED: &'static str = "a decimal number";

            // decimal or scientific notation only; `inf` and `NaN` are not
            // numbers here.
            fn from_param(value: &str) -> Option<Self> {
                if !value
                    .bytes()
                    .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
                {
                    return None;
                }
                value.parse::<$ty>().ok().filter(|v| v.is_finite())
            }
        })+
    };
}

float_param!(f32, f64);

impl FromParam for bool {
    const EXPECTED: &'static str = "`true` or `false`";

    fn from_param(value: &str) -> Option<Self> {
        if unicase::eq(value, "true") {
            Some(true)
        } else if unicase::eq(value, "false") {
            Some(false)
        } else {
            None
        }
    }
}

impl FromParam for DateTime<Utc> {
    const EXPECTED: &'static str = "an ISO-8601 date-time with offset";

    /// Accepts an ISO-8601 zoned date-time, with or without seconds, and
    /// with an optional trailing `[Region/City]`.  The offset is what
    /// places the instant; the region is not consulted.
    fn from_param(value: &str) -> Option<Self> {
        let value = match value.find('[') {
            Some(start) if value.ends_with(']') => &value[..start],
            _ => value,
        };

        DateTime::parse_from_rfc3339(value)
            .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%#z"))
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }
}

/// Whether `value` converts into the primitive `target`.  Targets that are
/// not primitives cannot be checked here, and are reported as converting.
pub(crate) fn converts(target: TypeDescriptor, value: &str) -> bool {
    match target {
        TypeDescriptor::Int32 => i32::from_param(value).is_some(),
        TypeDescriptor::Int64 => i64::from_param(value).is_some(),
        TypeDescriptor::Float32 => f32::from_param(value).is_some(),
        TypeDescriptor::Float64 => f64::from_param(value).is_some(),
        TypeDescriptor::Bool => bool::from_param(value).is_some(),
        TypeDescriptor::Date => DateTime::<Utc>::from_param(value).is_some(),
        _ => true,
    }
}

/// Extracts a required value.
///
/// # Errors
/// Fails with [`BadInput`] if the value is absent, empty, or cannot be
/// converted into `T`.
pub fn required<T: FromParam>(
    exchange: &Exchange,
    source: SourceKind,
    name: &str,
) -> Result<T, BadInput> {
    let value = exchange
        .lookup(source, name)
        .ok_or_else(|| BadInput::missing(name))?;
    T::from_param(value).ok_or_else(|| BadInput::invalid(name, T::EXPECTED))
}

/// Extracts an optional value.  Absent and malformed values are `None`.
pub fn optional<T: FromParam>(exchange: &Exchange, source: SourceKind, name: &str) -> Option<T> {
    let value = exchange.lookup(source, name)?;
    let converted = T::from_param(value);
    if converted.is_none() {
        log::debug!("{:?} parameter `{}`: ignoring malformed value", source, name);
    }
    converted
}

/// Extracts a value, using the textual `default` when it is absent.
///
/// # Errors
/// Fails with [`BadInput`] if the value (or the default) cannot be
/// converted into `T`.
pub fn with_default<T: FromParam>(
    exchange: &Exchange,
    source: SourceKind,
    name: &str,
    default: &str,
) -> Result<T, BadInput> {
    let value = exchange.lookup(source, name).unwrap_or(default);
    T::from_param(value).ok_or_else(|| BadInput::invalid(name, T::EXPECTED))
}

/// Extracts an optional value, falling back to the textual `default` when
/// it is absent or malformed.
pub fn optional_with_default<T: FromParam>(
    exchange: &Exchange,
    source: SourceKind,
    name: &str,
    default: &str,
) -> Option<T> {
    optional(exchange, source, name).or_else(|| T::from_param(default))
}

macro_rules! source_extractors {
    ($($(#[$m:meta])* $module:ident => $source:expr;)+) => {
        $(
            $(#[$m])*
            pub mod $module {
                use crate::error::BadInput;
                use crate::Exchange;
                use chrono::{DateTime, Utc};

                /// Extracts a string.
                ///
                /// # Errors
                /// Fails if the value is absent or empty.
                pub fn string(exchange: &Exchange, name: &str) -> Result<String, BadInput> {
                    super::required(exchange, $source, name)
                }

                /// Extracts a 32-bit integer.
                ///
                /// # Errors
                /// Fails if the value is absent, empty, or not a base-10
                /// integer in range.
                pub fn integer(exchange: &Exchange, name: &str) -> Result<i32, BadInput> {
                    super::required(exchange, $source, name)
                }

                /// Extracts a 64-bit integer.
                ///
                /// # Errors
                /// Fails if the value is absent, empty, or not a base-10
                /// integer in range.
                pub fn long(exchange: &Exchange, name: &str) -> Result<i64, BadInput> {
                    super::required(exchange, $source, name)
                }

                /// Extracts a 32-bit float.
                ///
                /// # Errors
                /// Fails if the value is absent, empty, or not a number.
                pub fn float(exchange: &Exchange, name: &str) -> Result<f32, BadInput> {
                    super::required(exchange, $source, name)
                }

                /// Extracts a 64-bit float.
                ///
                /// # Errors
                /// Fails if the value is absent, empty, or not a number.
                pub fn double(exchange: &Exchange, name: &str) -> Result<f64, BadInput> {
                    super::required(exchange, $source, name)
                }

                /// Extracts a boolean; `true` or `false`, in any case.
                ///
                /// # Errors
                /// Fails if the value is absent, empty, or neither.
                pub fn boolean(exchange: &Exchange, name: &str) -> Result<bool, BadInput> {
                    super::required(exchange, $source, name)
                }

                /// Extracts an ISO-8601 date-time, normalized to UTC.
                ///
                /// # Errors
                /// Fails if the value is absent, empty, or not a date-time
                /// with an offset.
                pub fn date(exchange: &Exchange, name: &str) -> Result<DateTime<Utc>, BadInput> {
                    super::required(exchange, $source, name)
                }

                /// The optional twins of the extractors above.  Absent,
                /// empty, and malformed values are all `None`.
                pub mod optional {
                    use crate::Exchange;
                    use chrono::{DateTime, Utc};

                    /// Extracts a string.
                    pub fn string(exchange: &Exchange, name: &str) -> Option<String> {
                        crate::extract::optional(exchange, $source, name)
                    }

                    /// Extracts a 32-bit integer.
                    pub fn integer(exchange: &Exchange, name: &str) -> Option<i32> {
                        crate::extract::optional(exchange, $source, name)
                    }

                    /// Extracts a 64-bit integer.
                    pub fn long(exchange: &Exchange, name: &str) -> Option<i64> {
                        crate::extract::optional(exchange, $source, name)
                    }

                    /// Extracts a 32-bit float.
                    pub fn float(exchange: &Exchange, name: &str) -> Option<f32> {
                        crate::extract::optional(exchange, $source, name)
                    }

                    /// Extracts a 64-bit float.
                    pub fn double(exchange: &Exchange, name: &str) -> Option<f64> {
                        crate::extract::optional(exchange, $source, name)
                    }

                    /// Extracts a boolean.
                    pub fn boolean(exchange: &Exchange, name: &str) -> Option<bool> {
                        crate::extract::optional(exchange, $source, name)
                    }

                    /// Extracts a date-time, normalized to UTC.
                    pub fn date(exchange: &Exchange, name: &str) -> Option<DateTime<Utc>> {
                        crate::extract::optional(exchange, $source, name)
                    }
                }
            }
        )+
    };
}

source_extractors! {
    /// Extractors over the query string.  Repeated parameters yield their
    /// first value.
    query => crate::metadata::SourceKind::Query;
    /// Extractors over the named captures of the matched route.
    path => crate::metadata::SourceKind::Path;
    /// Extractors over the request headers.  Repeated headers yield their
    /// first value.
    header => crate::metadata::SourceKind::Header;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use chrono::TimeZone;

    fn exchange(uri: &str) -> Exchange {
        Exchange::from_request(Request::get(uri).unwrap())
    }

    #[test]
    fn required_on_absent_fails() {
        let exchange = exchange("/?empty=");
        let error = query::integer(&exchange, "limit").unwrap_err();
        assert!(error.message().contains("limit"));
        assert!(query::string(&exchange, "empty").is_err());
        assert!(path::long(&exchange, "id").is_err());
        assert!(header::boolean(&exchange, "x-flag").is_err());
    }

    #[test]
    fn optional_on_absent_is_none() {
        let exchange = exchange("/?empty=&bad=abc");
        assert_eq!(query::optional::integer(&exchange, "limit"), None);
        assert_eq!(query::optional::string(&exchange, "empty"), None);
        assert_eq!(query::optional::double(&exchange, "bad"), None);
        assert_eq!(path::optional::date(&exchange, "when"), None);
    }

    #[test]
    fn integers() {
        let exchange = exchange("/?a=42&b=-7&c=%2042&d=99999999999&e=%2B3");
        assert_eq!(query::integer(&exchange, "a").unwrap(), 42);
        assert_eq!(query::integer(&exchange, "b").unwrap(), -7);
        assert!(query::integer(&exchange, "c").is_err());
        assert!(query::integer(&exchange, "d").is_err());
        assert_eq!(query::long(&exchange, "d").unwrap(), 99_999_999_999);
        assert_eq!(query::integer(&exchange, "e").unwrap(), 3);
    }

    #[test]
    fn long_round_trip() {
        for x in [i64::MIN, -1, 0, 1, 42, i64::MAX] {
            let exchange = exchange("/").with_path_param("x", x.to_string());
            assert_eq!(path::long(&exchange, "x").unwrap(), x);
        }
    }

    #[test]
    fn floats() {
        let exchange = exchange("/?a=1.5&b=2e3&c=1,000&d=-.5E-1");
        assert_eq!(query::float(&exchange, "a").unwrap(), 1.5);
        assert_eq!(query::double(&exchange, "b").unwrap(), 2000.0);
        assert!(query::double(&exchange, "c").is_err());
        assert_eq!(query::double(&exchange, "d").unwrap(), -0.05);
    }

    #[test]
    fn non_finite_floats() {
        let exchange = exchange("/?a=inf&b=NaN&c=infinity&d=-inf&e=1e500");
        for name in ["a", "b", "c", "d", "e"] {
            assert!(query::double(&exchange, name).is_err(), "{}", name);
            assert_eq!(query::optional::float(&exchange, name), None, "{}", name);
        }
    }

    #[test]
    fn booleans() {
        let exchange = exchange("/?a=TRUE&b=false&c=yes&d=1");
        assert!(query::boolean(&exchange, "a").unwrap());
        assert!(!query::boolean(&exchange, "b").unwrap());
        assert!(query::boolean(&exchange, "c").is_err());
        assert_eq!(query::optional::boolean(&exchange, "d"), None);
    }

    #[test]
    fn dates() {
        let exchange = exchange("/?at=2011-12-03T10:15:30%2B01:00&bad=2011-12-03");
        let expected = Utc.with_ymd_and_hms(2011, 12, 3, 9, 15, 30).unwrap();
        assert_eq!(query::date(&exchange, "at").unwrap(), expected);
        assert!(query::date(&exchange, "bad").is_err());
    }

    #[test]
    fn dates_without_seconds_or_with_region() {
        let exchange = exchange("/")
            .with_path_param("short", "2011-12-03T10:15Z")
            .with_path_param("region", "2011-12-03T10:15:30+01:00[Europe/Paris]")
            .with_path_param("fraction", "2011-12-03T10:15:30.5-02:00")
            .with_path_param("unzoned", "2011-12-03T10:15:30")
            .with_path_param("broken", "2011-12-03T10:15:30+01:00[Europe/Paris");
        assert_eq!(
            path::date(&exchange, "short").unwrap(),
            Utc.with_ymd_and_hms(2011, 12, 3, 10, 15, 0).unwrap()
        );
        assert_eq!(
            path::date(&exchange, "region").unwrap(),
            Utc.with_ymd_and_hms(2011, 12, 3, 9, 15, 30).unwrap()
        );
        assert_eq!(
            path::date(&exchange, "fraction").unwrap(),
            Utc.with_ymd_and_hms(2011, 12, 3, 12, 15, 30).unwrap()
                + chrono::Duration::milliseconds(500)
        );
        assert!(path::date(&exchange, "unzoned").is_err());
        assert!(path::date(&exchange, "broken").is_err());
    }

    #[test]
    fn default_conversions() {
        assert!(converts(TypeDescriptor::Int32, "20"));
        assert!(!converts(TypeDescriptor::Int32, "twenty"));
        assert!(!converts(TypeDescriptor::Bool, "yes"));
        assert!(!converts(TypeDescriptor::Float64, "inf"));
        assert!(converts(TypeDescriptor::Date, "2011-12-03T10:15Z"));
        assert!(converts(TypeDescriptor::String, ""));
        assert!(converts(TypeDescriptor::UserDefined("Id"), "anything"));
    }

    #[test]
    fn headers() {
        let exchange = exchange("/")
            .with_header("x-count", "3")
            .unwrap()
            .with_header("x-count", "4")
            .unwrap();
        assert_eq!(header::integer(&exchange, "x-count").unwrap(), 3);
        assert_eq!(header::optional::string(&exchange, "x-missing"), None);
    }

    #[test]
    fn path_and_query_are_separate() {
        let exchange = exchange("/?id=1").with_path_param("id", "2");
        assert_eq!(path::optional::long(&exchange, "id"), Some(2));
        assert_eq!(query::optional::long(&exchange, "id"), Some(1));
    }

    #[test]
    fn defaults() {
        let exchange = exchange("/?page=3&bad=x");
        assert_eq!(
            with_default::<i32>(&exchange, SourceKind::Query, "page", "1").unwrap(),
            3
        );
        assert_eq!(
            with_default::<i32>(&exchange, SourceKind::Query, "size", "20").unwrap(),
            20
        );
        assert!(with_default::<i32>(&exchange, SourceKind::Query, "bad", "1").is_err());
        assert_eq!(
            optional_with_default::<i32>(&exchange, SourceKind::Query, "bad", "1"),
            Some(1)
        );
    }
}
