use crate::metadata::Verb;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
/// Errors generated specifically from this library, and not its interactions
/// with user code.
pub enum ProteusError {
    #[error("could not parse the given string ({:?}) as an address", .0)]
    /// Generated when attempting to parse an address (during
    /// [`crate::Router::listen`]), but the address was invalid.
    InvalidAddress(String),
    #[error("could not bind the listening socket")]
    /// Generated when the listening socket could not be created, bound, or
    /// put into the listening state.
    Listen(#[source] std::io::Error),
    #[error("could not serve server")]
    /// Generated when attempting to bind and listen using hyper, but it failed
    /// for some underlying reason.
    HyperServer(#[source] hyper::Error),
    /// Generated when attempting to read the body of a request, or response,
    /// and failing.
    #[error("could not read the body of a request or response")]
    ReadBody(#[source] std::io::Error),
    /// Generated when the body of a request is larger than the configured
    /// maximum request size.
    #[error("the body of the request exceeded {0} bytes")]
    PayloadTooLarge(u64),
    /// Generated when a body could not be parsed as form data.
    #[error("could not parse the body of the request as form data")]
    FormData(#[source] anyhow::Error),
    /// Generated when a server configuration file could not be parsed.
    #[error("could not parse the server configuration")]
    Config(#[source] toml::de::Error),
    /// Generated when a server configuration file could not be read, or the
    /// runtime could not be constructed.
    #[error("i/o error while preparing the server")]
    Io(#[source] std::io::Error),
    /// Generated when a handler attempts to write to the response sink of an
    /// exchange more than once.
    #[error("a response has already been written to this exchange")]
    ResponseAlreadySent,
    /// Generated when bootstrapping the server failed.
    #[error(transparent)]
    Bind(#[from] BindError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
/// Errors raised while binding controllers to the router.  These only occur
/// during bootstrap, and abort it; they never surface while serving.
pub enum BindError {
    /// A controller declares route methods, but carries no class path.
    #[error("controller `{controller}` has route methods but no class path")]
    MissingClassPath {
        /// The name of the controller type.
        controller: &'static str,
    },
    /// A method carries more than one verb marker.
    #[error("method `{controller}::{method}` has more than one verb marker ({verbs:?})")]
    AmbiguousVerb {
        /// The name of the controller type.
        controller: &'static str,
        /// The name of the offending method.
        method: &'static str,
        /// Every verb marker found on the method, in declaration order.
        verbs: Vec<Verb>,
    },
    /// Two routes share the same verb and path template.
    #[error("route {verb} {path} is already registered")]
    RouteCollision {
        /// The verb of the colliding route.
        verb: http::Method,
        /// The composed path template of the colliding route.
        path: String,
    },
    /// A parameter's textual default does not convert into its type.
    #[error("parameter `{parameter}` of `{controller}::{method}` has a default {default:?} that is not {target}")]
    InvalidDefault {
        /// The name of the controller type.
        controller: &'static str,
        /// The name of the offending method.
        method: &'static str,
        /// The name of the parameter.
        parameter: &'static str,
        /// The declared default.
        default: &'static str,
        /// The parameter's type.
        target: crate::metadata::TypeDescriptor,
    },
    /// A path template could not be compiled into a matcher.
    #[error("invalid path template {path:?}: {reason}")]
    InvalidPath {
        /// The offending path template.
        path: String,
        /// Why the template was rejected.
        reason: String,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
/// The request did not carry a usable value for a parameter.
///
/// The message is written, as is, to the body of the `400 Bad Request`
/// response; it always names the offending parameter or codec.
pub struct BadInput(String);

impl BadInput {
    /// Creates an error with the given message.
    pub fn new<M: Into<String>>(message: M) -> Self {
        BadInput(message.into())
    }

    /// A required parameter was absent or empty.
    ///
    /// # Examples
    /// ```rust
    /// let error = proteus::BadInput::missing("limit");
    /// assert_eq!(error.to_string(), "missing required parameter `limit`");
    /// ```
    pub fn missing(name: &str) -> Self {
        BadInput(format!("missing required parameter `{}`", name))
    }

    /// A parameter was present, but could not be converted into the
    /// expected type.
    pub fn invalid(name: &str, expected: &str) -> Self {
        BadInput(format!(
            "invalid value for parameter `{}`: expected {}",
            name, expected
        ))
    }

    /// Returns the message of this error.
    pub fn message(&self) -> &str {
        &self.0
    }
}

#[derive(thiserror::Error, Debug)]
/// The ways a generated handler can fail while serving a request.
pub enum HandlerError {
    /// The request was unusable; maps to `400 Bad Request`.
    #[error(transparent)]
    BadInput(#[from] BadInput),
    /// The exchange was closed by the peer before a response could be
    /// written; no response is sent.
    #[error("the exchange was closed before a response was written")]
    Aborted,
    /// Anything else; maps to `500 Internal Server Error`.
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl HandlerError {
    /// Converts an error returned by a controller method.  Errors that are
    /// (or wrap) a [`BadInput`] keep their 400 semantics; everything else is
    /// internal.
    pub fn from_controller<E: Into<anyhow::Error>>(error: E) -> Self {
        let error = error.into();
        match error.downcast::<BadInput>() {
            Ok(bad) => HandlerError::BadInput(bad),
            Err(error) => match error.downcast::<HandlerError>() {
                Ok(inner) => inner,
                Err(error) => HandlerError::Internal(error),
            },
        }
    }
}

impl From<ProteusError> for HandlerError {
    fn from(error: ProteusError) -> Self {
        match error {
            ProteusError::ReadBody(e) => e.into(),
            error => HandlerError::Internal(error.into()),
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(error: std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            HandlerError::Aborted
        } else {
            HandlerError::Internal(error.into())
        }
    }
}
