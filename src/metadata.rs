//! Route metadata, and the reader that turns it into bindings.
//!
//! The `#[controller]` macro records what it finds on a controller's `impl`
//! block as-is: the class path, and for every public method its verb markers
//! (in source order), its method path, and its parameters.  Nothing is
//! resolved at expansion time; [`read_controller`] does that at bind time,
//! so that a malformed controller fails bootstrap with a [`BindError`]
//! instead of silently dropping a route.

use crate::error::BindError;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// An HTTP verb a controller method can be bound to.
pub enum Verb {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// `HEAD`
    Head,
    /// `PATCH`
    Patch,
}

impl Verb {
    /// The matching [`http::Method`].
    pub fn method(self) -> http::Method {
        match self {
            Verb::Get => http::Method::GET,
            Verb::Post => http::Method::POST,
            Verb::Put => http::Method::PUT,
            Verb::Delete => http::Method::DELETE,
            Verb::Options => http::Method::OPTIONS,
            Verb::Head => http::Method::HEAD,
            Verb::Patch => http::Method::PATCH,
        }
    }

    /// Whether requests with this verb carry a body that must be read before
    /// the handler runs.
    pub fn has_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method().as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// Where the value for a parameter comes from.
pub enum SourceKind {
    /// A named capture of the path template.
    Path,
    /// A query string parameter.
    Query,
    /// A request header.
    Header,
    /// The decoded request body.
    Body,
    /// An uploaded file of a form.
    FormFile,
    /// The exchange itself.
    Exchange,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// A structural description of a parameter's type, enough to drive codecs
/// and conversions.
pub enum TypeDescriptor {
    /// `String`
    String,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `bool`
    Bool,
    /// A zoned date-time, normalized to UTC.
    Date,
    /// Raw bytes.
    ByteBuffer,
    /// The path of a spooled upload.
    FilePath,
    /// Any other named type, decoded through a codec.
    UserDefined(&'static str),
    /// A generic container, with its element types.
    Generic {
        /// The container, e.g. `Vec`.
        container: &'static str,
        /// The type arguments of the container.
        elements: &'static [TypeDescriptor],
    },
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::String => f.write_str("string"),
            TypeDescriptor::Int32 => f.write_str("int32"),
            TypeDescriptor::Int64 => f.write_str("int64"),
            TypeDescriptor::Float32 => f.write_str("float32"),
            TypeDescriptor::Float64 => f.write_str("float64"),
            TypeDescriptor::Bool => f.write_str("bool"),
            TypeDescriptor::Date => f.write_str("date"),
            TypeDescriptor::ByteBuffer => f.write_str("bytes"),
            TypeDescriptor::FilePath => f.write_str("file"),
            TypeDescriptor::UserDefined(name) => f.write_str(name),
            TypeDescriptor::Generic {
                container,
                elements,
            } => {
                write!(f, "{}<", container)?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str(">")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The recipe for binding one method parameter to one exchange source.
pub struct ParameterSpec {
    /// The name looked up in the source; the declared parameter name unless
    /// overridden.
    pub name: &'static str,
    /// Where the value comes from.
    pub source: SourceKind,
    /// The type the value is converted into.
    pub target: TypeDescriptor,
    /// Whether the parameter must be present (i.e. it is not an `Option`).
    pub required: bool,
    /// The textual default used when the value is absent.
    pub default: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Everything the controller macro recorded about one public method.
pub struct MethodMetadata {
    /// The method's name.
    pub name: &'static str,
    /// Every verb marker on the method, in declaration order.
    pub verbs: &'static [Verb],
    /// The method path, if a path marker was present.
    pub path: Option<&'static str>,
    /// The method's parameters, in declaration order.
    pub parameters: &'static [ParameterSpec],
}

impl MethodMetadata {
    /// Whether the generated handler must read the body before running; true
    /// for body-bearing verbs, and for any method that extracts the body or
    /// an uploaded file.
    pub fn reads_body(&self, verb: Verb) -> bool {
        verb.has_body()
            || self
                .parameters
                .iter()
                .any(|p| matches!(p.source, SourceKind::Body | SourceKind::FormFile))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Everything the controller macro recorded about a controller.
pub struct ControllerMetadata {
    /// The name of the controller type.
    pub name: &'static str,
    /// The class path, if a path was given to the controller marker.
    pub path: Option<&'static str>,
    /// The controller's public methods, in declaration order.
    pub methods: &'static [MethodMetadata],
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A resolved `(verb, path)` for one controller method.
pub struct Binding {
    /// The verb the method answers to.
    pub verb: Verb,
    /// The composed path template.
    pub path: String,
    /// The method itself.
    pub method: &'static MethodMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A registered route.  Created during bootstrap, and immutable afterwards.
pub struct RouteDescriptor {
    /// The verb of the route.
    pub verb: Verb,
    /// The path template of the route.
    pub path: String,
    /// The name of the controller type.
    pub controller: &'static str,
    /// The name of the controller method.
    pub method: &'static str,
    /// The parameters bound for each request.
    pub parameters: &'static [ParameterSpec],
}

impl fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<7} {} -> {}::{}",
            self.verb, self.path, self.controller, self.method
        )
    }
}

/// Resolves the verb of a method.  A method without a verb marker is not a
/// route, and yields `None`; more than one marker is rejected.
///
/// # Errors
/// Returns [`BindError::AmbiguousVerb`] if the method carries more than one
/// verb marker.
pub fn resolve_verb(
    controller: &ControllerMetadata,
    method: &MethodMetadata,
) -> Result<Option<Verb>, BindError> {
    match method.verbs {
        [] => Ok(None),
        [verb] => Ok(Some(*verb)),
        verbs => Err(BindError::AmbiguousVerb {
            controller: controller.name,
            method: method.name,
            verbs: verbs.to_vec(),
        }),
    }
}

lazy_static::lazy_static! {
    static ref SLASHES: regex::Regex = regex::Regex::new("/{2,}").unwrap();
}

/// Composes the class path with the method path: `"/" + class + "/" +
/// method`, with runs of `/` collapsed.  A method path of exactly `"/"`
/// contributes nothing.
///
/// # Examples
/// ```rust
/// use proteus::metadata::compose_path;
/// assert_eq!(compose_path("/users", "/"), "/users");
/// assert_eq!(compose_path("/users", "/{id}"), "/users/{id}");
/// assert_eq!(compose_path("/a/", "/b"), "/a/b");
/// ```
pub fn compose_path(class: &str, method: &str) -> String {
    let joined = if method == "/" {
        format!("/{}", class)
    } else {
        format!("/{}/{}", class, method)
    };

    SLASHES.replace_all(&joined, "/").into_owned()
}

/// Rejects a textual default that does not convert into its parameter's
/// type, so that it fails the bootstrap rather than every request.
fn check_defaults(
    controller: &ControllerMetadata,
    method: &MethodMetadata,
) -> Result<(), BindError> {
    for parameter in method.parameters {
        if let Some(default) = parameter.default {
            if !crate::extract::converts(parameter.target, default) {
                return Err(BindError::InvalidDefault {
                    controller: controller.name,
                    method: method.name,
                    parameter: parameter.name,
                    default,
                    target: parameter.target,
                });
            }
        }
    }

    Ok(())
}

/// Reads every route out of a controller's metadata.
///
/// # Errors
/// Fails if any method has more than one verb marker, if a parameter's
/// default does not convert into its type, or if the controller has route
/// methods but no class path.
pub fn read_controller(
    controller: &'static ControllerMetadata,
) -> Result<Vec<Binding>, BindError> {
    let mut bindings = Vec::with_capacity(controller.methods.len());

    for method in controller.methods {
        let verb = match resolve_verb(controller, method)? {
            Some(verb) => verb,
            None => {
                log::debug!("{}::{}: no verb marker, skipping", controller.name, method.name);
                continue;
            }
        };

        let class = controller.path.ok_or(BindError::MissingClassPath {
            controller: controller.name,
        })?;
        check_defaults(controller, method)?;
        let path = compose_path(class, method.path.unwrap_or("/"));

        log::debug!(
            "{}::{}: {} {}",
            controller.name,
            method.name,
            verb,
            path
        );

        bindings.push(Binding { verb, path, method });
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: ParameterSpec = ParameterSpec {
        name: "id",
        source: SourceKind::Path,
        target: TypeDescriptor::Int64,
        required: true,
        default: None,
    };

    static USERS: ControllerMetadata = ControllerMetadata {
        name: "Users",
        path: Some("/users"),
        methods: &[
            MethodMetadata {
                name: "get_user",
                verbs: &[Verb::Get],
                path: Some("/{id}"),
                parameters: &[ID],
            },
            MethodMetadata {
                name: "list",
                verbs: &[Verb::Get],
                path: None,
                parameters: &[],
            },
            MethodMetadata {
                name: "helper",
                verbs: &[],
                path: Some("/helper"),
                parameters: &[],
            },
        ],
    };

    static AMBIGUOUS: ControllerMetadata = ControllerMetadata {
        name: "Ambiguous",
        path: Some("/"),
        methods: &[MethodMetadata {
            name: "both",
            verbs: &[Verb::Post, Verb::Get],
            path: None,
            parameters: &[],
        }],
    };

    static PATHLESS: ControllerMetadata = ControllerMetadata {
        name: "Pathless",
        path: None,
        methods: &[MethodMetadata {
            name: "ping",
            verbs: &[Verb::Get],
            path: Some("/ping"),
            parameters: &[],
        }],
    };

    static BAD_DEFAULT: ControllerMetadata = ControllerMetadata {
        name: "Pages",
        path: Some("/pages"),
        methods: &[MethodMetadata {
            name: "list",
            verbs: &[Verb::Get],
            path: None,
            parameters: &[ParameterSpec {
                name: "limit",
                source: SourceKind::Query,
                target: TypeDescriptor::Int32,
                required: true,
                default: Some("twenty"),
            }],
        }],
    };

    static HELPERS: ControllerMetadata = ControllerMetadata {
        name: "Helpers",
        path: None,
        methods: &[MethodMetadata {
            name: "helper",
            verbs: &[],
            path: None,
            parameters: &[],
        }],
    };

    #[test]
    fn test_compose_path() {
        assert_eq!(compose_path("/users", "/"), "/users");
        assert_eq!(compose_path("/users", "/{id}"), "/users/{id}");
        assert_eq!(compose_path("/a/", "/b"), "/a/b");
        assert_eq!(compose_path("users", "{id}"), "/users/{id}");
        assert_eq!(compose_path("", "/"), "/");
        assert_eq!(compose_path("/a//b", "//c"), "/a/b/c");
    }

    #[test]
    fn test_read_controller() {
        let bindings = read_controller(&USERS).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].verb, Verb::Get);
        assert_eq!(bindings[0].path, "/users/{id}");
        assert_eq!(bindings[0].method.name, "get_user");
        assert_eq!(bindings[1].path, "/users");
    }

    #[test]
    fn test_ambiguous_verb() {
        let error = read_controller(&AMBIGUOUS).unwrap_err();
        assert_eq!(
            error,
            BindError::AmbiguousVerb {
                controller: "Ambiguous",
                method: "both",
                verbs: vec![Verb::Post, Verb::Get],
            }
        );
    }

    #[test]
    fn test_missing_class_path() {
        let error = read_controller(&PATHLESS).unwrap_err();
        assert_eq!(
            error,
            BindError::MissingClassPath {
                controller: "Pathless"
            }
        );
        // no route methods, so no class path is needed.
        assert!(read_controller(&HELPERS).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_default() {
        let error = read_controller(&BAD_DEFAULT).unwrap_err();
        assert_eq!(
            error,
            BindError::InvalidDefault {
                controller: "Pages",
                method: "list",
                parameter: "limit",
                default: "twenty",
                target: TypeDescriptor::Int32,
            }
        );
    }

    #[test]
    fn test_reads_body() {
        let method = &USERS.methods[0];
        assert!(!method.reads_body(Verb::Get));
        assert!(method.reads_body(Verb::Post));
    }

    #[test]
    fn test_descriptor_display() {
        static ELEMENTS: [TypeDescriptor; 1] = [TypeDescriptor::UserDefined("User")];
        let generic = TypeDescriptor::Generic {
            container: "Vec",
            elements: &ELEMENTS,
        };
        assert_eq!(generic.to_string(), "Vec<User>");
        assert_eq!(TypeDescriptor::Int32.to_string(), "int32");
    }
}
