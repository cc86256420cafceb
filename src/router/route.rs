use super::Pattern;
use crate::metadata::Verb;
use crate::Endpoint;
use std::pin::Pin;

/// A registered route: a verb, a compiled template, and its endpoint.
pub(crate) struct Route {
    pub(crate) path: String,
    pub(crate) pattern: Pattern,
    verb: Verb,
    endpoint: Pin<Box<dyn Endpoint>>,
}

impl Route {
    pub(crate) fn new(verb: Verb, path: String, pattern: Pattern, endpoint: Pin<Box<dyn Endpoint>>) -> Self {
        Route {
            path,
            pattern,
            verb,
            endpoint,
        }
    }

    pub(crate) fn verb(&self) -> Verb {
        self.verb
    }

    pub(crate) fn endpoint(&self) -> &Pin<Box<dyn Endpoint>> {
        &self.endpoint
    }

    pub(crate) fn matches(&self, method: &http::Method) -> bool {
        self.verb.method() == method
    }

    /// Whether both routes answer the same requests.
    pub(crate) fn collides(&self, verb: Verb, pattern: &Pattern) -> bool {
        self.verb == verb && self.pattern.shape() == pattern.shape()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("verb", &self.verb)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
