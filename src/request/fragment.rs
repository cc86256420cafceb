use crate::router::Route;
use std::ops::Range;
use std::sync::Arc;

/// The named captures of the route that matched a request.
///
/// This is inserted as an extension on the request by the router, and read
/// back by [`crate::Request::fragment_str`] and the exchange's path map.
#[derive(Debug, Clone)]
pub struct Fragment {
    base: String,
    captures: Vec<(Arc<str>, Range<usize>)>,
}

impl Fragment {
    pub(crate) fn new(path: impl Into<String>, route: &Route) -> Option<Self> {
        let path = path.into();
        let found = route.pattern.regex().captures(&path)?;
        let captures = route
            .pattern
            .match_keys()
            .iter()
            .zip(found.iter())
            .filter_map(|(key, group)| Some((key.clone()?, group?.range())))
            .collect();

        Some(Fragment {
            base: path,
            captures,
        })
    }

    /// The value captured under the given name, if the route declared it and
    /// it matched.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, range)| &self.base[range.clone()])
    }

    /// Every named capture, in template order.
    pub fn named(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.captures
            .iter()
            .map(move |(key, range)| (&**key, &self.base[range.clone()]))
    }
}
