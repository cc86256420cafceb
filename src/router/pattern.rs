use crate::error::BindError;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Clone, Debug)]
/// A compiled path template.  Holds the anchored regular expression, the
/// capture names in group order, and the template's shape: the expression
/// with every capture left anonymous, so that `/users/{id}` and
/// `/users/{name}` are recognised as the same route.
pub(crate) struct Pattern {
    regex: regex::Regex,
    match_keys: Arc<[Option<Arc<str>>]>,
    shape: String,
    specificity: Vec<u8>,
}

impl Pattern {
    pub fn new(template: &str) -> Result<Self, BindError> {
        let invalid = |reason: String| BindError::InvalidPath {
            path: template.to_owned(),
            reason,
        };

        if !template.starts_with('/') {
            return Err(invalid("templates must start with `/`".to_owned()));
        }

        let regex = regex::Regex::new(&regex_pattern(template, true)?)
            .map_err(|e| invalid(e.to_string()))?;
        let match_keys = regex
            .capture_names()
            .map(|v| v.map(Arc::from))
            .collect::<Arc<[_]>>();
        let shape = regex_pattern(template, false)?;

        Ok(Pattern {
            regex,
            match_keys,
            shape,
            specificity: specificity(template),
        })
    }

    /// Get a reference to the pattern's regex.
    pub(crate) fn regex(&self) -> &regex::Regex {
        &self.regex
    }

    /// Get a reference to the pattern's match keys.
    pub(crate) fn match_keys(&self) -> &Arc<[Option<Arc<str>>]> {
        &self.match_keys
    }

    pub(crate) fn shape(&self) -> &str {
        &self.shape
    }

    /// One rank per segment; lower is more specific.  Literal segments rank
    /// before typed captures, which rank before plain captures, which rank
    /// before `path` captures.
    pub(crate) fn specificity(&self) -> &[u8] {
        &self.specificity
    }
}

lazy_static::lazy_static! {
    static ref PATTERN: regex::Regex = regex::Regex::new("\\{(?P<name>[^}:]*)(?::(?P<pattern>[^}]*))?\\}").unwrap();
    static ref NAME: regex::Regex = regex::Regex::new("^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

fn regex_pattern(path: &str, named: bool) -> Result<String, BindError> {
    let mut start = 0;
    let mut buffer = String::with_capacity(path.len() + 2);
    buffer.push('^');

    for capture in PATTERN.captures_iter(path) {
        let whole = capture.get(0).map_or(0..0, |m| m.range());
        buffer.push_str(&regex::escape(&path[start..whole.start]));
        start = whole.end;

        let name = capture.name("name").map_or("", |m| m.as_str());
        if !NAME.is_match(name) {
            return Err(BindError::InvalidPath {
                path: path.to_owned(),
                reason: format!("invalid capture name {:?}", name),
            });
        }

        let name = if named { Some(name) } else { None };
        let pattern = capture.name("pattern").map(|m| m.as_str());
        push_pattern(&mut buffer, name, pattern).map_err(|reason| BindError::InvalidPath {
            path: path.to_owned(),
            reason,
        })?;
    }

    buffer.push_str(&regex::escape(&path[start..]));

    buffer.push('$');
    Ok(buffer)
}

fn specificity(template: &str) -> Vec<u8> {
    template
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            PATTERN
                .captures_iter(segment)
                .map(|capture| match capture.name("pattern").map(|m| m.as_str()) {
                    Some("int" | "uint" | "uuid" | "oext") => 1,
                    Some("path") => 3,
                    _ => 2,
                })
                .max()
                .unwrap_or(0)
        })
        .collect()
}

static UUID_PATTERN: &str =
    "[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12}";

fn push_pattern(buffer: &mut String, name: Option<&str>, pattern: Option<&str>) -> Result<(), String> {
    struct NamePattern<'n>(Option<&'n str>);
    impl std::fmt::Display for NamePattern<'_> {
        fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self.0 {
                Some(n) => write!(fmt, "?P<{}>", n),
                None => Ok(()),
            }
        }
    }
    let name = NamePattern(name);
    let written = match pattern {
        Some("oext") => write!(buffer, "(?:\\.({}[^/]+))?", name),
        Some("int") => write!(buffer, "({}[+-]?\\d+)", name),
        Some("uint") => write!(buffer, "({}\\d+)", name),
        Some("path") => write!(buffer, "({}.+)", name),
        Some("uuid") => write!(buffer, "({}{})", name, UUID_PATTERN),
        Some("str" | "s" | "string") | None => write!(buffer, "({}[^/]+)", name),
        Some(v) => return Err(format!("unknown capture type {:?}", v)),
    };

    written.map_err(|e| e.to_string())
}
