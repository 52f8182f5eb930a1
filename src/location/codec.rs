//! Location and query parsing.

use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

/// A path plus query string, as reported by a history provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location {
    /// Path part, always starting with `/`.
    pub pathname: String,
    /// Query part without the leading `?`.
    pub search: String,
}

impl Location {
    pub fn new(pathname: impl Into<String>, search: impl Into<String>) -> Self {
        let mut pathname = pathname.into();
        if !pathname.starts_with('/') {
            pathname.insert(0, '/');
        }
        let search = search.into();
        let search = search.strip_prefix('?').unwrap_or(&search).to_string();
        Self { pathname, search }
    }

    /// Splits `"/path?query"` into a location.
    pub fn parse(href: &str) -> Self {
        match href.split_once('?') {
            Some((path, search)) => Self::new(path, search),
            None => Self::new(href, ""),
        }
    }

    /// Decoded query of this location.
    pub fn query(&self) -> Query {
        Query::parse(&self.search)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.search.is_empty() {
            write!(f, "{}", self.pathname)
        } else {
            write!(f, "{}?{}", self.pathname, self.search)
        }
    }
}

impl FromStr for Location {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Location {
    fn from(href: &str) -> Self {
        Self::parse(href)
    }
}

/// Ordered query parameters. A repeated key keeps its first position and its
/// last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn parse(search: &str) -> Self {
        let search = search.strip_prefix('?').unwrap_or(search);
        let mut query = Query::default();
        for (key, value) in form_urlencoded::parse(search.as_bytes()) {
            query.insert(key.into_owned(), value.into_owned());
        }
        query
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encodes back into a search string (no leading `?`).
    pub fn to_search(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// Returns the remainder of `pathname` when it lies under `prefix`.
///
/// No prefix, or the root prefix `/`, accepts every path unchanged.
pub fn strip_prefix<'a>(pathname: &'a str, prefix: Option<&str>) -> Option<&'a str> {
    match normalize_prefix(prefix) {
        None => Some(pathname),
        Some(prefix) => pathname
            .strip_prefix(prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/')),
    }
}

/// Drops a prefix that filters nothing (`/` or empty).
pub fn normalize_prefix(prefix: Option<&str>) -> Option<&str> {
    prefix.filter(|prefix| !prefix.is_empty() && *prefix != "/")
}
