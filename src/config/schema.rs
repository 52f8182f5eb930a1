//! Configuration schema definitions.
//!
//! Two kinds of configuration live here: the route schema (the declarative
//! tree the router is compiled from) and the router options.

use std::fmt;
use std::rc::Rc;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::location::Location;

/// Root router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Location reverted to when a transition is vetoed before anything
    /// was committed.
    pub default: Option<String>,

    /// Only pathnames starting with this prefix are routed.
    pub prefix: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default: None,
            prefix: None,
            log_level: "info".to_string(),
        }
    }
}

pub type SegmentMatcher = Rc<dyn Fn(&str) -> String>;
pub type LeaveCallback = Rc<dyn Fn(&str)>;
pub type ChangeCallback = Rc<dyn Fn(Option<&Location>, &Location)>;

/// Router construction options: the serializable config plus callbacks.
#[derive(Clone)]
pub struct RouterOptions {
    pub config: RouterConfig,
    /// Derives the match literal of a route from its schema key.
    pub segment_matcher: SegmentMatcher,
    /// Called with the pathname of locations outside the prefix.
    pub on_leave: Option<LeaveCallback>,
    /// Called after every committed transition.
    pub on_change: Option<ChangeCallback>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from_config(RouterConfig::default())
    }
}

impl fmt::Debug for RouterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterOptions")
            .field("config", &self.config)
            .field("on_leave", &self.on_leave.is_some())
            .field("on_change", &self.on_change.is_some())
            .finish_non_exhaustive()
    }
}

impl RouterOptions {
    pub fn from_config(config: RouterConfig) -> Self {
        Self {
            config,
            segment_matcher: Rc::new(|key: &str| key.to_string()),
            on_leave: None,
            on_change: None,
        }
    }

    pub fn default_location(mut self, location: impl Into<String>) -> Self {
        self.config.default = Some(location.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    pub fn segment_matcher(mut self, f: impl Fn(&str) -> String + 'static) -> Self {
        self.segment_matcher = Rc::new(f);
        self
    }

    pub fn on_leave(mut self, f: impl Fn(&str) + 'static) -> Self {
        self.on_leave = Some(Rc::new(f));
        self
    }

    pub fn on_change(mut self, f: impl Fn(Option<&Location>, &Location) + 'static) -> Self {
        self.on_change = Some(Rc::new(f));
        self
    }
}

/// An ordered set of named route declarations.
///
/// Order matters: siblings are matched in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    entries: Vec<(String, RouteDecl)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route. A repeated name replaces the earlier declaration
    /// in place.
    pub fn route(mut self, name: impl Into<String>, decl: RouteDecl) -> Self {
        self.insert(name.into(), decl);
        self
    }

    fn insert(&mut self, name: String, decl: RouteDecl) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = decl,
            None => self.entries.push((name, decl)),
        }
    }

    pub fn entries(&self) -> &[(String, RouteDecl)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of route declarations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Schema, A::Error> {
                let mut schema = Schema::new();
                while let Some((name, decl)) = map.next_entry::<String, RouteDecl>()? {
                    schema.insert(name, decl);
                }
                Ok(schema)
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

/// How a route matches its path segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MatchDecl {
    /// A literal segment, `"*"` (one segment) or `"**"` (the rest).
    Literal(String),
    /// A regular expression anchored at the current segment.
    Regex {
        regex: String,
        #[serde(default)]
        flags: String,
    },
}

/// Restricts which group trees may be active next to a primary match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParallelDecl {
    pub groups: Vec<String>,
    /// Dotted ids of group routes allowed regardless of their group.
    pub matches: Vec<String>,
}

/// Declaration of a single route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteDecl {
    /// `None` derives a literal from the route name.
    pub matcher: Option<MatchDecl>,
    pub query: Vec<String>,
    pub exact: bool,
    /// `None` inherits the parent's group.
    pub group: Option<String>,
    pub children: Option<Schema>,
    pub extension: Map<String, Value>,
    pub parallel: Option<ParallelDecl>,
}

impl RouteDecl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches a literal, `"*"` or `"**"`.
    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.matcher = Some(MatchDecl::Literal(pattern.into()));
        self
    }

    pub fn regex(mut self, regex: impl Into<String>, flags: impl Into<String>) -> Self {
        self.matcher = Some(MatchDecl::Regex {
            regex: regex.into(),
            flags: flags.into(),
        });
        self
    }

    pub fn query<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn children(mut self, children: Schema) -> Self {
        self.children = Some(children);
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extension.insert(key.into(), value.into());
        self
    }

    pub fn parallel<G, M>(mut self, groups: G, matches: M) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        self.parallel = Some(ParallelDecl {
            groups: groups.into_iter().map(Into::into).collect(),
            matches: matches.into_iter().map(Into::into).collect(),
        });
        self
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecl {
    #[serde(rename = "$match")]
    matcher: Option<MatchDecl>,
    #[serde(rename = "$query", default)]
    query: Vec<String>,
    #[serde(rename = "$exact", default)]
    exact: bool,
    #[serde(rename = "$group")]
    group: Option<String>,
    #[serde(rename = "$children")]
    children: Option<Schema>,
    #[serde(rename = "$extension", default)]
    extension: Map<String, Value>,
    #[serde(rename = "$parallel")]
    parallel: Option<ParallelDecl>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Flag(bool),
    Table(RawDecl),
}

impl<'de> Deserialize<'de> for RouteDecl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawEntry::deserialize(deserializer)? {
            RawEntry::Flag(true) => Ok(RouteDecl::default()),
            RawEntry::Flag(false) => Err(de::Error::custom(
                "a route declaration must be `true` or a table",
            )),
            RawEntry::Table(raw) => Ok(RouteDecl {
                matcher: raw.matcher,
                query: raw.query,
                exact: raw.exact,
                group: raw.group,
                children: raw.children,
                extension: raw.extension,
                parallel: raw.parallel,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_schema_keeps_declaration_order() {
        let schema: Schema = serde_json::from_str(
            r#"{
                "zeta": true,
                "alpha": { "$match": "*", "$exact": true },
                "mid": { "$children": { "b": true, "a": true } }
            }"#,
        )
        .unwrap();

        let names: Vec<_> = schema.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);

        let (_, alpha) = &schema.entries()[1];
        assert_eq!(alpha.matcher, Some(MatchDecl::Literal("*".into())));
        assert!(alpha.exact);

        let children = schema.entries()[2].1.children.as_ref().unwrap();
        let names: Vec<_> = children.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_toml_schema_with_regex_and_extension() {
        let schema: Schema = toml::from_str(
            r#"
            [users]
            "$query" = ["tab"]

            [users."$children".user]
            "$match" = { regex = "\\d+", flags = "i" }
            "$extension" = { title = "User" }

            [help]
            "$group" = "side"
            "#,
        )
        .unwrap();

        let (name, users) = &schema.entries()[0];
        assert_eq!(name, "users");
        assert_eq!(users.query, vec!["tab".to_string()]);

        let user = &users.children.as_ref().unwrap().entries()[0].1;
        assert_eq!(
            user.matcher,
            Some(MatchDecl::Regex {
                regex: "\\d+".into(),
                flags: "i".into()
            })
        );
        assert_eq!(user.extension.get("title"), Some(&Value::from("User")));

        assert_eq!(schema.entries()[1].1.group.as_deref(), Some("side"));
    }

    #[test]
    fn test_rejects_false_and_unknown_keys() {
        assert!(serde_json::from_str::<Schema>(r#"{ "a": false }"#).is_err());
        assert!(serde_json::from_str::<Schema>(r#"{ "a": { "$nope": 1 } }"#).is_err());
    }

    #[test]
    fn test_builder_matches_declarative_form() {
        let built = Schema::new()
            .route("default", RouteDecl::new().matching(""))
            .route("about", RouteDecl::new());
        let parsed: Schema =
            serde_json::from_str(r#"{ "default": { "$match": "" }, "about": true }"#).unwrap();
        assert_eq!(built, parsed);
    }
}
