//! Route match patterns.
//!
//! # Responsibilities
//! - Compile declared `$match` values (literal, `*`, `**`, regex)
//! - Match a pattern against the next segment(s) of a path
//!
//! # Design Decisions
//! - Paths handed to patterns carry no leading `/`
//! - Regexes are anchored at the current position
//! - A regex whose match stops inside a segment is a configuration error,
//!   not a silent no-match

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::config::schema::MatchDecl;
use crate::routing::error::RouteError;

/// A compiled match pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches one segment equal to the literal.
    Literal(String),
    /// `*`: one non-empty segment.
    Segment,
    /// `**`: the rest of the path, zero or more segments.
    Rest,
    /// Custom regular expression.
    Regex { source: String, regex: Regex },
}

impl Pattern {
    /// Compiles the declared matcher of `route`, falling back to `derived`.
    pub fn compile(
        route: &str,
        decl: Option<&MatchDecl>,
        derived: impl FnOnce() -> String,
    ) -> Result<Self, RouteError> {
        match decl {
            None => Ok(Pattern::Literal(derived())),
            Some(MatchDecl::Literal(text)) => Ok(match text.as_str() {
                "*" => Pattern::Segment,
                "**" => Pattern::Rest,
                _ => Pattern::Literal(text.clone()),
            }),
            Some(MatchDecl::Regex { regex, flags }) => compile_regex(route, regex, flags),
        }
    }

    /// Matches the start of `path`.
    ///
    /// Returns the captured text and the remaining path (separator
    /// stripped), or `None` when the pattern does not apply.
    pub fn match_at<'p>(
        &self,
        route: &str,
        path: &'p str,
    ) -> Result<Option<(&'p str, &'p str)>, RouteError> {
        let (segment, rest) = split_segment(path);
        match self {
            Pattern::Literal(literal) => Ok((segment == literal.as_str()).then_some((segment, rest))),
            Pattern::Segment => Ok((!segment.is_empty()).then_some((segment, rest))),
            Pattern::Rest => Ok(Some((path, ""))),
            Pattern::Regex { regex, .. } => {
                let Some(found) = regex.find(path) else {
                    return Ok(None);
                };
                let after = &path[found.end()..];
                if after.is_empty() {
                    Ok(Some((found.as_str(), "")))
                } else if let Some(rest) = after.strip_prefix('/') {
                    Ok(Some((found.as_str(), rest)))
                } else {
                    Err(RouteError::UnterminatedMatch {
                        route: route.to_string(),
                        path: path.to_string(),
                    })
                }
            }
        }
    }

    /// The fixed text this pattern always matches, if any.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Pattern::Literal(text) => Some(text),
            _ => None,
        }
    }

    /// `**` consumes everything below it.
    pub fn is_rest(&self) -> bool {
        matches!(self, Pattern::Rest)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "{:?}", text),
            Pattern::Segment => f.write_str("*"),
            Pattern::Rest => f.write_str("**"),
            Pattern::Regex { source, .. } => write!(f, "/{}/", source),
        }
    }
}

fn split_segment(path: &str) -> (&str, &str) {
    match path.split_once('/') {
        Some((segment, rest)) => (segment, rest),
        None => (path, ""),
    }
}

fn compile_regex(route: &str, source: &str, flags: &str) -> Result<Pattern, RouteError> {
    let anchored = format!("^(?:{})", source);
    let mut builder = RegexBuilder::new(&anchored);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'u' => builder.unicode(true),
            _ => {
                return Err(RouteError::UnsupportedRegexFlag {
                    route: route.to_string(),
                    flag,
                })
            }
        };
    }
    let regex = builder.build().map_err(|source| RouteError::InvalidRegex {
        route: route.to_string(),
        source,
    })?;
    Ok(Pattern::Regex {
        source: source.to_string(),
        regex,
    })
}
