//! Routing error definitions.

use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors raised while compiling, matching or addressing routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Regex pattern failed to compile.
    #[error("route `{route}`: invalid pattern: {source}")]
    InvalidRegex {
        route: String,
        #[source]
        source: regex::Error,
    },

    /// Regex flag that makes no sense for segment matching.
    #[error("route `{route}`: unsupported regex flag `{flag}`")]
    UnsupportedRegexFlag { route: String, flag: char },

    /// `$parallel.matches` names a route that does not exist.
    #[error("route `{route}`: parallel match `{target}` is not a declared route")]
    UnknownParallelMatch { route: String, target: String },

    /// A custom pattern matched text not followed by `/` or end of path.
    #[error("route `{route}`: pattern match in `{path}` does not end at a path separator")]
    UnterminatedMatch { route: String, path: String },

    /// Path generation found no value for a dynamic segment.
    #[error("route `{route}`: no value for segment `{segment}`")]
    MissingSegment { route: String, segment: String },

    /// Query read on a route that declares no query keys.
    #[error("route `{route}` declares no query keys")]
    NoQueryKeys { route: String },

    /// Query read for a key the route does not declare.
    #[error("route `{route}` does not declare query key `{key}`")]
    UndeclaredQueryKey { route: String, key: String },

    /// Router options failed validation.
    #[error("invalid router options: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    InvalidOptions(Vec<ValidationError>),
}
