//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check location-shaped values (prefix, default)
//! - Validate the log level
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::location::{strip_prefix, Location};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("prefix `{0}` must start with `/`")]
    PrefixNotAbsolute(String),

    #[error("prefix `{0}` must not end with `/`")]
    PrefixTrailingSlash(String),

    #[error("default location `{0}` must start with `/`")]
    DefaultNotAbsolute(String),

    #[error("default location `{default}` lies outside prefix `{prefix}`")]
    DefaultOutsidePrefix { default: String, prefix: String },

    #[error("unknown log level `{0}`")]
    UnknownLogLevel(String),
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(prefix) = &config.prefix {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::PrefixNotAbsolute(prefix.clone()));
        } else if prefix.len() > 1 && prefix.ends_with('/') {
            errors.push(ValidationError::PrefixTrailingSlash(prefix.clone()));
        }
    }

    if let Some(default) = &config.default {
        if !default.starts_with('/') {
            errors.push(ValidationError::DefaultNotAbsolute(default.clone()));
        } else if let Some(prefix) = &config.prefix {
            if strip_prefix(&Location::parse(default).pathname, Some(prefix)).is_none() {
                errors.push(ValidationError::DefaultOutsidePrefix {
                    default: default.clone(),
                    prefix: prefix.clone(),
                });
            }
        }
    }

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let config = RouterConfig {
            default: Some("home".into()),
            prefix: Some("app/".into()),
            log_level: "loud".into(),
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::PrefixNotAbsolute("app/".into()),
                ValidationError::DefaultNotAbsolute("home".into()),
                ValidationError::UnknownLogLevel("loud".into()),
            ]
        );
    }

    #[test]
    fn test_default_must_sit_under_prefix() {
        let config = RouterConfig {
            default: Some("/home".into()),
            prefix: Some("/app".into()),
            ..RouterConfig::default()
        };
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::DefaultOutsidePrefix {
                default: "/home".into(),
                prefix: "/app".into(),
            }]
        );
    }

    #[test]
    fn test_root_prefix_is_valid() {
        let config = RouterConfig {
            default: Some("/home?tab=1".into()),
            prefix: Some("/".into()),
            ..RouterConfig::default()
        };
        assert!(validate_config(&config).is_ok());

        let config = RouterConfig {
            default: Some("/application".into()),
            prefix: Some("/app".into()),
            ..RouterConfig::default()
        };
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
