//! Typed errors for configuration loading.
//!
//! Transforming source and resolving stack locations never fail; everything
//! that can go wrong there degrades to "no attribution". Only building a
//! [`crate::Rewriter`] or loading options from JSON can be rejected.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Plugin or runtime options were not valid JSON for the expected shape.
    #[error("invalid configuration JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A monitored name is empty or not a plain identifier.
    #[error("monitored name '{0}' is not a valid identifier")]
    InvalidName(String),

    /// The same identifier was listed in two monitored groups.
    #[error("monitored name '{name}' appears in both '{first}' and '{second}'")]
    OverlappingName {
        name: String,
        first: &'static str,
        second: &'static str,
    },

    /// A pattern built from configuration failed to compile.
    #[error("pattern compilation failed: {0}")]
    Pattern(#[from] regex::Error),
}
