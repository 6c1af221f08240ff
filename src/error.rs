//! Error types for configuration and conversion boundaries
//!
//! Rendering itself never fails: `cook` and `sanitize` degrade malformed
//! input to literal text. These errors surface only where configuration is
//! parsed (allow-list entries, watched-word patterns, feature names) and at
//! the HTML-to-markup parse boundary.

use thiserror::Error;

/// Errors produced while building a pipeline or converting HTML back to markup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// An allow-list entry did not match the `tag`, `tag.class` or `tag[attr=value]` grammar
    #[error("invalid allow-list entry: {0}")]
    InvalidAllowListEntry(String),
    /// A feature name was referenced that no registered feature carries
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
    /// A watched-word or censor pattern failed to compile
    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    /// Input exceeded a static size guard
    #[error("input of {len} bytes exceeds limit of {limit} bytes")]
    InputTooLarge { len: usize, limit: usize },
    /// Invalid input data
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Internal error
    #[error("internal error: {0}")]
    InternalError(String),
}

impl MarkupError {
    /// Get a stable numeric code for the error kind
    pub fn code(&self) -> u32 {
        match self {
            MarkupError::InvalidAllowListEntry(_) => 1,
            MarkupError::UnknownFeature(_) => 2,
            MarkupError::InvalidPattern { .. } => 3,
            MarkupError::InputTooLarge { .. } => 4,
            MarkupError::InvalidInput(_) => 5,
            MarkupError::InternalError(_) => 99,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            MarkupError::InvalidAllowListEntry("x[".into()),
            MarkupError::UnknownFeature("nope".into()),
            MarkupError::InvalidPattern {
                pattern: "(".into(),
                reason: "unclosed group".into(),
            },
            MarkupError::InputTooLarge { len: 10, limit: 5 },
            MarkupError::InvalidInput("empty".into()),
            MarkupError::InternalError("boom".into()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(MarkupError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display() {
        let err = MarkupError::InputTooLarge { len: 10, limit: 5 };
        assert_eq!(err.to_string(), "input of 10 bytes exceeds limit of 5 bytes");
        assert_eq!(
            MarkupError::UnknownFeature("spoiler".into()).to_string(),
            "unknown feature: spoiler"
        );
    }
}
