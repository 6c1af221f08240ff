//! Shared regex plumbing and the size guard for regex-heavy passes

use crate::error::MarkupError;
use regex::Regex;
use std::sync::OnceLock;

/// Text runs longer than this skip the watched-word, censor and
/// typographer passes and are left unchanged
pub const MAX_REGEX_PASS_LEN: usize = 64 * 1024;

/// Compile `pattern` once into `cell`
///
/// Returns `None` if the pattern does not compile; callers treat that as
/// "rule never matches".
pub(crate) fn cached_regex(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Whether a text run is small enough for a regex pass
pub(crate) fn within_pass_limit(pass: &'static str, text: &str) -> bool {
    if text.len() > MAX_REGEX_PASS_LEN {
        let err = MarkupError::InputTooLarge {
            len: text.len(),
            limit: MAX_REGEX_PASS_LEN,
        };
        tracing::debug!(pass, error = %err, "skipping oversized text run");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_regex_compiles_once() {
        static CELL: OnceLock<Option<Regex>> = OnceLock::new();
        let first = cached_regex(&CELL, "a+").map(|r| r as *const Regex);
        let second = cached_regex(&CELL, "ignored").map(|r| r as *const Regex);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_pattern_is_none() {
        static CELL: OnceLock<Option<Regex>> = OnceLock::new();
        assert!(cached_regex(&CELL, "(").is_none());
    }

    #[test]
    fn test_pass_limit() {
        assert!(within_pass_limit("test", "short"));
        assert!(!within_pass_limit("test", &"x".repeat(MAX_REGEX_PASS_LEN + 1)));
    }
}
