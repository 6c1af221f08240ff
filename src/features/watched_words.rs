//! Watched words: site-configured replacements and auto-links
//!
//! Patterns are compiled once per pipeline into [`CompiledWords`], which
//! also carries the combined censor pattern used by the `censored` feature.

use super::{CoreContext, FeatureSpec, TextScope, for_each_inline, map_text, rewrite_text_tokens};
use crate::error::MarkupError;
use crate::options::PipelineConfig;
use crate::patterns::within_pass_limit;
use crate::sanitizer::safe_url;
use crate::token::{Nesting, Token};
use regex::{Regex, RegexBuilder};

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("watched-words")
        .enabled_when(|config| {
            !config.watched_words_replace.is_empty() || !config.watched_words_link.is_empty()
        })
        .with_post_processor("watched_words", apply)
}

/// Compile a case-insensitive watched-word pattern
///
/// # Examples
///
/// ```
/// use cooked_markup::features::watched_words::compile_pattern;
///
/// assert!(compile_pattern("ca(t|r)").unwrap().is_match("CAT"));
/// assert!(compile_pattern("(").is_err());
/// ```
pub fn compile_pattern(source: &str) -> Result<Regex, MarkupError> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|err| MarkupError::InvalidPattern {
            pattern: source.to_string(),
            reason: err.to_string(),
        })
}

/// Watched-word and censor patterns ready for matching
#[derive(Debug, Default)]
pub struct CompiledWords {
    pub replace: Vec<(Regex, String)>,
    pub link: Vec<(Regex, String)>,
    pub censor: Option<Regex>,
}

impl CompiledWords {
    /// Compile every configured pattern, skipping the ones that fail
    pub fn compile(config: &PipelineConfig<'_>) -> Self {
        let replace = compile_pairs(config.watched_words_replace);
        let link = compile_pairs(config.watched_words_link);

        let valid: Vec<&str> = config
            .censored_patterns
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty() && keep(compile_pattern(p)).is_some())
            .collect();
        let censor = if valid.is_empty() {
            None
        } else {
            let combined = valid
                .iter()
                .map(|p| format!("(?:{p})"))
                .collect::<Vec<_>>()
                .join("|");
            keep(compile_pattern(&combined))
        };

        Self { replace, link, censor }
    }

    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.link.is_empty() && self.censor.is_none()
    }
}

fn keep(result: Result<Regex, MarkupError>) -> Option<Regex> {
    match result {
        Ok(regex) => Some(regex),
        Err(err) => {
            tracing::warn!(error = %err, "skipping invalid watched-word pattern");
            None
        }
    }
}

fn compile_pairs(pairs: &[(String, String)]) -> Vec<(Regex, String)> {
    pairs
        .iter()
        .filter(|(pattern, _)| !pattern.is_empty())
        .filter_map(|(pattern, value)| keep(compile_pattern(pattern)).map(|re| (re, value.clone())))
        .collect()
}

/// Replace every non-empty match of `re` with `replacement` taken literally
pub fn replace_matches(text: &str, re: &Regex, replacement: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut matched = false;
    for found in re.find_iter(text).filter(|m| !m.is_empty()) {
        out.push_str(&text[last..found.start()]);
        out.push_str(replacement);
        last = found.end();
        matched = true;
    }
    if !matched {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

fn link_matches(text: &str, re: &Regex, target: &str) -> Option<Vec<Token>> {
    let href = safe_url("a", "href", target)?;
    let mut tokens = Vec::new();
    let mut last = 0;
    for found in re.find_iter(text).filter(|m| !m.is_empty()) {
        if found.start() > last {
            tokens.push(Token::text(&text[last..found.start()]));
        }
        tokens.push(Token::new("link_open", "a", Nesting::Open).with_attr("href", href.clone()));
        tokens.push(Token::text(found.as_str()));
        tokens.push(Token::new("link_close", "a", Nesting::Close));
        last = found.end();
    }
    if tokens.is_empty() {
        return None;
    }
    if last < text.len() {
        tokens.push(Token::text(&text[last..]));
    }
    Some(tokens)
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    let words = ctx.words;
    for_each_inline(tokens, |children| {
        for (re, replacement) in &words.replace {
            map_text(children, TextScope::OutsideLinks, |text| {
                if !within_pass_limit("watched_words", text) {
                    return None;
                }
                replace_matches(text, re, replacement)
            });
        }
        for (re, target) in &words.link {
            rewrite_text_tokens(children, TextScope::OutsideLinks, |text| {
                if !within_pass_limit("watched_words", text) {
                    return None;
                }
                link_matches(text, re, target)
            });
        }
    });
}
