//! Bare URLs in running text become links

use super::{CoreContext, FeatureSpec, TextScope, for_each_inline, rewrite_text_tokens};
use crate::patterns::{cached_regex, within_pass_limit};
use crate::sanitizer::safe_url;
use crate::token::{Nesting, Token};
use regex::Regex;
use std::sync::OnceLock;

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("linkify")
        .enabled_when(|config| config.settings.enable_markdown_linkify)
        .with_post_processor("linkify", apply)
}

fn url_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, r"(?i)\b(?:https?://|www\.)[^\s<>]+")
}

/// Drop trailing punctuation that is more likely prose than URL
fn trim_url(url: &str) -> &str {
    let mut end = url.len();
    loop {
        let current = &url[..end];
        let Some(last) = current.chars().next_back() else {
            break;
        };
        let strip = match last {
            '.' | ',' | ':' | ';' | '!' | '?' | '\'' | '"' | '*' | '_' => true,
            ')' => current.matches(')').count() > current.matches('(').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }
    &url[..end]
}

/// Split `text` around the URLs it contains
///
/// Returns `None` when there is nothing to link.
pub fn linkify_text(text: &str) -> Option<Vec<Token>> {
    if !within_pass_limit("linkify", text) {
        return None;
    }
    let re = url_regex()?;
    let mut tokens = Vec::new();
    let mut last = 0;

    for found in re.find_iter(text) {
        let url = trim_url(found.as_str());
        if url.len() <= 4 || url.eq_ignore_ascii_case("www.") {
            continue;
        }
        let target = if url.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("www.")) {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        let Some(href) = safe_url("a", "href", &target) else {
            continue;
        };

        if found.start() > last {
            tokens.push(Token::text(&text[last..found.start()]));
        }
        let mut open = Token::new("link_open", "a", Nesting::Open).with_attr("href", href);
        open.info = "linkify".to_string();
        let mut close = Token::new("link_close", "a", Nesting::Close);
        close.info = "linkify".to_string();
        tokens.push(open);
        tokens.push(Token::text(url));
        tokens.push(close);
        last = found.start() + url.len();
    }

    if tokens.is_empty() {
        return None;
    }
    if last < text.len() {
        tokens.push(Token::text(&text[last..]));
    }
    Some(tokens)
}

fn apply(tokens: &mut Vec<Token>, _ctx: &CoreContext<'_>) {
    for_each_inline(tokens, |children| {
        rewrite_text_tokens(children, TextScope::OutsideLinks, linkify_text);
    });
}
