//! Typographic replacements: arrows, dashes, ellipsis and symbols

use super::{CoreContext, FeatureSpec, TextScope, for_each_inline, map_text};
use crate::patterns::{cached_regex, within_pass_limit};
use crate::token::Token;
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("typographer")
        .enabled_when(|config| config.settings.enable_markdown_typographer)
        .with_post_processor("replacements", apply)
}

const ARROWS: &[(&str, &str)] = &[("<->", "↔"), ("->", "→"), ("<-", "←"), ("=>", "⇒")];

fn dashes() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, "-+")
}

fn symbols() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, r"(?i)\((c|r|tm)\)")
}

/// Apply every replacement to `text`
///
/// # Examples
///
/// ```
/// use cooked_markup::features::typographer::replace_typography;
///
/// assert_eq!(replace_typography("a -> b... (c) 2024 -- ok").as_deref(), Some("a → b… © 2024 – ok"));
/// assert_eq!(replace_typography("plain"), None);
/// ```
pub fn replace_typography(text: &str) -> Option<String> {
    let mut out = text.to_string();
    for (from, to) in ARROWS {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    if out.contains("--")
        && let Some(re) = dashes()
    {
        out = re
            .replace_all(&out, |caps: &Captures<'_>| match caps[0].len() {
                3 => "—".to_string(),
                2 => "–".to_string(),
                _ => caps[0].to_string(),
            })
            .into_owned();
    }
    if out.contains("...") {
        out = out.replace("...", "…");
    }
    if out.contains('(')
        && let Some(re) = symbols()
    {
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                match caps[1].to_ascii_lowercase().as_str() {
                    "c" => "©",
                    "r" => "®",
                    _ => "™",
                }
                .to_string()
            })
            .into_owned();
    }
    if out.contains("+-") {
        out = out.replace("+-", "±");
    }
    (out != text).then_some(out)
}

fn apply(tokens: &mut Vec<Token>, _ctx: &CoreContext<'_>) {
    for_each_inline(tokens, |children| {
        map_text(children, TextScope::OutsideAutolinks, |text| {
            if !within_pass_limit("typographer", text) {
                return None;
            }
            replace_typography(text)
        });
    });
}
