//! Code fences and indented code
//!
//! Fence languages are normalized to a canonical name; anything unknown
//! falls back to the site's default code language. Contents are never
//! parsed, only escaped by the renderer.

use super::{CoreContext, FeatureSpec};
use crate::options::SiteSettings;
use crate::token::Token;

/// Short names mapped to canonical language names
const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("rb", "ruby"),
    ("py", "python"),
    ("sh", "bash"),
    ("shell", "bash"),
    ("yml", "yaml"),
    ("md", "markdown"),
    ("ts", "typescript"),
    ("c++", "cpp"),
    ("cs", "csharp"),
    ("rs", "rust"),
    ("htm", "html"),
];

/// Pseudo-languages always accepted
const ALWAYS_ACCEPTED: &[&str] = &["auto", "text", "plaintext", "nohighlight"];

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("code-block")
        .with_allow_list(["pre", "code", "code.lang-*"])
        .with_post_processor("code_block", apply)
}

/// Canonical language for a fence info string
///
/// # Examples
///
/// ```
/// use cooked_markup::features::code_block::resolve_language;
/// use cooked_markup::options::SiteSettings;
///
/// let settings = SiteSettings::default();
/// assert_eq!(resolve_language("rb", &settings), "ruby");
/// assert_eq!(resolve_language("klingon", &settings), "auto");
/// assert_eq!(resolve_language("", &settings), "auto");
/// ```
pub fn resolve_language(info: &str, settings: &SiteSettings) -> String {
    let Some(raw) = info.split_whitespace().next() else {
        return settings.default_code_lang.clone();
    };
    let lower = raw.to_lowercase();
    let canonical = LANGUAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(lower.as_str(), |(_, name)| name);

    let known = ALWAYS_ACCEPTED.contains(&canonical)
        || settings.highlighted_languages.iter().any(|l| l == canonical);
    if known {
        canonical.to_string()
    } else {
        settings.default_code_lang.clone()
    }
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    for token in tokens.iter_mut() {
        if token.kind != "fence" && token.kind != "code_block" {
            continue;
        }
        let lang = resolve_language(&token.info, &ctx.options.settings);
        token.set_attr("class", format!("lang-{lang}"));
    }
}
