//! Heading anchors
//!
//! Every heading gets an `id` and a leading empty `<a class="anchor">` link
//! built from a slug of its text.

use super::{CoreContext, FeatureSpec};
use crate::token::{Token, plain_text};
use std::collections::HashMap;

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("anchor")
        .with_allow_list([
            "a.anchor", "a[name]", "h1[id]", "h2[id]", "h3[id]", "h4[id]", "h5[id]", "h6[id]",
        ])
        .with_post_processor("anchor", apply)
}

/// Slug of heading text
///
/// Lowercases, keeps unicode letters and digits, and turns every other run
/// of characters into a single `-`.
///
/// # Examples
///
/// ```
/// use cooked_markup::features::anchor::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("Über Café"), "über-café");
/// assert_eq!(slugify("!!!"), "");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut ordinal = 0usize;

    for idx in 0..tokens.len() {
        if tokens[idx].kind != "heading_open" {
            continue;
        }
        ordinal += 1;
        let Some(inline) = tokens.get(idx + 1).filter(|t| t.kind == "inline") else {
            continue;
        };

        let mut slug = slugify(&plain_text(&inline.children));
        if slug.is_empty() {
            slug = format!("h-{ordinal}");
        }
        if let Some(post_id) = ctx.options.post_id {
            slug = format!("p-{post_id}-{slug}");
        }
        let count = seen.entry(slug.clone()).or_insert(0);
        if *count > 0 {
            slug = format!("{slug}-{count}");
        }
        *count += 1;

        tokens[idx].set_attr("id", format!("heading--{slug}"));
        let anchor = Token::raw_html(format!(
            "<a name=\"{slug}\" class=\"anchor\" href=\"#{slug}\"></a>"
        ));
        tokens[idx + 1].children.insert(0, anchor);
    }
}
