//! Onebox placeholders
//!
//! A top-level paragraph holding nothing but a bare URL becomes a block
//! onebox link that a collaborator later swaps for a preview card. Bare
//! URLs inside running text become inline oneboxes: the injected preview
//! cache supplies a title when it already knows the URL, otherwise the link
//! is marked as still loading. Cache keys are the link URLs.

use super::{CoreContext, FeatureSpec};
use crate::token::Token;

pub const ONEBOX_CLASS: &str = "onebox";
pub const INLINE_ONEBOX_CLASS: &str = "inline-onebox";
pub const INLINE_ONEBOX_LOADING_CLASS: &str = "inline-onebox-loading";

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("onebox")
        .with_allow_list([
            "a.onebox",
            "a.inline-onebox",
            "a.inline-onebox-loading",
        ])
        .with_post_processor("onebox", apply)
}

fn is_bare_link(open: &Token) -> bool {
    open.kind == "link_open" && (open.info == "linkify" || open.info == "autolink")
}

/// Whether `children` is exactly one bare link whose text is its URL
fn is_lone_bare_link(children: &[Token]) -> bool {
    match children {
        [open, text, close] => {
            is_bare_link(open)
                && text.kind == "text"
                && close.kind == "link_close"
                && open.attr("href").is_some_and(|href| {
                    href == text.content || href.strip_prefix("http://") == Some(text.content.as_str())
                })
        }
        _ => false,
    }
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    let inline_enabled = ctx.options.settings.enable_inline_onebox;
    for idx in 0..tokens.len() {
        if tokens[idx].kind != "inline" {
            continue;
        }
        let top_level_paragraph = idx > 0
            && tokens[idx - 1].kind == "paragraph_open"
            && tokens[idx - 1].level == 0
            && !tokens[idx - 1].hidden;
        let children = &mut tokens[idx].children;

        if top_level_paragraph && is_lone_bare_link(children) {
            children[0].add_class(ONEBOX_CLASS);
            children[0].set_attr("target", "_blank");
            continue;
        }
        if inline_enabled {
            mark_inline_oneboxes(children, ctx);
        }
    }
}

fn mark_inline_oneboxes(children: &mut [Token], ctx: &CoreContext<'_>) {
    let mut idx = 0;
    while idx + 2 < children.len() {
        let is_candidate = is_bare_link(&children[idx])
            && children[idx + 1].kind == "text"
            && children[idx + 2].kind == "link_close";
        if !is_candidate {
            idx += 1;
            continue;
        }
        let href = children[idx].attr("href").unwrap_or_default().to_string();
        let title = ctx
            .options
            .preview_cache
            .as_ref()
            .and_then(|cache| cache.get(&href))
            .filter(|title| !title.trim().is_empty());
        match title {
            Some(title) => {
                children[idx].add_class(INLINE_ONEBOX_CLASS);
                children[idx + 1].content = title;
            }
            None => children[idx].add_class(INLINE_ONEBOX_LOADING_CLASS),
        }
        idx += 3;
    }
}
