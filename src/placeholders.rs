//! Placeholder discovery in cooked HTML
//!
//! Cooked output may reference content the core cannot resolve on its own:
//! onebox links waiting for a preview card, inline oneboxes whose title is
//! not cached yet, and `upload://` references the upload lookup did not
//! know. Collaborators resolve those later and patch the HTML; this module
//! tells them where to look.
//!
//! # Examples
//!
//! ```rust
//! use cooked_markup::placeholders::{find_placeholders, PlaceholderKind};
//!
//! let html = r#"<p><a href="https://example.com" class="onebox" target="_blank">https://example.com</a></p>
//! <p><img src="/images/transparent.png" data-orig-src="upload://a.png"></p>"#;
//! let found = find_placeholders(html);
//!
//! assert_eq!(found.len(), 2);
//! assert_eq!(found[0].kind, PlaceholderKind::Onebox);
//! assert_eq!(found[1].url, "upload://a.png");
//! ```

use crate::features::onebox::{INLINE_ONEBOX_LOADING_CLASS, ONEBOX_CLASS};
use crate::parser::{attr_value, element_name, fragment_children, has_class, parse_html};
use markup5ever_rcdom::Handle;

/// What a placeholder is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// A block onebox link to be replaced by a preview card
    Onebox,
    /// An inline onebox whose title is not known yet
    InlineOnebox,
    /// An image whose `upload://` source did not resolve
    UploadImage,
    /// A link whose `upload://` target did not resolve
    UploadLink,
}

/// One unresolved reference in cooked HTML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    /// The URL a collaborator needs to resolve
    pub url: String,
}

fn classify(node: &Handle, tag: &str) -> Option<Placeholder> {
    let placeholder = |kind, url: Option<String>| url.map(|url| Placeholder { kind, url });
    match tag {
        "img" => placeholder(PlaceholderKind::UploadImage, attr_value(node, "data-orig-src")),
        "a" => {
            if let Some(url) = attr_value(node, "data-orig-href") {
                Some(Placeholder { kind: PlaceholderKind::UploadLink, url })
            } else if has_class(node, ONEBOX_CLASS) {
                placeholder(PlaceholderKind::Onebox, attr_value(node, "href"))
            } else if has_class(node, INLINE_ONEBOX_LOADING_CLASS) {
                placeholder(PlaceholderKind::InlineOnebox, attr_value(node, "href"))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Every placeholder in `html`, in document order
pub fn find_placeholders(html: &str) -> Vec<Placeholder> {
    if !html.contains("onebox") && !html.contains("data-orig-") {
        return Vec::new();
    }
    let dom = parse_html(html);
    let mut found = Vec::new();
    let mut stack: Vec<Handle> = fragment_children(&dom).into_iter().rev().collect();

    while let Some(node) = stack.pop() {
        if let Some(tag) = element_name(&node)
            && let Some(placeholder) = classify(&node, &tag)
        {
            found.push(placeholder);
        }
        stack.extend(node.children.borrow().iter().rev().cloned());
    }
    found
}
