//! HTML5 parser using html5ever
//!
//! The sanitizer, the placeholder scanner and the markup converter all work
//! on HTML *fragments*: cooked output, user-supplied inline HTML, pasted
//! content. html5ever parses them as documents following the WHATWG
//! algorithm, so malformed markup (unclosed tags, misnested formatting,
//! stray end tags) is repaired exactly the way a browser would repair it.
//! [`fragment_children`] then flattens the synthesized `<head>` and `<body>`
//! back into the node sequence the author wrote.
//!
//! # Examples
//!
//! ```rust
//! use cooked_markup::parser::{fragment_children, parse_html};
//!
//! let dom = parse_html("<p>Hello <b>world");
//! let nodes = fragment_children(&dom);
//! assert_eq!(nodes.len(), 1);
//! ```
//!
//! # Configuration
//!
//! The parser uses default html5ever configuration:
//! - **Scripting**: Disabled (scripts are not executed)
//! - **Error Handling**: Errors are collected but parsing continues
//! - **Tree Builder**: Uses RcDom for reference-counted DOM nodes

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse an HTML string into a DOM tree
///
/// Never fails: html5ever recovers from every malformed input.
pub fn parse_html(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// Return the top-level nodes of a parsed fragment in document order
///
/// Children of the synthesized `<head>` come first (the parser hoists
/// leading `<style>`, `<script>`, `<meta>` there), followed by the children
/// of `<body>` or `<frameset>`.
pub fn fragment_children(dom: &RcDom) -> Vec<Handle> {
    let mut nodes = Vec::new();
    for child in dom.document.children.borrow().iter() {
        if element_name(child).as_deref() != Some("html") {
            continue;
        }
        for section in child.children.borrow().iter() {
            match element_name(section).as_deref() {
                Some("head") | Some("body") | Some("frameset") => {
                    nodes.extend(section.children.borrow().iter().cloned());
                }
                _ => nodes.push(section.clone()),
            }
        }
    }
    nodes
}

/// Lowercase local name of an element node, `None` for other node kinds
pub fn element_name(node: &Handle) -> Option<String> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(name.local.as_ref().to_string()),
        _ => None,
    }
}

/// Value of attribute `attr` on an element node
pub fn attr_value(node: &Handle, attr: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Whether the element's `class` attribute lists `class`
pub fn has_class(node: &Handle, class: &str) -> bool {
    attr_value(node, "class")
        .map(|value| value.split_ascii_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

/// Concatenated text of a subtree, collected without recursion
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    let mut stack = vec![node.clone()];
    while let Some(current) = stack.pop() {
        if let NodeData::Text { ref contents } = current.data {
            text.push_str(&contents.borrow());
        }
        for child in current.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }
    text
}
