//! Allow-list sanitization of HTML fragments
//!
//! Cooked HTML is displayed verbatim, so everything that leaves the pipeline
//! passes through this module. The sanitizer re-parses its input with
//! html5ever and re-serializes only what the resolved allow list permits.
//!
//! # Element handling
//!
//! | Element                                   | Action                              |
//! |-------------------------------------------|-------------------------------------|
//! | `script`, `style`, `template`             | removed with contents               |
//! | `textarea`, `button`, `canvas`, `progress`| replaced by their text              |
//! | `iframe` with an allowed `src` prefix     | kept (children dropped)             |
//! | any other `iframe`                        | removed with contents               |
//! | tag missing from the allow list           | unwrapped (children promoted)       |
//! | table internals outside a kept `table`    | unwrapped                           |
//! | allowed tag                               | kept with filtered attributes       |
//!
//! Comments, doctypes and processing instructions never survive.
//!
//! # Attribute handling
//!
//! - Event handlers (`on*`) and namespaced attributes are always dropped.
//! - `class` is filtered class by class.
//! - URL attributes reject every scheme except `http`, `https`, `mailto`,
//!   `ftp`, `tel`, `upload` and relative URLs (`img[src]` also accepts
//!   raster `data:image/*`); bare single quotes are escaped as `%27`.
//! - Heading `id` survives only in the `heading--slug` form.
//! - `video[autoplay]` always gets `muted`.
//!
//! # Idempotence
//!
//! A sanitize call re-cleans its own output until it stops changing, so
//! `sanitize(sanitize(h)) == sanitize(h)` holds even when the parser
//! re-normalizes what an earlier pass emitted.

use crate::allow_list::{ResolvedAllowList, DEFAULT_ALLOWED_IFRAMES};
use crate::parser::{attr_value, fragment_children, parse_html, text_content};
use html5ever::Attribute;
use markup5ever_rcdom::{Handle, NodeData};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum element depth kept as structure; deeper elements are unwrapped
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Upper bound on re-cleaning passes before giving up on a fixed point
const MAX_PASSES: usize = 8;

/// Elements removed together with their contents
const DROPPED_ELEMENTS: &[&str] = &["script", "style", "template"];

/// Elements replaced by their text content
const TEXT_ONLY_ELEMENTS: &[&str] = &["textarea", "button", "canvas", "progress"];

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements that only make sense inside a `table`
const TABLE_INTERNAL_ELEMENTS: &[&str] = &[
    "caption", "colgroup", "col", "thead", "tbody", "tfoot", "tr", "td", "th",
];

/// Attributes whose values are URLs
const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "poster",
    "cite",
    "srcset",
    "data-orig-src",
    "data-orig-href",
];

/// URL schemes accepted in URL attributes
const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto", "ftp", "tel", "upload"];

/// `data:` prefixes accepted for `img[src]`
const SAFE_DATA_IMAGE_PREFIXES: &[&str] = &[
    "data:image/png",
    "data:image/gif",
    "data:image/jpeg",
    "data:image/jpg",
    "data:image/webp",
];

/// Action to take when sanitizing an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeAction {
    /// Keep the element with its allowed attributes
    Keep,
    /// Drop the element but keep its children
    Unwrap,
    /// Remove the element and all its children
    Remove,
    /// Replace the element with its text content
    ReplaceWithText,
}

enum Frame {
    Enter {
        node: Handle,
        depth: usize,
        in_table: bool,
    },
    Close(String),
}

/// Allow-list sanitizer
///
/// Built once per resolved allow list; [`Sanitizer::sanitize`] is a pure
/// function of its input.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    allow_list: ResolvedAllowList,
    allowed_iframes: Vec<String>,
    max_depth: usize,
}

impl Sanitizer {
    /// Create a sanitizer enforcing `allow_list` with the default iframe prefixes
    pub fn new(allow_list: ResolvedAllowList) -> Self {
        Self {
            allow_list,
            allowed_iframes: DEFAULT_ALLOWED_IFRAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Replace the allowed iframe `src` prefixes
    pub fn with_allowed_iframes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_iframes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Create a sanitizer with custom maximum depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The allow list this sanitizer enforces
    pub fn allow_list(&self) -> &ResolvedAllowList {
        &self.allow_list
    }

    /// Sanitize an HTML fragment
    ///
    /// # Examples
    ///
    /// ```
    /// use cooked_markup::allow_list::AllowListBuilder;
    /// use cooked_markup::sanitizer::Sanitizer;
    ///
    /// let sanitizer = Sanitizer::new(AllowListBuilder::with_defaults().get_allow_list());
    /// assert_eq!(
    ///     sanitizer.sanitize("<p onclick=\"x()\">hi<script>alert(1)</script></p>"),
    ///     "<p>hi</p>"
    /// );
    /// assert_eq!(sanitizer.sanitize("<iframe src=\"http://evil.com\"></iframe>"), "");
    /// ```
    pub fn sanitize(&self, html: &str) -> String {
        let mut current = self.clean_once(html);
        for _ in 1..MAX_PASSES {
            let next = self.clean_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
        tracing::debug!(len = current.len(), "sanitizer stopped before a fixed point");
        current
    }

    /// Decide what to do with an element
    ///
    /// # Arguments
    ///
    /// * `tag` - Lowercase tag name
    /// * `node` - The element node, consulted for `iframe` sources
    /// * `depth` - Element depth below the fragment root
    /// * `in_table` - Whether a kept `table` encloses the element
    pub fn element_action(
        &self,
        tag: &str,
        node: &Handle,
        depth: usize,
        in_table: bool,
    ) -> SanitizeAction {
        if DROPPED_ELEMENTS.contains(&tag) {
            return SanitizeAction::Remove;
        }
        if TEXT_ONLY_ELEMENTS.contains(&tag) {
            return SanitizeAction::ReplaceWithText;
        }
        if tag == "iframe" {
            return if self.allow_list.allows_tag("iframe") && self.iframe_allowed(node) {
                SanitizeAction::Keep
            } else {
                SanitizeAction::Remove
            };
        }
        if depth >= self.max_depth || !self.allow_list.allows_tag(tag) {
            return SanitizeAction::Unwrap;
        }
        if !in_table && TABLE_INTERNAL_ELEMENTS.contains(&tag) {
            return SanitizeAction::Unwrap;
        }
        SanitizeAction::Keep
    }

    fn iframe_allowed(&self, node: &Handle) -> bool {
        match attr_value(node, "src") {
            Some(src) => {
                safe_url("iframe", "src", &src).is_some()
                    && self
                        .allowed_iframes
                        .iter()
                        .any(|prefix| !prefix.is_empty() && src.starts_with(prefix.as_str()))
            }
            None => false,
        }
    }

    /// Keep only the attributes the allow list permits for `tag`
    pub fn filter_attributes(&self, tag: &str, attrs: &[Attribute]) -> Vec<(String, String)> {
        let mut kept: Vec<(String, String)> = Vec::with_capacity(attrs.len());

        for attr in attrs {
            if attr.name.prefix.is_some() {
                continue;
            }
            let name = attr.name.local.as_ref();
            let value: &str = &attr.value;
            if is_event_handler(name) {
                continue;
            }

            let kept_value = if name == "class" {
                let classes: Vec<&str> = value
                    .split_ascii_whitespace()
                    .filter(|class| self.allow_list.allows_attr_value(tag, "class", class))
                    .collect();
                if classes.is_empty() {
                    continue;
                }
                classes.join(" ")
            } else if name == "id" && is_heading(tag) {
                if !self.allow_list.allows_attr(tag, "id") || !is_heading_id(value) {
                    continue;
                }
                value.to_string()
            } else if URL_ATTRIBUTES.contains(&name) {
                match safe_url(tag, name, value) {
                    Some(url) if self.allow_list.allows_attr_value(tag, name, &url) => url,
                    _ => continue,
                }
            } else if self.allow_list.allows_attr_value(tag, name, value) {
                value.to_string()
            } else {
                continue;
            };

            kept.push((name.to_string(), kept_value));
        }

        if tag == "video"
            && kept.iter().any(|(name, _)| name == "autoplay")
            && !kept.iter().any(|(name, _)| name == "muted")
        {
            kept.push(("muted".to_string(), String::new()));
        }

        kept
    }

    fn clean_once(&self, html: &str) -> String {
        let dom = parse_html(html);
        let mut out = String::with_capacity(html.len());
        let mut stack: Vec<Frame> = fragment_children(&dom)
            .into_iter()
            .rev()
            .map(|node| Frame::Enter {
                node,
                depth: 0,
                in_table: false,
            })
            .collect();

        while let Some(frame) = stack.pop() {
            let (node, depth, in_table) = match frame {
                Frame::Close(tag) => {
                    out.push_str("</");
                    out.push_str(&tag);
                    out.push('>');
                    continue;
                }
                Frame::Enter {
                    node,
                    depth,
                    in_table,
                } => (node, depth, in_table),
            };

            match node.data {
                NodeData::Text { ref contents } => escape_text_into(&contents.borrow(), &mut out),
                NodeData::Element {
                    ref name,
                    ref attrs,
                    ..
                } => {
                    let tag = name.local.as_ref().to_ascii_lowercase();
                    match self.element_action(&tag, &node, depth, in_table) {
                        SanitizeAction::Remove => {}
                        SanitizeAction::ReplaceWithText => {
                            escape_text_into(&text_content(&node), &mut out)
                        }
                        SanitizeAction::Unwrap => push_children(&mut stack, &node, depth + 1, in_table),
                        SanitizeAction::Keep => {
                            let kept = self.filter_attributes(&tag, &attrs.borrow());
                            write_open_tag(&tag, &kept, &mut out);
                            if VOID_ELEMENTS.contains(&tag.as_str()) {
                                continue;
                            }
                            if tag == "iframe" {
                                out.push_str("</iframe>");
                                continue;
                            }
                            if tag == "pre" && first_text_starts_with_newline(&node) {
                                out.push('\n');
                            }
                            let child_in_table = in_table || tag == "table";
                            stack.push(Frame::Close(tag));
                            push_children(&mut stack, &node, depth + 1, child_in_table);
                        }
                    }
                }
                _ => {}
            }
        }

        out
    }
}

fn push_children(stack: &mut Vec<Frame>, node: &Handle, depth: usize, in_table: bool) {
    for child in node.children.borrow().iter().rev() {
        stack.push(Frame::Enter {
            node: child.clone(),
            depth,
            in_table,
        });
    }
}

fn first_text_starts_with_newline(node: &Handle) -> bool {
    node.children
        .borrow()
        .first()
        .map(|child| match child.data {
            NodeData::Text { ref contents } => contents.borrow().starts_with('\n'),
            _ => false,
        })
        .unwrap_or(false)
}

fn write_open_tag(tag: &str, attrs: &[(String, String)], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        if !value.is_empty() {
            out.push_str("=\"");
            escape_attr_into(value, out);
            out.push('"');
        }
    }
    out.push('>');
}

/// Check if an attribute is an event handler
///
/// # Examples
///
/// ```
/// use cooked_markup::sanitizer::is_event_handler;
///
/// assert!(is_event_handler("onclick"));
/// assert!(is_event_handler("ONLOAD"));
/// assert!(!is_event_handler("href"));
/// ```
pub fn is_event_handler(attr_name: &str) -> bool {
    attr_name.len() > 2
        && attr_name
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

fn is_heading(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn is_heading_id(value: &str) -> bool {
    static HEADING_ID: OnceLock<Option<Regex>> = OnceLock::new();
    HEADING_ID
        .get_or_init(|| Regex::new(r"^heading--[\w-]+$").ok())
        .as_ref()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// Scheme of a URL after browsers strip whitespace and control characters
fn url_scheme(url: &str) -> Option<String> {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    let colon = compact.find(':')?;
    let delimiter = compact.find(['/', '?', '#']).unwrap_or(usize::MAX);
    if colon < delimiter {
        Some(compact[..colon].to_ascii_lowercase())
    } else {
        None
    }
}

/// Check if a URL uses a scheme the sanitizer refuses
///
/// # Examples
///
/// ```
/// use cooked_markup::sanitizer::is_dangerous_url;
///
/// assert!(is_dangerous_url("javascript:alert('xss')"));
/// assert!(is_dangerous_url(" JaVa\tScRiPt:alert(1)"));
/// assert!(is_dangerous_url("data:text/html,<script>"));
/// assert!(!is_dangerous_url("https://example.com"));
/// assert!(!is_dangerous_url("/relative/path"));
/// ```
pub fn is_dangerous_url(url: &str) -> bool {
    match url_scheme(url) {
        Some(scheme) => !ALLOWED_URL_SCHEMES.contains(&scheme.as_str()),
        None => false,
    }
}

/// Validate a URL attribute value, returning the value to emit
///
/// Returns `None` when the URL must be dropped. Bare single quotes are
/// percent-escaped in the returned value.
pub fn safe_url(tag: &str, attr: &str, url: &str) -> Option<String> {
    let trimmed = url.trim();
    let acceptable = if attr == "srcset" {
        trimmed
            .split(',')
            .filter_map(|candidate| candidate.split_whitespace().next())
            .all(|candidate| !is_dangerous_url(candidate))
    } else if tag == "img"
        && attr == "src"
        && trimmed.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
    {
        let lower = trimmed.to_ascii_lowercase();
        SAFE_DATA_IMAGE_PREFIXES.iter().any(|p| lower.starts_with(p))
    } else {
        !is_dangerous_url(trimmed)
    };

    if acceptable {
        Some(trimmed.replace('\'', "%27"))
    } else {
        None
    }
}

/// Escape text content for HTML
pub fn escape_text_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Escape a double-quoted attribute value
///
/// An `&` that starts a query parameter (`&name=`) is written as is: an
/// attribute value never decodes a reference followed by `=` or an
/// alphanumeric, so `src="...?a=1&b=2"` keeps its bytes. Every other `&`
/// is escaped.
///
/// # Examples
///
/// ```
/// use cooked_markup::sanitizer::escape_attr_into;
///
/// let mut out = String::new();
/// escape_attr_into("/x?a=1&b=2&copy;\"", &mut out);
/// assert_eq!(out, "/x?a=1&b=2&amp;copy;&quot;");
/// ```
pub fn escape_attr_into(value: &str, out: &mut String) {
    for (i, c) in value.char_indices() {
        match c {
            '&' if starts_query_parameter(&value[i + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn starts_query_parameter(rest: &str) -> bool {
    let name = rest.bytes().take_while(u8::is_ascii_alphanumeric).count();
    name > 0 && rest.as_bytes().get(name) == Some(&b'=')
}
