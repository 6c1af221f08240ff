//! HTML back to markup
//!
//! The inverse of cooking, used when pasting rich text into the editor. The
//! input is parsed with html5ever and walked depth-first in document order;
//! known structural tags become their markup equivalents and everything else
//! is a transparent container whose text is kept.
//!
//! # Conversions
//!
//! | HTML                                 | Markup                              |
//! |--------------------------------------|-------------------------------------|
//! | `h1`..`h6`                           | `#`..`######` headings              |
//! | `em`/`i`, `strong`/`b`, `del`/`s`    | `*x*`, `**x**`, `~~x~~`             |
//! | `code`, `pre`                        | code spans, fenced code blocks      |
//! | `a`, `img`                           | `[text](href)`, `![alt](src)`       |
//! | `img.emoji`                          | `:name:`                            |
//! | `a.mention`, `a.mention-group`       | `@name`                             |
//! | `ul`, `ol`, `blockquote`, `table`    | lists, `>` quotes, GFM tables       |
//! | `aside.quote`                        | `[quote="user, post:N, topic:M"]`   |
//! | `script`, `style`, `template`        | dropped with contents               |
//!
//! Decorators registered with [`ToMarkdown::add_tag_decorator`] and
//! [`ToMarkdown::add_block_decorator`] are consulted before the built-ins.
//!
//! # Output normalization
//!
//! LF line endings, no trailing whitespace, at most one blank line between
//! blocks (blank lines inside fenced code survive), exactly one final
//! newline. Input without content converts to an empty string.
//!
//! # Example
//!
//! ```
//! use cooked_markup::to_markdown::ToMarkdown;
//!
//! let converter = ToMarkdown::new();
//! let markup = converter
//!     .convert("<h2>Title</h2><p>Some <strong>bold</strong> text</p>")
//!     .unwrap();
//! assert_eq!(markup, "## Title\n\nSome **bold** text\n");
//! ```

use crate::error::MarkupError;
use crate::parser::{attr_value, element_name, fragment_children, has_class, parse_html, text_content};
use crate::sanitizer::safe_url;
use markup5ever_rcdom::{Handle, NodeData};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Elements deeper than this are flattened to their text
pub const MAX_DEPTH: usize = 256;

/// Elements removed together with their contents
const DROPPED_ELEMENTS: &[&str] = &["script", "style", "template"];

/// Code classes that carry no language
const NO_LANGUAGE: &[&str] = &["auto", "nohighlight", "plaintext", "text"];

/// Element handed to decorators
pub struct Element<'a> {
    node: &'a Handle,
    tag: &'a str,
}

impl Element<'_> {
    /// Lowercase tag name
    pub fn tag(&self) -> &str {
        self.tag
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        attr_value(self.node, name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        has_class(self.node, class)
    }

    /// Concatenated text of the element
    pub fn text(&self) -> String {
        text_content(self.node)
    }
}

/// Receives an element and its converted inner markup; `None` falls back
/// to the built-in conversion
pub type Decorator = Arc<dyn Fn(&Element<'_>, &str) -> Option<String> + Send + Sync>;

/// HTML to markup converter with decorator extension points
#[derive(Clone, Default)]
pub struct ToMarkdown {
    tag_decorators: HashMap<String, Decorator>,
    block_decorators: HashMap<String, Decorator>,
}

impl fmt::Debug for ToMarkdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.tag_decorators.keys().collect();
        let mut blocks: Vec<&String> = self.block_decorators.keys().collect();
        tags.sort();
        blocks.sort();
        f.debug_struct("ToMarkdown")
            .field("tag_decorators", &tags)
            .field("block_decorators", &blocks)
            .finish()
    }
}

impl ToMarkdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an inline decorator for `tag`; its markup is written in place
    pub fn add_tag_decorator<F>(&mut self, tag: &str, decorator: F) -> &mut Self
    where
        F: Fn(&Element<'_>, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.tag_decorators.insert(tag.to_ascii_lowercase(), Arc::new(decorator));
        self
    }

    /// Register a block decorator for `tag`; its markup is separated from
    /// its neighbours by blank lines
    ///
    /// # Examples
    ///
    /// ```
    /// use cooked_markup::to_markdown::ToMarkdown;
    ///
    /// let mut converter = ToMarkdown::new();
    /// converter.add_block_decorator("div", |element, inner| {
    ///     element
    ///         .has_class("spoiler")
    ///         .then(|| format!("[spoiler]{}[/spoiler]", inner.trim()))
    /// });
    /// let markup = converter.convert("<div class=\"spoiler\">secret</div><div>open</div>").unwrap();
    /// assert_eq!(markup, "[spoiler]secret[/spoiler]\n\nopen\n");
    /// ```
    pub fn add_block_decorator<F>(&mut self, tag: &str, decorator: F) -> &mut Self
    where
        F: Fn(&Element<'_>, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.block_decorators.insert(tag.to_ascii_lowercase(), Arc::new(decorator));
        self
    }

    /// Convert an HTML fragment to markup
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidInput`] for empty or whitespace-only input.
    pub fn convert(&self, html: &str) -> Result<String, MarkupError> {
        if html.trim().is_empty() {
            return Err(MarkupError::InvalidInput("empty HTML input".to_string()));
        }
        let dom = parse_html(html);
        let mut output = String::with_capacity(html.len() / 2);
        for node in fragment_children(&dom) {
            self.traverse_node(&node, &mut output, 0);
        }
        Ok(normalize_output(&output))
    }

    fn traverse_node(&self, node: &Handle, output: &mut String, depth: usize) {
        match node.data {
            NodeData::Text { ref contents } => push_text(output, &contents.borrow()),
            NodeData::Element { .. } => self.handle_element(node, output, depth),
            _ => {}
        }
    }

    fn traverse_children(&self, node: &Handle, output: &mut String, depth: usize) {
        for child in node.children.borrow().iter() {
            self.traverse_node(child, output, depth + 1);
        }
    }

    fn children_markup(&self, node: &Handle, depth: usize) -> String {
        let mut inner = String::new();
        self.traverse_children(node, &mut inner, depth);
        inner
    }

    fn handle_element(&self, node: &Handle, output: &mut String, depth: usize) {
        let Some(tag) = element_name(node) else {
            return;
        };
        if DROPPED_ELEMENTS.contains(&tag.as_str()) {
            return;
        }
        if depth > MAX_DEPTH {
            push_text(output, &text_content(node));
            return;
        }

        let element = Element { node, tag: &tag };
        if let Some(decorator) = self.block_decorators.get(&tag)
            && let Some(markup) = decorator(&element, &self.children_markup(node, depth))
        {
            push_block(output, &markup);
            return;
        }
        if let Some(decorator) = self.tag_decorators.get(&tag)
            && let Some(markup) = decorator(&element, &self.children_markup(node, depth))
        {
            output.push_str(&markup);
            return;
        }

        match tag.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = usize::from(tag.as_bytes()[1] - b'0');
                let text = collapse_whitespace(&self.children_markup(node, depth));
                if !text.is_empty() {
                    push_block(output, &format!("{} {text}", "#".repeat(level)));
                }
            }
            "p" => push_block(output, &self.children_markup(node, depth)),
            "br" => output.push('\n'),
            "hr" => push_block(output, "---"),
            "em" | "i" => self.handle_wrapped(node, output, depth, "*"),
            "strong" | "b" => self.handle_wrapped(node, output, depth, "**"),
            "del" | "s" | "strike" => self.handle_wrapped(node, output, depth, "~~"),
            "code" => push_code_span(output, &text_content(node)),
            "pre" => push_block(output, &code_block(node)),
            "a" => self.handle_link(node, output, depth),
            "img" => handle_image(node, output),
            "ul" => push_block(output, &self.handle_list(node, depth, false)),
            "ol" => push_block(output, &self.handle_list(node, depth, true)),
            "blockquote" => {
                let inner = self.children_markup(node, depth);
                push_block(output, &prefix_lines(&normalize_output(&inner), "> ", ">"));
            }
            "aside" if has_class(node, "quote") => push_block(output, &self.handle_quote(node, depth)),
            "table" => push_block(output, &self.handle_table(node, depth)),
            "div" | "section" | "article" | "aside" | "header" | "footer" | "details" | "figure" => {
                push_block(output, &self.children_markup(node, depth));
            }
            _ => self.traverse_children(node, output, depth),
        }
    }

    /// Emphasis-style markers around the element's markup; surrounding
    /// whitespace moves outside the markers
    fn handle_wrapped(&self, node: &Handle, output: &mut String, depth: usize, marker: &str) {
        let inner = self.children_markup(node, depth);
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            push_text(output, &inner);
            return;
        }
        if inner.starts_with(char::is_whitespace) {
            push_text(output, " ");
        }
        output.push_str(marker);
        output.push_str(trimmed);
        output.push_str(marker);
        if inner.ends_with(char::is_whitespace) {
            push_text(output, " ");
        }
    }

    fn handle_link(&self, node: &Handle, output: &mut String, depth: usize) {
        if has_class(node, "anchor") {
            return;
        }
        let inner = self.children_markup(node, depth);
        let text = collapse_whitespace(&inner);
        if has_class(node, "mention") || has_class(node, "mention-group") {
            output.push_str(&text);
            return;
        }

        let href = attr_value(node, "data-orig-href")
            .or_else(|| attr_value(node, "href"))
            .and_then(|href| safe_url("a", "href", &href));
        let Some(href) = href else {
            output.push_str(&text);
            return;
        };

        let bare = text.is_empty()
            || text == href
            || has_class(node, "onebox")
            || has_class(node, "inline-onebox")
            || has_class(node, "inline-onebox-loading");
        if bare {
            output.push_str(&href);
            return;
        }
        match attr_value(node, "title").filter(|t| !t.is_empty()) {
            Some(title) => output.push_str(&format!("[{text}]({href} \"{}\")", title.replace('"', "\\\""))),
            None => output.push_str(&format!("[{text}]({href})")),
        }
    }

    fn handle_list(&self, node: &Handle, depth: usize, ordered: bool) -> String {
        let start: u64 = if ordered {
            attr_value(node, "start")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(1)
        } else {
            1
        };
        let mut items = Vec::new();
        let mut loose = false;

        for item in node.children.borrow().iter() {
            if element_name(item).as_deref() != Some("li") {
                continue;
            }
            let has_paragraph = item
                .children
                .borrow()
                .iter()
                .any(|child| element_name(child).as_deref() == Some("p"));
            loose |= has_paragraph;

            let mut inner = normalize_output(&self.children_markup(item, depth + 1));
            if !has_paragraph {
                inner = inner
                    .lines()
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            let marker = if ordered {
                format!("{}. ", start.saturating_add(items.len() as u64))
            } else {
                "- ".to_string()
            };
            items.push(list_item(&marker, inner.trim_end()));
        }
        items.join(if loose { "\n\n" } else { "\n" })
    }

    fn handle_quote(&self, node: &Handle, depth: usize) -> String {
        let username = attr_value(node, "data-username").filter(|u| !u.is_empty());
        let open = match username {
            Some(username) => {
                let mut params = vec![username];
                if let Some(post) = attr_value(node, "data-post") {
                    params.push(format!("post:{post}"));
                }
                if let Some(topic) = attr_value(node, "data-topic") {
                    params.push(format!("topic:{topic}"));
                }
                if attr_value(node, "data-full").as_deref() == Some("true") {
                    params.push("full:true".to_string());
                }
                format!("[quote=\"{}\"]", params.join(", "))
            }
            None => "[quote]".to_string(),
        };

        let mut body = String::new();
        for child in node.children.borrow().iter() {
            match element_name(child).as_deref() {
                Some("blockquote") => self.traverse_children(child, &mut body, depth + 1),
                Some("div") if has_class(child, "title") => {}
                _ => self.traverse_node(child, &mut body, depth + 1),
            }
        }
        let body = normalize_output(&body);
        format!("{open}\n{}\n[/quote]", body.trim_end())
    }

    fn handle_table(&self, node: &Handle, depth: usize) -> String {
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut alignments: Vec<Option<String>> = Vec::new();

        for row in table_rows(node) {
            let mut cells = Vec::new();
            for cell in row.children.borrow().iter() {
                if !matches!(element_name(cell).as_deref(), Some("th") | Some("td")) {
                    continue;
                }
                if rows.is_empty() {
                    alignments.push(cell_alignment(cell));
                }
                let text = collapse_whitespace(&self.children_markup(cell, depth + 1));
                cells.push(text.replace('|', "\\|"));
            }
            if !cells.is_empty() {
                rows.push(cells);
            }
        }
        let Some(columns) = rows.iter().map(Vec::len).max() else {
            return String::new();
        };
        alignments.resize(columns, None);

        let mut lines = Vec::with_capacity(rows.len() + 1);
        for (idx, row) in rows.iter().enumerate() {
            let mut cells: Vec<&str> = row.iter().map(String::as_str).collect();
            cells.resize(columns, "");
            lines.push(format!("| {} |", cells.join(" | ")));
            if idx == 0 {
                let separator: Vec<&str> = alignments
                    .iter()
                    .map(|align| match align.as_deref() {
                        Some("left") => ":---",
                        Some("center") => ":---:",
                        Some("right") => "---:",
                        _ => "---",
                    })
                    .collect();
                lines.push(format!("| {} |", separator.join(" | ")));
            }
        }
        lines.join("\n")
    }
}

fn handle_image(node: &Handle, output: &mut String) {
    if has_class(node, "emoji")
        && let Some(code) = attr_value(node, "title")
            .or_else(|| attr_value(node, "alt"))
            .filter(|code| code.len() > 2 && code.starts_with(':') && code.ends_with(':'))
    {
        output.push_str(&code);
        return;
    }
    let src = attr_value(node, "data-orig-src")
        .or_else(|| attr_value(node, "src"))
        .and_then(|src| safe_url("img", "src", &src));
    let Some(src) = src else {
        return;
    };
    let mut alt = collapse_whitespace(&attr_value(node, "alt").unwrap_or_default());
    if let (Some(width), Some(height)) = (attr_value(node, "width"), attr_value(node, "height"))
        && !width.is_empty()
        && !height.is_empty()
        && width.bytes().chain(height.bytes()).all(|b| b.is_ascii_digit())
    {
        alt = format!("{alt}|{width}x{height}");
    }
    output.push_str(&format!("![{alt}]({src})"));
}

/// Rows of a table in document order, without descending into nested tables
fn table_rows(table: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    let mut stack: Vec<Handle> = table.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        match element_name(&node).as_deref() {
            Some("tr") => rows.push(node),
            Some("thead") | Some("tbody") | Some("tfoot") => {
                stack.extend(node.children.borrow().iter().rev().cloned());
            }
            _ => {}
        }
    }
    rows
}

fn cell_alignment(cell: &Handle) -> Option<String> {
    if let Some(align) = attr_value(cell, "align") {
        return Some(align.trim().to_ascii_lowercase());
    }
    let style = attr_value(cell, "style")?;
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("text-align"))
        .map(|(_, value)| value.trim().to_ascii_lowercase())
}

fn code_language(pre: &Handle) -> Option<String> {
    let classes = pre
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child).as_deref() == Some("code"))
        .and_then(|code| attr_value(code, "class"))?;
    classes
        .split_whitespace()
        .find_map(|class| class.strip_prefix("language-").or_else(|| class.strip_prefix("lang-")))
        .filter(|lang| !lang.is_empty() && !NO_LANGUAGE.contains(lang))
        .map(str::to_string)
}

fn code_block(pre: &Handle) -> String {
    let content = text_content(pre);
    let content = content.strip_suffix('\n').unwrap_or(&content);
    let fence = "`".repeat(longest_backtick_run(content).max(2) + 1);
    let language = code_language(pre).unwrap_or_default();
    format!("{fence}{language}\n{content}\n{fence}")
}

fn push_code_span(output: &mut String, content: &str) {
    if content.is_empty() {
        return;
    }
    let fence = "`".repeat(longest_backtick_run(content) + 1);
    let pad = if content.starts_with('`') || content.ends_with('`') { " " } else { "" };
    output.push_str(&format!("{fence}{pad}{content}{pad}{fence}"));
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

/// Append text with whitespace runs collapsed; no space at line starts
fn push_text(output: &mut String, text: &str) {
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !at_line_start(output) {
            output.push(' ');
        }
        pending_space = false;
        output.push(c);
    }
    if pending_space && !at_line_start(output) {
        output.push(' ');
    }
}

fn at_line_start(output: &str) -> bool {
    output.is_empty() || output.ends_with('\n') || output.ends_with(' ')
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Separate `block` from its neighbours with blank lines
fn push_block(output: &mut String, block: &str) {
    let block = block.trim_matches('\n');
    if block.trim().is_empty() {
        return;
    }
    if !output.is_empty() && !output.ends_with("\n\n") {
        if output.ends_with('\n') {
            output.push('\n');
        } else {
            output.push_str("\n\n");
        }
    }
    output.push_str(block);
    output.push_str("\n\n");
}

fn prefix_lines(text: &str, prefix: &str, empty_prefix: &str) -> String {
    text.trim_end()
        .lines()
        .map(|line| {
            if line.is_empty() {
                empty_prefix.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_item(marker: &str, inner: &str) -> String {
    let pad = " ".repeat(marker.len());
    let mut item = String::from(marker);
    for (idx, line) in inner.lines().enumerate() {
        if idx > 0 {
            item.push('\n');
            if !line.is_empty() {
                item.push_str(&pad);
            }
        }
        item.push_str(line);
    }
    item
}

/// Normalize markup for deterministic output
///
/// LF line endings, trailing whitespace removed, blank-line runs collapsed
/// outside fenced code, one final newline, empty string for blank input.
pub fn normalize_output(markup: &str) -> String {
    let markup = markup.replace("\r\n", "\n").replace('\r', "\n");
    let mut result = String::with_capacity(markup.len());
    let mut prev_blank = true;
    let mut fence: Option<String> = None;

    for line in markup.lines() {
        let trimmed = line.trim_end();
        if let Some(open) = &fence {
            if trimmed.trim_start() == open {
                fence = None;
            }
            result.push_str(trimmed);
            result.push('\n');
            prev_blank = false;
            continue;
        }
        let start = trimmed.trim_start();
        if start.starts_with("```") {
            fence = Some(start.chars().take_while(|c| *c == '`').collect());
        }
        if trimmed.is_empty() {
            if !prev_blank {
                result.push('\n');
                prev_blank = true;
            }
            continue;
        }
        result.push_str(trimmed);
        result.push('\n');
        prev_blank = false;
    }

    while result.ends_with("\n\n") {
        result.pop();
    }
    if result.trim().is_empty() {
        return String::new();
    }
    result
}
