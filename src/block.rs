//! Block pass: line-oriented scanning into structural tokens
//!
//! The source is split into lines and every enabled [`BlockRule`] is tried,
//! in order, at the current line until one consumes input. Container rules
//! (blockquote, list, bracket-tag blocks) strip their markers and run a
//! nested [`BlockState`] on the collected lines, splicing the nested tokens
//! between their own open and close tokens. The nested state is one level
//! deeper; once `max_nesting` is reached container rules decline and the
//! markers degrade to paragraph text.
//!
//! Rules are plain functions so that a pipeline can be assembled from the
//! rules of whichever features are enabled.

use crate::brackets::CloserMemo;
use crate::options::RenderOptions;
use crate::token::{Nesting, Token};
use regex::Regex;
use std::sync::OnceLock;

/// Container depth at which nested blocks degrade to text
pub const DEFAULT_MAX_NESTING: usize = 100;

/// Signature of a block rule; `silent` asks whether the rule would match
/// without consuming anything
pub type BlockRuleFn = fn(&mut BlockState<'_>, bool) -> bool;

#[derive(Debug, Clone, Copy)]
pub struct BlockRule {
    pub name: &'static str,
    /// Rules run in ascending order
    pub order: u32,
    pub run: BlockRuleFn,
    /// Whether the rule may end a paragraph without a blank line
    pub terminates_paragraph: bool,
}

/// Built-in block rules; `paragraph` is always kept
pub fn core_rules() -> Vec<BlockRule> {
    vec![
        BlockRule { name: "code", order: 200, run: code, terminates_paragraph: false },
        BlockRule { name: "fence", order: 300, run: fence, terminates_paragraph: true },
        BlockRule { name: "blockquote", order: 400, run: blockquote, terminates_paragraph: true },
        BlockRule { name: "hr", order: 500, run: hr, terminates_paragraph: true },
        BlockRule { name: "list", order: 600, run: list, terminates_paragraph: true },
        BlockRule { name: "html_block", order: 700, run: html_block, terminates_paragraph: true },
        BlockRule { name: "heading", order: 800, run: heading, terminates_paragraph: true },
        BlockRule { name: "lheading", order: 900, run: lheading, terminates_paragraph: false },
        BlockRule { name: "paragraph", order: 1000, run: paragraph, terminates_paragraph: false },
    ]
}

pub struct BlockState<'a> {
    pub lines: Vec<String>,
    /// Index of the line rules are tried at
    pub line: usize,
    pub tokens: Vec<Token>,
    /// Container depth of this state
    pub level: usize,
    pub rules: &'a [BlockRule],
    pub options: &'a RenderOptions,
    pub max_nesting: usize,
    /// Bracket-tag closers found so far in `lines`
    pub closers: CloserMemo,
    /// Lines rewritten by [`BlockState::resume_at`]
    rewrites: usize,
}

impl<'a> BlockState<'a> {
    pub fn new(
        source: &str,
        rules: &'a [BlockRule],
        options: &'a RenderOptions,
        max_nesting: usize,
    ) -> Self {
        Self::from_lines(
            source.split('\n').map(expand_leading_tabs).collect(),
            0,
            rules,
            options,
            max_nesting,
        )
    }

    fn from_lines(
        lines: Vec<String>,
        level: usize,
        rules: &'a [BlockRule],
        options: &'a RenderOptions,
        max_nesting: usize,
    ) -> Self {
        Self {
            lines,
            line: 0,
            tokens: Vec::new(),
            level,
            rules,
            options,
            max_nesting,
            closers: CloserMemo::new(),
            rewrites: 0,
        }
    }

    /// Run the rules over every line
    pub fn tokenize(&mut self) {
        let rules = self.rules;
        while self.line < self.lines.len() {
            if is_blank(&self.lines[self.line]) {
                self.line += 1;
                continue;
            }
            let before = self.line;
            let rewrites = self.rewrites;
            let matched = rules.iter().any(|rule| (rule.run)(self, false));
            if !matched || (self.line <= before && self.rewrites == rewrites) {
                // every line must be consumed; paragraph always matches
                self.line = before + 1;
            }
        }
    }

    /// Parse `source` and return its tokens
    pub fn parse(
        source: &str,
        rules: &'a [BlockRule],
        options: &'a RenderOptions,
        max_nesting: usize,
    ) -> Vec<Token> {
        let mut state = Self::new(source, rules, options, max_nesting);
        state.tokenize();
        state.tokens
    }

    /// Whether a container may open another nesting level here
    pub fn can_nest(&self) -> bool {
        if self.level < self.max_nesting {
            return true;
        }
        tracing::debug!(level = self.level, "nesting limit reached, container left as text");
        false
    }

    /// Tokenize `lines` one level deeper
    pub fn nested(&self, lines: Vec<String>) -> Vec<Token> {
        let mut child =
            Self::from_lines(lines, self.level + 1, self.rules, self.options, self.max_nesting);
        child.tokenize();
        child.tokens
    }

    /// Push a block token at this state's level
    pub fn push(&mut self, kind: &'static str, tag: &'static str, nesting: Nesting) -> &mut Token {
        let mut token = Token::new(kind, tag, nesting);
        token.block = true;
        token.level = self.level;
        self.tokens.push(token);
        let last = self.tokens.len() - 1;
        &mut self.tokens[last]
    }

    /// Push an `inline` token holding raw text for the inline pass
    pub fn push_inline(&mut self, content: String) {
        let mut token = Token::new("inline", "", Nesting::Leaf);
        token.content = content;
        token.level = self.level + 1;
        token.block = true;
        self.tokens.push(token);
    }

    /// Continue at `line`, whose remaining text is `rest`
    ///
    /// Used when a block ends partway through a line; `rest` must be a
    /// strict tail of that line.
    pub fn resume_at(&mut self, line: usize, rest: String) {
        self.lines[line] = rest;
        self.closers.forget_line(line);
        self.line = line;
        self.rewrites += 1;
    }

    pub fn current(&self) -> Option<&str> {
        self.lines.get(self.line).map(String::as_str)
    }

    /// Whether some paragraph-terminating rule matches at `line`
    pub fn interrupts_paragraph(&mut self, line: usize) -> bool {
        let saved = self.line;
        self.line = line;
        let rules = self.rules;
        let result = rules
            .iter()
            .filter(|rule| rule.terminates_paragraph)
            .any(|rule| (rule.run)(self, true));
        self.line = saved;
        result
    }
}

fn expand_leading_tabs(line: &str) -> String {
    if !line.starts_with([' ', '\t']) || !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 8);
    let mut column = 0;
    let mut rest = line;
    while let Some(c) = rest.chars().next() {
        match c {
            ' ' => {
                out.push(' ');
                column += 1;
            }
            '\t' => {
                let width = 4 - column % 4;
                out.extend(std::iter::repeat_n(' ', width));
                column += width;
            }
            _ => break,
        }
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Number of leading spaces
pub fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// `line` with up to `count` leading spaces removed
pub fn strip_columns(line: &str, count: usize) -> String {
    let spaces = indent_of(line).min(count);
    line[spaces..].to_string()
}

fn code(state: &mut BlockState<'_>, silent: bool) -> bool {
    let start = state.line;
    if state.current().is_none_or(|line| indent_of(line) < 4) {
        return false;
    }
    if silent {
        return true;
    }

    let mut end = start;
    let mut last_content = start;
    while end < state.lines.len() {
        let line = &state.lines[end];
        if is_blank(line) {
            end += 1;
            continue;
        }
        if indent_of(line) < 4 {
            break;
        }
        last_content = end;
        end += 1;
    }

    let mut content = String::new();
    for line in &state.lines[start..=last_content] {
        content.push_str(&strip_columns(line, 4));
        content.push('\n');
    }
    let token = state.push("code_block", "code", Nesting::Leaf);
    token.content = content;
    state.line = last_content + 1;
    true
}

fn fence(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some(line) = state.current() else {
        return false;
    };
    let indent = indent_of(line);
    if indent >= 4 {
        return false;
    }
    let rest = &line[indent..];
    let Some(marker) = rest.chars().next().filter(|c| *c == '`' || *c == '~') else {
        return false;
    };
    let run = rest.len() - rest.trim_start_matches(marker).len();
    if run < 3 {
        return false;
    }
    let info = rest[run..].trim().to_string();
    if marker == '`' && info.contains('`') {
        return false;
    }
    if silent {
        return true;
    }

    let start = state.line;
    let mut close = None;
    for idx in start + 1..state.lines.len() {
        let candidate = &state.lines[idx];
        if indent_of(candidate) >= 4 {
            continue;
        }
        let trimmed = candidate.trim_start();
        let close_run = trimmed.len() - trimmed.trim_start_matches(marker).len();
        if close_run >= run && trimmed[close_run..].trim().is_empty() {
            close = Some(idx);
            break;
        }
    }

    let end = close.unwrap_or(state.lines.len());
    let mut content = String::new();
    for body in &state.lines[start + 1..end] {
        content.push_str(&strip_columns(body, indent));
        content.push('\n');
    }

    let token = state.push("fence", "code", Nesting::Leaf);
    token.info = info;
    token.content = content;
    state.line = close.map(|c| c + 1).unwrap_or(end);
    true
}

fn blockquote_marker(line: &str) -> Option<String> {
    let indent = indent_of(line);
    if indent >= 4 {
        return None;
    }
    let rest = line[indent..].strip_prefix('>')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest).to_string())
}

fn blockquote(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some(first) = state.current().and_then(blockquote_marker) else {
        return false;
    };
    if !state.can_nest() {
        return false;
    }
    if silent {
        return true;
    }

    let mut lines = vec![first];
    let mut idx = state.line + 1;
    while idx < state.lines.len() {
        if let Some(stripped) = blockquote_marker(&state.lines[idx]) {
            lines.push(stripped);
            idx += 1;
            continue;
        }
        let lazy = !is_blank(&state.lines[idx])
            && lines.last().is_some_and(|l| !is_blank(l))
            && !state.interrupts_paragraph(idx);
        if !lazy {
            break;
        }
        lines.push(state.lines[idx].clone());
        idx += 1;
    }

    let inner = state.nested(lines);
    state.push("blockquote_open", "blockquote", Nesting::Open);
    state.tokens.extend(inner);
    state.push("blockquote_close", "blockquote", Nesting::Close);
    state.line = idx;
    true
}

fn is_hr(line: &str) -> bool {
    if indent_of(line) >= 4 {
        return false;
    }
    let trimmed = line.trim();
    let Some(marker) = trimmed.chars().next().filter(|c| matches!(c, '-' | '*' | '_')) else {
        return false;
    };
    let mut count = 0;
    for c in trimmed.chars() {
        if c == marker {
            count += 1;
        } else if c != ' ' && c != '\t' {
            return false;
        }
    }
    count >= 3
}

fn hr(state: &mut BlockState<'_>, silent: bool) -> bool {
    if !state.current().is_some_and(is_hr) {
        return false;
    }
    if silent {
        return true;
    }
    state.push("hr", "hr", Nesting::Leaf);
    state.line += 1;
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListMarker {
    ordered: bool,
    /// Bullet character or ordered delimiter
    delimiter: char,
    start: u64,
    content_offset: usize,
    empty: bool,
}

impl ListMarker {
    fn same_list(&self, other: &ListMarker) -> bool {
        self.ordered == other.ordered && self.delimiter == other.delimiter
    }
}

fn parse_list_marker(line: &str) -> Option<ListMarker> {
    let indent = indent_of(line);
    if indent >= 4 {
        return None;
    }
    let rest = &line[indent..];
    let first = rest.chars().next()?;

    let (ordered, delimiter, start, width) = if matches!(first, '-' | '+' | '*') {
        (false, first, 0, 1)
    } else {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 || digits > 9 {
            return None;
        }
        let delimiter = rest[digits..].chars().next().filter(|c| *c == '.' || *c == ')')?;
        let start = rest[..digits].parse().ok()?;
        (true, delimiter, start, digits + 1)
    };

    let after = &rest[width..];
    if !after.is_empty() && !after.starts_with(' ') {
        return None;
    }
    let spaces = indent_of(after);
    let empty = is_blank(after);
    let content_offset = if empty || spaces > 4 {
        indent + width + 1
    } else {
        indent + width + spaces
    };

    Some(ListMarker {
        ordered,
        delimiter,
        start,
        content_offset,
        empty,
    })
}

fn list(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some(first) = state.current().and_then(parse_list_marker) else {
        return false;
    };
    if silent {
        return !first.empty && (!first.ordered || first.start == 1);
    }
    if !state.can_nest() {
        return false;
    }

    let mut items: Vec<Vec<String>> = Vec::new();
    let mut loose = false;
    let mut idx = state.line;

    while idx < state.lines.len() {
        let Some(marker) = parse_list_marker(&state.lines[idx]) else {
            break;
        };
        if !marker.same_list(&first) {
            break;
        }
        let offset = marker.content_offset;
        let mut item = vec![state.lines[idx].get(offset..).unwrap_or("").to_string()];
        idx += 1;

        while idx < state.lines.len() {
            let line = &state.lines[idx];
            if is_blank(line) {
                item.push(String::new());
                idx += 1;
                continue;
            }
            if indent_of(line) >= offset {
                item.push(line[offset..].to_string());
                idx += 1;
                continue;
            }
            let previous_blank = item.last().is_none_or(|l| is_blank(l));
            let starts_item = parse_list_marker(line).is_some();
            if previous_blank || starts_item || state.interrupts_paragraph(idx) {
                break;
            }
            item.push(state.lines[idx].trim_start().to_string());
            idx += 1;
        }

        let mut trailing_blank = false;
        while item.len() > 1 && item.last().is_some_and(|l| is_blank(l)) {
            item.pop();
            trailing_blank = true;
        }
        if item.iter().skip(1).any(|l| is_blank(l)) {
            loose = true;
        }
        items.push(item);

        let continues = idx < state.lines.len()
            && parse_list_marker(&state.lines[idx]).is_some_and(|m| m.same_list(&first));
        if !continues {
            if trailing_blank {
                // blank lines after the last item belong to the document
                idx -= 1;
                while idx > state.line && is_blank(&state.lines[idx]) {
                    idx -= 1;
                }
                idx += 1;
            }
            break;
        }
        if trailing_blank {
            loose = true;
        }
    }

    let (open_kind, close_kind, tag) = if first.ordered {
        ("ordered_list_open", "ordered_list_close", "ol")
    } else {
        ("bullet_list_open", "bullet_list_close", "ul")
    };
    let list_open = state.push(open_kind, tag, Nesting::Open);
    if first.ordered && first.start != 1 {
        list_open.set_attr("start", first.start.to_string());
    }

    let child_level = state.level + 1;
    for item in items {
        let mut inner = state.nested(item);
        if !loose {
            for token in inner.iter_mut() {
                if token.level == child_level
                    && (token.kind == "paragraph_open" || token.kind == "paragraph_close")
                {
                    token.hidden = true;
                }
            }
        }
        state.push("list_item_open", "li", Nesting::Open);
        state.tokens.extend(inner);
        state.push("list_item_close", "li", Nesting::Close);
    }
    state.push(close_kind, tag, Nesting::Close);
    state.line = idx;
    true
}

struct HtmlBlockKind {
    open: &'static str,
    close: Option<&'static str>,
    can_interrupt: bool,
}

const HTML_BLOCK_KINDS: &[HtmlBlockKind] = &[
    HtmlBlockKind {
        open: r"(?i)^<(script|pre|style|textarea)(\s|>|$)",
        close: Some(r"(?i)</(script|pre|style|textarea)>"),
        can_interrupt: true,
    },
    HtmlBlockKind { open: r"^<!--", close: Some(r"-->"), can_interrupt: true },
    HtmlBlockKind { open: r"^<\?", close: Some(r"\?>"), can_interrupt: true },
    HtmlBlockKind { open: r"^<![A-Za-z]", close: Some(r">"), can_interrupt: true },
    HtmlBlockKind { open: r"^<!\[CDATA\[", close: Some(r"\]\]>"), can_interrupt: true },
    HtmlBlockKind {
        open: r"(?i)^</?(address|article|aside|base|basefont|blockquote|body|caption|center|col|colgroup|dd|details|dialog|dir|div|dl|dt|fieldset|figcaption|figure|footer|form|frame|frameset|h[1-6]|head|header|hr|html|iframe|legend|li|link|main|menu|menuitem|nav|noframes|ol|optgroup|option|p|param|search|section|summary|table|tbody|td|tfoot|th|thead|title|tr|track|ul)(\s|/?>|$)",
        close: None,
        can_interrupt: true,
    },
    HtmlBlockKind {
        open: r#"^(?:<[A-Za-z][A-Za-z0-9-]*(?:\s+[A-Za-z_:][A-Za-z0-9_.:-]*(?:\s*=\s*(?:[^"'=<>`\x00-\x20]+|'[^']*'|"[^"]*"))?)*\s*/?>|</[A-Za-z][A-Za-z0-9-]*\s*>)\s*$"#,
        close: None,
        can_interrupt: false,
    },
];

fn html_block_patterns() -> &'static [(Regex, Option<Regex>, bool)] {
    static PATTERNS: OnceLock<Vec<(Regex, Option<Regex>, bool)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        HTML_BLOCK_KINDS
            .iter()
            .filter_map(|kind| {
                let open = Regex::new(kind.open).ok()?;
                let close = match kind.close {
                    Some(pattern) => Some(Regex::new(pattern).ok()?),
                    None => None,
                };
                Some((open, close, kind.can_interrupt))
            })
            .collect()
    })
}

fn html_block(state: &mut BlockState<'_>, silent: bool) -> bool {
    if !state.options.settings.allow_html {
        return false;
    }
    let Some(line) = state.current() else {
        return false;
    };
    let indent = indent_of(line);
    if indent >= 4 || !line[indent..].starts_with('<') {
        return false;
    }
    let text = &line[indent..];
    let Some((_, close, can_interrupt)) =
        html_block_patterns().iter().find(|(open, _, _)| open.is_match(text))
    else {
        return false;
    };
    if silent {
        return *can_interrupt;
    }

    let start = state.line;
    let mut end = start;
    match close {
        Some(close) => {
            while end < state.lines.len() {
                let closed = close.is_match(&state.lines[end]);
                end += 1;
                if closed {
                    break;
                }
            }
        }
        None => {
            while end < state.lines.len() && !is_blank(&state.lines[end]) {
                end += 1;
            }
        }
    }

    let mut content = state.lines[start..end].join("\n");
    content.push('\n');
    let token = state.push("html_block", "", Nesting::Leaf);
    token.content = content;
    state.line = end;
    true
}

/// Parse an ATX heading line into `(level, content)`
fn atx_heading(line: &str) -> Option<(usize, String)> {
    let indent = indent_of(line);
    if indent >= 4 {
        return None;
    }
    let rest = &line[indent..];
    let level = rest.len() - rest.trim_start_matches('#').len();
    if level == 0 || level > 6 {
        return None;
    }
    let after = &rest[level..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }
    let mut content = after.trim();
    let without_closing = content.trim_end_matches('#');
    if without_closing.is_empty() {
        content = "";
    } else if without_closing.ends_with([' ', '\t']) {
        content = without_closing.trim_end();
    }
    Some((level, content.to_string()))
}

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

fn push_heading(state: &mut BlockState<'_>, level: usize, content: String) {
    let tag = HEADING_TAGS[level.clamp(1, 6) - 1];
    state.push("heading_open", tag, Nesting::Open);
    state.push_inline(content);
    state.push("heading_close", tag, Nesting::Close);
}

fn heading(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some((level, content)) = state.current().and_then(atx_heading) else {
        return false;
    };
    if silent {
        return true;
    }
    push_heading(state, level, content);
    state.line += 1;
    true
}

fn setext_level(line: &str) -> Option<usize> {
    if indent_of(line) >= 4 {
        return None;
    }
    let trimmed = line.trim();
    let marker = trimmed.chars().next()?;
    if !matches!(marker, '=' | '-') || !trimmed.chars().all(|c| c == marker) {
        return None;
    }
    Some(if marker == '=' { 1 } else { 2 })
}

fn lheading(state: &mut BlockState<'_>, silent: bool) -> bool {
    if silent {
        return false;
    }
    let start = state.line;
    let mut idx = start + 1;
    while idx < state.lines.len() && !is_blank(&state.lines[idx]) {
        if let Some(level) = setext_level(&state.lines[idx]) {
            let content = paragraph_text(&state.lines[start..idx]);
            push_heading(state, level, content);
            state.line = idx + 1;
            return true;
        }
        if state.interrupts_paragraph(idx) {
            return false;
        }
        idx += 1;
    }
    false
}

fn paragraph_text(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| l.trim_start())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn paragraph(state: &mut BlockState<'_>, silent: bool) -> bool {
    if silent {
        return false;
    }
    let start = state.line;
    let mut idx = start + 1;
    while idx < state.lines.len()
        && !is_blank(&state.lines[idx])
        && !state.interrupts_paragraph(idx)
    {
        idx += 1;
    }

    let content = paragraph_text(&state.lines[start..idx]);
    state.push("paragraph_open", "p", Nesting::Open);
    state.push_inline(content);
    state.push("paragraph_close", "p", Nesting::Close);
    state.line = idx;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Token> {
        let rules = core_rules();
        let options = RenderOptions::default();
        BlockState::parse(source, &rules, &options, DEFAULT_MAX_NESTING)
    }

    fn kinds(tokens: &[Token]) -> Vec<&'static str> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        let tokens = parse("one\ntwo\n\nthree");
        assert_eq!(
            kinds(&tokens),
            vec![
                "paragraph_open",
                "inline",
                "paragraph_close",
                "paragraph_open",
                "inline",
                "paragraph_close"
            ]
        );
        assert_eq!(tokens[1].content, "one\ntwo");
    }

    #[test]
    fn test_headings() {
        let tokens = parse("## Hello ##\nSub\n---");
        assert_eq!(tokens[0].tag, "h2");
        assert_eq!(tokens[1].content, "Hello");
        assert_eq!(tokens[3].tag, "h2");
        assert_eq!(tokens[4].content, "Sub");
        assert!(atx_heading("#hashtag").is_none());
    }

    #[test]
    fn test_fence_keeps_contents_verbatim() {
        let tokens = parse("```ruby\n**not bold**\n\n[quote]\n```\nafter");
        assert_eq!(tokens[0].kind, "fence");
        assert_eq!(tokens[0].info, "ruby");
        assert_eq!(tokens[0].content, "**not bold**\n\n[quote]\n");
        assert_eq!(tokens[2].content, "after");
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let tokens = parse("~~~\ncode");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].content, "code\n");
    }

    #[test]
    fn test_blockquote_with_lazy_continuation() {
        let tokens = parse("> a\nb\n\nc");
        assert_eq!(
            kinds(&tokens)[..5],
            [
                "blockquote_open",
                "paragraph_open",
                "inline",
                "paragraph_close",
                "blockquote_close"
            ]
        );
        assert_eq!(tokens[2].content, "a\nb");
        assert_eq!(tokens[2].level, 2);
    }

    #[test]
    fn test_tight_and_loose_lists() {
        let tight = parse("- a\n- b");
        assert!(tight.iter().filter(|t| t.kind == "paragraph_open").all(|t| t.hidden));

        let loose = parse("- a\n\n- b");
        assert!(loose.iter().filter(|t| t.kind == "paragraph_open").all(|t| !t.hidden));
    }

    #[test]
    fn test_ordered_list_start() {
        let tokens = parse("3. a\n4. b");
        assert_eq!(tokens[0].kind, "ordered_list_open");
        assert_eq!(tokens[0].attr("start"), Some("3"));
    }

    #[test]
    fn test_nested_list() {
        let tokens = parse("- a\n  - b\n- c");
        let opens = tokens.iter().filter(|t| t.kind == "bullet_list_open").count();
        assert_eq!(opens, 2);
    }

    #[test]
    fn test_list_interrupt_rules() {
        // only lists starting at 1 may interrupt a paragraph
        let tokens = parse("text\n2. not a list");
        assert_eq!(tokens.len(), 3);
        let tokens = parse("text\n1. a list");
        assert_eq!(tokens[3].kind, "ordered_list_open");
    }

    #[test]
    fn test_hr_and_code() {
        let tokens = parse("***\n\n    indented\n    code\n\nafter");
        assert_eq!(tokens[0].kind, "hr");
        assert_eq!(tokens[1].kind, "code_block");
        assert_eq!(tokens[1].content, "indented\ncode\n");
    }

    #[test]
    fn test_html_block() {
        let tokens = parse("<div class=\"x\">\n*raw*\n</div>\n\ntext");
        assert_eq!(tokens[0].kind, "html_block");
        assert_eq!(tokens[0].content, "<div class=\"x\">\n*raw*\n</div>\n");
    }

    #[test]
    fn test_html_block_disabled() {
        let rules = core_rules();
        let mut options = RenderOptions::default();
        options.settings.allow_html = false;
        let tokens = BlockState::parse("<div>\nx\n</div>", &rules, &options, DEFAULT_MAX_NESTING);
        assert_eq!(tokens[0].kind, "paragraph_open");
    }

    #[test]
    fn test_nesting_guard_degrades_to_text() {
        let rules = core_rules();
        let options = RenderOptions::default();
        let source = ">".repeat(10) + " deep";
        let tokens = BlockState::parse(&source, &rules, &options, 3);
        let quotes = tokens.iter().filter(|t| t.kind == "blockquote_open").count();
        assert_eq!(quotes, 3);
        let inline = tokens.iter().find(|t| t.kind == "inline").map(|t| t.content.clone());
        assert_eq!(inline.as_deref(), Some(">>>>>>> deep"));
    }

    #[test]
    fn test_tabs_expand_in_indentation() {
        assert_eq!(expand_leading_tabs("\tcode"), "    code");
        assert_eq!(expand_leading_tabs("  \tx\ty"), "    x\ty");
    }
}
