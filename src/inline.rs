//! Inline pass: character-level scanning of `inline` token contents
//!
//! Every enabled [`InlineRule`] is tried at the current position until one
//! consumes input; characters no rule wants accumulate as pending text.
//! Emphasis-style markers are pushed as one text token per delimiter and
//! paired afterwards, following the CommonMark delimiter algorithm, so that
//! unmatched markers simply stay literal.

use crate::brackets::CloserMemo;
use crate::options::RenderOptions;
use crate::patterns::cached_regex;
use crate::sanitizer::safe_url;
use crate::token::{Nesting, Token};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

pub type InlineRuleFn = fn(&mut InlineState<'_>) -> bool;

#[derive(Debug, Clone, Copy)]
pub struct InlineRule {
    pub name: &'static str,
    /// Rules run in ascending order
    pub order: u32,
    pub run: InlineRuleFn,
}

/// Built-in inline rules; `text` and `newline` are always kept
pub fn core_rules() -> Vec<InlineRule> {
    vec![
        InlineRule { name: "text", order: 100, run: text },
        InlineRule { name: "newline", order: 200, run: newline },
        InlineRule { name: "escape", order: 300, run: escape },
        InlineRule { name: "backticks", order: 400, run: backticks },
        InlineRule { name: "strikethrough", order: 500, run: strikethrough },
        InlineRule { name: "emphasis", order: 600, run: emphasis },
        InlineRule { name: "link", order: 700, run: link },
        InlineRule { name: "image", order: 800, run: image },
        InlineRule { name: "autolink", order: 900, run: autolink },
        InlineRule { name: "html_inline", order: 1000, run: html_inline },
        InlineRule { name: "entity", order: 1100, run: entity },
    ]
}

/// A run of emphasis or strikethrough markers awaiting a partner
#[derive(Debug, Clone)]
pub struct Delimiter {
    pub marker: char,
    /// Length of the whole marker run, used by the "multiple of 3" rule
    pub length: usize,
    /// Index of the text token holding this marker
    pub token: usize,
    /// Index of the matching closer once paired
    pub end: Option<usize>,
    pub open: bool,
    pub close: bool,
}

pub struct InlineState<'a> {
    pub src: &'a str,
    pub pos: usize,
    /// Text not yet flushed into a token
    pub pending: String,
    pub tokens: Vec<Token>,
    pub delimiters: Vec<Delimiter>,
    /// Nesting depth of link labels being parsed
    pub depth: usize,
    /// Greater than zero inside a link label
    pub link_level: usize,
    pub rules: &'a [InlineRule],
    pub options: &'a RenderOptions,
    pub max_nesting: usize,
    /// Bracket-tag closers found so far in `src`
    pub closers: CloserMemo,
    /// `[` position -> closing `]` of the label it opens
    label_ends: HashMap<usize, Option<usize>>,
}

impl<'a> InlineState<'a> {
    pub fn new(
        src: &'a str,
        rules: &'a [InlineRule],
        options: &'a RenderOptions,
        max_nesting: usize,
    ) -> Self {
        Self {
            src,
            pos: 0,
            pending: String::new(),
            tokens: Vec::new(),
            delimiters: Vec::new(),
            depth: 0,
            link_level: 0,
            rules,
            options,
            max_nesting,
            closers: CloserMemo::new(),
            label_ends: HashMap::new(),
        }
    }

    /// Parse `src` into inline tokens
    ///
    /// # Examples
    ///
    /// ```
    /// use cooked_markup::inline::{core_rules, InlineState};
    /// use cooked_markup::options::RenderOptions;
    ///
    /// let rules = core_rules();
    /// let options = RenderOptions::default();
    /// let tokens = InlineState::parse("**evil**", &rules, &options, 100);
    /// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    /// assert_eq!(kinds, ["strong_open", "text", "strong_close"]);
    /// ```
    pub fn parse(
        src: &'a str,
        rules: &'a [InlineRule],
        options: &'a RenderOptions,
        max_nesting: usize,
    ) -> Vec<Token> {
        let mut state = Self::new(src, rules, options, max_nesting);
        state.tokenize();
        state.tokens
    }

    pub fn tokenize(&mut self) {
        let rules = self.rules;
        while self.pos < self.src.len() {
            let before = self.pos;
            let matched = rules.iter().any(|rule| (rule.run)(self));
            if !matched || self.pos <= before {
                self.pos = before;
                if let Some(c) = self.src[before..].chars().next() {
                    self.pending.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
        self.flush_pending();

        balance_pairs(&mut self.delimiters);
        apply_emphasis(&self.delimiters, &mut self.tokens);
        apply_strikethrough(&self.delimiters, &mut self.tokens);
        join_text(&mut self.tokens);
    }

    /// Parse a nested span, e.g. a link label, one level deeper
    ///
    /// At the nesting limit the span is returned as literal text.
    pub fn parse_nested(&self, src: &str, link_level: usize) -> Vec<Token> {
        if self.depth + 1 >= self.max_nesting {
            return vec![Token::text(src)];
        }
        let mut child = InlineState::new(src, self.rules, self.options, self.max_nesting);
        child.depth = self.depth + 1;
        child.link_level = link_level;
        child.tokenize();
        child.tokens
    }

    /// Index of the `]` closing the label that opens at `start`
    ///
    /// Brackets nest; escaped brackets and brackets inside code spans do
    /// not count. Every `[` the scan passes is settled along the way, so
    /// later lookups for those are not scanned again.
    pub fn label_end(&mut self, start: usize) -> Option<usize> {
        if let Some(known) = self.label_ends.get(&start) {
            return *known;
        }
        let src = self.src;
        let bytes = src.as_bytes();
        let mut open: Vec<usize> = Vec::new();
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'`' => {
                    i = skip_code_span(src, i);
                    continue;
                }
                b'[' => match self.label_ends.get(&i).copied() {
                    Some(Some(end)) => {
                        i = end + 1;
                        continue;
                    }
                    Some(None) => break,
                    None => open.push(i),
                },
                b']' => {
                    if let Some(opener) = open.pop() {
                        self.label_ends.insert(opener, Some(i));
                        if open.is_empty() {
                            return Some(i);
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
        for opener in open {
            self.label_ends.insert(opener, None);
        }
        None
    }

    /// Remaining source from the current position
    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Character before the current position
    pub fn previous_char(&self) -> Option<char> {
        self.src[..self.pos].chars().next_back()
    }

    /// Push a token after flushing pending text
    pub fn push(&mut self, token: Token) {
        self.flush_pending();
        self.tokens.push(token);
    }

    pub fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let content = std::mem::take(&mut self.pending);
            self.tokens.push(Token::text(content));
        }
    }

    /// Flanking analysis for the marker run at `start`
    ///
    /// Returns `(run length, can open, can close)`.
    fn scan_delims(&self, start: usize, can_split_word: bool) -> (usize, bool, bool) {
        let rest = &self.src[start..];
        let Some(marker) = rest.chars().next() else {
            return (0, false, false);
        };
        let count = rest.len() - rest.trim_start_matches(marker).len();
        let last = self.src[..start].chars().next_back().unwrap_or(' ');
        let next = rest[count..].chars().next().unwrap_or(' ');

        let last_punct = is_punctuation(last);
        let next_punct = is_punctuation(next);
        let last_space = last.is_whitespace();
        let next_space = next.is_whitespace();

        let left_flanking = !next_space && (!next_punct || last_space || last_punct);
        let right_flanking = !last_space && (!last_punct || next_space || next_punct);

        let can_open = left_flanking && (can_split_word || !right_flanking || last_punct);
        let can_close = right_flanking && (can_split_word || !left_flanking || next_punct);
        (count, can_open, can_close)
    }
}

pub fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace() && !c.is_control())
}

fn is_terminator(c: char) -> bool {
    matches!(
        c,
        '\n' | '!'
            | '#'
            | '$'
            | '%'
            | '&'
            | '*'
            | '+'
            | '-'
            | ':'
            | '<'
            | '='
            | '>'
            | '@'
            | '['
            | '\\'
            | ']'
            | '^'
            | '_'
            | '`'
            | '{'
            | '}'
            | '~'
    )
}

fn text(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    let len = rest.find(is_terminator).unwrap_or(rest.len());
    if len == 0 {
        return false;
    }
    state.pending.push_str(&rest[..len]);
    state.pos += len;
    true
}

fn skip_spaces(state: &mut InlineState<'_>) {
    let rest = state.rest();
    state.pos += rest.len() - rest.trim_start_matches(' ').len();
}

fn newline(state: &mut InlineState<'_>) -> bool {
    if state.peek() != Some('\n') {
        return false;
    }
    let trimmed = state.pending.trim_end_matches(' ').len();
    let trailing = state.pending.len() - trimmed;
    state.pending.truncate(trimmed);

    let breaks = !state.options.settings.traditional_markdown_linebreaks;
    let token = if trailing >= 2 || breaks {
        Token::new("hardbreak", "br", Nesting::Leaf)
    } else {
        Token::new("softbreak", "br", Nesting::Leaf)
    };
    state.push(token);
    state.pos += 1;
    skip_spaces(state);
    true
}

fn escape(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('\\') {
        return false;
    }
    match rest[1..].chars().next() {
        Some('\n') => {
            state.push(Token::new("hardbreak", "br", Nesting::Leaf));
            state.pos += 2;
            skip_spaces(state);
        }
        Some(c) if c.is_ascii_punctuation() => {
            let mut token = Token::new("text_special", "", Nesting::Leaf);
            token.content = c.to_string();
            token.info = "escape".to_string();
            state.push(token);
            state.pos += 1 + c.len_utf8();
        }
        _ => {
            state.pending.push('\\');
            state.pos += 1;
        }
    }
    true
}

/// Length of the backtick run at the start of `text`
fn backtick_run(text: &str) -> usize {
    text.len() - text.trim_start_matches('`').len()
}

/// Offset in `text` of a backtick run of exactly `run` characters
fn find_closing_run(text: &str, run: usize) -> Option<usize> {
    let mut search = 0;
    while let Some(found) = text[search..].find('`') {
        let start = search + found;
        let len = backtick_run(&text[start..]);
        if len == run {
            return Some(start);
        }
        search = start + len;
    }
    None
}

fn backticks(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('`') {
        return false;
    }
    let run = backtick_run(rest);
    let after = &rest[run..];
    let Some(close) = find_closing_run(after, run) else {
        state.pending.push_str(&rest[..run]);
        state.pos += run;
        return true;
    };

    let mut content = after[..close].replace('\n', " ");
    if content.len() >= 2
        && content.starts_with(' ')
        && content.ends_with(' ')
        && !content.trim().is_empty()
    {
        content = content[1..content.len() - 1].to_string();
    }
    let mut token = Token::new("code_inline", "code", Nesting::Leaf);
    token.content = content;
    state.push(token);
    state.pos += run + close + run;
    true
}

fn emphasis(state: &mut InlineState<'_>) -> bool {
    let Some(marker) = state.peek().filter(|c| *c == '*' || *c == '_') else {
        return false;
    };
    let (count, can_open, can_close) = state.scan_delims(state.pos, marker == '*');
    for _ in 0..count {
        state.push(Token::text(marker.to_string()));
        let token = state.tokens.len() - 1;
        state.delimiters.push(Delimiter {
            marker,
            length: count,
            token,
            end: None,
            open: can_open,
            close: can_close,
        });
    }
    state.pos += count;
    true
}

fn strikethrough(state: &mut InlineState<'_>) -> bool {
    if state.peek() != Some('~') {
        return false;
    }
    let (count, can_open, can_close) = state.scan_delims(state.pos, true);
    if count < 2 {
        return false;
    }
    let mut len = count;
    if len % 2 == 1 {
        state.push(Token::text("~"));
        len -= 1;
    }
    for _ in 0..len / 2 {
        state.push(Token::text("~~"));
        let token = state.tokens.len() - 1;
        state.delimiters.push(Delimiter {
            marker: '~',
            length: 0,
            token,
            end: None,
            open: can_open,
            close: can_close,
        });
    }
    state.pos += count;
    true
}

/// Pair openers with closers
fn balance_pairs(delimiters: &mut [Delimiter]) {
    let max = delimiters.len();
    if max == 0 {
        return;
    }
    let mut openers_bottom: HashMap<char, [isize; 6]> = HashMap::new();
    let mut header_idx = 0usize;
    let mut last_token_idx: isize = -2;
    let mut jumps: Vec<usize> = Vec::with_capacity(max);

    for closer_idx in 0..max {
        jumps.push(0);
        let marker = delimiters[closer_idx].marker;
        let token = delimiters[closer_idx].token as isize;

        if delimiters[header_idx].marker != marker || last_token_idx != token - 1 {
            header_idx = closer_idx;
        }
        last_token_idx = token;

        if !delimiters[closer_idx].close {
            continue;
        }

        let slot = |d: &Delimiter| (if d.open { 3 } else { 0 }) + d.length % 3;
        let bottom_slot = slot(&delimiters[closer_idx]);
        let min_opener_idx = openers_bottom.entry(marker).or_insert([-1; 6])[bottom_slot];

        let mut opener_idx = header_idx as isize - jumps[header_idx] as isize - 1;
        let mut new_min_opener_idx = opener_idx;

        while opener_idx > min_opener_idx {
            let o = opener_idx as usize;
            let opener = &delimiters[o];
            if opener.marker == marker && opener.open && opener.end.is_none() {
                let closer = &delimiters[closer_idx];
                let odd_match = (opener.close || closer.open)
                    && (opener.length + closer.length) % 3 == 0
                    && (opener.length % 3 != 0 || closer.length % 3 != 0);

                if !odd_match {
                    let last_jump = if o > 0 && !delimiters[o - 1].open {
                        jumps[o - 1] + 1
                    } else {
                        0
                    };
                    jumps[closer_idx] = closer_idx - o + last_jump;
                    jumps[o] = last_jump;
                    delimiters[closer_idx].open = false;
                    delimiters[o].end = Some(closer_idx);
                    delimiters[o].close = false;
                    new_min_opener_idx = -1;
                    last_token_idx = -2;
                    break;
                }
            }
            opener_idx -= jumps[o] as isize + 1;
        }

        if new_min_opener_idx != -1 {
            let bottom_slot = slot(&delimiters[closer_idx]);
            openers_bottom.entry(marker).or_insert([-1; 6])[bottom_slot] = new_min_opener_idx;
        }
    }
}

fn retag(token: &mut Token, kind: &'static str, tag: &'static str, nesting: Nesting) {
    token.kind = kind;
    token.tag = tag;
    token.nesting = nesting;
    token.content.clear();
}

fn apply_emphasis(delimiters: &[Delimiter], tokens: &mut [Token]) {
    let mut i = delimiters.len();
    while i > 0 {
        i -= 1;
        let start = &delimiters[i];
        if start.marker != '_' && start.marker != '*' {
            continue;
        }
        let Some(end_idx) = start.end else {
            continue;
        };
        let end = &delimiters[end_idx];

        let strong = i > 0
            && delimiters[i - 1].end == Some(end_idx + 1)
            && delimiters[i - 1].marker == start.marker
            && delimiters[i - 1].token + 1 == start.token
            && delimiters.get(end_idx + 1).is_some_and(|d| d.token == end.token + 1);

        let (open_kind, close_kind, tag) = if strong {
            ("strong_open", "strong_close", "strong")
        } else {
            ("em_open", "em_close", "em")
        };
        retag(&mut tokens[start.token], open_kind, tag, Nesting::Open);
        retag(&mut tokens[end.token], close_kind, tag, Nesting::Close);

        if strong {
            tokens[delimiters[i - 1].token].content.clear();
            tokens[delimiters[end_idx + 1].token].content.clear();
            i -= 1;
        }
    }
}

fn apply_strikethrough(delimiters: &[Delimiter], tokens: &mut [Token]) {
    for delimiter in delimiters {
        if delimiter.marker != '~' {
            continue;
        }
        let Some(end_idx) = delimiter.end else {
            continue;
        };
        retag(&mut tokens[delimiter.token], "s_open", "s", Nesting::Open);
        retag(&mut tokens[delimiters[end_idx].token], "s_close", "s", Nesting::Close);
    }
}

/// Merge adjacent text tokens and drop empty ones
pub fn join_text(tokens: &mut Vec<Token>) {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens.drain(..) {
        if token.kind == "text" {
            if token.content.is_empty() {
                continue;
            }
            if let Some(last) = out.last_mut()
                && last.kind == "text"
            {
                last.content.push_str(&token.content);
                continue;
            }
        }
        out.push(token);
    }
    *tokens = out;
}

/// Skip a code span starting at `i`, returning the index after it
fn skip_code_span(src: &str, i: usize) -> usize {
    let run = backtick_run(&src[i..]);
    match find_closing_run(&src[i + run..], run) {
        Some(close) => i + run + close + run,
        None => i + run,
    }
}

/// Remove backslashes in front of ASCII punctuation
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(next) = chars.peek().copied()
            && next.is_ascii_punctuation()
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkParts {
    label_start: usize,
    label_end: usize,
    href: String,
    title: Option<String>,
    /// Index after the closing `)`
    end: usize,
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n') {
        i += 1;
    }
    i
}

fn parse_destination(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if bytes.get(start) == Some(&b'<') {
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'>' => {
                    let href = unescape(&src[start + 1..i]).replace(' ', "%20");
                    return Some((href, i + 1));
                }
                b'<' | b'\n' => return None,
                _ => i += 1,
            }
        }
        return None;
    }

    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && i + 1 < bytes.len() {
            i += 2;
            continue;
        }
        if b == b'(' {
            depth += 1;
            if depth > 32 {
                return None;
            }
        }
        if b == b')' {
            if depth == 0 {
                break;
            }
            depth -= 1;
        }
        if b.is_ascii_whitespace() || b < 0x20 {
            break;
        }
        i += 1;
    }
    if depth != 0 {
        return None;
    }
    Some((unescape(&src[start..i]), i))
}

fn parse_title(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let close = match bytes.get(start)? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == close {
            return Some((unescape(&src[start + 1..i]), i + 1));
        }
        i += 1;
    }
    None
}

/// Parse `[label](destination "title")` with the `[` at `start`
fn parse_link_at(state: &mut InlineState<'_>, start: usize) -> Option<LinkParts> {
    let label_end = state.label_end(start)?;
    let src = state.src;
    let bytes = src.as_bytes();
    if bytes.get(label_end + 1) != Some(&b'(') {
        return None;
    }
    let mut i = skip_whitespace(bytes, label_end + 2);
    let (href, after) = if bytes.get(i) == Some(&b')') {
        (String::new(), i)
    } else {
        parse_destination(src, i)?
    };
    i = after;

    let mut title = None;
    let spaced = skip_whitespace(bytes, i);
    if spaced > i
        && let Some((parsed, after_title)) = parse_title(src, spaced)
    {
        title = Some(parsed);
        i = after_title;
    }
    i = skip_whitespace(bytes, i);
    if bytes.get(i) != Some(&b')') {
        return None;
    }

    Some(LinkParts {
        label_start: start + 1,
        label_end,
        href,
        title,
        end: i + 1,
    })
}

fn link(state: &mut InlineState<'_>) -> bool {
    if state.peek() != Some('[') || state.link_level > 0 {
        return false;
    }
    let start = state.pos;
    let Some(parts) = parse_link_at(state, start) else {
        return false;
    };
    let Some(href) = safe_url("a", "href", &parts.href) else {
        return false;
    };

    let src = state.src;
    let children = state.parse_nested(&src[parts.label_start..parts.label_end], state.link_level + 1);
    let mut open = Token::new("link_open", "a", Nesting::Open).with_attr("href", href);
    if let Some(title) = parts.title {
        open.set_attr("title", title);
    }
    state.push(open);
    state.tokens.extend(children);
    state.push(Token::new("link_close", "a", Nesting::Close));
    state.pos = parts.end;
    true
}

fn image(state: &mut InlineState<'_>) -> bool {
    if !state.rest().starts_with("![") {
        return false;
    }
    let start = state.pos + 1;
    let Some(parts) = parse_link_at(state, start) else {
        return false;
    };
    let Some(src_url) = safe_url("img", "src", &parts.href) else {
        return false;
    };

    let src = state.src;
    let children = state.parse_nested(&src[parts.label_start..parts.label_end], state.link_level);
    let mut token = Token::new("image", "img", Nesting::Leaf)
        .with_attr("src", src_url)
        .with_attr("alt", "");
    if let Some(title) = parts.title {
        token.set_attr("title", title);
    }
    token.children = children;
    state.push(token);
    state.pos = parts.end;
    true
}

fn autolink_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(&CELL, r"^<([A-Za-z][A-Za-z0-9+.-]{1,31}:[^<>\x00-\x20]*)>")
}

fn email_autolink_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(
        &CELL,
        r"^<([A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*)>",
    )
}

/// Push `link_open`, a text label and `link_close`
pub fn push_link(state: &mut InlineState<'_>, href: String, label: &str, info: &str) {
    let mut open = Token::new("link_open", "a", Nesting::Open).with_attr("href", href);
    open.info = info.to_string();
    let mut close = Token::new("link_close", "a", Nesting::Close);
    close.info = info.to_string();
    state.push(open);
    state.push(Token::text(label));
    state.push(close);
}

fn autolink(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('<') {
        return false;
    }

    if let Some(captures) = autolink_regex().and_then(|re| re.captures(rest))
        && let (Some(whole), Some(url)) = (captures.get(0), captures.get(1))
    {
        let Some(href) = safe_url("a", "href", url.as_str()) else {
            return false;
        };
        push_link(state, href, url.as_str(), "autolink");
        state.pos += whole.end();
        return true;
    }

    if let Some(captures) = email_autolink_regex().and_then(|re| re.captures(rest))
        && let (Some(whole), Some(email)) = (captures.get(0), captures.get(1))
    {
        push_link(state, format!("mailto:{}", email.as_str()), email.as_str(), "autolink");
        state.pos += whole.end();
        return true;
    }
    false
}

fn html_inline_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(
        &CELL,
        r#"^(?:<[A-Za-z][A-Za-z0-9-]*(?:\s+[A-Za-z_:][A-Za-z0-9_.:-]*(?:\s*=\s*(?:[^"'=<>`\x00-\x20]+|'[^']*'|"[^"]*"))?)*\s*/?>|</[A-Za-z][A-Za-z0-9-]*\s*>|<!---?>|<!--(?:[^-]|-[^-])*-->|<[?][\s\S]*?[?]>|<![A-Za-z][^>]*>|<!\[CDATA\[[\s\S]*?\]\]>)"#,
    )
}

fn html_inline(state: &mut InlineState<'_>) -> bool {
    if !state.options.settings.allow_html {
        return false;
    }
    let rest = state.rest();
    let mut chars = rest.chars();
    if chars.next() != Some('<') {
        return false;
    }
    if !chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
    {
        return false;
    }
    let Some(found) = html_inline_regex().and_then(|re| re.find(rest)) else {
        return false;
    };
    let mut token = Token::new("html_inline", "", Nesting::Leaf);
    token.content = found.as_str().to_string();
    state.push(token);
    state.pos += found.end();
    true
}

fn entity_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached_regex(
        &CELL,
        r"^&(?:#[xX]([0-9a-fA-F]{1,6})|#([0-9]{1,7})|([A-Za-z][A-Za-z0-9]{1,31}));",
    )
}

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{a0}"),
    ("copy", "©"),
    ("reg", "®"),
    ("trade", "™"),
    ("hellip", "…"),
    ("mdash", "—"),
    ("ndash", "–"),
    ("laquo", "«"),
    ("raquo", "»"),
    ("ldquo", "“"),
    ("rdquo", "”"),
    ("lsquo", "‘"),
    ("rsquo", "’"),
    ("middot", "·"),
    ("bull", "•"),
    ("times", "×"),
    ("divide", "÷"),
    ("deg", "°"),
    ("plusmn", "±"),
    ("para", "¶"),
    ("sect", "§"),
    ("euro", "€"),
    ("pound", "£"),
    ("yen", "¥"),
    ("cent", "¢"),
];

fn decode_entity(captures: &regex::Captures<'_>) -> Option<String> {
    let code = if let Some(hex) = captures.get(1) {
        u32::from_str_radix(hex.as_str(), 16).ok()
    } else if let Some(dec) = captures.get(2) {
        dec.as_str().parse::<u32>().ok()
    } else {
        let name = captures.get(3)?.as_str();
        return NAMED_ENTITIES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.to_string());
    };
    let c = code
        .filter(|c| *c != 0)
        .and_then(char::from_u32)
        .unwrap_or('\u{fffd}');
    Some(c.to_string())
}

fn entity(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('&') {
        return false;
    }
    let Some(captures) = entity_regex().and_then(|re| re.captures(rest)) else {
        return false;
    };
    let Some(decoded) = decode_entity(&captures) else {
        return false;
    };
    let len = captures.get(0).map_or(1, |m| m.end());
    let mut token = Token::new("text_special", "", Nesting::Leaf);
    token.content = decoded;
    token.info = "entity".to_string();
    state.push(token);
    state.pos += len;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse_with(source: &str, options: &RenderOptions) -> Vec<Token> {
        let rules = core_rules();
        InlineState::parse(source, &rules, options, 100)
    }

    fn parse(source: &str) -> Vec<Token> {
        parse_with(source, &RenderOptions::default())
    }

    fn kinds(tokens: &[Token]) -> Vec<&'static str> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_plain_text_is_one_token() {
        let tokens = parse("hello world");
        assert_eq!(tokens, vec![Token::text("hello world")]);
    }

    #[test]
    fn test_strong_and_em() {
        let tokens = parse("*a **b** c*");
        assert_eq!(
            kinds(&tokens),
            vec!["em_open", "text", "strong_open", "text", "strong_close", "text", "em_close"]
        );
    }

    #[test]
    fn test_unmatched_markers_stay_literal() {
        assert_eq!(parse("**open"), vec![Token::text("**open")]);
        assert_eq!(parse("2 * 3 * 4"), vec![Token::text("2 * 3 * 4")]);
    }

    #[test]
    fn test_intraword_underscore() {
        assert_eq!(parse("snake_case_name"), vec![Token::text("snake_case_name")]);
        let tokens = parse("in*tra*word");
        assert_eq!(kinds(&tokens), vec!["text", "em_open", "text", "em_close", "text"]);
    }

    #[test]
    fn test_strikethrough() {
        let tokens = parse("~~gone~~ ~kept~");
        assert_eq!(kinds(&tokens)[..3], ["s_open", "text", "s_close"]);
        assert_eq!(tokens[3].content, " ~kept~");
    }

    #[test]
    fn test_code_span() {
        let tokens = parse("use `` `x` `` here");
        assert_eq!(tokens[1].kind, "code_inline");
        assert_eq!(tokens[1].content, "`x`");
        assert_eq!(parse("``no close"), vec![Token::text("``no close")]);
    }

    #[test]
    fn test_breaks() {
        let tokens = parse("a\nb");
        assert_eq!(tokens[1].kind, "hardbreak");

        let mut options = RenderOptions::default();
        options.settings.traditional_markdown_linebreaks = true;
        let tokens = parse_with("a\nb", &options);
        assert_eq!(tokens[1].kind, "softbreak");
        let tokens = parse_with("a  \nb", &options);
        assert_eq!(tokens[1].kind, "hardbreak");
        assert_eq!(tokens[0].content, "a");
    }

    #[test]
    fn test_escapes() {
        let tokens = parse(r"\*not em\*");
        assert_eq!(kinds(&tokens), vec!["text_special", "text", "text_special"]);
        assert_eq!(parse(r"a\b"), vec![Token::text(r"a\b")]);
    }

    #[test]
    fn test_link_with_title() {
        let tokens = parse(r#"[**x**](/path "T")"#);
        assert_eq!(tokens[0].kind, "link_open");
        assert_eq!(tokens[0].attr("href"), Some("/path"));
        assert_eq!(tokens[0].attr("title"), Some("T"));
        assert_eq!(tokens[1].kind, "strong_open");
        assert_eq!(tokens.last().map(|t| t.kind), Some("link_close"));
    }

    #[test]
    fn test_link_destinations() {
        let tokens = parse("[a](<with space>) [b](/p(1))");
        assert_eq!(tokens[0].attr("href"), Some("with%20space"));
        assert_eq!(tokens[4].attr("href"), Some("/p(1)"));
    }

    #[test]
    fn test_dangerous_link_stays_text() {
        let tokens = parse("[x](javascript:alert(1))");
        assert!(tokens.iter().all(|t| t.kind == "text"));
    }

    #[test]
    fn test_no_links_inside_links() {
        let tokens = parse("[[a](/inner)](/outer)");
        let opens = tokens.iter().filter(|t| t.kind == "link_open").count();
        assert_eq!(opens, 1);
    }

    #[test]
    fn test_image() {
        let tokens = parse("![a *cat*](/cat.png)");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, "image");
        assert_eq!(tokens[0].attr("src"), Some("/cat.png"));
        assert_eq!(crate::token::plain_text(&tokens[0].children), "a cat");
    }

    #[test]
    fn test_autolinks() {
        let tokens = parse("<https://example.com> <me@example.com>");
        assert_eq!(tokens[0].attr("href"), Some("https://example.com"));
        assert_eq!(tokens[0].info, "autolink");
        assert_eq!(tokens[4].attr("href"), Some("mailto:me@example.com"));
    }

    #[test]
    fn test_html_inline() {
        let tokens = parse("a <kbd>b</kbd>");
        assert_eq!(kinds(&tokens), vec!["text", "html_inline", "text", "html_inline"]);

        let mut options = RenderOptions::default();
        options.settings.allow_html = false;
        let tokens = parse_with("a <kbd>b</kbd>", &options);
        assert_eq!(tokens, vec![Token::text("a <kbd>b</kbd>")]);
    }

    #[test]
    fn test_entities() {
        let tokens = parse("&copy; &#65; &#x42; &bogus;");
        let decoded: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == "text_special")
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(decoded, vec!["©", "A", "B"]);
        assert_eq!(tokens.last().map(|t| t.content.as_str()), Some(" &bogus;"));
    }

    #[test]
    fn test_nesting_limit_returns_literal_label() {
        let rules = core_rules();
        let options = RenderOptions::default();
        let tokens = InlineState::parse("[*a*](/x)", &rules, &options, 1);
        assert_eq!(tokens[1], Token::text("*a*"));
    }

    #[test]
    fn test_unclosed_labels_settled_once() {
        let source = "[".repeat(40_000);
        let rules = core_rules();
        let options = RenderOptions::default();
        let mut state = InlineState::new(&source, &rules, &options, 100);
        state.tokenize();
        assert_eq!(state.label_ends.len(), 40_000);
        assert!(state.label_ends.values().all(Option::is_none));
        assert_eq!(state.tokens, vec![Token::text(source.clone())]);
    }

    #[test]
    fn test_label_ends_skip_escapes_and_code() {
        let source = "[a \\] `]` [b] c](/x)";
        let rules = core_rules();
        let options = RenderOptions::default();
        let mut state = InlineState::new(source, &rules, &options, 100);
        assert_eq!(state.label_end(0), Some(source.len() - 5));
        assert_eq!(state.label_end(10), Some(12));
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(source in "[ -~\n]{0,80}") {
            let _ = parse(&source);
        }

        #[test]
        fn prop_plain_words_pass_through(source in "[a-z ]{1,60}") {
            let tokens = parse(&source);
            prop_assert_eq!(tokens, vec![Token::text(source.clone())]);
        }
    }
}
