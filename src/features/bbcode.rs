//! Bracket tags (`[b]`, `[url=…]`, `[code]`, `[grid]`, …)
//!
//! Tags are case-insensitive and stack-matched: the first closing tag that
//! brings the nesting depth back to zero ends the element. An opener without
//! a closer is left as literal text.
//!
//! Block tags must start a line; inline tags may appear anywhere in running
//! text. `[quote]` shares the block matcher but lives in its own feature.

use super::FeatureSpec;
use crate::block::{BlockRule, BlockState, indent_of, is_blank};
use crate::brackets::{CloserMemo, Pos};
use crate::inline::{InlineRule, InlineState};
use crate::sanitizer::safe_url;
use crate::token::{Nesting, Token};

pub fn block_feature() -> FeatureSpec {
    FeatureSpec::new("bbcode-block")
        .with_block_rule(BlockRule {
            name: "bbcode_block",
            order: 350,
            run: bbcode_block,
            terminates_paragraph: true,
        })
        .with_allow_list(["div.d-image-grid", "pre", "code"])
}

pub fn inline_feature() -> FeatureSpec {
    FeatureSpec::new("bbcode-inline")
        .with_inline_rule(InlineRule {
            name: "bbcode_inline",
            order: 650,
            run: bbcode_inline,
        })
        .with_allow_list([
            "span.bbcode-b",
            "span.bbcode-i",
            "span.bbcode-u",
            "span.bbcode-s",
            "a[data-bbcode=true]",
        ])
}

/// A parsed opening tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BbTag {
    /// Lowercase tag name
    pub name: String,
    /// Value of `[tag=value]`
    pub default: Option<String>,
    /// `key=value` pairs after the name, keys lowercased
    pub attrs: Vec<(String, String)>,
    /// Byte length of the opening tag including brackets
    pub len: usize,
}

impl BbTag {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_value(src: &str, start: usize, is_default: bool) -> Option<(String, usize)> {
    let first = *src.as_bytes().get(start)?;
    if first == b'"' || first == b'\'' {
        let close = src[start + 1..].find([first as char, '\n', '['])? + start + 1;
        if src.as_bytes()[close] != first {
            return None;
        }
        return Some((src[start + 1..close].to_string(), close + 1));
    }
    let end = src[start..]
        .find(|c: char| c == ']' || c == '\n' || c == '[' || (!is_default && c.is_whitespace()))
        .map(|e| start + e)?;
    if end == start {
        return None;
    }
    Some((src[start..end].trim_end().to_string(), end))
}

/// Parse an opening tag at the start of `src`
///
/// # Examples
///
/// ```
/// use cooked_markup::features::bbcode::parse_open_tag;
///
/// let tag = parse_open_tag("[URL=https://example.com]x[/url]").unwrap();
/// assert_eq!(tag.name, "url");
/// assert_eq!(tag.default.as_deref(), Some("https://example.com"));
/// assert_eq!(tag.len, 25);
///
/// let tag = parse_open_tag(r#"[quote user="sam" post=2]"#).unwrap();
/// assert_eq!(tag.attr("user"), Some("sam"));
/// assert_eq!(tag.attr("post"), Some("2"));
///
/// assert!(parse_open_tag("[b").is_none());
/// assert!(parse_open_tag("[b-x=1]").is_none());
/// assert!(parse_open_tag(r#"[quote="a [b] c"]"#).is_none());
/// ```
pub fn parse_open_tag(src: &str) -> Option<BbTag> {
    let rest = src.strip_prefix('[')?;
    let bytes = rest.as_bytes();
    if !bytes.first()?.is_ascii_alphabetic() {
        return None;
    }
    let name_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let name = rest[..name_len].to_ascii_lowercase();
    let mut i = name_len;
    if !matches!(bytes.get(i), Some(b']' | b'=' | b' ' | b'\t')) {
        return None;
    }

    let mut default = None;
    if bytes.get(i) == Some(&b'=') {
        let (value, next) = parse_value(rest, i + 1, true)?;
        default = Some(value);
        i = next;
    }

    let mut attrs = Vec::new();
    loop {
        while bytes.get(i).is_some_and(|b| *b == b' ' || *b == b'\t') {
            i += 1;
        }
        if *bytes.get(i)? == b']' {
            return Some(BbTag {
                name,
                default,
                attrs,
                len: i + 2,
            });
        }
        let key_len = rest[i..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len() - i);
        if key_len == 0 {
            return None;
        }
        let key = rest[i..i + key_len].to_ascii_lowercase();
        i += key_len;
        if bytes.get(i) != Some(&b'=') {
            return None;
        }
        let (value, next) = parse_value(rest, i + 1, false)?;
        attrs.push((key, value));
        i = next;
    }
}

/// A block tag matched across lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMatch {
    pub tag: BbTag,
    /// Whether the opener stands alone on its line
    pub opener_alone: bool,
    /// Lines between the opener and the closer
    pub inner: Vec<String>,
    /// Line holding the closer
    pub end_line: usize,
    /// Text after the closer on its line
    pub trailing: Option<String>,
}

/// Match a block tag named one of `names` starting at line `start`
pub fn match_block_tag(
    lines: &[String],
    start: usize,
    names: &[&str],
    memo: &mut CloserMemo,
) -> Option<BlockMatch> {
    let line = lines.get(start)?;
    if indent_of(line) >= 4 {
        return None;
    }
    let trimmed = line.trim_start();
    if !trimmed.starts_with('[') {
        return None;
    }
    let tag = parse_open_tag(trimmed)?;
    if !names.contains(&tag.name.as_str()) {
        return None;
    }

    let at = line.len() - trimmed.len();
    let body = at + tag.len;
    let opener_alone = is_blank(&line[body..]);
    let Some(closer) = memo.find(lines, &tag.name, Pos::new(start, at)) else {
        tracing::debug!(tag = %tag.name, line = start, "unterminated bracket tag left as text");
        return None;
    };

    let mut inner = Vec::new();
    for (idx, text) in lines.iter().enumerate().take(closer.line + 1).skip(start) {
        let from = if idx == start { body } else { 0 };
        if idx == closer.line {
            let before = &text[from..closer.start];
            if !is_blank(before) {
                inner.push(before.to_string());
            }
        } else if idx != start || !opener_alone {
            inner.push(text[from..].to_string());
        }
    }
    let after = lines[closer.line][closer.end..].trim();
    Some(BlockMatch {
        tag,
        opener_alone,
        inner,
        end_line: closer.line,
        trailing: (!after.is_empty()).then(|| after.to_string()),
    })
}

/// Move `state` past a matched block, keeping any text after the closer
pub fn finish_block(state: &mut BlockState<'_>, matched: &BlockMatch) {
    match &matched.trailing {
        Some(trailing) => state.resume_at(matched.end_line, trailing.clone()),
        None => state.line = matched.end_line + 1,
    }
}

fn bbcode_block(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some(matched) =
        match_block_tag(&state.lines, state.line, &["code", "grid"], &mut state.closers)
    else {
        return false;
    };
    if matched.tag.name == "code" && !matched.opener_alone {
        return false;
    }
    if matched.tag.name == "grid" && !state.can_nest() {
        return false;
    }
    if silent {
        return true;
    }

    if matched.tag.name == "code" {
        let mut content = matched.inner.join("\n");
        content.push('\n');
        let token = state.push("fence", "code", Nesting::Leaf);
        token.content = content;
        token.info = matched.tag.default.clone().unwrap_or_default();
    } else {
        let inner = state.nested(matched.inner.clone());
        state
            .push("grid_open", "div", Nesting::Open)
            .set_attr("class", "d-image-grid");
        state.tokens.extend(inner);
        state.push("grid_close", "div", Nesting::Close);
    }
    finish_block(state, &matched);
    true
}

const INLINE_TAGS: &[&str] = &["b", "i", "u", "s", "url", "email", "img", "code"];

fn bbcode_inline(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    if !rest.starts_with('[') {
        return false;
    }
    let Some(tag) = parse_open_tag(rest) else {
        return false;
    };
    if !INLINE_TAGS.contains(&tag.name.as_str()) {
        return false;
    }
    let src = state.src;
    let Some(closer) = state.closers.find(&[src], &tag.name, Pos::new(0, state.pos)) else {
        return false;
    };
    let body = &src[state.pos + tag.len..closer.start];

    let pushed = match tag.name.as_str() {
        "b" | "i" | "u" | "s" => {
            let children = state.parse_nested(body, state.link_level);
            let class = format!("bbcode-{}", tag.name);
            state.push(Token::new("bbcode_open", "span", Nesting::Open).with_attr("class", class));
            state.tokens.extend(children);
            state.push(Token::new("bbcode_close", "span", Nesting::Close));
            true
        }
        "url" | "email" => push_bbcode_link(state, &tag, body),
        "img" if body.trim().is_empty() => false,
        "img" => match safe_url("img", "src", body.trim()) {
            Some(src) => {
                state.push(
                    Token::new("image", "img", Nesting::Leaf)
                        .with_attr("src", src)
                        .with_attr("alt", ""),
                );
                true
            }
            None => false,
        },
        _ => {
            let mut token = Token::new("code_inline", "code", Nesting::Leaf);
            token.content = body.to_string();
            state.push(token);
            true
        }
    };
    if pushed {
        state.pos = closer.end;
    }
    pushed
}

fn push_bbcode_link(state: &mut InlineState<'_>, tag: &BbTag, body: &str) -> bool {
    if state.link_level > 0 {
        return false;
    }
    let target = tag.default.as_deref().unwrap_or(body).trim();
    if target.is_empty() {
        return false;
    }
    let href = if tag.name == "email" {
        if !target.contains('@') || target.contains(char::is_whitespace) {
            return false;
        }
        format!("mailto:{target}")
    } else {
        target.to_string()
    };
    let Some(href) = safe_url("a", "href", &href) else {
        return false;
    };

    let children = if tag.default.is_some() {
        state.parse_nested(body, state.link_level + 1)
    } else {
        vec![Token::text(body.trim())]
    };
    state.push(
        Token::new("link_open", "a", Nesting::Open)
            .with_attr("href", href)
            .with_attr("data-bbcode", "true"),
    );
    state.tokens.extend(children);
    state.push(Token::new("link_close", "a", Nesting::Close));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DEFAULT_MAX_NESTING;
    use crate::options::RenderOptions;

    fn lines(source: &str) -> Vec<String> {
        source.split('\n').map(str::to_string).collect()
    }

    fn inline_rules() -> Vec<InlineRule> {
        let mut rules = crate::inline::core_rules();
        rules.extend(inline_feature().inline_rules);
        rules.sort_by_key(|r| r.order);
        rules
    }

    fn block_rules() -> Vec<BlockRule> {
        let mut rules = crate::block::core_rules();
        rules.extend(block_feature().block_rules);
        rules.sort_by_key(|r| r.order);
        rules
    }

    fn parse_inline(source: &str) -> Vec<Token> {
        let options = RenderOptions::default();
        InlineState::parse(source, &inline_rules(), &options, DEFAULT_MAX_NESTING)
    }

    fn parse_block(source: &str) -> Vec<Token> {
        let options = RenderOptions::default();
        BlockState::parse(source, &block_rules(), &options, DEFAULT_MAX_NESTING)
    }

    #[test]
    fn test_match_block_same_line_and_trailing() {
        let mut memo = CloserMemo::new();
        let matched = match_block_tag(&lines("[grid]a[/grid] after"), 0, &["grid"], &mut memo);
        let matched = matched.unwrap();
        assert!(!matched.opener_alone);
        assert_eq!(matched.inner, vec!["a"]);
        assert_eq!(matched.trailing.as_deref(), Some("after"));
    }

    #[test]
    fn test_unterminated_block_is_none() {
        let mut memo = CloserMemo::new();
        assert!(match_block_tag(&lines("[grid]\na\nb"), 0, &["grid"], &mut memo).is_none());
    }

    #[test]
    fn test_code_block_is_verbatim() {
        let tokens = parse_block("[code]\n**x**\n[b]y[/b]\n[/code]\nafter");
        assert_eq!(tokens[0].kind, "fence");
        assert_eq!(tokens[0].content, "**x**\n[b]y[/b]\n");
        assert_eq!(tokens[2].content, "after");
    }

    #[test]
    fn test_grid_nests_blocks() {
        let tokens = parse_block("[grid]\n![a](/a.png)\n[/grid]");
        assert_eq!(tokens[0].attr("class"), Some("d-image-grid"));
        assert_eq!(tokens[2].kind, "inline");
        assert_eq!(tokens.last().map(|t| t.kind), Some("grid_close"));
    }

    #[test]
    fn test_inline_formatting_tags() {
        let tokens = parse_inline("[B]bold[/b] and [u]under[/u]");
        assert_eq!(tokens[0].attr("class"), Some("bbcode-b"));
        assert_eq!(tokens[1].content, "bold");
        assert_eq!(tokens[4].attr("class"), Some("bbcode-u"));
    }

    #[test]
    fn test_url_and_email() {
        let tokens = parse_inline("[url=https://a.com]site[/url] [url]https://b.com[/url]");
        assert_eq!(tokens[0].attr("href"), Some("https://a.com"));
        assert_eq!(tokens[0].attr("data-bbcode"), Some("true"));
        assert_eq!(tokens[4].attr("href"), Some("https://b.com"));
        assert_eq!(tokens[5].content, "https://b.com");

        let tokens = parse_inline("[email]me@x.org[/email]");
        assert_eq!(tokens[0].attr("href"), Some("mailto:me@x.org"));
    }

    #[test]
    fn test_unsafe_url_stays_literal() {
        let tokens = parse_inline("[url=javascript:alert(1)]x[/url]");
        assert!(tokens.iter().all(|t| t.kind == "text"));
    }

    #[test]
    fn test_unterminated_inline_is_literal() {
        assert_eq!(parse_inline("[b]open"), vec![Token::text("[b]open")]);
    }

    #[test]
    fn test_inline_code_and_img() {
        let tokens = parse_inline("[code]*x*[/code][img]/a.png[/img]");
        assert_eq!(tokens[0].kind, "code_inline");
        assert_eq!(tokens[0].content, "*x*");
        assert_eq!(tokens[1].attr("src"), Some("/a.png"));
    }

    #[test]
    fn test_empty_bodies_stay_literal() {
        assert_eq!(parse_inline("[img][/img]"), vec![Token::text("[img][/img]")]);
        assert_eq!(parse_inline("[img]  [/img]"), vec![Token::text("[img]  [/img]")]);
        assert_eq!(parse_inline("[url][/url]"), vec![Token::text("[url][/url]")]);
    }

    #[test]
    fn test_unterminated_block_tags_scanned_once() {
        let rules = block_rules();
        let options = RenderOptions::default();
        let source = "[grid]\n".repeat(4000);
        let mut state = BlockState::new(&source, &rules, &options, DEFAULT_MAX_NESTING);
        state.tokenize();
        assert!(state.closers.visited() <= 4000, "visited {}", state.closers.visited());
        assert_eq!(state.tokens[0].kind, "paragraph_open");
        assert_eq!(state.tokens.len(), 3);
    }

    #[test]
    fn test_unterminated_inline_tags_scanned_once() {
        let rules = inline_rules();
        let options = RenderOptions::default();
        let source = "[b]".repeat(10_000);
        let mut state = InlineState::new(&source, &rules, &options, DEFAULT_MAX_NESTING);
        state.tokenize();
        assert!(state.closers.visited() <= 10_000, "visited {}", state.closers.visited());
        assert_eq!(state.tokens, vec![Token::text(source.clone())]);
    }

    #[test]
    fn test_block_trailing_text_resumes_on_closer_line() {
        let tokens = parse_block("[grid]a[/grid] after\nnext");
        assert_eq!(tokens[0].kind, "grid_open");
        let paragraph = tokens.iter().find(|t| t.kind == "inline" && t.content.starts_with("after"));
        assert_eq!(paragraph.map(|t| t.content.as_str()), Some("after\nnext"));
    }
}
