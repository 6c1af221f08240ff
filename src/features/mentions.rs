//! `@username` mentions

use super::{CoreContext, FeatureSpec, TextScope, for_each_inline, rewrite_text_tokens};
use crate::options::{MentionKind, RenderOptions, SiteSettings};
use crate::token::{Nesting, Token};

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("mentions")
        .enabled_when(|config| config.settings.enable_mentions)
        .with_allow_list(["a.mention", "a.mention-group", "span.mention"])
        .with_post_processor("mentions", apply)
}

fn is_name_start(c: char, unicode: bool) -> bool {
    c == '_' || if unicode { c.is_alphanumeric() } else { c.is_ascii_alphanumeric() }
}

fn is_name_char(c: char, unicode: bool) -> bool {
    is_name_start(c, unicode) || c == '.' || c == '-'
}

/// Characters that may not precede `@`
fn blocks_mention(previous: char) -> bool {
    previous.is_alphanumeric() || matches!(previous, '_' | '@' | '/' | '`')
}

/// Byte ranges `(at, end)` of the mentions in `text`, `at` pointing at `@`
///
/// # Examples
///
/// ```
/// use cooked_markup::features::mentions::find_mentions;
/// use cooked_markup::options::SiteSettings;
///
/// let settings = SiteSettings::default();
/// assert_eq!(find_mentions("hi @sam.", &settings), vec![(3, 7)]);
/// assert!(find_mentions("mail me@example.com", &settings).is_empty());
/// ```
pub fn find_mentions(text: &str, settings: &SiteSettings) -> Vec<(usize, usize)> {
    let unicode = settings.unicode_usernames;
    let mut found = Vec::new();
    let mut previous: Option<char> = None;
    let mut iter = text.char_indices().peekable();

    while let Some((at, c)) = iter.next() {
        let prev = previous.replace(c);
        if c != '@' || prev.is_some_and(blocks_mention) {
            continue;
        }
        let start = at + 1;
        let mut end = start;
        while let Some(&(idx, next)) = iter.peek() {
            let allowed = if end == start {
                is_name_start(next, unicode)
            } else {
                is_name_char(next, unicode)
            };
            if !allowed {
                break;
            }
            end = idx + next.len_utf8();
            previous = Some(next);
            iter.next();
        }

        let name = text[start..end].trim_end_matches(['.', '-', '_']);
        if name.is_empty() || name.chars().count() > settings.max_username_length {
            continue;
        }
        found.push((at, start + name.len()));
    }
    found
}

fn mention_tokens(name: &str, options: &RenderOptions) -> Vec<Token> {
    let kind = match &options.lookups.mention {
        Some(lookup) => lookup(name),
        None => Some(MentionKind::User),
    };
    let (open, tag) = match kind {
        Some(MentionKind::User) => (
            Token::new("mention_open", "a", Nesting::Open)
                .with_attr("class", "mention")
                .with_attr("href", format!("/u/{}", name.to_lowercase())),
            "a",
        ),
        Some(MentionKind::Group) => (
            Token::new("mention_open", "a", Nesting::Open)
                .with_attr("class", "mention-group")
                .with_attr("href", format!("/groups/{name}")),
            "a",
        ),
        None => (
            Token::new("mention_open", "span", Nesting::Open).with_attr("class", "mention"),
            "span",
        ),
    };
    vec![
        open,
        Token::text(format!("@{name}")),
        Token::new("mention_close", tag, Nesting::Close),
    ]
}

/// Split `text` into plain text and mention tokens
pub fn mention_text(text: &str, options: &RenderOptions) -> Option<Vec<Token>> {
    if !text.contains('@') {
        return None;
    }
    let found = find_mentions(text, &options.settings);
    if found.is_empty() {
        return None;
    }
    let mut tokens = Vec::new();
    let mut last = 0;
    for (at, end) in found {
        if at > last {
            tokens.push(Token::text(&text[last..at]));
        }
        tokens.extend(mention_tokens(&text[at + 1..end], options));
        last = end;
    }
    if last < text.len() {
        tokens.push(Token::text(&text[last..]));
    }
    Some(tokens)
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    for_each_inline(tokens, |children| {
        rewrite_text_tokens(children, TextScope::OutsideLinks, |text| {
            mention_text(text, ctx.options)
        });
    });
}
