//! `:name:` emoji and emoticon shortcuts
//!
//! Names resolve against the custom emoji map first, then the host lookup,
//! then the built-in table. Names nothing knows about stay as typed.

use super::{CoreContext, FeatureSpec, TextScope, for_each_inline, rewrite_text_tokens};
use crate::inline::is_punctuation;
use crate::options::RenderOptions;
use crate::token::{Nesting, Token};

/// Cache-busting suffix on built-in emoji image URLs
pub const EMOJI_VERSION: &str = "v=12";

/// Emoji inlines holding no more than this many emoji and nothing but
/// whitespace render larger
pub const MAX_ONLY_EMOJI: usize = 3;

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("emoji")
        .enabled_when(|config| config.settings.enable_emoji)
        .with_allow_list(["img.emoji", "img.only-emoji", "img.emoji-custom"])
        .with_post_processor("emoji", apply)
}

const BUILTIN: &[&str] = &[
    "+1", "-1", "angry", "astonished", "blush", "broken_heart", "clap", "confused",
    "confounded", "cry", "disappointed", "dizzy_face", "expressionless", "eyes", "fearful",
    "fire", "flushed", "frowning", "grimacing", "grin", "grinning", "heart", "heart_eyes",
    "heavy_check_mark", "hugs", "innocent", "joy", "kissing", "kissing_heart", "laughing",
    "man", "neutral_face", "ok_hand", "open_mouth", "pensive", "point_right", "poop",
    "pray", "punch", "rage", "raised_hands", "relaxed", "relieved", "rocket", "scream",
    "see_no_evil", "slightly_frowning_face", "slightly_smiling_face", "sleeping", "smile",
    "smiley", "smirk", "sob", "star", "stuck_out_tongue", "stuck_out_tongue_closed_eyes",
    "stuck_out_tongue_winking_eye", "sunglasses", "sweat", "sweat_smile", "tada",
    "thinking", "tired_face", "triumph", "unamused", "upside_down_face", "warning",
    "wave", "weary", "wink", "woman", "worried", "x", "yum", "zipper_mouth_face",
];

const ALIASES: &[(&str, &str)] = &[
    ("thumbsup", "+1"),
    ("thumbsdown", "-1"),
    ("satisfied", "laughing"),
    ("simple_smile", "slightly_smiling_face"),
    ("hankey", "poop"),
    ("shit", "poop"),
    ("facepunch", "punch"),
    ("hugging_face", "hugs"),
];

/// Emoticon shortcuts, longest first so `:-)` wins over `:)`
const EMOTICONS: &[(&str, &str)] = &[
    ("</3", "broken_heart"),
    (":-)", "slightly_smiling_face"),
    (":'(", "cry"),
    ("8-)", "sunglasses"),
    (":)", "slightly_smiling_face"),
    (":(", "frowning"),
    (";)", "wink"),
    (":D", "smiley"),
    (":P", "stuck_out_tongue"),
    (";P", "stuck_out_tongue_winking_eye"),
    (":O", "open_mouth"),
    (":/", "confused"),
    (":|", "expressionless"),
    (":*", "kissing_heart"),
    ("<3", "heart"),
];

/// Canonical built-in name for `name`, following aliases
pub fn builtin_name(name: &str) -> Option<&'static str> {
    if let Some(found) = BUILTIN.iter().find(|n| **n == name) {
        return Some(found);
    }
    ALIASES.iter().find(|(alias, _)| *alias == name).map(|(_, target)| *target)
}

/// Image URL for an emoji, `None` when the name is unknown
///
/// # Examples
///
/// ```
/// use cooked_markup::features::emoji::emoji_url;
/// use cooked_markup::options::RenderOptions;
///
/// let options = RenderOptions::default();
/// assert_eq!(
///     emoji_url("thumbsup", None, &options).map(|(url, _)| url).as_deref(),
///     Some("/images/emoji/twitter/+1.png?v=12")
/// );
/// assert!(emoji_url("not_an_emoji", None, &options).is_none());
/// ```
pub fn emoji_url(name: &str, tone: Option<u8>, options: &RenderOptions) -> Option<(String, bool)> {
    if let Some(url) = options.custom_emoji.get(name) {
        return Some((url.clone(), true));
    }
    if let Some(lookup) = &options.lookups.emoji_url
        && let Some(url) = lookup(name)
    {
        return Some((url, false));
    }
    let canonical = builtin_name(name)?;
    let settings = &options.settings;
    let base = settings.emoji_base_url.trim_end_matches('/');
    let url = match tone {
        Some(tone) => format!("{base}/{}/{canonical}/{tone}.png?{EMOJI_VERSION}", settings.emoji_set),
        None => format!("{base}/{}/{canonical}.png?{EMOJI_VERSION}", settings.emoji_set),
    };
    Some((url, false))
}

fn emoji_token(code: &str, url: String, custom: bool) -> Token {
    let title = format!(":{code}:");
    Token::new("emoji", "img", Nesting::Leaf)
        .with_attr("src", url)
        .with_attr("title", title.clone())
        .with_attr("class", if custom { "emoji emoji-custom" } else { "emoji" })
        .with_attr("alt", title)
        .with_attr("loading", "lazy")
        .with_attr("width", "20")
        .with_attr("height", "20")
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'+' | b'-')
}

fn is_boundary(c: Option<char>) -> bool {
    c.is_none_or(|c| c.is_whitespace() || is_punctuation(c))
}

/// `(name, tone, end)` of a `:name:` or `:name:tN:` code starting at `start`
fn scan_named(text: &str, start: usize) -> Option<(&str, Option<u8>, usize)> {
    let bytes = text.as_bytes();
    let name_start = start + 1;
    let mut end = name_start;
    while end < bytes.len() && is_name_char(bytes[end]) {
        end += 1;
    }
    if end == name_start || bytes.get(end) != Some(&b':') {
        return None;
    }
    let name = &text[name_start..end];
    let after = end + 1;
    if let [b't', digit @ b'1'..=b'6', b':', ..] = bytes.get(after..).unwrap_or_default() {
        return Some((name, Some(digit - b'0'), after + 3));
    }
    Some((name, None, after))
}

fn scan_emoticon(text: &str, start: usize) -> Option<(&'static str, usize)> {
    let rest = text.get(start..)?;
    EMOTICONS
        .iter()
        .find(|(emoticon, _)| rest.starts_with(emoticon))
        .map(|(emoticon, name)| (*name, start + emoticon.len()))
}

/// Split `text` into plain text and emoji tokens
pub fn emoji_text(text: &str, options: &RenderOptions) -> Option<Vec<Token>> {
    let settings = &options.settings;
    let anywhere = settings.enable_inline_emoji_translation;
    let shortcuts = settings.enable_emoji_shortcuts;
    if !text.contains(':') && !(shortcuts && (text.contains(';') || text.contains('<') || text.contains('8'))) {
        return None;
    }

    let mut tokens = Vec::new();
    let mut last = 0;
    let mut pos = 0;
    while pos < text.len() {
        let Some(c) = text[pos..].chars().next() else {
            break;
        };
        let prev = text[..pos].chars().next_back();

        if c == ':' && (anywhere || is_boundary(prev))
            && let Some((name, tone, end)) = scan_named(text, pos)
            && (anywhere || is_boundary(text[end..].chars().next()))
            && let Some((url, custom)) = emoji_url(name, tone, options)
        {
            let code = match tone {
                Some(tone) => format!("{name}:t{tone}"),
                None => name.to_string(),
            };
            if pos > last {
                tokens.push(Token::text(&text[last..pos]));
            }
            tokens.push(emoji_token(&code, url, custom));
            last = end;
            pos = end;
            continue;
        }

        if shortcuts
            && prev.is_none_or(char::is_whitespace)
            && let Some((name, end)) = scan_emoticon(text, pos)
            && text[end..].chars().next().is_none_or(char::is_whitespace)
            && let Some((url, custom)) = emoji_url(name, None, options)
        {
            if pos > last {
                tokens.push(Token::text(&text[last..pos]));
            }
            tokens.push(emoji_token(name, url, custom));
            last = end;
            pos = end;
            continue;
        }

        pos += c.len_utf8();
    }

    if tokens.is_empty() {
        return None;
    }
    if last < text.len() {
        tokens.push(Token::text(&text[last..]));
    }
    Some(tokens)
}

fn mark_only_emoji(children: &mut [Token]) {
    let mut count = 0;
    for token in children.iter() {
        match token.kind {
            "emoji" => count += 1,
            "text" if token.content.trim().is_empty() => {}
            "softbreak" | "hardbreak" => {}
            _ => return,
        }
    }
    if (1..=MAX_ONLY_EMOJI).contains(&count) {
        for token in children.iter_mut().filter(|t| t.kind == "emoji") {
            token.add_class("only-emoji");
        }
    }
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    for_each_inline(tokens, |children| {
        rewrite_text_tokens(children, TextScope::OutsideAutolinks, |text| {
            emoji_text(text, ctx.options)
        });
        mark_only_emoji(children);
    });
}
