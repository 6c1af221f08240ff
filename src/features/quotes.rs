//! `[quote="user, post:N, topic:M, full:true"]` blocks
//!
//! A quote renders as an `aside.quote` carrying the source post in data
//! attributes, an optional title with the quoted user's avatar, and a
//! blockquote holding the parsed body.

use super::FeatureSpec;
use super::bbcode::{BbTag, finish_block, match_block_tag};
use crate::block::{BlockRule, BlockState};
use crate::render::escape_html;
use crate::token::{Nesting, Token};

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("quotes")
        .with_block_rule(BlockRule {
            name: "quotes",
            order: 360,
            run: quote_block,
            terminates_paragraph: true,
        })
        .with_allow_list([
            "aside.quote",
            "aside.no-group",
            "aside.group-*",
            "aside[data-username]",
            "aside[data-post]",
            "aside[data-topic]",
            "aside[data-full]",
            "div.title",
            "div.quote-controls",
            "img.avatar",
            "blockquote",
        ])
}

/// Source reference parsed from a quote tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteParams {
    pub username: Option<String>,
    pub post: Option<u64>,
    pub topic: Option<u64>,
    pub full: bool,
}

impl QuoteParams {
    /// Read parameters from either `[quote="user, post:1"]` or
    /// `[quote user=name post=1]`
    ///
    /// # Examples
    ///
    /// ```
    /// use cooked_markup::features::bbcode::parse_open_tag;
    /// use cooked_markup::features::quotes::QuoteParams;
    ///
    /// let tag = parse_open_tag(r#"[quote="eviltrout, post:1, topic:2, full:true"]"#).unwrap();
    /// let params = QuoteParams::from_tag(&tag);
    /// assert_eq!(params.username.as_deref(), Some("eviltrout"));
    /// assert_eq!(params.post, Some(1));
    /// assert_eq!(params.topic, Some(2));
    /// assert!(params.full);
    /// ```
    pub fn from_tag(tag: &BbTag) -> Self {
        let mut params = Self::default();
        if let Some(default) = &tag.default {
            for part in default.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.split_once(':') {
                    Some((key, value)) => params.set(key.trim(), value.trim()),
                    None if params.username.is_none() => params.username = Some(part.to_string()),
                    None => {}
                }
            }
        }
        for (key, value) in &tag.attrs {
            params.set(key, value);
        }
        params
    }

    fn set(&mut self, key: &str, value: &str) {
        match key {
            "user" | "username" => self.username = Some(value.to_string()),
            "post" => self.post = value.parse().ok(),
            "topic" => self.topic = value.parse().ok(),
            "full" => self.full = value == "true",
            _ => {}
        }
    }
}

fn title_html(state: &BlockState<'_>, username: &str) -> String {
    let avatar = state
        .options
        .lookups
        .avatar
        .as_ref()
        .and_then(|lookup| lookup(username));
    let name = escape_html(username);
    match avatar {
        Some(url) => format!(
            "<div class=\"title\">\n<div class=\"quote-controls\"></div>\n<img loading=\"lazy\" alt=\"\" width=\"24\" height=\"24\" src=\"{}\" class=\"avatar\"> {name}:</div>\n",
            escape_html(&url)
        ),
        None => format!(
            "<div class=\"title\">\n<div class=\"quote-controls\"></div>\n{name}:</div>\n"
        ),
    }
}

fn quote_block(state: &mut BlockState<'_>, silent: bool) -> bool {
    if !state.can_nest() {
        return false;
    }
    let Some(matched) =
        match_block_tag(&state.lines, state.line, &["quote"], &mut state.closers)
    else {
        return false;
    };
    if silent {
        return true;
    }

    let params = QuoteParams::from_tag(&matched.tag);
    let group = match (&params.username, params.post, &state.options.lookups.primary_group) {
        (Some(username), Some(post), Some(lookup)) => lookup(username, post),
        _ => None,
    };
    let class = match &group {
        Some(group) => format!("quote group-{group}"),
        None => "quote no-group".to_string(),
    };

    let mut aside = Token::new("quote_open", "aside", Nesting::Open).with_attr("class", class);
    if let Some(username) = &params.username {
        aside.set_attr("data-username", username.clone());
    }
    if let Some(post) = params.post {
        aside.set_attr("data-post", post.to_string());
    }
    if let Some(topic) = params.topic {
        aside.set_attr("data-topic", topic.to_string());
    }
    if params.full {
        aside.set_attr("data-full", "true");
    }
    let title = params.username.as_deref().map(|u| title_html(state, u));
    let body = state.nested(matched.inner.clone());

    let open = state.push("quote_open", "aside", Nesting::Open);
    open.attrs = aside.attrs;
    if let Some(title) = title {
        let mut raw = Token::raw_html(title);
        raw.block = true;
        raw.level = state.level + 1;
        state.tokens.push(raw);
    }
    state.push("blockquote_open", "blockquote", Nesting::Open);
    state.tokens.extend(body);
    state.push("blockquote_close", "blockquote", Nesting::Close);
    state.push("quote_close", "aside", Nesting::Close);
    finish_block(state, &matched);
    true
}
