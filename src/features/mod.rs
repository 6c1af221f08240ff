//! Named, toggleable features and the registry that orders them
//!
//! A feature bundles the block and inline rules it adds to the engine, the
//! allow-list entries its output needs, and an optional post-processor that
//! rewrites the token stream after the inline pass. The registry keeps
//! features in registration order; a pipeline is assembled from whichever of
//! them are enabled for a given [`PipelineConfig`].
//!
//! # Example
//!
//! ```
//! use cooked_markup::features::{FeatureRegistry, FeatureSpec};
//!
//! let mut registry = FeatureRegistry::standard();
//! registry.register(FeatureSpec::new("spoiler").with_allow_list(["div.spoiler"]));
//! assert!(registry.get("spoiler").is_some());
//! assert_eq!(registry.names().first().copied(), Some("default"));
//! ```

pub mod anchor;
pub mod bbcode;
pub mod censored;
pub mod code_block;
pub mod emoji;
pub mod linkify;
pub mod mentions;
pub mod onebox;
pub mod quotes;
pub mod table;
pub mod typographer;
pub mod upload;
pub mod watched_words;

use crate::allow_list::DEFAULT_ALLOW_LIST;
use crate::block::BlockRule;
use crate::inline::{InlineRule, join_text};
use crate::options::{PipelineConfig, RenderOptions};
use crate::token::{Nesting, Token};
use std::fmt;
use watched_words::CompiledWords;

/// Read-only state handed to post-processors
pub struct CoreContext<'a> {
    pub options: &'a RenderOptions,
    /// Watched-word and censor patterns compiled when the pipeline was built
    pub words: &'a CompiledWords,
}

pub type CoreRuleFn = fn(&mut Vec<Token>, &CoreContext<'_>);

/// A post-processor over the block token stream, run after the inline pass
#[derive(Debug, Clone, Copy)]
pub struct CoreRule {
    pub name: &'static str,
    pub run: CoreRuleFn,
}

/// One named, toggleable unit of parsing, rendering and allow-list behavior
#[derive(Clone)]
pub struct FeatureSpec {
    pub name: String,
    /// Whether the configuration turns the feature on
    pub enabled: fn(&PipelineConfig<'_>) -> bool,
    pub block_rules: Vec<BlockRule>,
    pub inline_rules: Vec<InlineRule>,
    pub allow_list: Vec<String>,
    pub post_processor: Option<CoreRule>,
}

fn always(_: &PipelineConfig<'_>) -> bool {
    true
}

impl FeatureSpec {
    /// An always-enabled feature with no rules
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: always,
            block_rules: Vec::new(),
            inline_rules: Vec::new(),
            allow_list: Vec::new(),
            post_processor: None,
        }
    }

    pub fn enabled_when(mut self, predicate: fn(&PipelineConfig<'_>) -> bool) -> Self {
        self.enabled = predicate;
        self
    }

    pub fn with_block_rule(mut self, rule: BlockRule) -> Self {
        self.block_rules.push(rule);
        self
    }

    pub fn with_inline_rule(mut self, rule: InlineRule) -> Self {
        self.inline_rules.push(rule);
        self
    }

    pub fn with_allow_list<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_post_processor(mut self, name: &'static str, run: CoreRuleFn) -> Self {
        self.post_processor = Some(CoreRule { name, run });
        self
    }
}

impl fmt::Debug for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSpec")
            .field("name", &self.name)
            .field(
                "block_rules",
                &self.block_rules.iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .field(
                "inline_rules",
                &self.inline_rules.iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .field("allow_list", &self.allow_list)
            .field("post_processor", &self.post_processor.map(|r| r.name))
            .finish()
    }
}

/// Ordered collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureRegistry {
    features: Vec<FeatureSpec>,
}

impl FeatureRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in features in their standard order
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(FeatureSpec::new("default").with_allow_list(DEFAULT_ALLOW_LIST.iter().copied()));
        registry.register(anchor::feature());
        registry.register(code_block::feature());
        registry.register(table::feature());
        registry.register(bbcode::block_feature());
        registry.register(bbcode::inline_feature());
        registry.register(quotes::feature());
        registry.register(linkify::feature());
        registry.register(onebox::feature());
        registry.register(upload::feature());
        registry.register(mentions::feature());
        registry.register(emoji::feature());
        registry.register(watched_words::feature());
        registry.register(censored::feature());
        registry.register(typographer::feature());
        registry
    }

    /// Append a feature; a feature with the same name is replaced in place
    pub fn register(&mut self, feature: FeatureSpec) {
        match self.features.iter_mut().find(|f| f.name == feature.name) {
            Some(slot) => *slot = feature,
            None => self.features.push(feature),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Which text tokens a rewrite visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextScope {
    Everywhere,
    /// Skip text inside any link
    OutsideLinks,
    /// Skip text inside autolinks and linkified URLs
    OutsideAutolinks,
}

/// Call `f` on the children of every `inline` token
pub fn for_each_inline(tokens: &mut [Token], mut f: impl FnMut(&mut Vec<Token>)) {
    for token in tokens.iter_mut().filter(|t| t.kind == "inline") {
        f(&mut token.children);
    }
}

/// Replace `text` tokens with the tokens `f` returns
///
/// `f` returns `None` to leave a token untouched. Adjacent text tokens are
/// merged afterwards.
pub fn rewrite_text_tokens(
    children: &mut Vec<Token>,
    scope: TextScope,
    mut f: impl FnMut(&str) -> Option<Vec<Token>>,
) {
    let mut out: Vec<Token> = Vec::with_capacity(children.len());
    let mut link_depth = 0usize;
    let mut changed = false;

    for token in children.drain(..) {
        if token.tag == "a" {
            let counts = match scope {
                TextScope::Everywhere => false,
                TextScope::OutsideLinks => true,
                TextScope::OutsideAutolinks => token.info == "autolink" || token.info == "linkify",
            };
            match token.nesting {
                Nesting::Open if counts || link_depth > 0 => link_depth += 1,
                Nesting::Close if link_depth > 0 => link_depth -= 1,
                _ => {}
            }
        }

        if token.kind == "text"
            && link_depth == 0
            && let Some(replacement) = f(&token.content)
        {
            out.extend(replacement);
            changed = true;
            continue;
        }
        out.push(token);
    }

    if changed {
        join_text(&mut out);
    }
    *children = out;
}

/// Rewrite the content of `text` tokens in place
pub fn map_text(children: &mut Vec<Token>, scope: TextScope, mut f: impl FnMut(&str) -> Option<String>) {
    rewrite_text_tokens(children, scope, |text| f(text).map(|s| vec![Token::text(s)]));
}
