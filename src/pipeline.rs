//! The cook pipeline: markup source in, sanitized HTML out
//!
//! A [`Pipeline`] is resolved once per configuration from a
//! [`FeatureRegistry`]: it holds the ordered block, inline and
//! post-processing rules of the enabled features, the compiled watched-word
//! patterns, and a sanitizer enforcing the allow list of exactly the same
//! feature set. [`Cooker`] caches pipelines by [`ConfigFingerprint`].
//!
//! # Cooking
//!
//! 1. Normalize line endings and NUL characters
//! 2. Block pass over the source lines
//! 3. Inline pass over every `inline` token
//! 4. Post-processors in feature registration order
//! 5. Render to HTML
//! 6. Sanitize
//! 7. Scan for placeholders
//!
//! No step can fail; malformed constructs degrade to literal text.
//!
//! # Toggles
//!
//! A feature runs when its own predicate holds and, if `features_override`
//! is set, its name is listed there. `markdown_it_rules` additionally
//! restricts the low-level rules named in [`MARKDOWN_IT_RULES`]; the
//! essential `paragraph`, `text` and `newline` rules always run.

use crate::allow_list::{AllowListBuilder, ResolvedAllowList};
use crate::block::{self, BlockRule, BlockState};
use crate::error::MarkupError;
use crate::features::watched_words::CompiledWords;
use crate::features::{CoreContext, CoreRule, FeatureRegistry};
use crate::fingerprint::ConfigFingerprint;
use crate::inline::{self, InlineRule, InlineState};
use crate::options::{PipelineConfig, RenderOptions};
use crate::placeholders::{Placeholder, find_placeholders};
use crate::render::render;
use crate::sanitizer::Sanitizer;
use crate::token::Token;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Low-level rules that `markdown_it_rules` can switch off
pub const MARKDOWN_IT_RULES: &[&str] = &[
    "code",
    "fence",
    "blockquote",
    "hr",
    "list",
    "html_block",
    "heading",
    "lheading",
    "table",
    "escape",
    "backticks",
    "strikethrough",
    "emphasis",
    "link",
    "image",
    "autolink",
    "html_inline",
    "entity",
    "linkify",
    "replacements",
];

/// Rules that run regardless of `markdown_it_rules`
pub const ESSENTIAL_RULES: &[&str] = &["paragraph", "text", "newline"];

/// Rules dropped when the site disallows raw HTML
const HTML_RULES: &[&str] = &["html_block", "html_inline"];

/// Result of a cook call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookedDocument {
    /// Sanitized HTML
    pub html: String,
    /// Unresolved references collaborators may patch later
    pub placeholders: Vec<Placeholder>,
}

/// Replace CR line endings with LF and NUL with U+FFFD
pub fn normalize_source(source: &str) -> String {
    source
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "\u{FFFD}")
}

/// Which low-level rules may run
struct RuleFilter {
    allowed: Option<BTreeSet<String>>,
    allow_html: bool,
}

impl RuleFilter {
    fn new(config: &PipelineConfig<'_>) -> Self {
        let allowed = config.markdown_it_rules.map(|names| {
            for name in names.iter().filter(|n| !MARKDOWN_IT_RULES.contains(&n.as_str())) {
                tracing::warn!(rule = %name, "unknown rule in markdown_it_rules");
            }
            names.iter().cloned().collect()
        });
        Self {
            allowed,
            allow_html: config.settings.allow_html,
        }
    }

    fn keeps(&self, name: &str) -> bool {
        if ESSENTIAL_RULES.contains(&name) {
            return true;
        }
        if !self.allow_html && HTML_RULES.contains(&name) {
            return false;
        }
        match &self.allowed {
            Some(allowed) if MARKDOWN_IT_RULES.contains(&name) => allowed.contains(name),
            _ => true,
        }
    }
}

/// Rules, patterns and sanitizer for one configuration
#[derive(Debug)]
pub struct Pipeline {
    features: Vec<String>,
    block_rules: Vec<BlockRule>,
    inline_rules: Vec<InlineRule>,
    core_rules: Vec<CoreRule>,
    words: CompiledWords,
    sanitizer: Sanitizer,
    max_nesting: usize,
}

impl Pipeline {
    /// Resolve the features enabled for `options` into a pipeline
    ///
    /// # Examples
    ///
    /// ```
    /// use cooked_markup::features::FeatureRegistry;
    /// use cooked_markup::options::RenderOptions;
    /// use cooked_markup::pipeline::Pipeline;
    ///
    /// let options = RenderOptions {
    ///     features_override: Some(vec!["default".to_string(), "emoji".to_string()]),
    ///     ..RenderOptions::default()
    /// };
    /// let pipeline = Pipeline::build(&FeatureRegistry::standard(), &options);
    /// assert_eq!(pipeline.features(), ["default", "emoji"]);
    /// ```
    pub fn build(registry: &FeatureRegistry, options: &RenderOptions) -> Self {
        Self::from_config(registry, &options.config())
    }

    /// Build from the configuration view alone
    pub fn from_config(registry: &FeatureRegistry, config: &PipelineConfig<'_>) -> Self {
        let overridden: Option<BTreeSet<&str>> = config
            .features_override
            .map(|names| names.iter().map(String::as_str).collect());
        if let Some(names) = &overridden {
            for name in names.iter().filter(|n| registry.get(n).is_none()) {
                let err = MarkupError::UnknownFeature(name.to_string());
                tracing::warn!(error = %err, "ignoring features_override entry");
            }
        }

        let filter = RuleFilter::new(config);
        let mut allow_list = AllowListBuilder::new();
        let mut features = Vec::new();
        let mut block_rules = block::core_rules();
        let mut inline_rules = inline::core_rules();
        let mut core_rules = Vec::new();

        for feature in registry.features() {
            allow_list.allow_list_feature(&feature.name, &feature.allow_list);
            let enabled = (feature.enabled)(config)
                && overridden
                    .as_ref()
                    .is_none_or(|names| names.contains(feature.name.as_str()));
            tracing::trace!(feature = %feature.name, enabled, "resolving feature");
            if !enabled {
                continue;
            }
            allow_list.enable(&feature.name);
            features.push(feature.name.clone());
            block_rules.extend(feature.block_rules.iter().copied());
            inline_rules.extend(feature.inline_rules.iter().copied());
            core_rules.extend(feature.post_processor);
        }

        block_rules.retain(|rule| filter.keeps(rule.name));
        inline_rules.retain(|rule| filter.keeps(rule.name));
        core_rules.retain(|rule| filter.keeps(rule.name));
        block_rules.sort_by_key(|rule| rule.order);
        inline_rules.sort_by_key(|rule| rule.order);
        tracing::trace!(
            block = block_rules.len(),
            inline = inline_rules.len(),
            post = core_rules.len(),
            "pipeline rules resolved"
        );

        let mut sanitizer = Sanitizer::new(allow_list.get_allow_list());
        if let Some(prefixes) = config.allowed_iframes {
            sanitizer = sanitizer.with_allowed_iframes(prefixes.iter().cloned());
        }

        Self {
            features,
            block_rules,
            inline_rules,
            core_rules,
            words: CompiledWords::compile(config),
            sanitizer,
            max_nesting: config.settings.max_nesting,
        }
    }

    /// Names of the enabled features in registration order
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Names of the active rules: block, inline, then post-processors
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.block_rules
            .iter()
            .map(|r| r.name)
            .chain(self.inline_rules.iter().map(|r| r.name))
            .chain(self.core_rules.iter().map(|r| r.name))
            .collect()
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// The allow list resolved from the enabled features
    pub fn allow_list(&self) -> &ResolvedAllowList {
        self.sanitizer.allow_list()
    }

    /// Run both passes and the post-processors
    pub fn parse(&self, source: &str, options: &RenderOptions) -> Vec<Token> {
        let source = normalize_source(source);
        let mut tokens = BlockState::parse(&source, &self.block_rules, options, self.max_nesting);
        for token in tokens.iter_mut().filter(|t| t.kind == "inline") {
            token.children = InlineState::parse(&token.content, &self.inline_rules, options, self.max_nesting);
        }
        let ctx = CoreContext {
            options,
            words: &self.words,
        };
        for rule in &self.core_rules {
            (rule.run)(&mut tokens, &ctx);
        }
        tokens
    }

    /// Rendered HTML before sanitization
    pub fn render_unsanitized(&self, source: &str, options: &RenderOptions) -> String {
        render(&self.parse(source, options))
    }

    /// Cook `source` into sanitized HTML
    pub fn cook(&self, source: &str, options: &RenderOptions) -> CookedDocument {
        let html = self.sanitizer.sanitize(&self.render_unsanitized(source, options));
        let placeholders = find_placeholders(&html);
        CookedDocument { html, placeholders }
    }
}

/// A feature registry plus a cache of the pipelines built from it
///
/// # Examples
///
/// ```
/// use cooked_markup::options::RenderOptions;
/// use cooked_markup::pipeline::Cooker;
///
/// let cooker = Cooker::default();
/// let options = RenderOptions::default();
/// assert_eq!(cooker.cook("**evil**", &options).html, "<p><strong>evil</strong></p>");
/// assert_eq!(cooker.cook("again", &options).html, "<p>again</p>");
/// assert_eq!(cooker.cached_pipelines(), 1);
/// ```
#[derive(Debug)]
pub struct Cooker {
    registry: FeatureRegistry,
    pipelines: Mutex<PipelineCache>,
}

/// Most pipelines a [`Cooker`] keeps at once
pub const MAX_CACHED_PIPELINES: usize = 64;

/// Built pipelines by fingerprint, oldest dropped first once full
#[derive(Debug, Default)]
struct PipelineCache {
    entries: HashMap<ConfigFingerprint, Arc<Pipeline>>,
    order: VecDeque<ConfigFingerprint>,
}

impl PipelineCache {
    fn get(&self, key: &ConfigFingerprint) -> Option<Arc<Pipeline>> {
        self.entries.get(key).map(Arc::clone)
    }

    /// Store `built` unless another caller stored one first; returns the kept one
    fn insert(&mut self, key: ConfigFingerprint, built: Arc<Pipeline>) -> Arc<Pipeline> {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        while self.entries.len() >= MAX_CACHED_PIPELINES {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            tracing::debug!(fingerprint = %oldest, "evicting cached pipeline");
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&built));
        built
    }
}

impl Default for Cooker {
    fn default() -> Self {
        Self::new(FeatureRegistry::standard())
    }
}

impl Cooker {
    pub fn new(registry: FeatureRegistry) -> Self {
        Self {
            registry,
            pipelines: Mutex::new(PipelineCache::default()),
        }
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    fn cache(&self) -> MutexGuard<'_, PipelineCache> {
        match self.pipelines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The pipeline for `options`, built on first use
    ///
    /// At most [`MAX_CACHED_PIPELINES`] configurations stay cached; the
    /// oldest one is dropped to make room for a new one.
    pub fn pipeline(&self, options: &RenderOptions) -> Arc<Pipeline> {
        let config = options.config();
        let key = ConfigFingerprint::of_config(&config);
        if let Some(pipeline) = self.cache().get(&key) {
            return pipeline;
        }
        tracing::trace!(fingerprint = %key, "building pipeline");
        let built = Arc::new(Pipeline::from_config(&self.registry, &config));
        self.cache().insert(key, built)
    }

    pub fn cook(&self, source: &str, options: &RenderOptions) -> CookedDocument {
        self.pipeline(options).cook(source, options)
    }

    /// Number of configurations currently cached
    pub fn cached_pipelines(&self) -> usize {
        self.cache().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSpec;
    use proptest::prelude::*;

    fn cook(source: &str, options: &RenderOptions) -> String {
        Pipeline::build(&FeatureRegistry::standard(), options).cook(source, options).html
    }

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source("a\r\nb\rc\0"), "a\nb\nc\u{FFFD}");
    }

    #[test]
    fn test_default_features() {
        let pipeline = Pipeline::build(&FeatureRegistry::standard(), &RenderOptions::default());
        let features = pipeline.features();
        assert!(features.iter().any(|f| f == "mentions"));
        assert!(features.iter().any(|f| f == "emoji"));
        assert!(!features.iter().any(|f| f == "typographer"));
        assert!(!features.iter().any(|f| f == "watched-words"));
    }

    #[test]
    fn test_rules_sorted_by_order() {
        let pipeline = Pipeline::build(&FeatureRegistry::standard(), &RenderOptions::default());
        let names = pipeline.rule_names();
        let table = names.iter().position(|n| *n == "table").unwrap();
        let code = names.iter().position(|n| *n == "code").unwrap();
        let quotes = names.iter().position(|n| *n == "quotes").unwrap();
        let paragraph = names.iter().position(|n| *n == "paragraph").unwrap();
        assert!(table < code && code < quotes && quotes < paragraph);
    }

    #[test]
    fn test_markdown_it_rules_keep_essentials() {
        let options = RenderOptions {
            markdown_it_rules: Some(vec!["emphasis".to_string()]),
            ..RenderOptions::default()
        };
        let pipeline = Pipeline::build(&FeatureRegistry::standard(), &options);
        let names = pipeline.rule_names();
        for name in ["paragraph", "text", "newline", "emphasis", "quotes", "mentions"] {
            assert!(names.contains(&name), "{name} missing");
        }
        for name in ["heading", "link", "linkify", "table"] {
            assert!(!names.contains(&name), "{name} present");
        }
        assert_eq!(cook("# *a* [b](/c)", &options), "<p># <em>a</em> [b](/c)</p>");
    }

    #[test]
    fn test_disallowed_html_is_escaped() {
        let mut options = RenderOptions::default();
        options.settings.allow_html = false;
        assert_eq!(cook("<b>x</b>", &options), "<p>&lt;b&gt;x&lt;/b&gt;</p>");
    }

    #[test]
    fn test_custom_feature_allow_list_follows_toggle() {
        let mut registry = FeatureRegistry::standard();
        registry.register(
            FeatureSpec::new("spoiler")
                .enabled_when(|config| config.settings.enable_inline_onebox)
                .with_allow_list(["div.spoiler"]),
        );
        let mut off = RenderOptions::default();
        off.settings.enable_inline_onebox = false;
        let html = "<div class=\"spoiler\">x</div>";
        let enabled = Pipeline::build(&registry, &RenderOptions::default());
        let disabled = Pipeline::build(&registry, &off);
        assert_eq!(enabled.sanitizer().sanitize(html), html);
        assert_eq!(disabled.sanitizer().sanitize(html), "<div>x</div>");
    }

    #[test]
    fn test_cooker_caches_per_configuration() {
        let cooker = Cooker::default();
        let plain = RenderOptions::default();
        let mut typographic = RenderOptions::default();
        typographic.settings.enable_markdown_typographer = true;

        let first = cooker.pipeline(&plain);
        let again = cooker.pipeline(&plain);
        assert!(Arc::ptr_eq(&first, &again));
        cooker.pipeline(&typographic);
        assert_eq!(cooker.cached_pipelines(), 2);
    }

    #[test]
    fn test_cooker_agrees_with_direct_build_whatever_the_order() {
        let mut registry = FeatureRegistry::standard();
        registry.register(
            FeatureSpec::new("spoiler")
                .enabled_when(|config| config.settings.enable_inline_onebox)
                .with_allow_list(["div.spoiler"]),
        );
        let html = "<div class=\"spoiler\">x</div>";
        let settings = [(Some(1), true), (Some(2), false), (None, true), (Some(1), false)];
        let variants: Vec<RenderOptions> = settings
            .into_iter()
            .map(|(post_id, onebox)| {
                let mut options = RenderOptions {
                    post_id,
                    ..RenderOptions::default()
                };
                options.settings.enable_inline_onebox = onebox;
                options
            })
            .collect();

        for order in [[0, 1, 2, 3], [3, 2, 1, 0], [1, 0, 3, 2]] {
            let cooker = Cooker::new(registry.clone());
            for &i in &order {
                let options = &variants[i];
                let direct = Pipeline::build(&registry, options);
                let cached = cooker.pipeline(options);
                assert_eq!(cached.features(), direct.features());
                assert_eq!(
                    cached.sanitizer().sanitize(html),
                    direct.sanitizer().sanitize(html)
                );
            }
            assert_eq!(cooker.cached_pipelines(), 2);
        }
    }

    #[test]
    fn test_cooker_cache_is_bounded() {
        let cooker = Cooker::default();
        let options_for = |i: usize| RenderOptions {
            censored_patterns: vec![format!("word{i}")],
            ..RenderOptions::default()
        };
        let first = cooker.pipeline(&options_for(0));
        for i in 1..MAX_CACHED_PIPELINES * 4 {
            cooker.pipeline(&options_for(i));
            assert!(cooker.cached_pipelines() <= MAX_CACHED_PIPELINES);
        }
        assert_eq!(cooker.cached_pipelines(), MAX_CACHED_PIPELINES);

        // the evicted configuration is rebuilt, not lost
        let rebuilt = cooker.pipeline(&options_for(0));
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        let source = "a word0 b";
        assert_eq!(
            rebuilt.cook(source, &options_for(0)).html,
            first.cook(source, &options_for(0)).html
        );
        assert_eq!(cooker.cached_pipelines(), MAX_CACHED_PIPELINES);

        let last = options_for(MAX_CACHED_PIPELINES * 4 - 1);
        assert!(Arc::ptr_eq(&cooker.pipeline(&last), &cooker.pipeline(&last)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_cook_is_deterministic(source in "[a-z*_:@\\[\\]/ \n#>`-]{0,80}") {
            let options = RenderOptions::default();
            prop_assert_eq!(cook(&source, &options), cook(&source, &options));
        }
    }
}
