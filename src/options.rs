//! Per-call rendering options
//!
//! [`RenderOptions`] is an immutable bag handed to every `cook` call. The
//! configuration half of it (site settings, word lists, toggles) decides which
//! features run and is fingerprinted to cache built pipelines; the other half
//! (topic/post ids, lookup callbacks, the preview cache) is consulted while
//! rendering and never affects the pipeline shape.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Site-setting subset consulted by the built-in features
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub enable_mentions: bool,
    pub unicode_usernames: bool,
    pub max_username_length: usize,
    pub enable_emoji: bool,
    pub enable_emoji_shortcuts: bool,
    pub enable_inline_emoji_translation: bool,
    pub emoji_set: String,
    pub emoji_base_url: String,
    pub enable_markdown_typographer: bool,
    pub enable_markdown_linkify: bool,
    pub traditional_markdown_linebreaks: bool,
    pub default_code_lang: String,
    pub highlighted_languages: Vec<String>,
    pub enable_inline_onebox: bool,
    pub allow_html: bool,
    pub max_nesting: usize,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            enable_mentions: true,
            unicode_usernames: false,
            max_username_length: 20,
            enable_emoji: true,
            enable_emoji_shortcuts: true,
            enable_inline_emoji_translation: false,
            emoji_set: "twitter".to_string(),
            emoji_base_url: "/images/emoji".to_string(),
            enable_markdown_typographer: false,
            enable_markdown_linkify: true,
            traditional_markdown_linebreaks: false,
            default_code_lang: "auto".to_string(),
            highlighted_languages: [
                "bash",
                "c",
                "cpp",
                "csharp",
                "css",
                "diff",
                "go",
                "html",
                "java",
                "javascript",
                "json",
                "kotlin",
                "markdown",
                "php",
                "python",
                "ruby",
                "rust",
                "scss",
                "sql",
                "swift",
                "typescript",
                "xml",
                "yaml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            enable_inline_onebox: true,
            allow_html: true,
            max_nesting: crate::block::DEFAULT_MAX_NESTING,
        }
    }
}

/// What a mentioned name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionKind {
    User,
    Group,
}

/// `username -> avatar url`
pub type AvatarLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
/// `(username, post number) -> primary group name`
pub type PrimaryGroupLookup = Arc<dyn Fn(&str, u64) -> Option<String> + Send + Sync>;
/// Batched `upload://` short url resolution
pub type UploadUrlLookup = Arc<dyn Fn(&[String]) -> HashMap<String, String> + Send + Sync>;
/// `name -> user, group or unknown`
pub type MentionLookup = Arc<dyn Fn(&str) -> Option<MentionKind> + Send + Sync>;
/// `emoji name -> image url`, consulted before the built-in table
pub type EmojiUrlLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Host callbacks consulted while rendering
#[derive(Clone, Default)]
pub struct Lookups {
    pub avatar: Option<AvatarLookup>,
    pub primary_group: Option<PrimaryGroupLookup>,
    pub upload_urls: Option<UploadUrlLookup>,
    pub mention: Option<MentionLookup>,
    pub emoji_url: Option<EmojiUrlLookup>,
}

impl fmt::Debug for Lookups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookups")
            .field("avatar", &self.avatar.is_some())
            .field("primary_group", &self.primary_group.is_some())
            .field("upload_urls", &self.upload_urls.is_some())
            .field("mention", &self.mention.is_some())
            .field("emoji_url", &self.emoji_url.is_some())
            .finish()
    }
}

/// Key/value cache for externally resolved content (link preview titles)
pub trait ContentCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn delete(&self, key: &str);
}

/// In-memory [`ContentCache`]
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn set(&self, key: &str, value: String) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), value);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key.to_string(), value);
            }
        }
    }

    fn delete(&self, key: &str) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.remove(key);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(key);
            }
        }
    }
}

/// Immutable per-call rendering options
///
/// # Examples
///
/// ```
/// use cooked_markup::options::{RenderOptions, SiteSettings};
///
/// let options = RenderOptions {
///     post_id: Some(7),
///     settings: SiteSettings {
///         enable_markdown_typographer: true,
///         ..SiteSettings::default()
///     },
///     ..RenderOptions::default()
/// };
/// assert!(options.settings.enable_markdown_typographer);
/// ```
#[derive(Clone, Default)]
pub struct RenderOptions {
    pub settings: SiteSettings,
    pub topic_id: Option<u64>,
    pub post_id: Option<u64>,
    pub lookups: Lookups,
    /// Regex sources whose matches are blacked out
    pub censored_patterns: Vec<String>,
    /// `(regex source, replacement text)`
    pub watched_words_replace: Vec<(String, String)>,
    /// `(regex source, link target)`
    pub watched_words_link: Vec<(String, String)>,
    /// Allowed iframe `src` prefixes; `None` keeps the built-in list
    pub allowed_iframes: Option<Vec<String>>,
    /// Custom emoji `name -> url`
    pub custom_emoji: BTreeMap<String, String>,
    /// When set, only the listed features run
    pub features_override: Option<Vec<String>>,
    /// When set, only the listed low-level rules run
    pub markdown_it_rules: Option<Vec<String>>,
    pub preview_cache: Option<Arc<dyn ContentCache>>,
}

impl RenderOptions {
    /// The configuration half of these options
    pub fn config(&self) -> PipelineConfig<'_> {
        PipelineConfig {
            settings: &self.settings,
            censored_patterns: &self.censored_patterns,
            watched_words_replace: &self.watched_words_replace,
            watched_words_link: &self.watched_words_link,
            allowed_iframes: self.allowed_iframes.as_deref(),
            features_override: self.features_override.as_deref(),
            markdown_it_rules: self.markdown_it_rules.as_deref(),
        }
    }
}

/// Everything a pipeline is built from
///
/// Feature predicates and the pipeline builder see only this view, and the
/// fingerprint hashes exactly this view, so two options with equal configs
/// always share one pipeline. Ids, lookups, custom emoji and the preview
/// cache are not reachable from here.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PipelineConfig<'a> {
    pub settings: &'a SiteSettings,
    pub censored_patterns: &'a [String],
    pub watched_words_replace: &'a [(String, String)],
    pub watched_words_link: &'a [(String, String)],
    pub allowed_iframes: Option<&'a [String]>,
    pub features_override: Option<&'a [String]>,
    pub markdown_it_rules: Option<&'a [String]>,
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("settings", &self.settings)
            .field("topic_id", &self.topic_id)
            .field("post_id", &self.post_id)
            .field("lookups", &self.lookups)
            .field("censored_patterns", &self.censored_patterns)
            .field("watched_words_replace", &self.watched_words_replace)
            .field("watched_words_link", &self.watched_words_link)
            .field("allowed_iframes", &self.allowed_iframes)
            .field("custom_emoji", &self.custom_emoji)
            .field("features_override", &self.features_override)
            .field("markdown_it_rules", &self.markdown_it_rules)
            .field("preview_cache", &self.preview_cache.is_some())
            .finish()
    }
}
