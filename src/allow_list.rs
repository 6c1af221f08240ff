//! Per-feature allow-list contributions and their resolution
//!
//! Every feature contributes a list of entries describing the tags and
//! attributes it needs to survive sanitization. The builder keeps those
//! contributions separate so that toggling a feature adds or removes exactly
//! its own entries; [`AllowListBuilder::get_allow_list`] is a fold over the
//! currently enabled features and nothing else.
//!
//! # Entry grammar
//!
//! | Entry                 | Meaning                                        |
//! |-----------------------|------------------------------------------------|
//! | `tag`                 | the tag is allowed, with no attributes         |
//! | `tag.class`           | `class` may contain `class`                    |
//! | `tag[attr]`           | `attr` may carry any value                     |
//! | `tag[attr=value]`     | `attr` may carry exactly `value`               |
//! | `tag[attr-*]`         | any attribute starting with `attr-`            |
//! | `tag[attr-*=value]`   | prefixed attributes carrying exactly `value`   |
//!
//! Values ending in `*` act as prefixes (`aside.group-*`).
//!
//! # Example
//!
//! ```
//! use cooked_markup::allow_list::AllowListBuilder;
//!
//! let mut builder = AllowListBuilder::new();
//! builder.allow_list_feature("test", ["custom[data-*]", "custom[rel=nofollow]"]);
//! builder.enable("test");
//!
//! let resolved = builder.get_allow_list();
//! assert!(resolved.allows_tag("custom"));
//! assert!(resolved.allows_attr_value("custom", "data-x", "anything"));
//! assert!(!resolved.allows_attr_value("custom", "rel", "noopener"));
//! ```

use crate::error::MarkupError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Attribute value pattern meaning "any value"
pub const ANY_VALUE: &str = "*";

/// Baseline tags and attributes contributed by the `default` feature
pub const DEFAULT_ALLOW_LIST: &[&str] = &[
    "a.attachment",
    "a.hashtag",
    "a[href]",
    "a[rel=nofollow]",
    "a[target=_blank]",
    "a[title]",
    "abbr[title]",
    "b",
    "big",
    "blockquote",
    "br",
    "code",
    "dd",
    "del",
    "details",
    "details[open]",
    "div",
    "div[dir]",
    "div[lang]",
    "dl",
    "dt",
    "em",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "i",
    "iframe",
    "iframe[allowfullscreen]",
    "iframe[frameborder]",
    "iframe[height]",
    "iframe[marginheight]",
    "iframe[marginwidth]",
    "iframe[src]",
    "iframe[width]",
    "img[alt]",
    "img[height]",
    "img[loading]",
    "img[src]",
    "img[title]",
    "img[width]",
    "ins",
    "kbd",
    "li",
    "mark",
    "ol",
    "ol[start]",
    "p",
    "p[dir]",
    "p[lang]",
    "pre",
    "rp",
    "rt",
    "ruby",
    "s",
    "small",
    "span.excerpt",
    "span[lang]",
    "strike",
    "strong",
    "sub",
    "summary",
    "sup",
    "ul",
    "video[autoplay]",
    "video[controls]",
    "video[height]",
    "video[loop]",
    "video[muted]",
    "video[playsinline]",
    "video[poster]",
    "video[width]",
    "source[src]",
    "source[type]",
];

/// Allowed iframe `src` prefixes used when the caller configures none
pub const DEFAULT_ALLOWED_IFRAMES: &[&str] = &[
    "https://www.google.com/maps/embed?",
    "https://www.openstreetmap.org/export/embed.html?",
    "https://calendar.google.com/calendar/embed?",
    "https://codepen.io/",
];

/// One parsed allow-list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListEntry {
    /// Lowercase tag name
    pub tag: String,
    /// Attribute name pattern (literal or `prefix-*`), if the entry names one
    pub attr: Option<String>,
    /// Attribute value pattern (`*`, literal, or `prefix*`)
    pub value: String,
}

impl AllowListEntry {
    /// Parse one entry from the source grammar
    ///
    /// # Examples
    ///
    /// ```
    /// use cooked_markup::allow_list::AllowListEntry;
    ///
    /// let entry = AllowListEntry::parse("a[rel=nofollow]").unwrap();
    /// assert_eq!(entry.tag, "a");
    /// assert_eq!(entry.attr.as_deref(), Some("rel"));
    /// assert_eq!(entry.value, "nofollow");
    ///
    /// assert!(AllowListEntry::parse("a[rel").is_err());
    /// ```
    pub fn parse(source: &str) -> Result<Self, MarkupError> {
        let Some(re) = entry_regex() else {
            return Err(MarkupError::InternalError(
                "allow-list grammar failed to compile".to_string(),
            ));
        };
        let source = source.trim();
        let caps = re
            .captures(source)
            .ok_or_else(|| MarkupError::InvalidAllowListEntry(source.to_string()))?;

        let tag = caps[1].to_ascii_lowercase();
        if let Some(class) = caps.get(2) {
            return Ok(Self {
                tag,
                attr: Some("class".to_string()),
                value: class.as_str().to_string(),
            });
        }
        if let Some(attr) = caps.get(3) {
            let value = match caps.get(4) {
                Some(v) => unquote(v.as_str()).to_string(),
                None => ANY_VALUE.to_string(),
            };
            if value.is_empty() {
                return Err(MarkupError::InvalidAllowListEntry(source.to_string()));
            }
            return Ok(Self {
                tag,
                attr: Some(attr.as_str().to_ascii_lowercase()),
                value,
            });
        }
        Ok(Self {
            tag,
            attr: None,
            value: ANY_VALUE.to_string(),
        })
    }
}

fn entry_regex() -> Option<&'static Regex> {
    static ENTRY: OnceLock<Option<Regex>> = OnceLock::new();
    ENTRY
        .get_or_init(|| {
            Regex::new(
                r#"^([A-Za-z][A-Za-z0-9]*)(?:\.([A-Za-z0-9_-]+\*?)|\[([A-Za-z_][A-Za-z0-9_:.-]*\*?)(?:=([^\]]+))?\])?$"#,
            )
            .ok()
        })
        .as_ref()
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Resolved `{tagList, attrList}` table enforced by the sanitizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAllowList {
    /// Every allowed tag; values are always empty
    pub tag_list: BTreeMap<String, Vec<String>>,
    /// tag → attribute pattern → allowed value patterns, in insertion order
    pub attr_list: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl ResolvedAllowList {
    /// Whether `tag` may appear at all
    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tag_list.contains_key(tag) || self.attr_list.contains_key(tag)
    }

    /// Whether `tag` may carry attribute `attr` with some value
    pub fn allows_attr(&self, tag: &str, attr: &str) -> bool {
        self.matching_values(tag, attr).next().is_some()
    }

    /// Whether `tag` may carry `attr="value"`
    pub fn allows_attr_value(&self, tag: &str, attr: &str, value: &str) -> bool {
        self.matching_values(tag, attr)
            .any(|allowed| value_matches(allowed, value))
    }

    /// Value patterns of every attribute pattern matching `attr` on `tag`
    fn matching_values<'a>(&'a self, tag: &str, attr: &'a str) -> impl Iterator<Item = &'a str> {
        self.attr_list
            .get(tag)
            .into_iter()
            .flat_map(move |attrs| {
                attrs
                    .iter()
                    .filter(move |(pattern, _)| attr_name_matches(pattern, attr))
                    .flat_map(|(_, values)| values.iter().map(String::as_str))
            })
    }

    fn insert(&mut self, entry: &AllowListEntry) {
        self.tag_list.entry(entry.tag.clone()).or_default();
        if let Some(attr) = &entry.attr {
            let values = self
                .attr_list
                .entry(entry.tag.clone())
                .or_default()
                .entry(attr.clone())
                .or_default();
            if !values.contains(&entry.value) {
                values.push(entry.value.clone());
            }
        }
    }
}

fn attr_name_matches(pattern: &str, attr: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => attr.len() > prefix.len() && attr.starts_with(prefix),
        None => pattern == attr,
    }
}

fn value_matches(pattern: &str, value: &str) -> bool {
    if pattern == ANY_VALUE {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

#[derive(Debug, Clone)]
struct FeatureEntries {
    name: String,
    entries: Vec<AllowListEntry>,
}

/// Collects allow-list contributions per feature and resolves the enabled set
#[derive(Debug, Clone, Default)]
pub struct AllowListBuilder {
    features: Vec<FeatureEntries>,
    enabled: BTreeSet<String>,
}

impl AllowListBuilder {
    /// Create an empty builder with no features and nothing enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder holding the enabled `default` feature
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        builder.allow_list_feature("default", DEFAULT_ALLOW_LIST.iter().copied());
        builder.enable("default");
        builder
    }

    /// Register entries under `name`
    ///
    /// Repeated calls for the same feature append. Entries that do not parse
    /// are skipped with a warning.
    pub fn allow_list_feature<I, S>(&mut self, name: &str, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed: Vec<AllowListEntry> = entries
            .into_iter()
            .filter_map(|raw| match AllowListEntry::parse(raw.as_ref()) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(feature = name, error = %err, "skipping allow-list entry");
                    None
                }
            })
            .collect();

        match self.features.iter_mut().find(|f| f.name == name) {
            Some(feature) => feature.entries.extend(parsed),
            None => self.features.push(FeatureEntries {
                name: name.to_string(),
                entries: parsed,
            }),
        }
    }

    /// Mark a feature as enabled
    pub fn enable(&mut self, name: &str) {
        self.enabled.insert(name.to_string());
    }

    /// Mark a feature as disabled
    pub fn disable(&mut self, name: &str) {
        self.enabled.remove(name);
    }

    /// Whether a feature is currently enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// Fold the entries of every enabled feature into one table
    pub fn get_allow_list(&self) -> ResolvedAllowList {
        let mut resolved = ResolvedAllowList::default();
        for feature in self.features.iter().filter(|f| self.enabled.contains(&f.name)) {
            for entry in &feature.entries {
                resolved.insert(entry);
            }
        }
        resolved
    }
}
