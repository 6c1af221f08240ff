//! Configuration fingerprints using BLAKE3 hashing
//!
//! A pipeline depends only on the configuration half of [`RenderOptions`],
//! the [`PipelineConfig`] view: site settings, word lists, iframe prefixes
//! and the two toggle lists. That view is serialized with `serde_json` and
//! hashed; the first 128 bits of the hash, hex encoded, key the pipeline
//! cache.
//!
//! Lookup callbacks, ids, custom emoji and the preview cache are consulted
//! while rendering and never change the pipeline shape, so they are left out.
//!
//! # Example
//!
//! ```
//! use cooked_markup::fingerprint::ConfigFingerprint;
//! use cooked_markup::options::RenderOptions;
//!
//! let mut options = RenderOptions::default();
//! let first = ConfigFingerprint::of(&options);
//! assert_eq!(first.as_str().len(), 32);
//!
//! options.post_id = Some(42);
//! assert_eq!(ConfigFingerprint::of(&options), first);
//!
//! options.settings.enable_emoji = false;
//! assert_ne!(ConfigFingerprint::of(&options), first);
//! ```

use crate::options::{PipelineConfig, RenderOptions};
use std::fmt;

/// Hex key identifying one pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    /// Fingerprint the configuration part of `options`
    pub fn of(options: &RenderOptions) -> Self {
        Self::of_config(&options.config())
    }

    pub fn of_config(config: &PipelineConfig<'_>) -> Self {
        let mut hasher = blake3::Hasher::new();
        if let Err(err) = serde_json::to_writer(&mut hasher, config) {
            tracing::warn!(error = %err, "failed to serialize configuration for fingerprint");
        }
        let hash = hasher.finalize();
        Self(hex::encode(&hash.as_bytes()[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
