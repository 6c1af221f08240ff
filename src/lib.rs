//! Cooked Markup - extensible markup-to-HTML cooking pipeline
//!
//! This library turns user-authored markup (a CommonMark-like dialect plus
//! bracket-tag macros, mentions, emoji shorthand and quote blocks) into HTML
//! that is safe to display verbatim, and converts HTML back to markup.
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `allow_list`: per-feature allow-list contributions and their resolution
//! - `sanitizer`: allow-list enforcement over HTML fragments
//! - `block`, `inline`, `render`, `token`: the two-pass rule engine
//! - `brackets`: memoized matching of bracket-tag openers and closers
//! - `features`: named, toggleable features and their registry
//! - `pipeline`: feature resolution, cooking and the pipeline cache
//! - `placeholders`: unresolved references in cooked HTML
//! - `to_markdown`: HTML back to markup
//! - `parser`: HTML5 parsing using html5ever
//! - `fingerprint`: configuration fingerprints using BLAKE3
//!
//! # Example
//!
//! ```
//! use cooked_markup::options::RenderOptions;
//!
//! let options = RenderOptions::default();
//! assert_eq!(cooked_markup::cook("**evil**", &options), "<p><strong>evil</strong></p>");
//! assert_eq!(cooked_markup::sanitize("<p onclick=\"x()\">hi</p>"), "<p>hi</p>");
//! assert_eq!(cooked_markup::to_markdown("<p><em>hi</em></p>"), "*hi*\n");
//! ```
//!
//! # Logging
//!
//! Diagnostics go through `tracing`; the library never installs a
//! subscriber. Configuration problems are logged at `warn`, degradations at
//! `debug`, pipeline construction at `trace`.

pub mod allow_list;
pub mod block;
pub mod brackets;
pub mod error;
pub mod features;
pub mod fingerprint;
pub mod inline;
pub mod options;
pub mod parser;
mod patterns;
pub mod pipeline;
pub mod placeholders;
pub mod render;
pub mod sanitizer;
pub mod to_markdown;
pub mod token;

pub use error::MarkupError;
pub use options::{PipelineConfig, RenderOptions};
pub use patterns::MAX_REGEX_PASS_LEN;
pub use pipeline::{CookedDocument, Cooker, MAX_CACHED_PIPELINES, Pipeline};
pub use sanitizer::Sanitizer;
pub use to_markdown::ToMarkdown;

use std::sync::OnceLock;

fn shared_cooker() -> &'static Cooker {
    static COOKER: OnceLock<Cooker> = OnceLock::new();
    COOKER.get_or_init(Cooker::default)
}

/// Cook `source` with the standard features
pub fn cook(source: &str, options: &RenderOptions) -> String {
    cook_document(source, options).html
}

/// Cook `source` and report the placeholders left in the output
pub fn cook_document(source: &str, options: &RenderOptions) -> CookedDocument {
    shared_cooker().cook(source, options)
}

/// Sanitize an HTML fragment with the allow list of the default configuration
pub fn sanitize(html: &str) -> String {
    shared_cooker()
        .pipeline(&RenderOptions::default())
        .sanitizer()
        .sanitize(html)
}

/// Convert HTML to markup; input without content gives an empty string
pub fn to_markdown(html: &str) -> String {
    ToMarkdown::new().convert(html).unwrap_or_default()
}
