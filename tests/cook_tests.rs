//! End-to-end cook tests
//!
//! These tests drive the public `cook` entry points with realistic posts and
//! check the sanitized HTML that comes out.

use cooked_markup::options::{Lookups, MentionKind, RenderOptions, SiteSettings};
use cooked_markup::placeholders::PlaceholderKind;
use cooked_markup::{MAX_REGEX_PASS_LEN, cook, cook_document};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn defaults() -> RenderOptions {
    RenderOptions::default()
}

#[test]
fn test_strong() {
    assert_eq!(cook("**evil**", &defaults()), "<p><strong>evil</strong></p>");
}

#[test]
fn test_quote_block() {
    let html = cook("[quote=\"eviltrout, post:1, topic:2\"]\nabc\n[/quote]", &defaults());

    assert!(html.starts_with("<aside class=\"quote no-group\""), "{html}");
    assert!(html.contains("data-username=\"eviltrout\""));
    assert!(html.contains("data-post=\"1\""));
    assert!(html.contains("data-topic=\"2\""));
    assert!(html.contains("<div class=\"title\">"));
    assert!(html.contains("eviltrout:"));
    assert!(html.contains("<blockquote>\n<p>abc</p>\n</blockquote>"));
    assert!(html.ends_with("</aside>"));
}

#[test]
fn test_unterminated_quote_is_literal() {
    let html = cook("[quote=\"sam\"]\nabc", &defaults());
    assert!(html.starts_with("<p>[quote=\"sam\"]"), "{html}");
    assert!(!html.contains("<aside"));
}

#[test]
fn test_only_emoji() {
    let html = cook(":smile:", &defaults());
    assert!(html.contains("<img src=\"/images/emoji/twitter/smile.png?v=12\""), "{html}");
    assert!(html.contains("class=\"emoji only-emoji\""));
    assert!(html.contains("title=\":smile:\""));
}

#[test]
fn test_emoji_word_boundary() {
    assert_eq!(cook("a:smile:a", &defaults()), "<p>a:smile:a</p>");

    let mut options = defaults();
    options.settings.enable_inline_emoji_translation = true;
    assert!(cook("a:smile:a", &options).contains("class=\"emoji\""));
}

#[test]
fn test_emoji_disabled() {
    let mut options = defaults();
    options.settings.enable_emoji = false;
    assert_eq!(cook(":smile:", &options), "<p>:smile:</p>");
}

#[test]
fn test_mentions() {
    let options = RenderOptions {
        lookups: Lookups {
            mention: Some(Arc::new(|name: &str| match name {
                "team" => Some(MentionKind::Group),
                "ghost" => None,
                _ => Some(MentionKind::User),
            })),
            ..Lookups::default()
        },
        ..defaults()
    };
    let html = cook("hi @Sam, @team and @ghost", &options);

    assert!(html.contains("<a class=\"mention\" href=\"/u/sam\">@Sam</a>"), "{html}");
    assert!(html.contains("<a class=\"mention-group\" href=\"/groups/team\">@team</a>"));
    assert!(html.contains("<span class=\"mention\">@ghost</span>"));
}

#[test]
fn test_mentions_skip_code_and_email() {
    let html = cook("`@sam` mail sam@example.com", &defaults());
    assert!(!html.contains("class=\"mention\""), "{html}");
}

#[test]
fn test_mentions_disabled() {
    let options = RenderOptions {
        settings: SiteSettings {
            enable_mentions: false,
            ..SiteSettings::default()
        },
        ..defaults()
    };
    assert_eq!(cook("@sam", &options), "<p>@sam</p>");
}

#[test]
fn test_code_fence_is_verbatim() {
    let html = cook("```ruby\n**not bold** <b>x</b> :smile:\n```", &defaults());
    assert_eq!(
        html,
        "<pre><code class=\"lang-ruby\">**not bold** &lt;b&gt;x&lt;/b&gt; :smile:\n</code></pre>"
    );
}

#[test]
fn test_heading_anchor() {
    let html = cook("# Hello World\n\n## Hello World", &defaults());
    assert!(html.starts_with("<h1 id=\"heading--hello-world\">"), "{html}");
    assert!(html.contains("href=\"#hello-world\""));
    assert!(html.contains("<h2 id=\"heading--hello-world-1\">"));
}

#[test]
fn test_bbcode_inline() {
    let html = cook("[b]bold[/b] and [url=https://example.com]site[/url]", &defaults());
    assert!(html.contains("<span class=\"bbcode-b\">bold</span>"), "{html}");
    assert!(html.contains("href=\"https://example.com\""));
    assert!(html.contains(">site</a>"));
}

#[test]
fn test_unsafe_link_is_not_linked() {
    let html = cook("[x](javascript:alert(1))", &defaults());
    assert!(!html.contains("javascript"), "{html}");
}

#[test]
fn test_raw_html_is_sanitized() {
    let html = cook("<div onclick=\"steal()\">hi</div>\n\n<script>alert(1)</script>", &defaults());
    assert!(!html.contains("onclick"), "{html}");
    assert!(!html.contains("<script"));
    assert!(!html.contains("alert"));
    assert!(html.contains("hi"));
}

#[test]
fn test_typographer_opt_in() {
    assert_eq!(cook("a -- b...", &defaults()), "<p>a -- b...</p>");

    let mut options = defaults();
    options.settings.enable_markdown_typographer = true;
    assert_eq!(cook("a -- b...", &options), "<p>a \u{2013} b\u{2026}</p>");
}

#[test]
fn test_watched_words_and_censor() {
    let options = RenderOptions {
        watched_words_replace: vec![("\\bcolour\\b".to_string(), "color".to_string())],
        watched_words_link: vec![("\\bdocs\\b".to_string(), "https://example.com/docs".to_string())],
        censored_patterns: vec!["darn".to_string()],
        ..defaults()
    };
    let html = cook("Colour docs darn", &options);

    assert!(html.contains("color"), "{html}");
    assert!(html.contains("<a href=\"https://example.com/docs\">docs</a>"));
    assert!(html.contains("\u{25A0}\u{25A0}\u{25A0}\u{25A0}"));
    assert!(!html.contains("darn"));
}

#[test]
fn test_invalid_pattern_does_not_stop_cooking() {
    let options = RenderOptions {
        censored_patterns: vec!["(".to_string(), "bad".to_string()],
        ..defaults()
    };
    assert_eq!(cook("bad word", &options), "<p>\u{25A0}\u{25A0}\u{25A0} word</p>");
}

#[test]
fn test_placeholders_reported() {
    let options = RenderOptions {
        lookups: Lookups {
            upload_urls: Some(Arc::new(|_: &[String]| HashMap::new())),
            ..Lookups::default()
        },
        ..defaults()
    };
    let doc = cook_document("https://example.com/article\n\n![a](upload://missing.png)", &options);

    let kinds: Vec<PlaceholderKind> = doc.placeholders.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PlaceholderKind::Onebox, PlaceholderKind::UploadImage]);
    assert_eq!(doc.placeholders[1].url, "upload://missing.png");
    assert!(doc.html.contains("class=\"onebox\""));
}

#[test]
fn test_crlf_and_nul_normalized() {
    assert_eq!(
        cook("a\r\nb\0", &defaults()),
        cook("a\nb\u{FFFD}", &defaults())
    );
}

#[test]
fn test_deep_nesting_does_not_panic() {
    let source = "> ".repeat(500) + "deep";
    let html = cook(&source, &defaults());
    assert!(html.contains("deep"));

    let source = "[quote]\n".repeat(300) + "x";
    assert!(cook(&source, &defaults()).contains('x'));
}

#[test]
fn test_zero_width_watched_words_terminate() {
    let options = RenderOptions {
        watched_words_replace: vec![
            ("a*".to_string(), "Z".to_string()),
            ("(?:)".to_string(), "Q".to_string()),
        ],
        watched_words_link: vec![("x*".to_string(), "/w".to_string())],
        censored_patterns: vec!["(?:)".to_string()],
        ..defaults()
    };
    assert_eq!(cook("sat bad", &options), "<p>sZt bZd</p>");
}

#[test]
fn test_typographer_leaves_code_alone() {
    let mut options = defaults();
    options.settings.enable_markdown_typographer = true;

    assert_eq!(
        cook("`a -- b` and a -- b", &options),
        "<p><code>a -- b</code> and a \u{2013} b</p>"
    );
    let fenced = cook("```\na -- b...\n```", &options);
    assert!(fenced.contains(">a -- b...\n</code></pre>"), "{fenced}");
    let indented = cook("    a -- b...", &options);
    assert!(indented.contains(">a -- b...\n</code></pre>"), "{indented}");
}

#[test]
fn test_oversized_text_run_skips_regex_passes() {
    let mut options = RenderOptions {
        watched_words_replace: vec![("darn".to_string(), "gosh".to_string())],
        censored_patterns: vec!["heck".to_string()],
        ..defaults()
    };
    options.settings.enable_markdown_typographer = true;

    let short = "a -- b darn heck";
    assert_eq!(cook(short, &options), "<p>a \u{2013} b gosh \u{25a0}\u{25a0}\u{25a0}\u{25a0}</p>");

    let long = vec![short; MAX_REGEX_PASS_LEN / short.len() + 1].join(" ");
    assert!(long.len() > MAX_REGEX_PASS_LEN);
    assert_eq!(cook(&long, &options), format!("<p>{long}</p>"));
}

#[test]
fn test_unterminated_bracket_tags_cook_in_linear_time() {
    let options = defaults();
    let posts = [
        "[quote]\n".repeat(4000),
        "[grid]\n".repeat(4000),
        "[b]".repeat(10_000),
        "[".repeat(32_000),
        "[quote]\n".repeat(2000) + &"[b]".repeat(5000),
    ];
    for post in posts {
        let started = Instant::now();
        let html = cook(&post, &options);
        let elapsed = started.elapsed();
        assert!(html.starts_with("<p>["), "{}", &html[..html.len().min(40)]);
        assert!(elapsed < Duration::from_secs(10), "{} bytes took {elapsed:?}", post.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_cook_is_deterministic(source in "[ -~\n]{0,200}") {
        let options = defaults();
        prop_assert_eq!(cook(&source, &options), cook(&source, &options));
    }

    #[test]
    fn prop_cook_output_is_sanitized(source in "[ -~\n]{0,200}") {
        let html = cook(&source, &defaults());
        prop_assert_eq!(cooked_markup::sanitize(&html), html.clone());
        prop_assert!(!html.to_ascii_lowercase().contains("<script"));
    }
}
