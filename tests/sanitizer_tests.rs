//! Sanitizer security tests
//!
//! This suite feeds hostile HTML through the public sanitize entry points
//! and checks that nothing executable survives, that allowed iframes pass
//! through untouched, and that sanitizing twice changes nothing.

use cooked_markup::options::RenderOptions;
use cooked_markup::parser::{attr_value, element_name, fragment_children, parse_html};
use cooked_markup::pipeline::Cooker;
use cooked_markup::sanitize;
use proptest::prelude::*;

/// Script tags are removed together with their contents
#[test]
fn test_xss_script_tag_removal() {
    let html = r#"<p>Before dangerous element</p>
        <script>alert('xss')</script>
        <p>After dangerous element</p>"#;

    let clean = sanitize(html);

    assert!(!clean.contains("<script"));
    assert!(!clean.contains("alert"));
    assert!(clean.contains("<p>Before dangerous element</p>"));
    assert!(clean.contains("<p>After dangerous element</p>"));
}

/// Event handler attributes never survive, even on allowed tags
#[test]
fn test_xss_event_handler_removal() {
    let html = r#"<p onclick="steal()">a</p><img src="/x.png" onerror="steal()"><a href="/ok" onmouseover="steal()">b</a>"#;

    let clean = sanitize(html);

    assert!(!clean.contains("steal"));
    assert!(!clean.contains("onclick"));
    assert!(!clean.contains("onerror"));
    assert!(clean.contains("<a href=\"/ok\">b</a>"));
}

/// Dangerous URL schemes are removed from links and images
#[test]
fn test_xss_dangerous_urls() {
    for html in [
        r#"<a href="javascript:alert(1)">x</a>"#,
        r#"<a href=" JaVaScRiPt:alert(1)">x</a>"#,
        r#"<a href="vbscript:msgbox(1)">x</a>"#,
        r#"<a href="data:text/html,<script>alert(1)</script>">x</a>"#,
        r#"<img src="javascript:alert(1)">"#,
    ] {
        let clean = sanitize(html);
        assert!(!clean.to_ascii_lowercase().contains("script:"), "{html} -> {clean}");
        assert!(!clean.contains("data:text"), "{html} -> {clean}");
    }
}

/// Unknown tags are unwrapped, keeping their text
#[test]
fn test_unknown_tags_are_unwrapped() {
    assert_eq!(sanitize("<custom><b>bold</b></custom>"), "<b>bold</b>");
    assert_eq!(sanitize("<form><input value=\"x\">text</form>"), "text");
}

/// Comments and doctypes are dropped
#[test]
fn test_comments_dropped() {
    assert_eq!(sanitize("<!DOCTYPE html><!-- hidden --><p>shown</p>"), "<p>shown</p>");
}

/// Iframes outside the allowed prefixes disappear entirely
#[test]
fn test_iframe_not_allowed() {
    assert_eq!(sanitize(r#"<iframe src="http://evil.com"></iframe>"#), "");
}

/// Iframes with an allowed `src` prefix are kept byte for byte
#[test]
fn test_iframe_allowed_prefix() {
    let html = r#"<iframe src="https://www.google.com/maps/embed?pb=!1m18" width="600" height="450" frameborder="0"></iframe>"#;
    assert_eq!(sanitize(html), html);
}

/// Hosts can replace the allowed iframe prefixes per configuration
#[test]
fn test_iframe_prefixes_from_options() {
    let cooker = Cooker::default();
    let options = RenderOptions {
        allowed_iframes: Some(vec!["https://player.example.com/".to_string()]),
        ..RenderOptions::default()
    };
    let pipeline = cooker.pipeline(&options);

    let player = r#"<iframe src="https://player.example.com/v/1"></iframe>"#;
    assert_eq!(pipeline.sanitizer().sanitize(player), player);

    let maps = r#"<iframe src="https://www.google.com/maps/embed?pb=1"></iframe>"#;
    assert_eq!(pipeline.sanitizer().sanitize(maps), "");
}

/// Deeply nested markup is handled without overflowing the stack
#[test]
fn test_deeply_nested_input() {
    let html = "<div>".repeat(5000) + "deep" + &"</div>".repeat(5000);
    let clean = sanitize(&html);
    assert!(clean.contains("deep"));
    assert_eq!(sanitize(&clean), clean);
}

/// Classes are filtered one by one
#[test]
fn test_class_filtering() {
    assert_eq!(
        sanitize(r#"<aside class="quote evil no-group">q</aside>"#),
        r#"<aside class="quote no-group">q</aside>"#
    );
}

fn hostile_fragment() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        Just("<p>".to_string()),
        Just("</p>".to_string()),
        Just("<aside class=\"quote\">".to_string()),
        Just("</aside>".to_string()),
        Just("<img src=\"x\" onerror=\"y\">".to_string()),
        Just("<a href=\"javascript:x\">".to_string()),
        Just("</a>".to_string()),
        Just("<svg><script>x</script></svg>".to_string()),
        Just("<style>p{}</style>".to_string()),
        Just("<iframe src=\"http://evil.com\">".to_string()),
        Just("<blockquote>".to_string()),
        Just("<math><mi>".to_string()),
        Just("<noscript><p>".to_string()),
        "[a-z <>&\"'=/\n]{0,10}".prop_map(|s| s),
    ];
    prop::collection::vec(piece, 0..20).prop_map(|parts| parts.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_sanitize_is_idempotent(html in hostile_fragment()) {
        let once = sanitize(&html);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn prop_no_executable_content(html in hostile_fragment()) {
        let clean = sanitize(&html);
        let dom = parse_html(&clean);
        let mut stack = fragment_children(&dom);
        while let Some(node) = stack.pop() {
            if let Some(tag) = element_name(&node) {
                prop_assert!(!["script", "style", "iframe", "svg", "math"].contains(&tag.as_str()), "{} leaked", tag);
                prop_assert!(attr_value(&node, "onerror").is_none());
                for attr in ["href", "src"] {
                    if let Some(url) = attr_value(&node, attr) {
                        prop_assert!(!url.trim_start().to_ascii_lowercase().starts_with("javascript:"));
                    }
                }
            }
            stack.extend(node.children.borrow().iter().cloned());
        }
    }
}
