//! Feature toggle tests
//!
//! Validates that features can be switched on and off independently, that
//! each toggle takes exactly its own allow-list entries with it, and that
//! host applications can register features of their own.
//!
//! Toggle combinations covered:
//! 1. Site settings turning a feature off
//! 2. `features_override` naming the features to keep
//! 3. `markdown_it_rules` naming the low-level rules to keep
//! 4. A host-registered feature with its own inline rule

use cooked_markup::allow_list::AllowListBuilder;
use cooked_markup::features::{FeatureRegistry, FeatureSpec};
use cooked_markup::inline::{InlineRule, InlineState};
use cooked_markup::options::RenderOptions;
use cooked_markup::pipeline::{Cooker, Pipeline};
use cooked_markup::token::{Nesting, Token};
use proptest::prelude::*;
use serde_json::json;

fn only(features: &[&str]) -> RenderOptions {
    RenderOptions {
        features_override: Some(features.iter().map(|f| f.to_string()).collect()),
        ..RenderOptions::default()
    }
}

fn cook_with(registry: FeatureRegistry, source: &str, options: &RenderOptions) -> String {
    Cooker::new(registry).cook(source, options).html
}

/// `%%text%%` becomes `<span class="highlight">text</span>`
fn highlight(state: &mut InlineState<'_>) -> bool {
    let rest = state.rest();
    let Some(body) = rest.strip_prefix("%%") else {
        return false;
    };
    let Some(end) = body.find("%%").filter(|end| *end > 0) else {
        return false;
    };
    let text = body[..end].to_string();
    state.push(Token::new("highlight_open", "span", Nesting::Open).with_attr("class", "highlight"));
    state.push(Token::text(text));
    state.push(Token::new("highlight_close", "span", Nesting::Close));
    state.pos += end + 4;
    true
}

fn registry_with_highlight() -> FeatureRegistry {
    let mut registry = FeatureRegistry::standard();
    registry.register(
        FeatureSpec::new("highlight")
            .with_inline_rule(InlineRule {
                name: "highlight",
                order: 650,
                run: highlight,
            })
            .with_allow_list(["span.highlight"]),
    );
    registry
}

#[test]
fn test_allow_list_feature_example() {
    let mut builder = AllowListBuilder::new();
    builder.allow_list_feature("test", ["custom[data-*]", "custom[rel=nofollow]"]);
    builder.allow_list_feature("test", ["custom[rel=test]"]);
    builder.enable("test");

    let resolved = serde_json::to_value(builder.get_allow_list()).expect("serializable");
    assert_eq!(
        resolved,
        json!({
            "tagList": { "custom": [] },
            "attrList": {
                "custom": { "data-*": ["*"], "rel": ["nofollow", "test"] }
            }
        })
    );

    builder.disable("test");
    let resolved = serde_json::to_value(builder.get_allow_list()).expect("serializable");
    assert_eq!(resolved, json!({ "tagList": {}, "attrList": {} }));
}

#[test]
fn test_features_override_keeps_only_listed() {
    let options = only(&["default", "emoji"]);
    let html = cooked_markup::cook("@sam :smile:", &options);
    assert!(html.starts_with("<p>@sam <img"), "{html}");
    assert!(html.contains("class=\"emoji"));
}

#[test]
fn test_disabling_default_removes_default_tags() {
    let options = only(&["emoji"]);
    let pipeline = Pipeline::build(&FeatureRegistry::standard(), &options);
    assert!(!pipeline.allow_list().allows_tag("p"));
    assert!(!pipeline.allow_list().allows_tag("strong"));
    assert_eq!(cooked_markup::cook("**evil**", &options), "evil");
}

#[test]
fn test_unknown_override_is_ignored() {
    let options = only(&["default", "no-such-feature"]);
    assert_eq!(cooked_markup::cook("**evil**", &options), "<p><strong>evil</strong></p>");
}

#[test]
fn test_disabling_feature_removes_only_its_entries() {
    let registry = FeatureRegistry::standard();
    let all = Pipeline::build(&registry, &RenderOptions::default());
    let names: Vec<&str> = registry
        .names()
        .into_iter()
        .filter(|name| *name != "mentions")
        .collect();
    let without = Pipeline::build(&registry, &only(&names));

    assert!(all.allow_list().allows_attr_value("a", "class", "mention-group"));
    assert!(!without.allow_list().allows_attr_value("a", "class", "mention-group"));
    assert!(without.allow_list().allows_attr_value("aside", "class", "quote"));
    assert!(without.allow_list().allows_tag("p"));
}

#[test]
fn test_site_setting_and_override_combine() {
    let mut options = only(&["default", "typographer"]);
    assert_eq!(cooked_markup::cook("a -- b", &options), "<p>a -- b</p>");

    options.settings.enable_markdown_typographer = true;
    assert_eq!(cooked_markup::cook("a -- b", &options), "<p>a \u{2013} b</p>");
}

#[test]
fn test_markdown_it_rules() {
    let options = RenderOptions {
        markdown_it_rules: Some(vec!["emphasis".to_string()]),
        ..RenderOptions::default()
    };
    assert_eq!(
        cooked_markup::cook("*a* `b` [c](/d)", &options),
        "<p><em>a</em> `b` [c](/d)</p>"
    );
}

#[test]
fn test_markdown_it_rules_disable_replacements() {
    let mut options = RenderOptions {
        markdown_it_rules: Some(vec!["emphasis".to_string()]),
        ..RenderOptions::default()
    };
    options.settings.enable_markdown_typographer = true;
    assert_eq!(cooked_markup::cook("a -- b", &options), "<p>a -- b</p>");
}

#[test]
fn test_custom_inline_feature() {
    let html = cook_with(registry_with_highlight(), "see %%this%% now", &RenderOptions::default());
    assert_eq!(html, "<p>see <span class=\"highlight\">this</span> now</p>");
}

#[test]
fn test_custom_inline_feature_toggled_off() {
    let options = only(&["default"]);
    let html = cook_with(registry_with_highlight(), "see %%this%% now", &options);
    assert_eq!(html, "<p>see %%this%% now</p>");
}

#[test]
fn test_custom_feature_allow_list_follows_toggle() {
    let registry = registry_with_highlight();
    let on = Pipeline::build(&registry, &RenderOptions::default());
    let off = Pipeline::build(&registry, &only(&["default"]));

    let html = "<span class=\"highlight\">x</span>";
    assert_eq!(on.sanitizer().sanitize(html), html);
    assert_eq!(off.sanitizer().sanitize(html), "<span>x</span>");
}

#[test]
fn test_cooker_reuses_pipelines() {
    let cooker = Cooker::default();
    cooker.cook("a", &RenderOptions::default());
    cooker.cook("b", &RenderOptions::default());
    cooker.cook("c", &only(&["default"]));
    assert_eq!(cooker.cached_pipelines(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_allow_list_depends_only_on_enabled_set(
        enabled in proptest::collection::vec(any::<bool>(), 3),
        shuffle in any::<bool>(),
    ) {
        let contributions = [
            ("one", vec!["span.one", "span[data-one]"]),
            ("two", vec!["div.two", "span[data-two]"]),
            ("three", vec!["mark"]),
        ];
        let mut forward = AllowListBuilder::new();
        for (name, entries) in &contributions {
            forward.allow_list_feature(name, entries);
        }
        let mut toggled = forward.clone();
        for ((name, _), on) in contributions.iter().zip(&enabled) {
            if *on {
                forward.enable(name);
            }
        }
        if shuffle {
            for (name, _) in &contributions {
                toggled.enable(name);
            }
        }
        for ((name, _), on) in contributions.iter().zip(&enabled) {
            if *on {
                toggled.enable(name);
            } else {
                toggled.disable(name);
            }
        }
        prop_assert_eq!(forward.get_allow_list(), toggled.get_allow_list());
    }
}
