/// Example cooking a post with the standard features
///
/// Shows quotes, mentions, emoji, code fences and raw HTML passing through
/// the sanitizer, then lists the placeholders a host would resolve later.
///
/// Run with: RUST_LOG=cooked_markup=trace cargo run --example basic_cook
use cooked_markup::options::{Lookups, MentionKind, RenderOptions};
use std::sync::Arc;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let source = r#"# Release notes

[quote="eviltrout, post:1, topic:2"]
Can we ship **today**?
[/quote]

Yes @sam, the @core team agreed :tada:

```rust
fn main() { println!("<hi>"); }
```

<div onclick="steal()">raw html is sanitized</div>

https://example.com/changelog
"#;

    let options = RenderOptions {
        lookups: Lookups {
            mention: Some(Arc::new(|name: &str| match name {
                "core" => Some(MentionKind::Group),
                _ => Some(MentionKind::User),
            })),
            ..Lookups::default()
        },
        ..RenderOptions::default()
    };

    let document = cooked_markup::cook_document(source, &options);
    println!("=== Cooked HTML ===\n{}\n", document.html);

    println!("=== Placeholders ===");
    if document.placeholders.is_empty() {
        println!("(none)");
    }
    for placeholder in &document.placeholders {
        println!("{:?}: {}", placeholder.kind, placeholder.url);
    }
}
