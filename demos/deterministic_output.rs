/// Example demonstrating deterministic cooked output
///
/// Cooking the same source with the same options always yields identical
/// HTML, which lets hosts cache cooked posts and compare revisions byte for
/// byte. Options that only differ in per-post data share one pipeline.
///
/// Run with: cargo run --example deterministic_output
use cooked_markup::fingerprint::ConfigFingerprint;
use cooked_markup::options::RenderOptions;
use cooked_markup::pipeline::Cooker;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("=== Deterministic Cook Example ===\n");

    let source = "## Heading\n\nSome *emphasis*, a [link](https://example.com) and :smile:\n\n\
                  - first\n- second\n\n[quote]\nquoted\n[/quote]";
    let cooker = Cooker::default();
    let options = RenderOptions::default();

    println!("Cooking the same post 5 times...\n");
    let mut results = Vec::new();
    for i in 1..=5 {
        let html = cooker.cook(source, &options).html;
        println!("Cook {}: {} bytes", i, html.len());
        results.push(html);
    }

    let deterministic = results.windows(2).all(|pair| pair[0] == pair[1]);
    println!("\nIdentical output for identical options: {}", deterministic);

    let other_post = RenderOptions {
        post_id: Some(42),
        ..RenderOptions::default()
    };
    let prefixed = cooker.cook(source, &other_post).html;
    println!("Post 42 anchors are prefixed: {}", prefixed.contains("heading--p-42-heading"));

    println!(
        "Pipelines built: {} (fingerprint {})",
        cooker.cached_pipelines(),
        ConfigFingerprint::of(&options)
    );

    println!("\n=== Cooked HTML ===\n{}", results[0]);
}
