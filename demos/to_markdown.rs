/// Example converting pasted HTML back to markup
///
/// Shows the built-in conversions and a block decorator that turns a
/// host-specific element into a bracket tag.
///
/// Run with: cargo run --example to_markdown
use cooked_markup::to_markdown::ToMarkdown;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let html = r#"
        <h1>Pasted page</h1>
        <p>Text with <strong>bold</strong>, <em>italic</em> and a <a href="https://example.com" title="Example">link</a>.</p>
        <div class="spoiler">the butler did it</div>
        <ul>
            <li>First item</li>
            <li>Second item with <code>inline code</code></li>
        </ul>
        <pre><code class="lang-rust">fn main() {}
</code></pre>
        <script>alert('dropped')</script>
    "#;

    let mut converter = ToMarkdown::new();
    converter.add_block_decorator("div", |element, inner| {
        element
            .has_class("spoiler")
            .then(|| format!("[spoiler]{}[/spoiler]", inner.trim()))
    });

    match converter.convert(html) {
        Ok(markup) => println!("{}", markup),
        Err(e) => eprintln!("Conversion failed: {}", e),
    }
}
