#![no_main]

use cooked_markup::options::RenderOptions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);
    let mut options = RenderOptions::default();
    let first = cooked_markup::cook(&source, &options);
    assert_eq!(first, cooked_markup::cook(&source, &options));

    options.settings.enable_markdown_typographer = true;
    options.settings.enable_inline_emoji_translation = true;
    options.settings.allow_html = false;
    let _ = cooked_markup::cook(&source, &options);
});
