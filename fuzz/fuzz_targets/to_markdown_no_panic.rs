#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let html = String::from_utf8_lossy(data);
    let markup = cooked_markup::to_markdown(&html);
    assert!(markup.is_empty() || markup.ends_with('\n'));
});
