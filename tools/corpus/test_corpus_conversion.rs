#!/usr/bin/env rust-script
//! Corpus conversion check
//!
//! Cooks a markup file and prints the HTML, or with `--to-markdown` converts
//! an HTML file back to markup. Exits non-zero when a cooked file does not
//! survive a second sanitize pass unchanged.
//!
//! ```cargo
//! [dependencies]
//! cooked-markup = { path = "../.." }
//! ```

use cooked_markup::options::RenderOptions;
use cooked_markup::to_markdown::ToMarkdown;
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let (reverse, filename) = match args.as_slice() {
        [_, flag, file] if flag == "--to-markdown" => (true, file),
        [_, file] => (false, file),
        _ => {
            eprintln!("Usage: {} [--to-markdown] <file>", args[0]);
            process::exit(1);
        }
    };

    let input = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file {}: {}", filename, e);
            process::exit(1);
        }
    };

    if reverse {
        match ToMarkdown::new().convert(&input) {
            Ok(markup) => print!("{}", markup),
            Err(e) => {
                eprintln!("Error converting to markup: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let html = cooked_markup::cook(&input, &RenderOptions::default());
    if cooked_markup::sanitize(&html) != html {
        eprintln!("Cooked output of {} is not stable under sanitize", filename);
        process::exit(2);
    }
    println!("{}", html);
}
