//! Censored words are blacked out character by character

use super::{CoreContext, FeatureSpec, TextScope, for_each_inline, map_text};
use crate::patterns::within_pass_limit;
use crate::token::Token;
use regex::Regex;

pub const CENSOR_CHAR: char = '■';

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("censored")
        .enabled_when(|config| config.censored_patterns.iter().any(|p| !p.is_empty()))
        .with_post_processor("censored", apply)
}

/// Replace every non-empty match with one [`CENSOR_CHAR`] per character
///
/// # Examples
///
/// ```
/// use cooked_markup::features::censored::censor;
/// use regex::Regex;
///
/// let re = Regex::new("(?i)heck").unwrap();
/// assert_eq!(censor("What the Heck", &re).as_deref(), Some("What the ■■■■"));
/// ```
pub fn censor(text: &str, re: &Regex) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in re.find_iter(text).filter(|m| !m.is_empty()) {
        out.push_str(&text[last..found.start()]);
        out.extend(std::iter::repeat_n(CENSOR_CHAR, found.as_str().chars().count()));
        last = found.end();
    }
    if last == 0 {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    let Some(re) = &ctx.words.censor else {
        return;
    };
    for_each_inline(tokens, |children| {
        map_text(children, TextScope::Everywhere, |text| {
            if !within_pass_limit("censored", text) {
                return None;
            }
            censor(text, re)
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::watched_words::CompiledWords;
    use crate::options::RenderOptions;
    use crate::token::Nesting;

    #[test]
    fn test_censors_inside_links_too() {
        let options = RenderOptions {
            censored_patterns: vec!["apple".to_string()],
            ..RenderOptions::default()
        };
        let words = CompiledWords::compile(&options.config());
        let mut inline = Token::new("inline", "", Nesting::Leaf);
        inline.children = vec![
            Token::text("Apple pie "),
            Token::new("link_open", "a", Nesting::Open).with_attr("href", "/x"),
            Token::text("apple"),
            Token::new("link_close", "a", Nesting::Close),
        ];
        let mut tokens = vec![inline];
        apply(&mut tokens, &CoreContext { options: &options, words: &words });
        assert_eq!(tokens[0].children[0].content, "■■■■■ pie ");
        assert_eq!(tokens[0].children[2].content, "■■■■■");
    }

    #[test]
    fn test_multibyte_match_counts_chars() {
        let re = Regex::new("héllo").unwrap();
        assert_eq!(censor("héllo!", &re).as_deref(), Some("■■■■■!"));
        assert_eq!(censor("nothing", &re), None);
    }
}
