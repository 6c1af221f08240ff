//! `upload://` short URLs
//!
//! Every short URL in image sources and link targets is collected first and
//! resolved with a single lookup call. Unresolved references keep their
//! short URL in a `data-orig-*` attribute so a collaborator can patch them
//! once the upload is known.

use super::{CoreContext, FeatureSpec, for_each_inline};
use crate::token::Token;
use std::collections::{BTreeSet, HashMap};

pub const UPLOAD_SCHEME: &str = "upload://";
pub const TRANSPARENT_IMAGE: &str = "/images/transparent.png";
pub const MISSING_LINK: &str = "/404";

pub fn feature() -> FeatureSpec {
    FeatureSpec::new("upload-protocol")
        .with_allow_list(["img[data-orig-src]", "a[data-orig-href]"])
        .with_post_processor("upload_protocol", apply)
}

fn is_short_url(url: &str) -> bool {
    url.get(..UPLOAD_SCHEME.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(UPLOAD_SCHEME))
}

/// Which attribute of a token may hold a short URL
fn url_attr(token: &Token) -> Option<&'static str> {
    match token.kind {
        "image" => Some("src"),
        "link_open" => Some("href"),
        _ => None,
    }
}

fn collect(children: &[Token], found: &mut BTreeSet<String>) {
    for token in children {
        if let Some(attr) = url_attr(token)
            && let Some(url) = token.attr(attr)
            && is_short_url(url)
        {
            found.insert(url.to_string());
        }
        collect(&token.children, found);
    }
}

fn rewrite(children: &mut [Token], resolved: &HashMap<String, String>) {
    for token in children.iter_mut() {
        if let Some(attr) = url_attr(token)
            && let Some(url) = token.attr(attr).map(str::to_string)
            && is_short_url(&url)
        {
            match (resolved.get(&url), attr) {
                (Some(target), _) => token.set_attr(attr, target.clone()),
                (None, "src") => {
                    token.set_attr("src", TRANSPARENT_IMAGE);
                    token.set_attr("data-orig-src", url);
                }
                (None, _) => {
                    token.set_attr("href", MISSING_LINK);
                    token.set_attr("data-orig-href", url);
                }
            }
        }
        rewrite(&mut token.children, resolved);
    }
}

fn apply(tokens: &mut Vec<Token>, ctx: &CoreContext<'_>) {
    let mut found = BTreeSet::new();
    for token in tokens.iter().filter(|t| t.kind == "inline") {
        collect(&token.children, &mut found);
    }
    if found.is_empty() {
        return;
    }

    let short_urls: Vec<String> = found.into_iter().collect();
    let resolved = match &ctx.options.lookups.upload_urls {
        Some(lookup) => lookup(&short_urls),
        None => HashMap::new(),
    };
    tracing::trace!(requested = short_urls.len(), resolved = resolved.len(), "upload urls looked up");
    for_each_inline(tokens, |children| rewrite(children, &resolved));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::watched_words::CompiledWords;
    use crate::options::{Lookups, RenderOptions};
    use crate::token::Nesting;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn inline(children: Vec<Token>) -> Vec<Token> {
        let mut token = Token::new("inline", "", Nesting::Leaf);
        token.children = children;
        vec![token]
    }

    #[test]
    fn test_single_batched_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let options = RenderOptions {
            lookups: Lookups {
                upload_urls: Some(Arc::new(move |urls: &[String]| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    urls.iter()
                        .filter(|u| u.contains("known"))
                        .map(|u| (u.clone(), "/uploads/known.png".to_string()))
                        .collect::<HashMap<_, _>>()
                })),
                ..Lookups::default()
            },
            ..RenderOptions::default()
        };
        let mut tokens = inline(vec![
            Token::new("image", "img", Nesting::Leaf).with_attr("src", "upload://known.png"),
            Token::new("image", "img", Nesting::Leaf).with_attr("src", "upload://missing.png"),
            Token::new("link_open", "a", Nesting::Open).with_attr("href", "upload://doc.pdf"),
            Token::new("link_close", "a", Nesting::Close),
        ]);
        let words = CompiledWords::default();
        apply(&mut tokens, &CoreContext { options: &options, words: &words });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let children = &tokens[0].children;
        assert_eq!(children[0].attr("src"), Some("/uploads/known.png"));
        assert_eq!(children[1].attr("src"), Some(TRANSPARENT_IMAGE));
        assert_eq!(children[1].attr("data-orig-src"), Some("upload://missing.png"));
        assert_eq!(children[2].attr("href"), Some(MISSING_LINK));
        assert_eq!(children[2].attr("data-orig-href"), Some("upload://doc.pdf"));
    }

    #[test]
    fn test_no_short_urls_no_lookup() {
        let options = RenderOptions {
            lookups: Lookups {
                upload_urls: Some(Arc::new(|_: &[String]| -> HashMap<String, String> {
                    panic!("unexpected lookup")
                })),
                ..Lookups::default()
            },
            ..RenderOptions::default()
        };
        let mut tokens = inline(vec![Token::new("image", "img", Nesting::Leaf).with_attr("src", "/a.png")]);
        let words = CompiledWords::default();
        apply(&mut tokens, &CoreContext { options: &options, words: &words });
        assert_eq!(tokens[0].children[0].attr("src"), Some("/a.png"));
    }
}
