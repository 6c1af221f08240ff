//! HTML rendering of token streams
//!
//! Generic tokens render as their tag with attributes. Block tokens are
//! followed by a newline unless the next token is inline content or hidden,
//! so that a paragraph renders as `<p>text</p>\n` while a blockquote renders
//! its opening tag on its own line. The rendered document is trimmed at the
//! end.

use crate::token::{plain_text, Nesting, Token};

/// Render a block-level token stream
///
/// # Examples
///
/// ```
/// use cooked_markup::render::render;
/// use cooked_markup::token::{Nesting, Token};
///
/// let mut paragraph_open = Token::new("paragraph_open", "p", Nesting::Open);
/// paragraph_open.block = true;
/// let mut inline = Token::new("inline", "", Nesting::Leaf);
/// inline.children.push(Token::text("a < b"));
/// let mut paragraph_close = Token::new("paragraph_close", "p", Nesting::Close);
/// paragraph_close.block = true;
///
/// assert_eq!(render(&[paragraph_open, inline, paragraph_close]), "<p>a &lt; b</p>");
/// ```
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    render_block(tokens, &mut out);
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out
}

fn render_block(tokens: &[Token], out: &mut String) {
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            "inline" => render_inline(&token.children, out),
            "fence" | "code_block" => render_code_block(token, out),
            "html_block" | "html_raw" => out.push_str(&token.content),
            _ => render_token(tokens, idx, out),
        }
    }
}

/// Render an inline token list
pub fn render_inline(tokens: &[Token], out: &mut String) {
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            "text" | "text_special" => escape_html_into(&token.content, out),
            "code_inline" => {
                out.push_str("<code");
                render_attrs(&token.attrs, out);
                out.push('>');
                escape_html_into(&token.content, out);
                out.push_str("</code>");
            }
            "softbreak" => out.push('\n'),
            "hardbreak" => out.push_str("<br>\n"),
            "html_inline" | "html_raw" => out.push_str(&token.content),
            "image" => render_image(token, out),
            _ => render_token(tokens, idx, out),
        }
    }
}

fn render_code_block(token: &Token, out: &mut String) {
    out.push_str("<pre><code");
    if token.attrs.is_empty() {
        let lang = token.info.split_whitespace().next().unwrap_or("");
        if !lang.is_empty() {
            out.push_str(" class=\"language-");
            escape_html_into(lang, out);
            out.push('"');
        }
    } else {
        render_attrs(&token.attrs, out);
    }
    out.push('>');
    escape_html_into(&token.content, out);
    out.push_str("</code></pre>\n");
}

fn render_image(token: &Token, out: &mut String) {
    out.push_str("<img");
    for (name, value) in &token.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        if name == "alt" && value.is_empty() {
            escape_html_into(&plain_text(&token.children), out);
        } else {
            escape_html_into(value, out);
        }
        out.push('"');
    }
    out.push('>');
}

fn render_token(tokens: &[Token], idx: usize, out: &mut String) {
    let token = &tokens[idx];
    if token.hidden {
        return;
    }
    if token.block && token.nesting != Nesting::Close && idx > 0 && tokens[idx - 1].hidden {
        out.push('\n');
    }
    if token.tag.is_empty() {
        return;
    }

    out.push_str(if token.nesting == Nesting::Close { "</" } else { "<" });
    out.push_str(token.tag);
    if token.nesting != Nesting::Close {
        render_attrs(&token.attrs, out);
    }

    let mut need_lf = token.block;
    if token.block && token.nesting == Nesting::Open {
        if let Some(next) = tokens.get(idx + 1) {
            if next.kind == "inline" || next.hidden {
                need_lf = false;
            } else if next.nesting == Nesting::Close && next.tag == token.tag {
                need_lf = false;
            }
        }
    }
    out.push_str(if need_lf { ">\n" } else { ">" });
}

fn render_attrs(attrs: &[(String, String)], out: &mut String) {
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_html_into(value, out);
        out.push('"');
    }
}

/// Escape `& < > "` for text and attribute positions
pub fn escape_html_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Escaped copy of `text`
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_html_into(text, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: &'static str, tag: &'static str, nesting: Nesting) -> Token {
        let mut token = Token::new(kind, tag, nesting);
        token.block = true;
        token
    }

    fn inline(text: &str) -> Token {
        let mut token = Token::new("inline", "", Nesting::Leaf);
        token.children.push(Token::text(text));
        token
    }

    #[test]
    fn test_blockquote_layout() {
        let tokens = vec![
            block("blockquote_open", "blockquote", Nesting::Open),
            block("paragraph_open", "p", Nesting::Open),
            inline("abc"),
            block("paragraph_close", "p", Nesting::Close),
            block("blockquote_close", "blockquote", Nesting::Close),
        ];
        assert_eq!(render(&tokens), "<blockquote>\n<p>abc</p>\n</blockquote>");
    }

    #[test]
    fn test_hidden_paragraphs_in_tight_list() {
        let mut p_open = block("paragraph_open", "p", Nesting::Open);
        p_open.hidden = true;
        let mut p_close = block("paragraph_close", "p", Nesting::Close);
        p_close.hidden = true;
        let tokens = vec![
            block("bullet_list_open", "ul", Nesting::Open),
            block("list_item_open", "li", Nesting::Open),
            p_open,
            inline("one"),
            p_close,
            block("list_item_close", "li", Nesting::Close),
            block("bullet_list_close", "ul", Nesting::Close),
        ];
        assert_eq!(render(&tokens), "<ul>\n<li>one</li>\n</ul>");
    }

    #[test]
    fn test_fence_escapes_contents() {
        let mut fence = Token::new("fence", "code", Nesting::Leaf);
        fence.content = "<b>&\n".to_string();
        fence.info = "rb extra".to_string();
        assert_eq!(
            render(&[fence]),
            "<pre><code class=\"language-rb\">&lt;b&gt;&amp;\n</code></pre>"
        );
    }

    #[test]
    fn test_image_alt_from_children() {
        let mut image = Token::new("image", "img", Nesting::Leaf)
            .with_attr("src", "/a.png")
            .with_attr("alt", "");
        image.children.push(Token::text("a \"cat\""));
        let mut out = String::new();
        render_inline(&[image], &mut out);
        assert_eq!(out, "<img src=\"/a.png\" alt=\"a &quot;cat&quot;\">");
    }
}
