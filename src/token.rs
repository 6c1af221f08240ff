//! Parse tokens shared by the block pass, the inline pass and the renderer
//!
//! The block pass produces a flat list of open/close/leaf tokens. Leaf
//! blocks carry an `inline` token whose `content` is the raw text; the inline
//! pass fills its `children` with another flat list.

/// Whether a token opens, closes or stands alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    Open,
    Close,
    Leaf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token type, e.g. `paragraph_open`, `text`, `fence`
    pub kind: &'static str,
    /// HTML tag rendered for generic tokens
    pub tag: &'static str,
    pub nesting: Nesting,
    pub attrs: Vec<(String, String)>,
    /// Raw text, code contents or pre-rendered HTML depending on `kind`
    pub content: String,
    /// Fence info string, link origin marker
    pub info: String,
    pub children: Vec<Token>,
    /// Container depth in the block structure
    pub level: usize,
    pub block: bool,
    /// Rendered without its tag (tight list paragraphs)
    pub hidden: bool,
}

impl Token {
    pub fn new(kind: &'static str, tag: &'static str, nesting: Nesting) -> Self {
        Self {
            kind,
            tag,
            nesting,
            attrs: Vec::new(),
            content: String::new(),
            info: String::new(),
            children: Vec::new(),
            level: 0,
            block: false,
            hidden: false,
        }
    }

    /// A `text` leaf
    pub fn text(content: impl Into<String>) -> Self {
        let mut token = Self::new("text", "", Nesting::Leaf);
        token.content = content.into();
        token
    }

    /// A leaf emitted verbatim by the renderer; only produced by rules
    pub fn raw_html(content: impl Into<String>) -> Self {
        let mut token = Self::new("html_raw", "", Nesting::Leaf);
        token.content = content.into();
        token
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute, keeping its position
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Append a class to the `class` attribute
    pub fn add_class(&mut self, class: &str) {
        match self.attrs.iter_mut().find(|(n, _)| n == "class") {
            Some(slot) => {
                if !slot.1.split_ascii_whitespace().any(|c| c == class) {
                    if !slot.1.is_empty() {
                        slot.1.push(' ');
                    }
                    slot.1.push_str(class);
                }
            }
            None => self.attrs.push(("class".to_string(), class.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(n, _)| n != name);
    }
}

/// Plain text of an inline token list, used for image alt text and slugs
pub fn plain_text(tokens: &[Token]) -> String {
    let mut text = String::new();
    for token in tokens {
        match token.kind {
            "text" | "text_special" | "code_inline" => text.push_str(&token.content),
            "image" => text.push_str(&plain_text(&token.children)),
            "softbreak" | "hardbreak" => text.push(' '),
            _ => {}
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_helpers() {
        let mut token = Token::new("link_open", "a", Nesting::Open).with_attr("href", "/a");
        token.set_attr("href", "/b");
        token.add_class("onebox");
        token.add_class("onebox");
        token.add_class("x");
        assert_eq!(token.attr("href"), Some("/b"));
        assert_eq!(token.attr("class"), Some("onebox x"));
        token.remove_attr("href");
        assert_eq!(token.attr("href"), None);
    }

    #[test]
    fn test_plain_text() {
        let mut code = Token::new("code_inline", "code", Nesting::Leaf);
        code.content = "x".to_string();
        let tokens = vec![
            Token::text("a "),
            Token::new("em_open", "em", Nesting::Open),
            code,
            Token::new("em_close", "em", Nesting::Close),
            Token::raw_html("<b>"),
        ];
        assert_eq!(plain_text(&tokens), "a x");
    }
}
