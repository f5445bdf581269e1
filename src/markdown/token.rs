//! Flat Markdown token stream.
//!
//! `pulldown-cmark` produces a nested event stream; the renderers consume a
//! flat list of open/close markers where every heading and paragraph carries
//! exactly one `inline` token holding its formatting spans:
//!
//! ```text
//! heading_open(h1) inline[text] heading_close
//! bullet_list_open list_item_open paragraph_open inline[...] paragraph_close list_item_close ...
//! ```
//!
//! Tight list items get synthetic paragraph tokens so both loose and tight
//! lists share one shape.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use std::fmt;

/// Token type.
#[allow(missing_docs)] // variants mirror the `snake_case` names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    HeadingOpen,
    HeadingClose,
    ParagraphOpen,
    ParagraphClose,
    Inline,
    Text,
    StrongOpen,
    StrongClose,
    EmOpen,
    EmClose,
    CodeInline,
    Softbreak,
    Hardbreak,
    LinkOpen,
    LinkClose,
    Image,
    HtmlInline,
    HtmlBlock,
    BulletListOpen,
    BulletListClose,
    OrderedListOpen,
    OrderedListClose,
    ListItemOpen,
    ListItemClose,
    BlockquoteOpen,
    BlockquoteClose,
    Fence,
    CodeBlock,
    Hr,
}

impl TokenKind {
    /// Name as used in log output and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::HeadingOpen => "heading_open",
            TokenKind::HeadingClose => "heading_close",
            TokenKind::ParagraphOpen => "paragraph_open",
            TokenKind::ParagraphClose => "paragraph_close",
            TokenKind::Inline => "inline",
            TokenKind::Text => "text",
            TokenKind::StrongOpen => "strong_open",
            TokenKind::StrongClose => "strong_close",
            TokenKind::EmOpen => "em_open",
            TokenKind::EmClose => "em_close",
            TokenKind::CodeInline => "code_inline",
            TokenKind::Softbreak => "softbreak",
            TokenKind::Hardbreak => "hardbreak",
            TokenKind::LinkOpen => "link_open",
            TokenKind::LinkClose => "link_close",
            TokenKind::Image => "image",
            TokenKind::HtmlInline => "html_inline",
            TokenKind::HtmlBlock => "html_block",
            TokenKind::BulletListOpen => "bullet_list_open",
            TokenKind::BulletListClose => "bullet_list_close",
            TokenKind::OrderedListOpen => "ordered_list_open",
            TokenKind::OrderedListClose => "ordered_list_close",
            TokenKind::ListItemOpen => "list_item_open",
            TokenKind::ListItemClose => "list_item_close",
            TokenKind::BlockquoteOpen => "blockquote_open",
            TokenKind::BlockquoteClose => "blockquote_close",
            TokenKind::Fence => "fence",
            TokenKind::CodeBlock => "code_block",
            TokenKind::Hr => "hr",
        }
    }

    /// Whether this token opens a list of either kind.
    pub fn is_list_open(&self) -> bool {
        matches!(self, TokenKind::BulletListOpen | TokenKind::OrderedListOpen)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of parsed Markdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    /// Token type.
    pub kind: TokenKind,
    /// HTML tag name, e.g. `h2` for a level-two heading.
    pub tag: String,
    /// Literal text for leaf tokens; plain text of the children for `inline`.
    pub content: String,
    /// Fence language or link destination.
    pub info: String,
    /// Formatting spans, only present on `inline` tokens.
    pub children: Vec<Token>,
}

impl Token {
    /// Create a token with no content.
    pub fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            tag: String::new(),
            content: String::new(),
            info: String::new(),
            children: Vec::new(),
        }
    }

    /// Set the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Set the content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the info string.
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Build an `inline` token from its children.
    pub fn inline(children: Vec<Token>) -> Self {
        let content = plain_text(&children);
        Self {
            children,
            ..Self::new(TokenKind::Inline).with_content(content)
        }
    }

    /// Shorthand for a `text` leaf.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(TokenKind::Text).with_content(content)
    }
}

/// Visible text of a run of inline tokens.
fn plain_text(children: &[Token]) -> String {
    let mut out = String::new();
    for child in children {
        match child.kind {
            TokenKind::Text | TokenKind::CodeInline => out.push_str(&child.content),
            TokenKind::Softbreak | TokenKind::Hardbreak => out.push(' '),
            _ => {}
        }
    }
    out
}

/// Parse Markdown into the flat token stream.
pub fn tokenize(markdown: &str) -> Vec<Token> {
    let parser = Parser::new_ext(markdown, Options::empty());
    let mut builder = TokenStream::default();

    for event in parser {
        builder.push_event(event);
    }

    builder.finish()
}

/// Code block being collected.
struct PendingCode {
    kind: TokenKind,
    info: String,
    text: String,
}

#[derive(Default)]
struct TokenStream {
    tokens: Vec<Token>,
    // Children of the heading/paragraph currently open
    inline: Option<Vec<Token>>,
    // Paragraph opened on behalf of a tight list item
    implicit_paragraph: bool,
    code: Option<PendingCode>,
    // Nesting depth of image alt text
    image_depth: usize,
}

impl TokenStream {
    fn push_event(&mut self, event: Event<'_>) {
        if let Some(code) = self.code.as_mut() {
            match event {
                Event::Text(text) => code.text.push_str(&text),
                Event::End(TagEnd::CodeBlock) => self.finish_code(),
                _ => {}
            }
            return;
        }

        if self.image_depth > 0 {
            self.push_image_event(event);
            return;
        }

        match event {
            Event::Start(Tag::Paragraph) => {
                self.close_implicit_paragraph();
                self.tokens.push(Token::new(TokenKind::ParagraphOpen).with_tag("p"));
                self.inline = Some(Vec::new());
            }
            Event::End(TagEnd::Paragraph) => {
                self.flush_inline();
                self.tokens.push(Token::new(TokenKind::ParagraphClose).with_tag("p"));
            }

            Event::Start(Tag::Heading { level, .. }) => {
                self.close_implicit_paragraph();
                self.tokens
                    .push(Token::new(TokenKind::HeadingOpen).with_tag(heading_tag(level)));
                self.inline = Some(Vec::new());
            }
            Event::End(TagEnd::Heading(level)) => {
                self.flush_inline();
                self.tokens
                    .push(Token::new(TokenKind::HeadingClose).with_tag(heading_tag(level)));
            }

            Event::Start(Tag::BlockQuote(_)) => {
                self.close_implicit_paragraph();
                self.tokens
                    .push(Token::new(TokenKind::BlockquoteOpen).with_tag("blockquote"));
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.close_implicit_paragraph();
                self.tokens
                    .push(Token::new(TokenKind::BlockquoteClose).with_tag("blockquote"));
            }

            Event::Start(Tag::List(start)) => {
                self.close_implicit_paragraph();
                let token = match start {
                    Some(n) => Token::new(TokenKind::OrderedListOpen)
                        .with_tag("ol")
                        .with_info(n.to_string()),
                    None => Token::new(TokenKind::BulletListOpen).with_tag("ul"),
                };
                self.tokens.push(token);
            }
            Event::End(TagEnd::List(ordered)) => {
                self.close_implicit_paragraph();
                let token = if ordered {
                    Token::new(TokenKind::OrderedListClose).with_tag("ol")
                } else {
                    Token::new(TokenKind::BulletListClose).with_tag("ul")
                };
                self.tokens.push(token);
            }

            Event::Start(Tag::Item) => {
                self.close_implicit_paragraph();
                self.tokens.push(Token::new(TokenKind::ListItemOpen).with_tag("li"));
            }
            Event::End(TagEnd::Item) => {
                self.close_implicit_paragraph();
                self.tokens.push(Token::new(TokenKind::ListItemClose).with_tag("li"));
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                self.close_implicit_paragraph();
                self.code = Some(match kind {
                    CodeBlockKind::Fenced(info) => PendingCode {
                        kind: TokenKind::Fence,
                        info: info.trim().to_string(),
                        text: String::new(),
                    },
                    CodeBlockKind::Indented => PendingCode {
                        kind: TokenKind::CodeBlock,
                        info: String::new(),
                        text: String::new(),
                    },
                });
            }

            Event::Rule => {
                self.close_implicit_paragraph();
                self.tokens.push(Token::new(TokenKind::Hr).with_tag("hr"));
            }

            Event::Html(html) => {
                self.close_implicit_paragraph();
                self.tokens
                    .push(Token::new(TokenKind::HtmlBlock).with_content(html.to_string()));
            }

            Event::Text(text) => self.push_inline(Token::text(text.to_string())),
            Event::Code(code) => {
                self.push_inline(Token::new(TokenKind::CodeInline).with_content(code.to_string()))
            }
            Event::InlineHtml(html) => self
                .push_inline(Token::new(TokenKind::HtmlInline).with_content(html.to_string())),
            Event::SoftBreak => self.push_inline(Token::new(TokenKind::Softbreak)),
            Event::HardBreak => self.push_inline(Token::new(TokenKind::Hardbreak).with_tag("br")),

            Event::Start(Tag::Strong) => {
                self.push_inline(Token::new(TokenKind::StrongOpen).with_tag("strong"))
            }
            Event::End(TagEnd::Strong) => {
                self.push_inline(Token::new(TokenKind::StrongClose).with_tag("strong"))
            }
            Event::Start(Tag::Emphasis) => {
                self.push_inline(Token::new(TokenKind::EmOpen).with_tag("em"))
            }
            Event::End(TagEnd::Emphasis) => {
                self.push_inline(Token::new(TokenKind::EmClose).with_tag("em"))
            }
            Event::Start(Tag::Link { dest_url, .. }) => self.push_inline(
                Token::new(TokenKind::LinkOpen)
                    .with_tag("a")
                    .with_info(dest_url.to_string()),
            ),
            Event::End(TagEnd::Link) => {
                self.push_inline(Token::new(TokenKind::LinkClose).with_tag("a"))
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.push_inline(
                    Token::new(TokenKind::Image)
                        .with_tag("img")
                        .with_info(dest_url.to_string()),
                );
                self.image_depth = 1;
            }

            _ => {}
        }
    }

    /// Alt text of an image lands in the image token's content.
    fn push_image_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Image { .. }) => self.image_depth += 1,
            Event::End(TagEnd::Image) => self.image_depth -= 1,
            Event::Text(text) | Event::Code(text) => {
                if let Some(image) = self
                    .inline
                    .as_mut()
                    .and_then(|children| children.last_mut())
                {
                    image.content.push_str(&text);
                }
            }
            _ => {}
        }
    }

    fn push_inline(&mut self, token: Token) {
        if self.inline.is_none() {
            // Inline content directly inside a tight list item
            self.tokens.push(Token::new(TokenKind::ParagraphOpen).with_tag("p"));
            self.inline = Some(Vec::new());
            self.implicit_paragraph = true;
        }
        if let Some(children) = self.inline.as_mut() {
            children.push(token);
        }
    }

    fn flush_inline(&mut self) {
        if let Some(children) = self.inline.take() {
            self.tokens.push(Token::inline(children));
        }
    }

    fn close_implicit_paragraph(&mut self) {
        if self.implicit_paragraph {
            self.flush_inline();
            self.tokens.push(Token::new(TokenKind::ParagraphClose).with_tag("p"));
            self.implicit_paragraph = false;
        }
    }

    fn finish_code(&mut self) {
        if let Some(code) = self.code.take() {
            self.tokens.push(
                Token::new(code.kind)
                    .with_tag("code")
                    .with_info(code.info)
                    .with_content(code.text),
            );
        }
    }

    fn finish(mut self) -> Vec<Token> {
        self.close_implicit_paragraph();
        self.finish_code();
        self.tokens
    }
}

fn heading_tag(level: HeadingLevel) -> String {
    let n = match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    };
    format!("h{}", n)
}
