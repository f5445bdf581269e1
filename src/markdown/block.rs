//! Block model shared by the DOCX and PDF backends.

use super::cursor::{ShapeError, TokenCursor};
use super::inline::{Run, build_runs, runs_text};
use super::token::{Token, TokenKind};
use serde::Serialize;
use thiserror::Error;

/// Leading marker of a list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "number", rename_all = "lowercase")]
pub enum ListMarker {
    /// Unordered item.
    Bullet,
    /// Ordered item with its 1-based position.
    Ordered(u32),
}

impl ListMarker {
    /// Literal prefix written before the item text.
    pub fn prefix(&self) -> String {
        match self {
            ListMarker::Bullet => "\u{2022} ".to_string(),
            ListMarker::Ordered(n) => format!("{}. ", n),
        }
    }
}

/// One top-level structural unit of a chapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    /// Heading; `level` is the parsed level, `None` when the tag was unreadable.
    Heading {
        /// Level 1-6 as parsed.
        level: Option<u8>,
        /// Literal heading text; emphasis markers are not kept.
        text: String,
    },
    /// Body paragraph.
    Paragraph {
        /// Paragraph text.
        runs: Vec<Run>,
        /// Paragraph continues a list item.
        in_list: bool,
    },
    /// First paragraph of a list item.
    ListItem {
        /// Bullet or number.
        marker: ListMarker,
        /// Item text.
        runs: Vec<Run>,
        /// Nesting depth, 0 for a top-level list.
        depth: usize,
    },
    /// Paragraph inside a blockquote, as literal text.
    Quote {
        /// Quoted text.
        text: String,
    },
    /// Fenced or indented code, verbatim.
    Code {
        /// Code exactly as written.
        text: String,
        /// Fence language, if given.
        language: Option<String>,
    },
    /// Thematic break.
    Rule,
    /// An outermost list begins.
    ListStart {
        /// Numbered list.
        ordered: bool,
    },
    /// An outermost list ended.
    ListEnd,
}

impl Block {
    /// Visible text of the block.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Paragraph { runs, .. } | Block::ListItem { runs, .. } => runs_text(runs),
            Block::Heading { text, .. } | Block::Quote { text } | Block::Code { text, .. } => {
                text.clone()
            }
            Block::Rule | Block::ListStart { .. } | Block::ListEnd => String::new(),
        }
    }
}

/// Block could not be built from the token stream.
#[derive(Error, Debug, Clone)]
#[error("malformed {token} block: {source}")]
pub struct BlockError {
    /// Token kind being handled when the shape check failed.
    pub token: TokenKind,
    /// Shape mismatch reported by the cursor.
    #[source]
    pub source: ShapeError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

#[derive(Debug)]
struct ListFrame {
    kind: ListKind,
    counter: u32,
}

/// List nesting and blockquote depth while walking a chapter.
#[derive(Debug, Default)]
struct RenderContext {
    lists: Vec<ListFrame>,
    quote_depth: usize,
}

impl RenderContext {
    fn in_list(&self) -> bool {
        !self.lists.is_empty()
    }

    fn open_list(&mut self, kind: ListKind) {
        self.lists.push(ListFrame { kind, counter: 1 });
    }

    fn close_list(&mut self) {
        self.lists.pop();
    }

    /// Marker for the next item of the innermost list.
    fn next_marker(&mut self) -> ListMarker {
        match self.lists.last_mut() {
            Some(frame) if frame.kind == ListKind::Ordered => {
                let n = frame.counter;
                frame.counter += 1;
                ListMarker::Ordered(n)
            }
            _ => ListMarker::Bullet,
        }
    }

    fn depth(&self) -> usize {
        self.lists.len().saturating_sub(1)
    }
}

/// Parse Markdown and build its blocks.
pub fn parse_blocks(markdown: &str) -> Result<Vec<Block>, BlockError> {
    let tokens = super::token::tokenize(markdown);
    build_blocks(&tokens)
}

/// Walk a token stream once and build its blocks in order.
pub fn build_blocks(tokens: &[Token]) -> Result<Vec<Block>, BlockError> {
    let mut cursor = TokenCursor::new(tokens);
    let mut ctx = RenderContext::default();
    let mut blocks = Vec::new();

    while let Some(token) = cursor.current() {
        let fail = |source: ShapeError| BlockError {
            token: token.kind,
            source,
        };

        match token.kind {
            TokenKind::HeadingOpen => {
                let inline = cursor.expect(1, TokenKind::Inline).map_err(fail)?;
                cursor.expect(2, TokenKind::HeadingClose).map_err(fail)?;
                blocks.push(Block::Heading {
                    level: heading_level(&token.tag),
                    text: inline.content.trim().to_string(),
                });
                cursor.advance_past(2);
            }

            TokenKind::ParagraphOpen => {
                let inline = cursor.expect(1, TokenKind::Inline).map_err(fail)?;
                cursor.expect(2, TokenKind::ParagraphClose).map_err(fail)?;
                if ctx.quote_depth > 0 {
                    blocks.push(Block::Quote {
                        text: inline.content.trim().to_string(),
                    });
                } else {
                    blocks.push(Block::Paragraph {
                        runs: build_runs(&inline.children),
                        in_list: ctx.in_list(),
                    });
                }
                cursor.advance_past(2);
            }

            TokenKind::BulletListOpen | TokenKind::OrderedListOpen => {
                let (kind, ordered) = if token.kind == TokenKind::OrderedListOpen {
                    (ListKind::Ordered, true)
                } else {
                    (ListKind::Bullet, false)
                };
                if !ctx.in_list() {
                    blocks.push(Block::ListStart { ordered });
                }
                ctx.open_list(kind);
                cursor.advance();
            }

            TokenKind::BulletListClose | TokenKind::OrderedListClose => {
                ctx.close_list();
                if !ctx.in_list() {
                    blocks.push(Block::ListEnd);
                }
                cursor.advance();
            }

            TokenKind::ListItemOpen => {
                let marker = ctx.next_marker();
                let depth = ctx.depth();
                let found = cursor.find_before(TokenKind::Inline, |kind| {
                    kind == TokenKind::ListItemClose || kind.is_list_open()
                });
                match found {
                    Some(offset) => {
                        // Only the item's leading paragraph is consumed here
                        let inline = cursor.expect(offset, TokenKind::Inline).map_err(fail)?;
                        blocks.push(Block::ListItem {
                            marker,
                            runs: build_runs(&inline.children),
                            depth,
                        });
                        let close_offset = match cursor.peek(offset + 1) {
                            Some(next) if next.kind == TokenKind::ParagraphClose => offset + 1,
                            _ => offset,
                        };
                        cursor.advance_past(close_offset);
                    }
                    None => {
                        blocks.push(Block::ListItem {
                            marker,
                            runs: Vec::new(),
                            depth,
                        });
                        cursor.advance();
                    }
                }
            }

            TokenKind::BlockquoteOpen => {
                ctx.quote_depth += 1;
                cursor.advance();
            }

            TokenKind::BlockquoteClose => {
                ctx.quote_depth = ctx.quote_depth.saturating_sub(1);
                cursor.advance();
            }

            TokenKind::Fence | TokenKind::CodeBlock => {
                let language = Some(token.info.trim())
                    .filter(|info| !info.is_empty())
                    .and_then(|info| info.split_whitespace().next())
                    .map(str::to_string);
                blocks.push(Block::Code {
                    text: token.content.clone(),
                    language,
                });
                cursor.advance();
            }

            TokenKind::Hr => {
                blocks.push(Block::Rule);
                cursor.advance();
            }

            // Inline-level tokens never appear at block level; closers were
            // consumed with their openers; html is not rendered.
            TokenKind::HeadingClose
            | TokenKind::ParagraphClose
            | TokenKind::ListItemClose
            | TokenKind::Inline
            | TokenKind::Text
            | TokenKind::StrongOpen
            | TokenKind::StrongClose
            | TokenKind::EmOpen
            | TokenKind::EmClose
            | TokenKind::CodeInline
            | TokenKind::Softbreak
            | TokenKind::Hardbreak
            | TokenKind::LinkOpen
            | TokenKind::LinkClose
            | TokenKind::Image
            | TokenKind::HtmlInline
            | TokenKind::HtmlBlock => cursor.advance(),
        }
    }

    Ok(blocks)
}

/// Level from a heading tag such as `h2`.
fn heading_level(tag: &str) -> Option<u8> {
    tag.strip_prefix('h')
        .and_then(|digits| digits.parse::<u8>().ok())
        .filter(|level| *level >= 1)
}
