//! Inline run builder.

use super::token::{Token, TokenKind};
use serde::Serialize;

/// A span of text sharing one formatting state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Run {
    /// Visible text.
    pub text: String,
    /// Strong emphasis.
    pub bold: bool,
    /// Emphasis.
    pub italic: bool,
    /// Inline code, rendered in the monospace face.
    pub code: bool,
}

impl Run {
    /// Unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    fn same_style(&self, other: &Run) -> bool {
        self.bold == other.bold && self.italic == other.italic && self.code == other.code
    }
}

/// Convert inline tokens into styled runs, preserving read order.
///
/// Text accumulates until a style boundary flushes it. A flushed buffer
/// that is empty or whitespace-only produces no run, and a run with the
/// same style as its predecessor is merged into it.
pub fn build_runs(children: &[Token]) -> Vec<Run> {
    let mut builder = RunBuilder::default();

    for token in children {
        match token.kind {
            TokenKind::Text => builder.buffer.push_str(&token.content),
            TokenKind::Softbreak | TokenKind::Hardbreak => builder.buffer.push(' '),
            TokenKind::StrongOpen | TokenKind::StrongClose => {
                builder.flush();
                builder.bold = !builder.bold;
            }
            TokenKind::EmOpen | TokenKind::EmClose => {
                builder.flush();
                builder.italic = !builder.italic;
            }
            TokenKind::CodeInline => {
                builder.flush();
                builder.push(Run {
                    text: token.content.clone(),
                    bold: builder.bold,
                    italic: builder.italic,
                    code: true,
                });
            }
            _ => {}
        }
    }

    builder.flush();
    builder.runs
}

/// Concatenated text of a run sequence.
pub fn runs_text(runs: &[Run]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

#[derive(Default)]
struct RunBuilder {
    bold: bool,
    italic: bool,
    buffer: String,
    runs: Vec<Run>,
}

impl RunBuilder {
    fn flush(&mut self) {
        let text = std::mem::take(&mut self.buffer);
        if text.trim().is_empty() {
            return;
        }
        self.push(Run {
            text,
            bold: self.bold,
            italic: self.italic,
            code: false,
        });
    }

    fn push(&mut self, run: Run) {
        if run.text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.same_style(&run) => last.text.push_str(&run.text),
            _ => self.runs.push(run),
        }
    }
}
