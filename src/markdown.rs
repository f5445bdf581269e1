//! Markdown tokenization and the block model the exporters render.

pub mod block;
pub mod cursor;
pub mod inline;
pub mod token;

pub use block::{Block, BlockError, ListMarker, build_blocks, parse_blocks};
pub use cursor::{ShapeError, TokenCursor};
pub use inline::{Run, build_runs, runs_text};
pub use token::{Token, TokenKind, tokenize};
