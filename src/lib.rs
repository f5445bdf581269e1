//! quill-export: renders Markdown books to DOCX and PDF.
//!
//! A book is a title page plus chapters written in Markdown. Each chapter
//! is tokenized, walked once into a shared block model, and rendered by
//! one of two backends:
//!
//! - a flow-document backend producing WordprocessingML paragraphs
//!   packaged as `.docx`
//! - a drawing-surface backend laying text out on PDF pages
//!
//! # Features
//!
//! - Headings, emphasis, inline code, nested lists, blockquotes, code
//!   blocks and rules
//! - Cover images from HTTP(S) or `data:` URLs
//! - HTTP API and command-line exporter

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Configuration and CLI.
pub mod config;
/// Error types.
pub mod error;
/// Cover fetching and book export.
pub mod export;
/// Document backends and assembly.
pub mod formats;
/// Book and chapter models.
pub mod library;
/// Markdown tokens, inline runs and blocks.
pub mod markdown;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config, ExportFormat};
pub use error::{AppError, Result};
pub use export::{
    CoverFetcher, ExportedDocument, HttpCoverFetcher, PdfStream, export_book, prepare_export,
    stream_pdf,
};
pub use library::{Book, Chapter};
pub use server::AppState;
