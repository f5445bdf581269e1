//! Book and chapter models supplied by the writing application.

pub mod book;

pub use book::{Book, Chapter};
