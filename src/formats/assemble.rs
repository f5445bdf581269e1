//! Document assembly shared by the DOCX and PDF writers.

use super::cover::CoverImage;
use crate::error::Result;
use crate::library::{Book, Chapter};
use crate::markdown::Block;

/// A backend that can receive the parts of a book in reading order.
pub trait BookWriter {
    /// Finished document handed back by [`BookWriter::finish`].
    type Output;

    /// Full-page cover image.
    fn cover(&mut self, cover: &CoverImage) -> Result<()>;

    /// Title, optional subtitle, author line and a decorative rule.
    fn title_page(&mut self, book: &Book) -> Result<()>;

    /// Start a new page.
    fn page_break(&mut self);

    /// Chapter title as a heading followed by the chapter content.
    fn chapter(&mut self, chapter: &Chapter) -> Result<()>;

    /// Complete the document.
    fn finish(self, book: &Book) -> Result<Self::Output>
    where
        Self: Sized;
}

/// Drive a writer through a book: cover, title page, then every chapter
/// on its own page.
pub fn assemble<W: BookWriter>(
    mut writer: W,
    book: &Book,
    cover: Option<&CoverImage>,
) -> Result<W::Output> {
    if let Some(cover) = cover {
        writer.cover(cover)?;
        writer.page_break();
    }

    writer.title_page(book)?;
    writer.page_break();

    for (index, chapter) in book.chapters.iter().enumerate() {
        if index > 0 {
            writer.page_break();
        }
        writer.chapter(chapter).inspect_err(|e| {
            tracing::error!(
                chapter = index + 1,
                title = %chapter.title,
                error = %e,
                "Failed to render chapter"
            );
        })?;
    }

    writer.finish(book)
}

/// Heading block for a chapter title.
pub fn chapter_heading(chapter: &Chapter) -> Block {
    Block::Heading {
        level: Some(1),
        text: chapter.title.trim().to_string(),
    }
}
