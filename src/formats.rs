pub mod assemble;
pub mod cover;
pub mod docx;
pub mod fonts;
pub mod page;
pub mod pdf;

pub use assemble::{BookWriter, assemble};
pub use cover::CoverImage;
pub use docx::{DocxBookWriter, Paragraph};
pub use page::{PageSetup, PageWriter, write_pdf};
pub use pdf::PdfBookWriter;

use crate::config::{ExportFormat, PdfConfig};
use crate::error::Result;
use crate::library::Book;

/// Render a validated book with an already decoded cover.
pub fn render_book(
    book: &Book,
    format: ExportFormat,
    cover: Option<&CoverImage>,
    pdf_config: &PdfConfig,
) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Docx => assemble(DocxBookWriter::new(), book, cover),
        ExportFormat::Pdf => {
            let mut doc = pdf::render_document(book, cover, pdf_config)?;
            let mut bytes = Vec::new();
            write_pdf(&mut doc, &mut bytes)?;
            Ok(bytes)
        }
    }
}
