//! Drawing-surface backend: renders blocks through a [`PageWriter`].

use super::assemble::{BookWriter, assemble, chapter_heading};
use super::cover::CoverImage;
use super::fonts::FontFace;
use super::page::{Align, Color, DocumentInfo, PageSetup, PageWriter, Span, TextOptions};
use crate::config::PdfConfig;
use crate::error::{AppError, Result};
use crate::library::{Book, Chapter};
use crate::markdown::{Block, Run, parse_blocks};
use lopdf::Document;

/// Body font size; spacing units are normalized against it.
pub const BASE_BODY_SIZE: f32 = 12.0;

const CODE_SIZE: f32 = 10.0;
const LIST_INDENT: f32 = 18.0;
const QUOTE_INDENT: f32 = 24.0;

const PARAGRAPH_AFTER: f32 = 10.0;
const LIST_OPEN: f32 = 4.0;
const LIST_CLOSE: f32 = 10.0;
const ITEM_AFTER: f32 = 2.0;
const RULE_BEFORE: f32 = 6.0;
const RULE_AFTER: f32 = 12.0;

const HEADING_COLOR: Color = Color::gray(0.1);
const QUOTE_COLOR: Color = Color::gray(0.3);
const QUOTE_BAR: Color = Color::gray(0.6);
const RULE_COLOR: Color = Color::gray(0.5);

struct HeadingStyle {
    size: f32,
    before: f32,
    after: f32,
}

const HEADING_STYLES: [HeadingStyle; 3] = [
    HeadingStyle {
        size: 24.0,
        before: 24.0,
        after: 12.0,
    },
    HeadingStyle {
        size: 20.0,
        before: 18.0,
        after: 10.0,
    },
    HeadingStyle {
        size: 16.0,
        before: 12.0,
        after: 8.0,
    },
];

fn heading_style(level: Option<u8>) -> &'static HeadingStyle {
    match level {
        Some(level @ 1..=3) => &HEADING_STYLES[level as usize - 1],
        _ => &HEADING_STYLES[2],
    }
}

/// Advance by `units` of spacing, measured in body-size lines.
fn space(writer: &mut PageWriter, units: f32) {
    writer.move_down(units / BASE_BODY_SIZE);
}

/// Render one chapter's Markdown onto the page writer.
pub fn render_markdown(writer: &mut PageWriter, markdown: &str) -> Result<()> {
    let blocks = parse_blocks(markdown).map_err(|e| {
        tracing::error!(token = %e.token, error = %e, "Failed to draw Markdown block");
        AppError::pdf("markdown", e.to_string())
    })?;

    for block in &blocks {
        render_block(writer, block);
    }

    Ok(())
}

/// Draw a single block at the writer's cursor.
pub fn render_block(writer: &mut PageWriter, block: &Block) {
    match block {
        Block::Heading { level, text } => {
            let style = heading_style(*level);
            writer.font(FontFace::Bold, style.size).fill(HEADING_COLOR);
            space(writer, style.before);
            let span = writer.span(text.as_str());
            writer.text(&[span], &TextOptions::default());
            space(writer, style.after);
        }

        Block::Paragraph { runs, in_list } => {
            writer.font(FontFace::Regular, BASE_BODY_SIZE).fill(Color::BLACK);
            let spans = spans_for_runs(writer, runs);
            let options = TextOptions {
                align: Align::Justify,
                indent: if *in_list { LIST_INDENT } else { 0.0 },
                ..TextOptions::default()
            };
            writer.text(&spans, &options);
            if !in_list {
                space(writer, PARAGRAPH_AFTER);
            }
        }

        Block::ListStart { .. } => {
            writer.font(FontFace::Regular, BASE_BODY_SIZE);
            space(writer, LIST_OPEN);
        }

        Block::ListEnd => {
            writer.font(FontFace::Regular, BASE_BODY_SIZE);
            space(writer, LIST_CLOSE);
        }

        Block::ListItem {
            marker,
            runs,
            depth,
        } => {
            writer.font(FontFace::Regular, BASE_BODY_SIZE).fill(Color::BLACK);
            let options = TextOptions {
                align: Align::Left,
                indent: LIST_INDENT * *depth as f32,
                marker: Some(writer.span(marker.prefix())),
                bar: None,
            };
            let spans = spans_for_runs(writer, runs);
            writer.text(&spans, &options);
            space(writer, ITEM_AFTER);
        }

        Block::Quote { text } => {
            writer.font(FontFace::Italic, BASE_BODY_SIZE).fill(QUOTE_COLOR);
            let span = writer.span(text.as_str());
            let options = TextOptions {
                align: Align::Left,
                indent: QUOTE_INDENT,
                marker: None,
                bar: Some(QUOTE_BAR),
            };
            writer.text(&[span], &options);
            writer.fill(Color::BLACK);
            space(writer, PARAGRAPH_AFTER);
        }

        Block::Code { text, .. } => {
            writer.font(FontFace::Mono, CODE_SIZE).fill(Color::BLACK);
            writer.preformatted(text, 0.0);
            writer.font(FontFace::Regular, BASE_BODY_SIZE);
            space(writer, PARAGRAPH_AFTER);
        }

        Block::Rule => {
            writer.font(FontFace::Regular, BASE_BODY_SIZE);
            let setup = *writer.setup();
            space(writer, RULE_BEFORE);
            writer.rule(setup.margin, setup.width - setup.margin, 0.5, RULE_COLOR);
            space(writer, RULE_AFTER);
        }
    }
}

/// Spans for inline runs in the writer's current size and colour.
fn spans_for_runs(writer: &PageWriter, runs: &[Run]) -> Vec<Span> {
    runs.iter()
        .map(|run| {
            let face = if run.code {
                FontFace::Mono
            } else {
                FontFace::styled(run.bold, run.italic)
            };
            Span {
                face,
                ..writer.span(run.text.as_str())
            }
        })
        .collect()
}

/// Assembles a book onto pages and serializes it with `lopdf`.
#[derive(Debug)]
pub struct PdfBookWriter {
    writer: PageWriter,
    compress: bool,
}

impl PdfBookWriter {
    /// Writer for the given page setup.
    pub fn new(setup: PageSetup, compress: bool) -> Self {
        Self {
            writer: PageWriter::new(setup),
            compress,
        }
    }

    /// Writer configured from the `[pdf]` section.
    pub fn from_config(config: &PdfConfig) -> Self {
        Self::new(PageSetup::from_config(config), config.compress)
    }

    fn centered(&mut self, text: &str) {
        let span = self.writer.span(text);
        let options = TextOptions {
            align: Align::Center,
            ..TextOptions::default()
        };
        self.writer.text(&[span], &options);
    }
}

impl BookWriter for PdfBookWriter {
    type Output = Document;

    fn cover(&mut self, cover: &CoverImage) -> Result<()> {
        let jpeg = cover.to_jpeg()?;
        let setup = *self.writer.setup();
        let (width, height) = cover.fit_within(setup.content_width(), setup.content_height());
        self.writer.advance((setup.content_height() - height) / 2.0);
        self.writer
            .image(jpeg, (cover.width(), cover.height()), (width, height));
        Ok(())
    }

    fn title_page(&mut self, book: &Book) -> Result<()> {
        let setup = *self.writer.setup();
        self.writer.advance(setup.content_height() * 0.25);

        self.writer.font(FontFace::Bold, 28.0).fill(Color::BLACK);
        self.centered(book.title.trim());

        if let Some(subtitle) = book.subtitle() {
            self.writer.font(FontFace::Italic, 16.0).fill(QUOTE_COLOR);
            self.writer.move_down(0.5);
            self.centered(subtitle);
        }

        self.writer.font(FontFace::Regular, 14.0).fill(Color::BLACK);
        self.writer.move_down(1.5);
        self.centered(&format!("by {}", book.author_display()));

        self.writer.move_down(1.0);
        let center = setup.width / 2.0;
        self.writer.rule(center - 72.0, center + 72.0, 1.0, RULE_COLOR);
        Ok(())
    }

    fn page_break(&mut self) {
        self.writer.add_page();
    }

    fn chapter(&mut self, chapter: &Chapter) -> Result<()> {
        render_block(&mut self.writer, &chapter_heading(chapter));
        render_markdown(&mut self.writer, &chapter.content)
    }

    fn finish(self, book: &Book) -> Result<Document> {
        let info = DocumentInfo {
            title: book.title.trim().to_string(),
            author: book.author_display().to_string(),
            subject: book.subtitle().map(str::to_string),
        };
        tracing::debug!(pages = self.writer.page_count(), "Building PDF");
        self.writer.into_document(&info, self.compress)
    }
}

/// Lay out a book into an unserialized PDF document.
pub fn render_document(
    book: &Book,
    cover: Option<&CoverImage>,
    config: &PdfConfig,
) -> Result<Document> {
    assemble(PdfBookWriter::from_config(config), book, cover)
}
