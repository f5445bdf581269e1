//! Flow-document backend: blocks become WordprocessingML paragraphs.
//!
//! [`render_markdown`] is a pure conversion from one chapter's Markdown to
//! [`Paragraph`] values carrying explicit typography (sizes in half-points,
//! spacing and indents in twips). [`DocxBookWriter`] assembles those
//! paragraphs with a title page and cover into a `.docx` package.

use super::assemble::{BookWriter, chapter_heading};
use super::cover::CoverImage;
use crate::error::{AppError, Result};
use crate::library::{Book, Chapter};
use crate::markdown::{Block, Run, parse_blocks};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::Serialize;
use std::borrow::Cow;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Body text size in half-points.
pub const BODY_SIZE: u32 = 24;

/// Code text size in half-points.
pub const CODE_SIZE: u32 = 20;

/// Monospace font for code.
pub const CODE_FONT: &str = "Courier New";

/// Background of code paragraphs.
pub const CODE_SHADING: &str = "F2F2F2";

const LIST_INDENT: u32 = 720;
const LIST_HANGING: u32 = 360;
const QUOTE_INDENT: u32 = 720;

const BODY_AFTER: u32 = 200;
const LIST_AFTER: u32 = 80;
const SPACER_AFTER: u32 = 120;

/// English Metric Units per inch.
const EMU_PER_INCH: f32 = 914_400.0;

/// Relationship id of the embedded cover image.
const COVER_REL_ID: &str = "rId2";

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

/// What a paragraph represents in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphKind {
    /// Book title.
    Title,
    /// Book subtitle.
    Subtitle,
    /// "by" line on the title page.
    Author,
    /// Section or chapter heading.
    Heading,
    /// Body text.
    Body,
    /// List item with its marker.
    ListItem,
    /// Blockquote text.
    Quote,
    /// Code block.
    Code,
    /// Horizontal rule.
    Rule,
    /// Empty paragraph closing a list.
    Spacer,
    /// Hard page break.
    PageBreak,
    /// Cover image.
    Cover,
}

/// Paragraph alignment, named after the `w:jc` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Flush left.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Justified.
    Both,
}

impl Alignment {
    fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Both => "both",
        }
    }
}

/// Space above and below a paragraph, in twips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Spacing {
    /// Space before.
    pub before: u32,
    /// Space after.
    pub after: u32,
}

/// Paragraph indentation, in twips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Indent {
    /// Left indent.
    pub left: u32,
    /// Right indent.
    pub right: u32,
    /// First line hangs this far left of `left`.
    pub hanging: u32,
}

/// A run of text with explicit formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRun {
    /// Text; `\n` becomes a line break and `\t` a tab stop.
    pub text: String,
    /// Bold.
    pub bold: bool,
    /// Italic.
    pub italic: bool,
    /// Font override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<&'static str>,
    /// Size in half-points.
    pub size: u32,
}

impl TextRun {
    /// Run in the body size with no styling.
    pub fn plain(text: impl Into<String>, size: u32) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            font: None,
            size,
        }
    }

    fn from_run(run: &Run, size: u32) -> Self {
        Self {
            text: run.text.clone(),
            bold: run.bold,
            italic: run.italic,
            font: run.code.then_some(CODE_FONT),
            size,
        }
    }
}

/// Inline picture placed in a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drawing {
    /// Relationship id of the image part.
    pub rel_id: &'static str,
    /// Width in EMU.
    pub width_emu: u64,
    /// Height in EMU.
    pub height_emu: u64,
}

/// One paragraph of the flow document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    /// What the paragraph represents.
    pub kind: ParagraphKind,
    /// Named paragraph style.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<&'static str>,
    /// Text runs.
    pub runs: Vec<TextRun>,
    /// Alignment.
    pub alignment: Alignment,
    /// Space before and after.
    pub spacing: Spacing,
    /// Indentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<Indent>,
    /// Left border bar, used for quotes.
    pub border_left: bool,
    /// Bottom border, used for rules.
    pub rule: bool,
    /// Background fill colour.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shading: Option<&'static str>,
    /// Inline picture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawing: Option<Drawing>,
}

impl Paragraph {
    /// Empty left-aligned paragraph of the given kind.
    pub fn new(kind: ParagraphKind) -> Self {
        Self {
            kind,
            style: None,
            runs: Vec::new(),
            alignment: Alignment::Left,
            spacing: Spacing::default(),
            indent: None,
            border_left: false,
            rule: false,
            shading: None,
            drawing: None,
        }
    }

    /// Paragraph holding only a page break.
    pub fn page_break() -> Self {
        Self::new(ParagraphKind::PageBreak)
    }

    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn with_runs(mut self, runs: Vec<TextRun>) -> Self {
        self.runs = runs;
        self
    }

    fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    fn spaced(mut self, before: u32, after: u32) -> Self {
        self.spacing = Spacing { before, after };
        self
    }

    fn styled(mut self, style: &'static str) -> Self {
        self.style = Some(style);
        self
    }
}

/// Style name, size and spacing of one heading level.
struct HeadingStyle {
    style: &'static str,
    size: u32,
    before: u32,
    after: u32,
}

const HEADING_STYLES: [HeadingStyle; 3] = [
    HeadingStyle {
        style: "Heading1",
        size: 32,
        before: 480,
        after: 240,
    },
    HeadingStyle {
        style: "Heading2",
        size: 28,
        before: 360,
        after: 200,
    },
    HeadingStyle {
        style: "Heading3",
        size: 24,
        before: 240,
        after: 160,
    },
];

/// Levels past 3, or unreadable ones, use the level-1 style at the level-3 size.
const FALLBACK_HEADING: HeadingStyle = HeadingStyle {
    style: "Heading1",
    size: 24,
    before: 480,
    after: 240,
};

fn heading_style(level: Option<u8>) -> &'static HeadingStyle {
    match level {
        Some(level @ 1..=3) => &HEADING_STYLES[level as usize - 1],
        _ => &FALLBACK_HEADING,
    }
}

/// Convert one chapter's Markdown into flow-document paragraphs.
pub fn render_markdown(markdown: &str) -> Result<Vec<Paragraph>> {
    let blocks = parse_blocks(markdown).map_err(|e| {
        tracing::error!(token = %e.token, error = %e, "Failed to convert Markdown block");
        AppError::content("markdown", e.to_string())
    })?;

    Ok(blocks.iter().filter_map(paragraph_for_block).collect())
}

/// Paragraph for one block; list openings produce none.
pub fn paragraph_for_block(block: &Block) -> Option<Paragraph> {
    let paragraph = match block {
        Block::Heading { level, text } => {
            let style = heading_style(*level);
            let run = TextRun {
                bold: true,
                ..TextRun::plain(text.as_str(), style.size)
            };
            Paragraph::new(ParagraphKind::Heading)
                .styled(style.style)
                .with_runs(vec![run])
                .spaced(style.before, style.after)
        }

        Block::Paragraph { runs, in_list } => {
            let mut paragraph = Paragraph::new(ParagraphKind::Body)
                .with_runs(runs.iter().map(|r| TextRun::from_run(r, BODY_SIZE)).collect())
                .aligned(Alignment::Both)
                .spaced(0, if *in_list { LIST_AFTER } else { BODY_AFTER });
            if *in_list {
                paragraph.indent = Some(Indent {
                    left: LIST_INDENT,
                    ..Indent::default()
                });
            }
            paragraph
        }

        Block::ListItem {
            marker,
            runs,
            depth,
        } => {
            let mut item_runs = vec![TextRun::plain(marker.prefix(), BODY_SIZE)];
            item_runs.extend(runs.iter().map(|r| TextRun::from_run(r, BODY_SIZE)));
            let mut paragraph = Paragraph::new(ParagraphKind::ListItem)
                .with_runs(item_runs)
                .spaced(0, LIST_AFTER);
            paragraph.indent = Some(Indent {
                left: LIST_INDENT * (*depth as u32 + 1),
                right: 0,
                hanging: LIST_HANGING,
            });
            paragraph
        }

        Block::Quote { text } => {
            let run = TextRun {
                italic: true,
                ..TextRun::plain(text.as_str(), BODY_SIZE)
            };
            let mut paragraph = Paragraph::new(ParagraphKind::Quote)
                .with_runs(vec![run])
                .spaced(0, BODY_AFTER);
            paragraph.indent = Some(Indent {
                left: QUOTE_INDENT,
                ..Indent::default()
            });
            paragraph.border_left = true;
            paragraph
        }

        Block::Code { text, .. } => {
            let run = TextRun {
                font: Some(CODE_FONT),
                ..TextRun::plain(text.strip_suffix('\n').unwrap_or(text), CODE_SIZE)
            };
            let mut paragraph = Paragraph::new(ParagraphKind::Code)
                .with_runs(vec![run])
                .spaced(0, BODY_AFTER);
            paragraph.shading = Some(CODE_SHADING);
            paragraph
        }

        Block::Rule => {
            let mut paragraph = Paragraph::new(ParagraphKind::Rule).spaced(0, BODY_AFTER);
            paragraph.rule = true;
            paragraph
        }

        Block::ListStart { .. } => return None,

        Block::ListEnd => Paragraph::new(ParagraphKind::Spacer).spaced(0, SPACER_AFTER),
    };

    Some(paragraph)
}

/// Collects a book's paragraphs and packages them as a `.docx` file.
#[derive(Debug, Default)]
pub struct DocxBookWriter {
    paragraphs: Vec<Paragraph>,
    cover_png: Option<Vec<u8>>,
}

impl DocxBookWriter {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paragraphs collected so far.
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }
}

impl BookWriter for DocxBookWriter {
    type Output = Vec<u8>;

    fn cover(&mut self, cover: &CoverImage) -> Result<()> {
        let png = cover.to_png()?;
        let (width, height) = cover.fit_within(6.0 * EMU_PER_INCH, 8.0 * EMU_PER_INCH);
        let mut paragraph = Paragraph::new(ParagraphKind::Cover).aligned(Alignment::Center);
        paragraph.drawing = Some(Drawing {
            rel_id: COVER_REL_ID,
            width_emu: width as u64,
            height_emu: height as u64,
        });
        self.paragraphs.push(paragraph);
        self.cover_png = Some(png);
        Ok(())
    }

    fn title_page(&mut self, book: &Book) -> Result<()> {
        let title = TextRun {
            bold: true,
            ..TextRun::plain(book.title.trim(), 56)
        };
        self.paragraphs.push(
            Paragraph::new(ParagraphKind::Title)
                .styled("Title")
                .with_runs(vec![title])
                .aligned(Alignment::Center)
                .spaced(2880, 240),
        );

        if let Some(subtitle) = book.subtitle() {
            let run = TextRun {
                italic: true,
                ..TextRun::plain(subtitle, 32)
            };
            self.paragraphs.push(
                Paragraph::new(ParagraphKind::Subtitle)
                    .styled("Subtitle")
                    .with_runs(vec![run])
                    .aligned(Alignment::Center)
                    .spaced(0, 240),
            );
        }

        let author = TextRun::plain(format!("by {}", book.author_display()), 28);
        self.paragraphs.push(
            Paragraph::new(ParagraphKind::Author)
                .with_runs(vec![author])
                .aligned(Alignment::Center)
                .spaced(480, 240),
        );

        let mut rule = Paragraph::new(ParagraphKind::Rule)
            .aligned(Alignment::Center)
            .spaced(0, 240);
        rule.rule = true;
        rule.indent = Some(Indent {
            left: 3600,
            right: 3600,
            hanging: 0,
        });
        self.paragraphs.push(rule);
        Ok(())
    }

    fn page_break(&mut self) {
        self.paragraphs.push(Paragraph::page_break());
    }

    fn chapter(&mut self, chapter: &Chapter) -> Result<()> {
        self.paragraphs
            .extend(paragraph_for_block(&chapter_heading(chapter)));
        self.paragraphs.extend(render_markdown(&chapter.content)?);
        Ok(())
    }

    fn finish(self, book: &Book) -> Result<Vec<u8>> {
        tracing::debug!(paragraphs = self.paragraphs.len(), "Packaging DOCX");
        write_package(book, &self.paragraphs, self.cover_png.as_deref())
    }
}

/// Write the OOXML package parts into a zip archive.
pub fn write_package(
    book: &Book,
    paragraphs: &[Paragraph],
    cover_png: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(PACKAGE_RELS_XML.as_bytes())?;

    zip.start_file("docProps/core.xml", options)?;
    zip.write_all(&core_properties_xml(book))?;

    zip.start_file("docProps/app.xml", options)?;
    zip.write_all(APP_XML.as_bytes())?;

    zip.start_file("word/document.xml", options)?;
    zip.write_all(&document_xml(paragraphs))?;

    zip.start_file("word/styles.xml", options)?;
    zip.write_all(STYLES_XML.as_bytes())?;

    zip.start_file("word/_rels/document.xml.rels", options)?;
    zip.write_all(document_rels_xml(cover_png.is_some()).as_bytes())?;

    if let Some(png) = cover_png {
        zip.start_file("word/media/cover.png", options)?;
        zip.write_all(png)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Serialize `word/document.xml`.
pub fn document_xml(paragraphs: &[Paragraph]) -> Vec<u8> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))));

    start(
        &mut writer,
        "w:document",
        &[
            ("xmlns:w", NS_W),
            ("xmlns:r", NS_R),
            ("xmlns:wp", NS_WP),
            ("xmlns:a", NS_A),
            ("xmlns:pic", NS_PIC),
        ],
    );
    start(&mut writer, "w:body", &[]);

    for (index, paragraph) in paragraphs.iter().enumerate() {
        write_paragraph(&mut writer, paragraph, index as u32 + 1);
    }

    // US Letter with one-inch margins
    start(&mut writer, "w:sectPr", &[]);
    empty(&mut writer, "w:pgSz", &[("w:w", "12240"), ("w:h", "15840")]);
    empty(
        &mut writer,
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
            ("w:header", "720"),
            ("w:footer", "720"),
            ("w:gutter", "0"),
        ],
    );
    end(&mut writer, "w:sectPr");

    end(&mut writer, "w:body");
    end(&mut writer, "w:document");

    writer.into_inner().into_inner()
}

fn write_paragraph<W: Write>(writer: &mut Writer<W>, paragraph: &Paragraph, drawing_id: u32) {
    start(writer, "w:p", &[]);

    if paragraph.kind == ParagraphKind::PageBreak {
        start(writer, "w:r", &[]);
        empty(writer, "w:br", &[("w:type", "page")]);
        end(writer, "w:r");
        end(writer, "w:p");
        return;
    }

    // Child order follows CT_PPr
    start(writer, "w:pPr", &[]);
    if let Some(style) = paragraph.style {
        empty(writer, "w:pStyle", &[("w:val", style)]);
    }
    if paragraph.border_left || paragraph.rule {
        start(writer, "w:pBdr", &[]);
        if paragraph.border_left {
            empty(
                writer,
                "w:left",
                &[("w:val", "single"), ("w:sz", "18"), ("w:space", "8"), ("w:color", "A0A0A0")],
            );
        }
        if paragraph.rule {
            empty(
                writer,
                "w:bottom",
                &[("w:val", "single"), ("w:sz", "6"), ("w:space", "1"), ("w:color", "808080")],
            );
        }
        end(writer, "w:pBdr");
    }
    if let Some(fill) = paragraph.shading {
        empty(
            writer,
            "w:shd",
            &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", fill)],
        );
    }
    let before = paragraph.spacing.before.to_string();
    let after = paragraph.spacing.after.to_string();
    empty(
        writer,
        "w:spacing",
        &[("w:before", before.as_str()), ("w:after", after.as_str())],
    );
    if let Some(indent) = paragraph.indent {
        let left = indent.left.to_string();
        let right = indent.right.to_string();
        let hanging = indent.hanging.to_string();
        let mut attrs = vec![("w:left", left.as_str()), ("w:right", right.as_str())];
        if indent.hanging > 0 {
            attrs.push(("w:hanging", hanging.as_str()));
        }
        empty(writer, "w:ind", &attrs);
    }
    empty(writer, "w:jc", &[("w:val", paragraph.alignment.as_str())]);
    end(writer, "w:pPr");

    if let Some(drawing) = &paragraph.drawing {
        write_drawing(writer, drawing, drawing_id);
    }

    for run in &paragraph.runs {
        write_run(writer, run);
    }

    end(writer, "w:p");
}

fn write_run<W: Write>(writer: &mut Writer<W>, run: &TextRun) {
    start(writer, "w:r", &[]);

    start(writer, "w:rPr", &[]);
    if let Some(font) = run.font {
        empty(
            writer,
            "w:rFonts",
            &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font)],
        );
    }
    if run.bold {
        empty(writer, "w:b", &[]);
    }
    if run.italic {
        empty(writer, "w:i", &[]);
    }
    let size = run.size.to_string();
    empty(writer, "w:sz", &[("w:val", size.as_str())]);
    empty(writer, "w:szCs", &[("w:val", size.as_str())]);
    end(writer, "w:rPr");

    let text = xml_chars(&run.text);
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            empty(writer, "w:br", &[]);
        }
        for (column, segment) in line.split('\t').enumerate() {
            if column > 0 {
                empty(writer, "w:tab", &[]);
            }
            if segment.is_empty() {
                continue;
            }
            let mut elem = BytesStart::new("w:t");
            elem.push_attribute(("xml:space", "preserve"));
            let _ = writer.write_event(Event::Start(elem));
            let _ = writer.write_event(Event::Text(BytesText::new(segment)));
            let _ = writer.write_event(Event::End(BytesEnd::new("w:t")));
        }
    }

    end(writer, "w:r");
}

fn write_drawing<W: Write>(writer: &mut Writer<W>, drawing: &Drawing, id: u32) {
    let cx = drawing.width_emu.to_string();
    let cy = drawing.height_emu.to_string();
    let id = id.to_string();

    start(writer, "w:r", &[]);
    start(writer, "w:drawing", &[]);
    start(
        writer,
        "wp:inline",
        &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
    );
    empty(writer, "wp:extent", &[("cx", cx.as_str()), ("cy", cy.as_str())]);
    empty(
        writer,
        "wp:docPr",
        &[("id", id.as_str()), ("name", "Cover Image"), ("descr", "Book cover")],
    );
    start(writer, "wp:cNvGraphicFramePr", &[]);
    empty(writer, "a:graphicFrameLocks", &[("noChangeAspect", "1")]);
    end(writer, "wp:cNvGraphicFramePr");

    start(writer, "a:graphic", &[]);
    start(writer, "a:graphicData", &[("uri", NS_PIC)]);
    start(writer, "pic:pic", &[]);

    start(writer, "pic:nvPicPr", &[]);
    empty(writer, "pic:cNvPr", &[("id", "0"), ("name", "cover.png")]);
    empty(writer, "pic:cNvPicPr", &[]);
    end(writer, "pic:nvPicPr");

    start(writer, "pic:blipFill", &[]);
    empty(writer, "a:blip", &[("r:embed", drawing.rel_id)]);
    start(writer, "a:stretch", &[]);
    empty(writer, "a:fillRect", &[]);
    end(writer, "a:stretch");
    end(writer, "pic:blipFill");

    start(writer, "pic:spPr", &[]);
    start(writer, "a:xfrm", &[]);
    empty(writer, "a:off", &[("x", "0"), ("y", "0")]);
    empty(writer, "a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())]);
    end(writer, "a:xfrm");
    start(writer, "a:prstGeom", &[("prst", "rect")]);
    empty(writer, "a:avLst", &[]);
    end(writer, "a:prstGeom");
    end(writer, "pic:spPr");

    end(writer, "pic:pic");
    end(writer, "a:graphicData");
    end(writer, "a:graphic");
    end(writer, "wp:inline");
    end(writer, "w:drawing");
    end(writer, "w:r");
}

/// Serialize `docProps/core.xml`.
fn core_properties_xml(book: &Book) -> Vec<u8> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))));

    start(
        &mut writer,
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    );
    write_text_element(&mut writer, "dc:title", book.title.trim());
    if let Some(subtitle) = book.subtitle() {
        write_text_element(&mut writer, "dc:subject", subtitle);
    }
    write_text_element(&mut writer, "dc:creator", book.author_display());

    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    for name in ["dcterms:created", "dcterms:modified"] {
        start(&mut writer, name, &[("xsi:type", "dcterms:W3CDTF")]);
        let _ = writer.write_event(Event::Text(BytesText::new(&now)));
        end(&mut writer, name);
    }
    end(&mut writer, "cp:coreProperties");

    writer.into_inner().into_inner()
}

fn document_rels_xml(with_cover: bool) -> String {
    let cover = if with_cover {
        format!(
            r#"<Relationship Id="{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/cover.png"/>"#,
            COVER_REL_ID
        )
    } else {
        String::new()
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>{}</Relationships>"#,
        cover
    )
}

/// Drop characters outside the XML 1.0 `Char` production.
///
/// Tab, line feed and carriage return are kept; other C0 controls and the
/// noncharacters U+FFFE and U+FFFF are removed.
pub fn xml_chars(text: &str) -> Cow<'_, str> {
    let allowed = |c: char| {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
    };
    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| allowed(c)).collect())
    }
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) {
    let mut elem = BytesStart::new(name);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    let _ = writer.write_event(Event::Start(elem));
}

fn empty<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) {
    let mut elem = BytesStart::new(name);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    let _ = writer.write_event(Event::Empty(elem));
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) {
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new(name)));
    let _ = writer.write_event(Event::Text(BytesText::new(&xml_chars(text))));
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/></Relationships>"#;

const APP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>quill-export</Application></Properties>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Times New Roman" w:hAnsi="Times New Roman" w:cs="Times New Roman"/><w:sz w:val="24"/><w:szCs w:val="24"/><w:lang w:val="en-US"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="200" w:line="276" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>
<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="center"/></w:pPr><w:rPr><w:b/><w:sz w:val="56"/><w:szCs w:val="56"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Subtitle"><w:name w:val="Subtitle"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:jc w:val="center"/></w:pPr><w:rPr><w:i/><w:sz w:val="32"/><w:szCs w:val="32"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="480" w:after="240"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/><w:szCs w:val="32"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="360" w:after="200"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:sz w:val="28"/><w:szCs w:val="28"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="160"/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:sz w:val="24"/><w:szCs w:val="24"/></w:rPr></w:style>
</w:styles>"#;
