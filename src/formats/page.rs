//! Page writer: an explicit drawing surface over a sequence of PDF pages.
//!
//! The writer keeps a vertical cursor, a current font and fill colour, and
//! the operations drawn so far on each page. Text is measured with the
//! standard font metrics, wrapped to the content width and broken onto a
//! new page when it reaches the bottom margin. [`PageWriter::finish`]
//! turns the pages into a PDF with `lopdf`.

use super::fonts::{FontFace, encode_win_ansi};
use crate::config::PdfConfig;
use crate::error::{AppError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat, dictionary};
use std::io::Write;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.2;

/// Baseline position below the top of a line, as a multiple of the font size.
const ASCENT: f32 = 0.8;

/// Horizontal gap between a quote bar and its text.
const BAR_GAP: f32 = 10.0;

/// Width of a quote bar.
const BAR_WIDTH: f32 = 3.0;

const PRODUCER: &str = concat!("quill-export ", env!("CARGO_PKG_VERSION"));

/// RGB fill or stroke colour, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

impl Color {
    /// Black.
    pub const BLACK: Color = Color::gray(0.0);

    /// Neutral grey of the given lightness.
    pub const fn gray(level: f32) -> Self {
        Self {
            r: level,
            g: level,
            b: level,
        }
    }

    fn operands(&self) -> Vec<Object> {
        vec![self.r.into(), self.g.into(), self.b.into()]
    }
}

/// Horizontal alignment of wrapped text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    /// Ragged right.
    #[default]
    Left,
    /// Centered on the content width.
    Center,
    /// Both edges flush, except the last line.
    Justify,
}

/// Paper size and margin, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    /// Page width.
    pub width: f32,
    /// Page height.
    pub height: f32,
    /// Margin on all four sides.
    pub margin: f32,
}

impl PageSetup {
    /// Page setup from configuration.
    pub fn from_config(config: &PdfConfig) -> Self {
        let (width, height) = config.page_size.dimensions();
        // A margin that leaves no content area falls back to one inch
        let margin = if config.margin >= 0.0 && config.margin * 2.0 < width.min(height) {
            config.margin
        } else {
            72.0
        };
        Self {
            width,
            height,
            margin,
        }
    }

    /// Width between the left and right margins.
    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// Height between the top and bottom margins.
    pub fn content_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::from_config(&PdfConfig::default())
    }
}

/// Text sharing one font, size and colour.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// Text to draw.
    pub text: String,
    /// Font face.
    pub face: FontFace,
    /// Font size in points.
    pub size: f32,
    /// Fill colour.
    pub color: Color,
}

/// How [`PageWriter::text`] lays out a paragraph.
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    /// Alignment of each line.
    pub align: Align,
    /// Left indent from the margin.
    pub indent: f32,
    /// Non-wrapping leading literal; following lines hang under the text.
    pub marker: Option<Span>,
    /// Draw a vertical bar of this colour left of every line.
    pub bar: Option<Color>,
}

/// Metadata written to the PDF Info dictionary.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    /// Document title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Subject line.
    pub subject: Option<String>,
}

#[derive(Debug)]
struct ImageResource {
    name: String,
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

/// A word or a collapsed space taken from one span.
#[derive(Debug, Clone)]
struct Piece {
    text: String,
    span: usize,
    width: f32,
    space: bool,
}

/// Drawing surface spanning every page of the document.
#[derive(Debug)]
pub struct PageWriter {
    setup: PageSetup,
    finished: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f32,
    face: FontFace,
    size: f32,
    color: Color,
    images: Vec<ImageResource>,
}

impl PageWriter {
    /// Start a document with one empty page.
    pub fn new(setup: PageSetup) -> Self {
        Self {
            setup,
            finished: Vec::new(),
            current: Vec::new(),
            y: setup.margin,
            face: FontFace::Regular,
            size: 12.0,
            color: Color::BLACK,
            images: Vec::new(),
        }
    }

    /// Page geometry.
    pub fn setup(&self) -> &PageSetup {
        &self.setup
    }

    /// Number of pages, including the one being drawn.
    pub fn page_count(&self) -> usize {
        self.finished.len() + 1
    }

    /// Cursor position measured down from the top edge of the page.
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Set the current font.
    pub fn font(&mut self, face: FontFace, size: f32) -> &mut Self {
        self.face = face;
        self.size = size;
        self
    }

    /// Set the current fill colour.
    pub fn fill(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Current font face.
    pub fn current_face(&self) -> FontFace {
        self.face
    }

    /// Current font size.
    pub fn current_size(&self) -> f32 {
        self.size
    }

    /// A span of `text` in the current font and colour.
    pub fn span(&self, text: impl Into<String>) -> Span {
        Span {
            text: text.into(),
            face: self.face,
            size: self.size,
            color: self.color,
        }
    }

    /// Height of one line at the current font size.
    pub fn line_height(&self) -> f32 {
        self.size * LINE_HEIGHT
    }

    /// Advance the cursor by a number of lines at the current font size.
    pub fn move_down(&mut self, lines: f32) {
        self.advance(lines * self.line_height());
    }

    /// Advance the cursor by a distance in points.
    pub fn advance(&mut self, points: f32) {
        self.y += points.max(0.0);
    }

    /// Finish the current page and continue at the top of a new one.
    pub fn add_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.finished.push(page);
        self.y = self.setup.margin;
    }

    fn bottom(&self) -> f32 {
        self.setup.height - self.setup.margin
    }

    /// Break to a new page unless `height` still fits above the bottom margin.
    fn ensure_space(&mut self, height: f32) {
        if self.y + height > self.bottom() && self.y > self.setup.margin {
            self.add_page();
        }
    }

    /// Convert a distance from the top edge to PDF user space.
    fn pdf_y(&self, y: f32) -> f32 {
        self.setup.height - y
    }

    /// Lay out and draw a paragraph of spans.
    ///
    /// Whitespace collapses to single spaces, lines wrap at word boundaries
    /// (words longer than a line wrap by character), and the cursor ends
    /// below the last line.
    pub fn text(&mut self, spans: &[Span], options: &TextOptions) {
        let marker_width = options
            .marker
            .as_ref()
            .map(|m| m.face.text_width(&m.text, m.size))
            .unwrap_or(0.0);
        let left = self.setup.margin + options.indent;
        let available = (self.setup.content_width() - options.indent - marker_width).max(1.0);

        let pieces = split_pieces(spans);
        let mut lines = break_lines(&pieces, spans, available);
        if lines.is_empty() {
            if options.marker.is_none() {
                return;
            }
            lines.push(Vec::new());
        }

        let count = lines.len();
        for (index, line) in lines.iter().enumerate() {
            let line_size = line
                .iter()
                .map(|p| spans[p.span].size)
                .chain(options.marker.iter().map(|m| m.size))
                .fold(0.0_f32, f32::max);
            let line_size = if line_size > 0.0 { line_size } else { self.size };
            let line_height = line_size * LINE_HEIGHT;
            self.ensure_space(line_height);
            let baseline = self.y + line_size * ASCENT;

            let natural: f32 = line.iter().map(|p| p.width).sum();
            let spaces = line.iter().filter(|p| p.space).count();
            let last = index + 1 == count;
            let (offset, word_spacing) = match options.align {
                Align::Left => (0.0, 0.0),
                Align::Center => (((available - natural) / 2.0).max(0.0), 0.0),
                Align::Justify if !last && spaces > 0 => {
                    (0.0, ((available - natural) / spaces as f32).max(0.0))
                }
                Align::Justify => (0.0, 0.0),
            };

            if let Some(color) = options.bar {
                let top = self.y;
                self.bar(left - BAR_GAP, top, line_height, color);
            }

            if index == 0
                && let Some(marker) = &options.marker
            {
                self.draw_run(left, baseline, marker, &marker.text, 0.0);
            }

            let mut x = left + marker_width + offset;
            for (span_index, text, width, space_count) in segments(line) {
                let span = &spans[span_index];
                self.draw_run(x, baseline, span, &text, word_spacing);
                x += width + space_count as f32 * word_spacing;
            }

            self.y += line_height;
        }
    }

    /// Draw text verbatim: line breaks are kept and long lines wrap by
    /// character. Uses the current font, which should be monospaced.
    pub fn preformatted(&mut self, text: &str, indent: f32) {
        let span = self.span(String::new());
        let left = self.setup.margin + indent;
        let available = (self.setup.content_width() - indent).max(1.0);
        let line_height = self.line_height();
        let body = text.strip_suffix('\n').unwrap_or(text);

        for source_line in body.split('\n') {
            let expanded = source_line.replace('\t', "    ");
            for row in wrap_chars(&expanded, span.face, span.size, available) {
                self.ensure_space(line_height);
                let baseline = self.y + span.size * ASCENT;
                if !row.is_empty() {
                    self.draw_run(left, baseline, &span, &row, 0.0);
                }
                self.y += line_height;
            }
        }
    }

    /// Draw a horizontal rule at the cursor between two x positions.
    pub fn rule(&mut self, from_x: f32, to_x: f32, thickness: f32, color: Color) {
        self.ensure_space(thickness);
        let y = self.pdf_y(self.y + thickness / 2.0);
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new("w", vec![thickness.into()]),
            Operation::new("RG", color.operands()),
            Operation::new("m", vec![from_x.into(), y.into()]),
            Operation::new("l", vec![to_x.into(), y.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.y += thickness;
    }

    /// Draw a filled vertical bar from `top` down by `height`.
    fn bar(&mut self, x: f32, top: f32, height: f32, color: Color) {
        let bottom = self.pdf_y(top + height);
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new("rg", color.operands()),
            Operation::new(
                "re",
                vec![x.into(), bottom.into(), BAR_WIDTH.into(), height.into()],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Place a JPEG image centered horizontally at the cursor.
    pub fn image(&mut self, jpeg: Vec<u8>, pixels: (u32, u32), size: (f32, f32)) {
        let (width, height) = size;
        self.ensure_space(height);
        let name = format!("Im{}", self.images.len() + 1);
        let x = self.setup.margin + (self.setup.content_width() - width).max(0.0) / 2.0;
        let y = self.pdf_y(self.y + height);
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.0_f32.into(),
                    0.0_f32.into(),
                    height.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        self.images.push(ImageResource {
            name,
            jpeg,
            width: pixels.0,
            height: pixels.1,
        });
        self.y += height;
    }

    fn draw_run(&mut self, x: f32, baseline: f32, span: &Span, text: &str, word_spacing: f32) {
        let y = self.pdf_y(baseline);
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(span.face.resource_name().as_bytes().to_vec()),
                    span.size.into(),
                ],
            ),
            Operation::new("rg", span.color.operands()),
            Operation::new("Tw", vec![word_spacing.into()]),
            Operation::new(
                "Tm",
                vec![
                    1.0_f32.into(),
                    0.0_f32.into(),
                    0.0_f32.into(),
                    1.0_f32.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Assemble the pages into a PDF file.
    pub fn finish(self, info: &DocumentInfo, compress: bool) -> Result<Vec<u8>> {
        let mut doc = self.into_document(info, compress)?;
        let mut pdf_bytes = Vec::new();
        write_pdf(&mut doc, &mut pdf_bytes)?;
        Ok(pdf_bytes)
    }

    /// Build the `lopdf` document without serializing it.
    pub fn into_document(mut self, info: &DocumentInfo, compress: bool) -> Result<Document> {
        let current = std::mem::take(&mut self.current);
        self.finished.push(current);

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = Dictionary::new();
        for face in FontFace::ALL {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(face.resource_name(), Object::Reference(font_id));
        }

        let mut xobjects = Dictionary::new();
        for image in self.images {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                image.jpeg,
            )
            .with_compression(false);
            let image_id = doc.add_object(stream);
            xobjects.set(image.name.as_str(), Object::Reference(image_id));
        }

        let resources_id = doc.add_object(dictionary! {
            "Font" => fonts,
            "XObject" => xobjects,
        });

        let media_box: Vec<Object> = vec![
            0.0_f32.into(),
            0.0_f32.into(),
            self.setup.width.into(),
            self.setup.height.into(),
        ];

        let mut kids = Vec::with_capacity(self.finished.len());
        for operations in self.finished {
            let content = Content { operations }
                .encode()
                .map_err(|e| AppError::pdf("document", format!("Failed to encode page: {}", e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => media_box.clone(),
                "Contents" => Object::Reference(content_id),
                "Resources" => Object::Reference(resources_id),
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut info_dict = dictionary! {
            "Title" => text_string(&info.title),
            "Author" => text_string(&info.author),
            "Creator" => Object::string_literal("quill-export"),
            "Producer" => Object::string_literal(PRODUCER),
            "CreationDate" => Object::string_literal(
                chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string(),
            ),
        };
        if let Some(subject) = &info.subject {
            info_dict.set("Subject", text_string(subject));
        }
        let info_id = doc.add_object(info_dict);
        doc.trailer.set("Info", Object::Reference(info_id));

        if compress {
            doc.compress();
        }

        Ok(doc)
    }
}

/// Serialize a finished document to `target`.
pub fn write_pdf<W: Write>(doc: &mut Document, target: &mut W) -> Result<()> {
    doc.save_to(target)
        .map_err(|e| AppError::pdf("document", format!("Failed to save PDF: {}", e)))?;
    Ok(())
}

/// PDF text string: literal for ASCII, UTF-16BE with a byte order mark otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Split spans into words and single collapsed spaces.
fn split_pieces(spans: &[Span]) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = Vec::new();

    for (index, span) in spans.iter().enumerate() {
        let mut word = String::new();
        for c in span.text.chars() {
            if c.is_whitespace() {
                if !word.is_empty() {
                    let text = std::mem::take(&mut word);
                    pieces.push(Piece {
                        width: span.face.text_width(&text, span.size),
                        text,
                        span: index,
                        space: false,
                    });
                }
                if !pieces.last().is_some_and(|p| p.space) {
                    pieces.push(Piece {
                        text: " ".to_string(),
                        span: index,
                        width: span.face.text_width(" ", span.size),
                        space: true,
                    });
                }
            } else {
                word.push(c);
            }
        }
        if !word.is_empty() {
            pieces.push(Piece {
                width: span.face.text_width(&word, span.size),
                text: word,
                span: index,
                space: false,
            });
        }
    }

    pieces
}

/// Greedy line breaking. Adjacent non-space pieces from different spans
/// stay together as one word.
fn break_lines(pieces: &[Piece], spans: &[Span], available: f32) -> Vec<Vec<Piece>> {
    let mut lines = Vec::new();
    let mut line: Vec<Piece> = Vec::new();
    let mut width = 0.0_f32;
    let mut i = 0;

    while i < pieces.len() {
        if pieces[i].space {
            // Spaces never start a line
            if !line.is_empty() {
                width += pieces[i].width;
                line.push(pieces[i].clone());
            }
            i += 1;
            continue;
        }

        let end = (i..pieces.len())
            .find(|&j| pieces[j].space)
            .unwrap_or(pieces.len());
        let word = &pieces[i..end];
        let word_width: f32 = word.iter().map(|p| p.width).sum();

        if width + word_width > available && line.iter().any(|p| !p.space) {
            trim_trailing_spaces(&mut line);
            lines.push(std::mem::take(&mut line));
            width = 0.0;
        }

        if word_width > available {
            for piece in word {
                let span = &spans[piece.span];
                for c in piece.text.chars() {
                    let char_width = span.face.text_width(c.encode_utf8(&mut [0; 4]), span.size);
                    if width + char_width > available && !line.is_empty() {
                        lines.push(std::mem::take(&mut line));
                        width = 0.0;
                    }
                    match line.last_mut() {
                        Some(last) if !last.space && last.span == piece.span => {
                            last.text.push(c);
                            last.width += char_width;
                        }
                        _ => line.push(Piece {
                            text: c.to_string(),
                            span: piece.span,
                            width: char_width,
                            space: false,
                        }),
                    }
                    width += char_width;
                }
            }
        } else {
            line.extend_from_slice(word);
            width += word_width;
        }

        i = end;
    }

    trim_trailing_spaces(&mut line);
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn trim_trailing_spaces(line: &mut Vec<Piece>) {
    while line.last().is_some_and(|p| p.space) {
        line.pop();
    }
}

/// Merge consecutive pieces of one span: `(span, text, width, spaces)`.
fn segments(line: &[Piece]) -> Vec<(usize, String, f32, usize)> {
    let mut out: Vec<(usize, String, f32, usize)> = Vec::new();
    for piece in line {
        let spaces = usize::from(piece.space);
        match out.last_mut() {
            Some(last) if last.0 == piece.span => {
                last.1.push_str(&piece.text);
                last.2 += piece.width;
                last.3 += spaces;
            }
            _ => out.push((piece.span, piece.text.clone(), piece.width, spaces)),
        }
    }
    out
}

/// Split one line of text into rows no wider than `available`.
fn wrap_chars(text: &str, face: FontFace, size: f32, available: f32) -> Vec<String> {
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut width = 0.0_f32;

    for c in text.chars() {
        let char_width = face.text_width(c.encode_utf8(&mut [0; 4]), size);
        if width + char_width > available && !row.is_empty() {
            rows.push(std::mem::take(&mut row));
            width = 0.0;
        }
        row.push(c);
        width += char_width;
    }

    rows.push(row);
    rows
}
