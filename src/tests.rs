use crate::config::{Config, ExportFormat, PageSize, PdfConfig};
use crate::error::{AppError, Result};
use crate::export::{
    CoverFetcher, HttpCoverFetcher, decode_data_url, export_book, load_cover, stream_pdf,
};
use crate::formats::docx::{self, Alignment, ParagraphKind};
use crate::formats::fonts::{FontFace, encode_win_ansi};
use crate::formats::page::{DocumentInfo, PageSetup, PageWriter};
use crate::formats::{self, CoverImage, pdf};
use crate::library::{Book, Chapter};
use crate::markdown::{
    Block, ListMarker, Run, ShapeError, Token, TokenCursor, TokenKind, build_blocks, build_runs,
    parse_blocks, runs_text, tokenize,
};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use base64::Engine;
use std::io::{Cursor, Read};
use tokio::io::AsyncReadExt;

struct StubFetcher(Option<Vec<u8>>);

impl CoverFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.0
            .clone()
            .ok_or_else(|| AppError::cover("connection refused"))
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([180, 40, 40]));
    let mut data = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .unwrap();
    data
}

fn sample_book() -> Book {
    Book {
        title: "The Long Road".to_string(),
        subtitle: Some("A Novel".to_string()),
        author: "Ada Writer".to_string(),
        cover_image_url: None,
        chapters: vec![
            Chapter {
                title: "Chapter One".to_string(),
                description: None,
                content: "It began **quietly**.\n\n- first\n- second\n".to_string(),
            },
            Chapter {
                title: "Chapter Two".to_string(),
                description: Some("The end".to_string()),
                content: "## Aftermath\n\n> Nothing stays.\n\n---\n".to_string(),
            },
        ],
    }
}

fn uncompressed() -> PdfConfig {
    PdfConfig {
        compress: false,
        ..PdfConfig::default()
    }
}

fn docx_part(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

fn docx_part_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn count_page_breaks(document_xml: &str) -> usize {
    let doc = roxmltree::Document::parse(document_xml).unwrap();
    doc.descendants()
        .filter(|n| n.has_tag_name((NS_W, "br")) && n.attribute((NS_W, "type")) == Some("page"))
        .count()
}

fn docx_text(document_xml: &str) -> String {
    let doc = roxmltree::Document::parse(document_xml).unwrap();
    doc.descendants()
        .filter(|n| n.has_tag_name((NS_W, "t")))
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join("|")
}

/// Operations of every page, in page order.
fn pdf_operations(bytes: &[u8]) -> Vec<Vec<lopdf::content::Operation>> {
    let doc = lopdf::Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let data = doc.get_page_content(page_id).unwrap();
            lopdf::content::Content::decode(&data).unwrap().operations
        })
        .collect()
}

/// Text shown on each page, one entry per `Tj`, joined with spaces.
fn pdf_page_text(bytes: &[u8]) -> Vec<String> {
    pdf_operations(bytes)
        .iter()
        .map(|ops| {
            ops.iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| match op.operands.first() {
                    Some(lopdf::Object::String(text, _)) => {
                        Some(text.iter().map(|&b| b as char).collect::<String>())
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn count_operator(ops: &[lopdf::content::Operation], operator: &str) -> usize {
    ops.iter().filter(|op| op.operator == operator).count()
}

// ============================================================================
// INLINE RUNS AND BLOCKS
// ============================================================================

#[test]
fn heading_then_styled_paragraph() {
    let paragraphs = docx::render_markdown("# Title\n\nSome **bold** and _italic_ text.").unwrap();
    assert_eq!(paragraphs.len(), 2);

    let heading = &paragraphs[0];
    assert_eq!(heading.kind, ParagraphKind::Heading);
    assert_eq!(heading.style, Some("Heading1"));
    assert_eq!(heading.text(), "Title");
    assert_eq!(heading.runs[0].size, 32);

    let body = &paragraphs[1];
    assert_eq!(body.kind, ParagraphKind::Body);
    assert_eq!(body.alignment, Alignment::Both);
    let runs: Vec<(&str, bool, bool)> = body
        .runs
        .iter()
        .map(|r| (r.text.as_str(), r.bold, r.italic))
        .collect();
    assert_eq!(
        runs,
        vec![
            ("Some ", false, false),
            ("bold", true, false),
            (" and ", false, false),
            ("italic", false, true),
            (" text.", false, false),
        ]
    );
}

#[test]
fn fenced_code_is_verbatim() {
    let markdown = "```js\nfunction f() {}\n```\n";
    let blocks = parse_blocks(markdown).unwrap();
    assert_eq!(
        blocks,
        vec![Block::Code {
            text: "function f() {}\n".to_string(),
            language: Some("js".to_string()),
        }]
    );

    let paragraphs = docx::render_markdown(markdown).unwrap();
    assert_eq!(paragraphs.len(), 1);
    assert_eq!(paragraphs[0].kind, ParagraphKind::Code);
    assert_eq!(paragraphs[0].runs.len(), 1);
    assert_eq!(paragraphs[0].runs[0].text, "function f() {}");
    assert_eq!(paragraphs[0].runs[0].font, Some(docx::CODE_FONT));
    assert_eq!(paragraphs[0].shading, Some(docx::CODE_SHADING));
}

#[test]
fn code_content_is_not_reprocessed() {
    let blocks = parse_blocks("```\n**not bold** _nor italic_\n```\n").unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].plain_text(), "**not bold** _nor italic_\n");
}

#[test]
fn ordered_list_prefixes_and_spacer() {
    let paragraphs = docx::render_markdown("1. First\n2. Second\n").unwrap();
    let kinds: Vec<ParagraphKind> = paragraphs.iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ParagraphKind::ListItem,
            ParagraphKind::ListItem,
            ParagraphKind::Spacer
        ]
    );
    assert_eq!(paragraphs[0].runs[0].text, "1. ");
    assert_eq!(paragraphs[0].text(), "1. First");
    assert_eq!(paragraphs[1].runs[0].text, "2. ");
    assert_eq!(paragraphs[1].text(), "2. Second");
    assert!(paragraphs[2].runs.is_empty());
}

#[test]
fn ordered_counter_resets_per_list() {
    let blocks = parse_blocks("1. a\n2. b\n\nbetween\n\n1. c\n").unwrap();
    let markers: Vec<ListMarker> = blocks
        .iter()
        .filter_map(|b| match b {
            Block::ListItem { marker, .. } => Some(*marker),
            _ => None,
        })
        .collect();
    assert_eq!(
        markers,
        vec![
            ListMarker::Ordered(1),
            ListMarker::Ordered(2),
            ListMarker::Ordered(1)
        ]
    );
}

#[test]
fn ordered_list_ignores_start_number() {
    let blocks = parse_blocks("5. five\n6. six\n").unwrap();
    assert!(blocks.contains(&Block::ListItem {
        marker: ListMarker::Ordered(1),
        runs: vec![Run::plain("five")],
        depth: 0,
    }));
}

#[test]
fn bullet_items_use_bullet_prefix() {
    let paragraphs = docx::render_markdown("- one\n- two\n- three\n").unwrap();
    let items: Vec<_> = paragraphs
        .iter()
        .filter(|p| p.kind == ParagraphKind::ListItem)
        .collect();
    assert_eq!(items.len(), 3);
    for item in items {
        assert_eq!(item.runs[0].text, "\u{2022} ");
        assert!(!item.text().chars().any(|c| c.is_ascii_digit()));
        let indent = item.indent.unwrap();
        assert_eq!(indent.left, 720);
        assert_eq!(indent.hanging, 360);
    }
}

#[test]
fn empty_content_renders_nothing() {
    for markdown in ["", "   \n\n  \t\n"] {
        assert!(parse_blocks(markdown).unwrap().is_empty());
        assert!(docx::render_markdown(markdown).unwrap().is_empty());
    }
}

#[test]
fn thematic_break_is_one_rule() {
    let blocks = parse_blocks("---\n").unwrap();
    assert_eq!(blocks, vec![Block::Rule]);

    let paragraphs = docx::render_markdown("---\n").unwrap();
    assert_eq!(paragraphs.len(), 1);
    assert_eq!(paragraphs[0].kind, ParagraphKind::Rule);
    assert!(paragraphs[0].rule);
    assert!(paragraphs[0].runs.is_empty());
}

#[test]
fn rendering_is_deterministic() {
    let markdown = "# A\n\nText with **bold**.\n\n1. x\n2. y\n\n> quote\n\n```\ncode\n```\n";
    let first = docx::render_markdown(markdown).unwrap();
    let second = docx::render_markdown(markdown).unwrap();
    assert_eq!(first, second);
}

#[test]
fn inline_runs_keep_all_text() {
    let tokens = tokenize("Alpha **beta** and _gamma_ **_delta_** end");
    let inline = tokens
        .iter()
        .find(|t| t.kind == TokenKind::Inline)
        .unwrap();

    let source: String = inline
        .children
        .iter()
        .filter(|t| t.kind == TokenKind::Text)
        .map(|t| t.content.as_str())
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let runs = build_runs(&inline.children);
    let rendered: String = runs_text(&runs)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    assert_eq!(rendered, source);
    assert!(runs.iter().any(|r| r.bold && r.italic && r.text == "delta"));
}

#[test]
fn whitespace_only_buffers_are_dropped() {
    let runs = build_runs(&tokenize("**a** *b*")[1].children);
    assert_eq!(
        runs,
        vec![
            Run {
                text: "a".to_string(),
                bold: true,
                ..Run::default()
            },
            Run {
                text: "b".to_string(),
                italic: true,
                ..Run::default()
            },
        ]
    );
}

#[test]
fn adjacent_runs_with_same_style_merge() {
    let children = vec![
        Token::text("one "),
        Token::new(TokenKind::StrongOpen),
        Token::new(TokenKind::StrongClose),
        Token::text("two"),
    ];
    assert_eq!(build_runs(&children), vec![Run::plain("one two")]);
}

#[test]
fn inline_code_becomes_monospace_run() {
    let paragraphs = docx::render_markdown("Use `cargo` now").unwrap();
    let runs = &paragraphs[0].runs;
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].text, "Use ");
    assert_eq!(runs[1].text, "cargo");
    assert_eq!(runs[1].font, Some(docx::CODE_FONT));
    assert_eq!(runs[2].text, " now");
    assert_eq!(runs[2].font, None);
}

#[test]
fn nested_lists_track_depth_and_counters() {
    let blocks = parse_blocks("1. x\n   1. y\n   2. z\n2. w\n").unwrap();
    let items: Vec<(ListMarker, String, usize)> = blocks
        .iter()
        .filter_map(|b| match b {
            Block::ListItem {
                marker,
                runs,
                depth,
            } => Some((*marker, runs_text(runs), *depth)),
            _ => None,
        })
        .collect();
    assert_eq!(
        items,
        vec![
            (ListMarker::Ordered(1), "x".to_string(), 0),
            (ListMarker::Ordered(1), "y".to_string(), 1),
            (ListMarker::Ordered(2), "z".to_string(), 1),
            (ListMarker::Ordered(2), "w".to_string(), 0),
        ]
    );
    assert_eq!(
        blocks.iter().filter(|b| **b == Block::ListEnd).count(),
        1,
        "only the outermost list emits a spacer"
    );
    assert_eq!(blocks.first(), Some(&Block::ListStart { ordered: true }));
}

#[test]
fn nested_bullets_indent_further() {
    let paragraphs = docx::render_markdown("- a\n  - b\n- c\n").unwrap();
    let indents: Vec<u32> = paragraphs
        .iter()
        .filter(|p| p.kind == ParagraphKind::ListItem)
        .map(|p| p.indent.unwrap().left)
        .collect();
    assert_eq!(indents, vec![720, 1440, 720]);
}

#[test]
fn loose_list_item_continuation_paragraph() {
    let blocks = parse_blocks("- first\n\n  second\n- third\n").unwrap();
    assert_eq!(
        blocks,
        vec![
            Block::ListStart { ordered: false },
            Block::ListItem {
                marker: ListMarker::Bullet,
                runs: vec![Run::plain("first")],
                depth: 0,
            },
            Block::Paragraph {
                runs: vec![Run::plain("second")],
                in_list: true,
            },
            Block::ListItem {
                marker: ListMarker::Bullet,
                runs: vec![Run::plain("third")],
                depth: 0,
            },
            Block::ListEnd,
        ]
    );

    let paragraphs = docx::render_markdown("- first\n\n  second\n- third\n").unwrap();
    assert_eq!(paragraphs[1].kind, ParagraphKind::Body);
    assert_eq!(paragraphs[1].spacing.after, 80);
}

#[test]
fn blockquote_becomes_italic_bordered_paragraph() {
    let paragraphs = docx::render_markdown("> quoted *text*\n\nafter").unwrap();
    assert_eq!(paragraphs.len(), 2);

    let quote = &paragraphs[0];
    assert_eq!(quote.kind, ParagraphKind::Quote);
    assert_eq!(quote.text(), "quoted text");
    assert!(quote.runs[0].italic);
    assert!(quote.border_left);
    assert_eq!(quote.indent.unwrap().left, 720);

    assert_eq!(paragraphs[1].kind, ParagraphKind::Body);
    assert_eq!(paragraphs[1].text(), "after");
}

#[test]
fn deep_headings_fall_back_to_level_one_style() {
    let paragraphs = docx::render_markdown("#### Deep\n\n## Two\n").unwrap();
    assert_eq!(paragraphs[0].style, Some("Heading1"));
    assert_eq!(paragraphs[0].runs[0].size, 24);
    assert_eq!(paragraphs[1].style, Some("Heading2"));
    assert_eq!(paragraphs[1].runs[0].size, 28);
}

#[test]
fn unreadable_heading_tag_has_no_level() {
    let tokens = vec![
        Token::new(TokenKind::HeadingOpen).with_tag("hx"),
        Token::inline(vec![Token::text("Odd")]),
        Token::new(TokenKind::HeadingClose).with_tag("hx"),
    ];
    let blocks = build_blocks(&tokens).unwrap();
    assert_eq!(
        blocks,
        vec![Block::Heading {
            level: None,
            text: "Odd".to_string(),
        }]
    );
    let paragraph = docx::paragraph_for_block(&blocks[0]).unwrap();
    assert_eq!(paragraph.style, Some("Heading1"));
    assert_eq!(paragraph.runs[0].size, 24);
}

#[test]
fn malformed_heading_shape_is_an_error() {
    let tokens = vec![
        Token::new(TokenKind::HeadingOpen).with_tag("h1"),
        Token::text("loose"),
    ];
    let err = build_blocks(&tokens).unwrap_err();
    assert_eq!(err.token, TokenKind::HeadingOpen);
    assert_eq!(err.source.expected, TokenKind::Inline);
    assert_eq!(err.source.found, Some(TokenKind::Text));
    assert!(err.to_string().contains("heading_open"));
}

#[test]
fn truncated_paragraph_is_an_error() {
    let tokens = vec![Token::new(TokenKind::ParagraphOpen).with_tag("p")];
    let err = build_blocks(&tokens).unwrap_err();
    assert_eq!(err.source.index, 1);
    assert_eq!(err.source.found, None);
    assert_eq!(
        err.to_string(),
        "malformed paragraph_open block: expected inline at token 1, found end of stream"
    );
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn shape_error_names_found_token() {
    let err = ShapeError {
        index: 4,
        expected: TokenKind::HeadingClose,
        found: Some(TokenKind::Text),
    };
    assert_eq!(err.to_string(), "expected heading_close at token 4, found text");
}

#[test]
fn unknown_tokens_are_skipped() {
    let tokens = vec![
        Token::new(TokenKind::HtmlBlock).with_content("<div>"),
        Token::new(TokenKind::ListItemClose),
        Token::new(TokenKind::Hr),
    ];
    assert_eq!(build_blocks(&tokens).unwrap(), vec![Block::Rule]);
}

#[test]
fn cursor_peek_expect_and_advance() {
    let tokens = tokenize("# Hi\n\ntext");
    let mut cursor = TokenCursor::new(&tokens);
    assert_eq!(cursor.current().unwrap().kind, TokenKind::HeadingOpen);
    assert_eq!(cursor.peek(1).unwrap().content, "Hi");
    assert!(cursor.expect(2, TokenKind::HeadingClose).is_ok());
    assert!(cursor.expect(1, TokenKind::Text).is_err());

    cursor.advance_past(2);
    assert_eq!(cursor.position(), 3);
    assert_eq!(cursor.current().unwrap().kind, TokenKind::ParagraphOpen);

    cursor.advance_past(100);
    assert!(cursor.is_done());
    assert!(cursor.current().is_none());
}

#[test]
fn cursor_find_before_stops_at_boundary() {
    let tokens = vec![
        Token::new(TokenKind::ListItemOpen),
        Token::new(TokenKind::ListItemClose),
        Token::inline(vec![Token::text("later")]),
    ];
    let cursor = TokenCursor::new(&tokens);
    assert_eq!(
        cursor.find_before(TokenKind::Inline, |k| k == TokenKind::ListItemClose),
        None
    );
    assert_eq!(cursor.find_before(TokenKind::Inline, |_| false), Some(2));
}

#[test]
fn tokenizer_synthesizes_tight_item_paragraphs() {
    let kinds: Vec<TokenKind> = tokenize("- a\n").iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::BulletListOpen,
            TokenKind::ListItemOpen,
            TokenKind::ParagraphOpen,
            TokenKind::Inline,
            TokenKind::ParagraphClose,
            TokenKind::ListItemClose,
            TokenKind::BulletListClose,
        ]
    );
}

// ============================================================================
// BOOK AND CONFIG
// ============================================================================

#[test]
fn filename_from_title() {
    let book = Book {
        title: "My Book: Part 2!".to_string(),
        ..Book::default()
    };
    assert_eq!(book.file_stem(), "my_book__part_2_");
    assert_eq!(book.filename(ExportFormat::Pdf), "my_book__part_2_.pdf");
    assert_eq!(book.filename(ExportFormat::Docx), "my_book__part_2_.docx");
}

#[test]
fn book_json_is_camel_case() {
    let json = r#"{
        "title": "T",
        "author": "A",
        "coverImageUrl": "https://example.com/c.png",
        "chapters": [{"title": "One", "content": "Hello"}]
    }"#;
    let book: Book = serde_json::from_str(json).unwrap();
    assert_eq!(book.cover_url(), Some("https://example.com/c.png"));
    assert_eq!(book.chapters[0].content, "Hello");
    assert!(book.subtitle().is_none());
}

#[test]
fn book_validation() {
    let book = Book {
        title: "  ".to_string(),
        ..Book::default()
    };
    match book.validate() {
        Err(AppError::InvalidInput { field, .. }) => assert_eq!(field, "title"),
        other => panic!("unexpected: {:?}", other),
    }

    let mut book = sample_book();
    book.chapters[1].title.clear();
    let err = book.validate().unwrap_err();
    assert_eq!(err.field(), Some("chapter"));
    assert!(err.to_string().contains("Chapter 2"));

    assert!(sample_book().validate().is_ok());
}

#[test]
fn author_falls_back_when_blank() {
    let book = Book {
        title: "T".to_string(),
        author: " ".to_string(),
        ..Book::default()
    };
    assert_eq!(book.author_display(), "Unknown Author");
}

#[test]
fn config_defaults() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.cover.timeout_seconds, 15);
    assert_eq!(config.cover.max_bytes, 10 * 1024 * 1024);
    assert_eq!(config.pdf.page_size, PageSize::Letter);
    assert_eq!(config.pdf.margin, 72.0);
    assert!(config.pdf.compress);
}

#[test]
fn config_partial_toml() {
    let config: Config = toml::from_str("[pdf]\npage_size = \"a4\"\n").unwrap();
    assert_eq!(config.pdf.page_size, PageSize::A4);
    assert_eq!(config.pdf.margin, 72.0);
    assert_eq!(config.cover.timeout_seconds, 15);
    assert_eq!(PageSize::A4.dimensions(), (595.28, 841.89));
}

#[test]
fn generated_config_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, Config::generate_default()).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.pdf.page_size, PageSize::Letter);
}

#[test]
fn broken_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pdf\nmargin = ").unwrap();
    assert!(matches!(Config::load(&path), Err(AppError::Config(_))));
}

#[test]
fn export_format_metadata() {
    assert_eq!(ExportFormat::Pdf.mime_type(), "application/pdf");
    assert_eq!(
        ExportFormat::Docx.mime_type(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert_eq!(ExportFormat::from_extension("DOCX"), Some(ExportFormat::Docx));
    assert_eq!(ExportFormat::from_extension("pdf"), Some(ExportFormat::Pdf));
    assert_eq!(ExportFormat::from_extension("odt"), None);
}

#[test]
fn error_status_codes() {
    let response = AppError::invalid("title", "missing").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = AppError::pdf("markdown", "bad").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = AppError::cover("unreachable").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// PDF DRAWING
// ============================================================================

#[test]
fn win_ansi_encoding() {
    assert_eq!(encode_win_ansi("Hi"), b"Hi".to_vec());
    assert_eq!(
        encode_win_ansi("\u{2022}\u{2013}\u{201C}\u{201D}\u{2026}"),
        vec![0x95, 0x96, 0x93, 0x94, 0x85]
    );
    assert_eq!(encode_win_ansi("caf\u{e9}"), vec![b'c', b'a', b'f', 0xE9]);
    assert_eq!(encode_win_ansi("\u{4E2D}"), vec![b'?']);
}

#[test]
fn helvetica_widths() {
    let width = FontFace::Regular.text_width("Hello", 10.0);
    assert!((width - 22.78).abs() < 0.001);
    assert!(FontFace::Bold.text_width("Hello", 10.0) > width);
    assert_eq!(FontFace::Mono.text_width("abc", 10.0), 18.0);
}

#[test]
fn pdf_rule_draws_one_line() {
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, "---\n").unwrap();
    let bytes = writer.finish(&DocumentInfo::default(), false).unwrap();

    let pages = pdf_operations(&bytes);
    assert_eq!(pages.len(), 1);
    assert_eq!(count_operator(&pages[0], "S"), 1);
    assert_eq!(count_operator(&pages[0], "Tj"), 0);
}

#[test]
fn pdf_empty_content_draws_nothing() {
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, "  \n").unwrap();
    assert_eq!(writer.y(), writer.setup().margin);
}

#[test]
fn pdf_list_markers_and_code() {
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, "1. First\n2. Second\n\n```\nlet x = 1;\n```\n").unwrap();
    let bytes = writer.finish(&DocumentInfo::default(), false).unwrap();

    let text_all = pdf_page_text(&bytes);
    let text = &text_all[0];
    assert!(text.contains("1.  First") || text.contains("1. First"));
    assert!(text.contains("2. "));
    assert!(text.contains("let x = 1;"));

    let ops_all = pdf_operations(&bytes);
    let ops = &ops_all[0];
    let uses_courier = ops.iter().any(|op| {
        op.operator == "Tf"
            && matches!(op.operands.first(), Some(lopdf::Object::Name(name)) if name == b"F5")
    });
    assert!(uses_courier);
}

#[test]
fn pdf_blockquote_draws_bar_in_italics() {
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, "> Quiet words\n").unwrap();
    let bytes = writer.finish(&DocumentInfo::default(), false).unwrap();

    let ops_all = pdf_operations(&bytes);
    let ops = &ops_all[0];
    assert_eq!(count_operator(ops, "re"), 1);
    let italic = ops.iter().any(|op| {
        op.operator == "Tf"
            && matches!(op.operands.first(), Some(lopdf::Object::Name(name)) if name == b"F3")
    });
    assert!(italic);
    assert!(pdf_page_text(&bytes)[0].contains("Quiet words"));
}

#[test]
fn pdf_justified_lines_set_word_spacing() {
    let paragraph = "word ".repeat(200);
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, &paragraph).unwrap();
    let bytes = writer.finish(&DocumentInfo::default(), false).unwrap();

    let ops_all = pdf_operations(&bytes);
    let ops = &ops_all[0];
    let spacing: Vec<f32> = ops
        .iter()
        .filter(|op| op.operator == "Tw")
        .filter_map(|op| op.operands.first().and_then(|o| o.as_float().ok()))
        .collect();
    assert!(spacing.len() > 1);
    assert!(spacing.iter().any(|&tw| tw > 0.0));
    // The last line is not stretched
    assert_eq!(spacing.last().copied(), Some(0.0));
}

#[test]
fn pdf_overflow_breaks_pages() {
    let markdown = "A paragraph of body text that goes on.\n\n".repeat(120);
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, &markdown).unwrap();
    assert!(writer.page_count() > 1);
}

#[test]
fn pdf_long_word_wraps_by_character() {
    let mut writer = PageWriter::new(PageSetup::default());
    let start = writer.y();
    pdf::render_markdown(&mut writer, &"x".repeat(400)).unwrap();
    // 400 glyphs of 6pt cannot fit on one 468pt line
    assert!(writer.y() - start > 2.0 * 12.0 * 1.2);
}

#[test]
fn page_setup_from_config() {
    let setup = PageSetup::from_config(&PdfConfig {
        page_size: PageSize::A4,
        margin: 36.0,
        compress: true,
    });
    assert_eq!(setup.width, 595.28);
    assert_eq!(setup.margin, 36.0);

    let setup = PageSetup::from_config(&PdfConfig {
        margin: 500.0,
        ..PdfConfig::default()
    });
    assert_eq!(setup.margin, 72.0);
}

// ============================================================================
// ASSEMBLY AND EXPORT
// ============================================================================

#[test]
fn docx_export_without_cover() {
    let book = sample_book();
    let document = tokio_test::block_on(export_book(
        &book,
        ExportFormat::Docx,
        &StubFetcher(None),
        &PdfConfig::default(),
    ))
    .unwrap();

    assert_eq!(document.filename, "the_long_road.docx");
    assert_eq!(document.format, ExportFormat::Docx);

    let names = docx_part_names(&document.bytes);
    for part in [
        "[Content_Types].xml",
        "_rels/.rels",
        "word/document.xml",
        "word/styles.xml",
        "word/_rels/document.xml.rels",
        "docProps/core.xml",
    ] {
        assert!(names.iter().any(|n| n == part), "missing {}", part);
    }
    assert!(!names.iter().any(|n| n.starts_with("word/media/")));

    let xml = docx_part(&document.bytes, "word/document.xml");
    // One after the title page, one between the two chapters
    assert_eq!(count_page_breaks(&xml), 2);

    let text = docx_text(&xml);
    for expected in [
        "The Long Road",
        "A Novel",
        "by Ada Writer",
        "Chapter One",
        "quietly",
        "\u{2022} ",
        "Chapter Two",
        "Aftermath",
        "Nothing stays.",
    ] {
        assert!(text.contains(expected), "missing {:?} in {}", expected, text);
    }

    let core = docx_part(&document.bytes, "docProps/core.xml");
    assert!(core.contains("<dc:title>The Long Road</dc:title>"));
    assert!(core.contains("<dc:creator>Ada Writer</dc:creator>"));
}

#[test]
fn docx_export_escapes_markup() {
    let book = Book {
        title: "Fish & <Chips>".to_string(),
        author: "A".to_string(),
        chapters: vec![Chapter {
            title: "One".to_string(),
            description: None,
            content: "a < b && c".to_string(),
        }],
        ..Book::default()
    };
    let bytes =
        formats::render_book(&book, ExportFormat::Docx, None, &PdfConfig::default()).unwrap();
    let xml = docx_part(&bytes, "word/document.xml");
    let text = docx_text(&xml);
    assert!(text.contains("Fish & <Chips>"));
    assert!(text.contains("a < b && c"));
}

#[test]
fn docx_export_with_cover() {
    let mut book = sample_book();
    book.cover_image_url = Some("https://covers.example/c.png".to_string());

    let document = tokio_test::block_on(export_book(
        &book,
        ExportFormat::Docx,
        &StubFetcher(Some(png_bytes(40, 60))),
        &PdfConfig::default(),
    ))
    .unwrap();

    let names = docx_part_names(&document.bytes);
    assert!(names.iter().any(|n| n == "word/media/cover.png"));

    let rels = docx_part(&document.bytes, "word/_rels/document.xml.rels");
    assert!(rels.contains("media/cover.png"));

    let xml = docx_part(&document.bytes, "word/document.xml");
    assert_eq!(count_page_breaks(&xml), 3);
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let extent = doc
        .descendants()
        .find(|n| n.tag_name().name() == "extent")
        .unwrap();
    let cx: u64 = extent.attribute("cx").unwrap().parse().unwrap();
    let cy: u64 = extent.attribute("cy").unwrap().parse().unwrap();
    // A 2:3 image in a 6x8 inch box is limited by height
    assert_eq!(cy, 8 * 914_400);
    assert_eq!(cx, 4_876_800);
}

#[test]
fn pdf_export_pages_and_text() {
    let book = sample_book();
    let document = tokio_test::block_on(export_book(
        &book,
        ExportFormat::Pdf,
        &StubFetcher(None),
        &uncompressed(),
    ))
    .unwrap();

    assert_eq!(document.filename, "the_long_road.pdf");
    assert!(document.bytes.starts_with(b"%PDF-"));

    let pages = pdf_page_text(&document.bytes);
    assert_eq!(pages.len(), 3);
    assert!(pages[0].contains("The Long Road"));
    assert!(pages[0].contains("A Novel"));
    assert!(pages[0].contains("by Ada Writer"));
    assert!(pages[1].contains("Chapter One"));
    assert!(pages[1].contains("quietly"));
    assert!(pages[2].contains("Chapter Two"));
    assert!(pages[2].contains("Nothing stays."));
}

#[test]
fn pdf_export_metadata() {
    let book = sample_book();
    let bytes = formats::render_book(&book, ExportFormat::Pdf, None, &uncompressed()).unwrap();
    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    let info_ref = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info_ref).unwrap();
    assert_eq!(
        info.get(b"Title").unwrap().as_str().unwrap(),
        b"The Long Road"
    );
    assert_eq!(info.get(b"Author").unwrap().as_str().unwrap(), b"Ada Writer");
}

#[test]
fn pdf_export_compressed_still_loads() {
    let book = sample_book();
    let bytes =
        formats::render_book(&book, ExportFormat::Pdf, None, &PdfConfig::default()).unwrap();
    assert_eq!(pdf_page_text(&bytes).len(), 3);
}

#[test]
fn pdf_export_with_cover() {
    let mut book = sample_book();
    book.cover_image_url = Some("https://covers.example/c.png".to_string());

    let document = tokio_test::block_on(export_book(
        &book,
        ExportFormat::Pdf,
        &StubFetcher(Some(png_bytes(30, 45))),
        &uncompressed(),
    ))
    .unwrap();

    let pages = pdf_operations(&document.bytes);
    assert_eq!(pages.len(), 4);
    assert_eq!(count_operator(&pages[0], "Do"), 1);
    assert_eq!(count_operator(&pages[1], "Do"), 0);
}

#[test]
fn single_chapter_has_no_extra_break() {
    let mut book = sample_book();
    book.chapters.truncate(1);
    let bytes = formats::render_book(&book, ExportFormat::Pdf, None, &uncompressed()).unwrap();
    assert_eq!(pdf_page_text(&bytes).len(), 2);

    let bytes =
        formats::render_book(&book, ExportFormat::Docx, None, &PdfConfig::default()).unwrap();
    assert_eq!(count_page_breaks(&docx_part(&bytes, "word/document.xml")), 1);
}

#[test]
fn cover_fetch_failure_is_fatal() {
    let mut book = sample_book();
    book.cover_image_url = Some("https://covers.example/missing.png".to_string());

    let err = tokio_test::block_on(export_book(
        &book,
        ExportFormat::Pdf,
        &StubFetcher(None),
        &PdfConfig::default(),
    ))
    .unwrap_err();
    assert!(matches!(err, AppError::ImageProcessing { .. }));
    assert_eq!(err.field(), Some("coverImageUrl"));
}

#[test]
fn undecodable_cover_is_fatal() {
    let mut book = sample_book();
    book.cover_image_url = Some("https://covers.example/c.png".to_string());

    let err = tokio_test::block_on(export_book(
        &book,
        ExportFormat::Docx,
        &StubFetcher(Some(b"definitely not an image".to_vec())),
        &PdfConfig::default(),
    ))
    .unwrap_err();
    assert_eq!(err.field(), Some("coverImageUrl"));
}

#[test]
fn blank_cover_url_is_skipped() {
    let mut book = sample_book();
    book.cover_image_url = Some("   ".to_string());
    let cover = tokio_test::block_on(load_cover(&book, &StubFetcher(None))).unwrap();
    assert!(cover.is_none());
}

#[test]
fn invalid_book_is_rejected_before_rendering() {
    let book = Book::default();
    let err = tokio_test::block_on(export_book(
        &book,
        ExportFormat::Pdf,
        &StubFetcher(None),
        &PdfConfig::default(),
    ))
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput { field: "title", .. }));
}

#[test]
fn data_url_covers() {
    let png = png_bytes(8, 8);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

    let decoded = decode_data_url(&format!("image/png;base64,{}", encoded)).unwrap();
    assert_eq!(decoded, png);
    assert!(decode_data_url("image/png,rawdata").is_err());
    assert!(decode_data_url("no-comma").is_err());

    let fetcher = HttpCoverFetcher::new(&Config::default().cover).unwrap();
    let fetched =
        tokio_test::block_on(fetcher.fetch(&format!("data:image/png;base64,{}", encoded))).unwrap();
    let cover = CoverImage::decode(&fetched).unwrap();
    assert_eq!((cover.width(), cover.height()), (8, 8));
}

#[test]
fn data_url_respects_size_limit() {
    let mut config = Config::default().cover;
    config.max_bytes = 16;
    let fetcher = HttpCoverFetcher::new(&config).unwrap();
    let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(8, 8));
    let err = tokio_test::block_on(fetcher.fetch(&format!("data:image/png;base64,{}", encoded)))
        .unwrap_err();
    assert_eq!(err.field(), Some("coverImageUrl"));
}

#[test]
fn unsupported_cover_scheme() {
    let fetcher = HttpCoverFetcher::new(&Config::default().cover).unwrap();
    let err = tokio_test::block_on(fetcher.fetch("ftp://example.com/c.png")).unwrap_err();
    assert!(matches!(err, AppError::ImageProcessing { .. }));
}

#[test]
fn wide_covers_are_scaled_down() {
    let cover = CoverImage::decode(&png_bytes(3200, 100)).unwrap();
    assert_eq!(cover.width(), 1600);
    assert_eq!(cover.height(), 50);
    assert!(!cover.to_jpeg().unwrap().is_empty());

    let (w, h) = cover.fit_within(320.0, 320.0);
    assert!((w - 320.0).abs() < 0.01);
    assert!((h - 10.0).abs() < 0.01);
}

// ============================================================================
// HEADINGS, XML TEXT AND STREAMING
// ============================================================================

/// Font resource and size of every `Tf` on a page.
fn font_changes(ops: &[lopdf::content::Operation]) -> Vec<(String, f32)> {
    ops.iter()
        .filter(|op| op.operator == "Tf")
        .map(|op| {
            let name = match &op.operands[0] {
                lopdf::Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
                other => panic!("unexpected font operand: {:?}", other),
            };
            (name, op.operands[1].as_float().unwrap())
        })
        .collect()
}

#[test]
fn heading_keeps_spaces_between_emphasis() {
    let paragraphs = docx::render_markdown("## **Bold** *italic* heading\n").unwrap();
    assert_eq!(paragraphs.len(), 1);
    assert_eq!(paragraphs[0].style, Some("Heading2"));
    assert_eq!(paragraphs[0].text(), "Bold italic heading");
    assert!(paragraphs[0].runs[0].bold);

    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, "## **Bold** *italic* heading\n").unwrap();
    let bytes = writer.finish(&DocumentInfo::default(), false).unwrap();
    assert_eq!(pdf_page_text(&bytes)[0], "Bold italic heading");
}

#[test]
fn pdf_heading_faces_and_sizes() {
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(
        &mut writer,
        "# One\n\n## Two\n\n### Three\n\n#### Four\n\n###### Six\n",
    )
    .unwrap();
    let bytes = writer.finish(&DocumentInfo::default(), false).unwrap();

    let pages = pdf_operations(&bytes);
    assert_eq!(pages.len(), 1);
    let expected: Vec<(String, f32)> = [24.0, 20.0, 16.0, 16.0, 16.0]
        .iter()
        .map(|&size| ("F2".to_string(), size))
        .collect();
    assert_eq!(font_changes(&pages[0]), expected);
    assert_eq!(pdf_page_text(&bytes)[0], "One Two Three Four Six");
}

#[test]
fn pdf_spacing_is_measured_in_lines() {
    // Level one: 24 units before and 12 after, in 28.8pt lines of the 24pt face
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, "# A\n").unwrap();
    let expected = 72.0 + 2.0 * 28.8 + 28.8 + 28.8;
    assert!((writer.y() - expected).abs() < 0.01, "y = {}", writer.y());

    // Body: one 14.4pt line and 10 units after
    let mut writer = PageWriter::new(PageSetup::default());
    pdf::render_markdown(&mut writer, "Body\n").unwrap();
    let expected = 72.0 + 14.4 + 10.0 / 12.0 * 14.4;
    assert!((writer.y() - expected).abs() < 0.01, "y = {}", writer.y());
}

#[test]
fn control_characters_are_dropped_from_docx() {
    let book = Book {
        title: "Bell\u{07} Book".to_string(),
        author: "A".to_string(),
        chapters: vec![Chapter {
            title: "One".to_string(),
            description: None,
            content: "Page\u{0C}feed and bell\u{07} here\n".to_string(),
        }],
        ..Book::default()
    };
    let bytes =
        formats::render_book(&book, ExportFormat::Docx, None, &PdfConfig::default()).unwrap();

    let xml = docx_part(&bytes, "word/document.xml");
    assert!(roxmltree::Document::parse(&xml).is_ok());
    assert!(!xml.contains('\u{07}'));
    assert!(!xml.contains('\u{0C}'));
    assert!(docx_text(&xml).contains("bell here"));

    let core = docx_part(&bytes, "docProps/core.xml");
    assert!(roxmltree::Document::parse(&core).is_ok());
    assert!(core.contains("<dc:title>Bell Book</dc:title>"));
}

#[test]
fn xml_chars_keeps_whitespace_controls() {
    assert_eq!(docx::xml_chars("a\tb\u{1}\u{FFFE}c\r\n"), "a\tbc\r\n");
    assert!(matches!(
        docx::xml_chars("plain"),
        std::borrow::Cow::Borrowed("plain")
    ));
}

#[test]
fn code_tabs_become_tab_elements() {
    let paragraphs = docx::render_markdown("```\nfn\tmain()\n\tbody\n```\n").unwrap();
    assert_eq!(paragraphs[0].runs[0].text, "fn\tmain()\n\tbody");

    let xml = String::from_utf8(docx::document_xml(&paragraphs)).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let tabs = doc
        .descendants()
        .filter(|n| n.has_tag_name((NS_W, "tab")))
        .count();
    assert_eq!(tabs, 2);
    assert_eq!(docx_text(&xml), "fn|main()|body");
    assert!(!xml.contains("    "));
}

#[test]
fn pdf_stream_yields_complete_document() {
    let book = sample_book();
    let bytes = tokio_test::block_on(async {
        let mut stream = stream_pdf(&book, &StubFetcher(None), &uncompressed())
            .await
            .unwrap();
        assert_eq!(stream.filename, "the_long_road.pdf");
        let mut bytes = Vec::new();
        stream.reader.read_to_end(&mut bytes).await.unwrap();
        bytes
    });

    let pages = pdf_page_text(&bytes);
    assert_eq!(pages.len(), 3);
    assert!(pages[2].contains("Nothing stays."));
}

#[test]
fn pdf_stream_larger_than_pipe() {
    let mut book = sample_book();
    book.chapters[0].content = "A paragraph of body text that goes on.\n\n".repeat(2000);
    let bytes = tokio_test::block_on(async {
        let mut stream = stream_pdf(&book, &StubFetcher(None), &uncompressed())
            .await
            .unwrap();
        let mut bytes = Vec::new();
        stream.reader.read_to_end(&mut bytes).await.unwrap();
        bytes
    });

    assert!(bytes.len() > 64 * 1024);
    assert!(pdf_page_text(&bytes).len() > 10);
}

#[test]
fn pdf_stream_rejects_invalid_book_up_front() {
    let err = tokio_test::block_on(stream_pdf(
        &Book::default(),
        &StubFetcher(None),
        &PdfConfig::default(),
    ))
    .unwrap_err();
    assert_eq!(err.field(), Some("title"));
}
