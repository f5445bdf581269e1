//! Book export: cover fetching, rendering and filename derivation.

use crate::config::{CoverConfig, ExportFormat, PdfConfig};
use crate::error::{AppError, Result};
use crate::formats::pdf::render_document;
use crate::formats::{CoverImage, render_book, write_pdf};
use crate::library::Book;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::future::Future;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};
use tokio::io::DuplexStream;
use tokio_util::io::SyncIoBridge;

/// Source of cover image bytes.
pub trait CoverFetcher {
    /// Fetch the raw image bytes behind `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetches covers over HTTP(S) and decodes inline `data:` URLs.
#[derive(Debug, Clone)]
pub struct HttpCoverFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpCoverFetcher {
    /// Build a fetcher with the configured timeout and size limit.
    pub fn new(config: &CoverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("quill-export/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_bytes {
            return Err(AppError::cover(format!(
                "Cover image is {} bytes, limit is {}",
                len, self.max_bytes
            )));
        }
        Ok(())
    }
}

impl CoverFetcher for HttpCoverFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(data) = url.strip_prefix("data:") {
            let bytes = decode_data_url(data)?;
            self.check_size(bytes.len())?;
            return Ok(bytes);
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::cover(format!("Unsupported cover URL: {}", url)));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::cover(format!("Failed to fetch cover image: {}", e)))?;

        if let Some(len) = response.content_length() {
            self.check_size(len as usize)?;
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::cover(format!("Failed to read cover image: {}", e)))?;
        self.check_size(bytes.len())?;

        Ok(bytes.to_vec())
    }
}

/// Decode the part of a `data:` URL after the scheme.
///
/// Only base64 payloads are accepted; the media type is not checked since
/// the image decoder sniffs the format from content.
pub fn decode_data_url(data: &str) -> Result<Vec<u8>> {
    let (header, payload) = data
        .split_once(',')
        .ok_or_else(|| AppError::cover("Malformed data URL"))?;
    if !header.ends_with(";base64") {
        return Err(AppError::cover("Only base64 data URLs are supported"));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::cover(format!("Invalid base64 in data URL: {}", e)))
}

/// A rendered document ready to be sent or written.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Download filename derived from the book title.
    pub filename: String,
    /// Output format.
    pub format: ExportFormat,
}

/// Fetch and decode the book's cover, if it has one.
pub async fn load_cover<F: CoverFetcher>(book: &Book, fetcher: &F) -> Result<Option<CoverImage>> {
    let Some(url) = book.cover_url() else {
        return Ok(None);
    };

    let data = fetcher.fetch(url).await.inspect_err(|e| {
        tracing::error!(error = %e, "Cover image fetch failed");
    })?;
    tracing::debug!(bytes = data.len(), "Fetched cover image");

    CoverImage::decode(&data).map(Some)
}

/// Validate a book and load its cover; the first step of every export.
pub async fn prepare_export<F: CoverFetcher>(
    book: &Book,
    fetcher: &F,
) -> Result<Option<CoverImage>> {
    book.validate()?;
    load_cover(book, fetcher).await
}

/// Validate, fetch the cover, and render a book in one call.
///
/// Rendering runs on the blocking pool.
pub async fn export_book<F: CoverFetcher>(
    book: &Book,
    format: ExportFormat,
    fetcher: &F,
    pdf: &PdfConfig,
) -> Result<ExportedDocument> {
    let start = Instant::now();
    let cover = prepare_export(book, fetcher).await?;

    let owned = book.clone();
    let config = pdf.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        render_book(&owned, format, cover.as_ref(), &config)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Export task failed: {}", e)))??;

    tracing::info!(
        title = %book.title,
        format = format.extension(),
        chapters = book.chapters.len(),
        bytes = bytes.len(),
        elapsed = ?start.elapsed(),
        "Exported book"
    );

    Ok(ExportedDocument {
        bytes,
        filename: book.filename(format),
        format,
    })
}

/// Pipe buffer between the PDF serializer and the reader.
const PDF_PIPE_CAPACITY: usize = 64 * 1024;

/// A PDF being serialized into a pipe.
#[derive(Debug)]
pub struct PdfStream {
    /// Read half of the pipe; EOF once the document is fully written.
    pub reader: DuplexStream,
    /// Download filename derived from the book title.
    pub filename: String,
}

/// Lay out a book as PDF and serialize it into a pipe as the reader drains it.
///
/// Layout errors are returned before any byte is written. The serializer
/// blocks whenever the pipe is full, so a slow reader holds it back.
pub async fn stream_pdf<F: CoverFetcher>(
    book: &Book,
    fetcher: &F,
    pdf: &PdfConfig,
) -> Result<PdfStream> {
    let start = Instant::now();
    let cover = prepare_export(book, fetcher).await?;

    let owned = book.clone();
    let config = pdf.clone();
    let mut doc = tokio::task::spawn_blocking(move || {
        render_document(&owned, cover.as_ref(), &config)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Export task failed: {}", e)))??;

    let (writer, reader) = tokio::io::duplex(PDF_PIPE_CAPACITY);
    let bridge = SyncIoBridge::new(writer);
    let title = book.title.clone();
    let chapters = book.chapters.len();

    tokio::task::spawn_blocking(move || {
        let mut out = BufWriter::new(bridge);
        let written = write_pdf(&mut doc, &mut out).and_then(|()| Ok(out.flush()?));
        match written {
            Ok(()) => tracing::info!(
                title = %title,
                format = ExportFormat::Pdf.extension(),
                chapters,
                elapsed = ?start.elapsed(),
                "Exported book"
            ),
            // The reader went away; nothing is left to report to
            Err(e) => tracing::warn!(title = %title, error = %e, "PDF stream ended early"),
        }
    });

    Ok(PdfStream {
        reader,
        filename: book.filename(ExportFormat::Pdf),
    })
}
