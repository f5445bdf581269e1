//! HTTP request handlers.

use crate::config::ExportFormat;
use crate::error::{AppError, Result};
use crate::export::{export_book, stream_pdf};
use crate::formats::{self, Paragraph};
use crate::library::Book;
use crate::server::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// Index page (simple HTML).
pub async fn index() -> Html<String> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>quill-export</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>quill-export {version}</h1>
    <p>Renders Markdown books to DOCX and PDF.</p>
    <h2>Endpoints</h2>
    <ul>
        <li><code>GET /api/health</code></li>
        <li><code>POST /api/render</code> with <code>{{"markdown": "..."}}</code></li>
        <li><code>POST /api/export/docx</code> or <code>/api/export/pdf</code> with a book</li>
    </ul>
</body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    Html(html)
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body of a render request.
#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    /// Chapter Markdown.
    pub markdown: String,
}

/// Flow-document paragraphs for a piece of Markdown.
pub async fn render(Json(request): Json<RenderRequest>) -> Result<Json<Vec<Paragraph>>> {
    let paragraphs =
        tokio::task::spawn_blocking(move || formats::docx::render_markdown(&request.markdown))
            .await
            .map_err(|e| AppError::Internal(format!("Render task failed: {}", e)))??;

    Ok(Json(paragraphs))
}

/// Export a book as a downloadable document.
pub async fn export(
    State(state): State<AppState>,
    Path(format): Path<String>,
    Json(book): Json<Book>,
) -> Result<Response<Body>> {
    let format = ExportFormat::from_extension(&format)
        .ok_or_else(|| AppError::invalid("format", format!("Unsupported format: {}", format)))?;
    let fetcher = state.fetcher.as_ref();

    match format {
        ExportFormat::Docx => {
            let document = export_book(&book, format, fetcher, &state.config.pdf).await?;
            let length = document.bytes.len();
            Ok(attachment(
                format,
                &document.filename,
                Some(length),
                Body::from(document.bytes),
            ))
        }
        ExportFormat::Pdf => {
            // Serialized while the client reads; length is not known up front
            let stream = stream_pdf(&book, fetcher, &state.config.pdf).await?;
            Ok(attachment(
                format,
                &stream.filename,
                None,
                Body::from_stream(ReaderStream::new(stream.reader)),
            ))
        }
    }
}

/// Download response with type and disposition headers.
fn attachment(
    format: ExportFormat,
    filename: &str,
    length: Option<usize>,
    body: Body,
) -> Response<Body> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.mime_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        );
    if let Some(length) = length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }
    builder.body(body).unwrap_or_else(|_| Response::default())
}
