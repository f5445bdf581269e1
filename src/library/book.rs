//! Book metadata model.

use crate::config::ExportFormat;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// A book as authored in the writing application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Book title.
    pub title: String,

    /// Optional subtitle shown under the title.
    #[serde(default)]
    pub subtitle: Option<String>,

    /// Author display name.
    #[serde(default)]
    pub author: String,

    /// Cover image location (`http(s)://` or `data:` URL).
    #[serde(default)]
    pub cover_image_url: Option<String>,

    /// Chapters in reading order.
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// One chapter of a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Chapter title.
    pub title: String,

    /// Short synopsis used when prompting for generation.
    #[serde(default)]
    pub description: Option<String>,

    /// Chapter body as Markdown.
    #[serde(default)]
    pub content: String,
}

impl Book {
    /// Check the fields the exporters rely on.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::invalid("title", "Book title is required"));
        }
        if let Some(index) = self.chapters.iter().position(|c| c.title.trim().is_empty()) {
            return Err(AppError::invalid(
                "chapter",
                format!("Chapter {} has no title", index + 1),
            ));
        }
        Ok(())
    }

    /// Cover URL, ignoring blank values.
    pub fn cover_url(&self) -> Option<&str> {
        self.cover_image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Subtitle, ignoring blank values.
    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Get display name for the author.
    pub fn author_display(&self) -> &str {
        let author = self.author.trim();
        if author.is_empty() {
            "Unknown Author"
        } else {
            author
        }
    }

    /// Filename stem derived from the title.
    ///
    /// Lower-cased, with every character outside `[a-z0-9]` replaced by `_`.
    pub fn file_stem(&self) -> String {
        self.title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Download filename for the given format.
    pub fn filename(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.file_stem(), format.extension())
    }
}
