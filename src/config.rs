use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Book export service rendering Markdown chapters to DOCX and PDF.
#[derive(Parser, Debug, Clone)]
#[command(name = "quill-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "QUILL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Export a book described by a JSON file.
    Export {
        /// Path to the book JSON file.
        book: PathBuf,
        /// Output format.
        #[arg(short, long, default_value = "pdf")]
        format: ExportFormat,
        /// Output path (defaults to the name derived from the book title).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the flow-document paragraphs of a Markdown file as JSON.
    Render {
        /// Path to the Markdown file.
        file: PathBuf,
    },

    /// Create a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Cover image fetching.
    #[serde(default)]
    pub cover: CoverConfig,

    /// PDF page setup.
    #[serde(default)]
    pub pdf: PdfConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

/// Cover image fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_cover_timeout")]
    pub timeout_seconds: u64,

    /// Largest accepted image payload in bytes.
    #[serde(default = "default_cover_max_bytes")]
    pub max_bytes: usize,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_cover_timeout(),
            max_bytes: default_cover_max_bytes(),
        }
    }
}

fn default_cover_timeout() -> u64 {
    15
}

fn default_cover_max_bytes() -> usize {
    10 * 1024 * 1024
}

/// PDF page configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Paper size.
    #[serde(default)]
    pub page_size: PageSize,

    /// Page margin in points, applied on all four sides.
    #[serde(default = "default_margin")]
    pub margin: f32,

    /// Flate-compress content streams.
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margin: default_margin(),
            compress: default_compress(),
        }
    }
}

fn default_margin() -> f32 {
    72.0
}

fn default_compress() -> bool {
    true
}

/// Supported paper sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// US Letter, 8.5 x 11 in.
    #[default]
    Letter,
    /// ISO A4, 210 x 297 mm.
    A4,
}

impl PageSize {
    /// Page dimensions in points (width, height).
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PageSize::Letter => (612.0, 792.0),
            PageSize::A4 => (595.28, 841.89),
        }
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("quill-export.toml"),
            dirs::config_dir()
                .map(|p| p.join("quill-export").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/quill-export/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# quill-export configuration

[server]
bind = "0.0.0.0:8080"

[cover]
# Seconds to wait for the cover image download
timeout_seconds = 15
# Largest accepted cover image in bytes
max_bytes = 10485760

[pdf]
# Paper size: "letter" or "a4"
page_size = "letter"
# Margin in points (72 = one inch)
margin = 72.0
compress = true
"#
        .to_string()
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Office Open XML word-processing document.
    Docx,
    /// Portable Document Format.
    Pdf,
}

impl ExportFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }

    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
        }
    }

    /// Try to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "docx" => Some(ExportFormat::Docx),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }
}
