//! quill-export entry point.

use clap::Parser;
use quill_export::{
    config::{Cli, Command, Config, ExportFormat},
    export::{HttpCoverFetcher, export_book},
    formats,
    library::Book,
    server,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout stays clean for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill_export=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Render { file }) => cmd_render(file),
        Some(Command::Export {
            book,
            format,
            output,
        }) => cmd_export(&config, book, format, output).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nEdit config.toml to configure the exporter.");
    println!("Then run: quill-export serve");

    Ok(())
}

/// Print the flow-document paragraphs of a Markdown file.
fn cmd_render(file: PathBuf) -> anyhow::Result<()> {
    let markdown = std::fs::read_to_string(&file)?;
    let paragraphs = formats::docx::render_markdown(&markdown)?;
    println!("{}", serde_json::to_string_pretty(&paragraphs)?);
    Ok(())
}

/// Export a book JSON file to DOCX or PDF.
async fn cmd_export(
    config: &Config,
    book_path: PathBuf,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&book_path)?;
    let book: Book = serde_json::from_str(&content)?;

    let fetcher = HttpCoverFetcher::new(&config.cover)?;
    let document = export_book(&book, format, &fetcher, &config.pdf).await?;

    let output = output.unwrap_or_else(|| PathBuf::from(&document.filename));
    std::fs::write(&output, &document.bytes)?;
    println!(
        "Wrote {} ({} bytes)",
        output.display(),
        document.bytes.len()
    );

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    tracing::info!(
        bind = %config.server.bind,
        page_size = ?config.pdf.page_size,
        "Starting quill-export server"
    );

    let state = server::AppState::new(config.clone())?;
    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
