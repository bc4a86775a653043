//! Main entry point for the tailzip CLI application.
//!
//! Lists or extracts ZIP archives from the local filesystem or from HTTP
//! URLs, fetching only the byte ranges it needs.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use time::PrimitiveDateTime;
use tracing_subscriber::EnvFilter;

use tailzip::{
    Archive, Cli, EntryKind, ExtractOptions, HttpRangeSource, LocalFileSource, Source,
};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate handler
/// based on whether the input is a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.is_http_url() {
        // Handle remote ZIP file via HTTP Range requests
        let source = HttpRangeSource::new(cli.file.clone())
            .await?
            .with_options(cli.source_options());
        let source = Arc::new(source);

        process_zip(source.clone(), &cli).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(source.transferred_bytes())
            );
        }
    } else {
        let source =
            LocalFileSource::new(Path::new(&cli.file))?.with_options(cli.source_options());
        process_zip(Arc::new(source), &cli).await?;
    }

    Ok(())
}

/// Process a ZIP archive based on CLI options.
///
/// - List mode (`-l` or `-v`): Display archive contents
/// - Extract mode: Extract every file into `-d DIR`
async fn process_zip<S: Source + 'static>(source: Arc<S>, cli: &Cli) -> Result<()> {
    let archive = Archive::open(source, cli.open_options()).await?;

    if cli.list || cli.verbose {
        list_files(&archive, cli.verbose);
        return Ok(());
    }

    if !cli.is_quiet() {
        for entry in archive.files().iter().filter(|e| !e.is_directory()) {
            println!("  extracting: {}", entry.path);
        }
    }

    let mut options = ExtractOptions::new(&cli.extract_dir).concurrency(cli.concurrency);
    if let Some(password) = &cli.password {
        options = options.password(password.clone());
    }
    archive.extract(options).await?;

    Ok(())
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files(archive: &Archive, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive.files() {
        if !verbose {
            println!("{}", entry.path);
            continue;
        }

        let encrypted = if entry.is_encrypted() { "*" } else { " " };

        println!(
            "{:>10}  {:>10}  {}  {} {}{}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            modified(entry.last_modified),
            encrypted,
            entry.path
        );

        if entry.kind == EntryKind::File {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
        if !archive.comment().is_empty() {
            println!("{}", archive.comment());
        }
    }
}

/// Space saved by compression, as a right-aligned percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// `YYYY-MM-DD  HH:MM`, or a blank column of the same width when the entry
/// carries no valid DOS timestamp.
fn modified(timestamp: Option<PrimitiveDateTime>) -> String {
    match timestamp {
        Some(t) => format!(
            "{:04}-{:02}-{:02}  {:02}:{:02}",
            t.year(),
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute()
        ),
        None => format!("{:<17}", "-"),
    }
}

fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

    if size < 1024 {
        return format!("{size} B");
    }
    let mut scaled = size as f64 / 1024.0;
    let mut unit = 0;
    while scaled >= 1024.0 && unit + 1 < UNITS.len() {
        scaled /= 1024.0;
        unit += 1;
    }
    format!("{scaled:.1} {}", UNITS[unit])
}
