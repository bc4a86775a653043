//! # tailzip
//!
//! Lazy ZIP reading over random-access byte sources.
//!
//! Opening an archive reads only its trailer and central directory, so it
//! works well over HTTP Range requests: listing a remote archive costs a few
//! small requests, and each entry is fetched only when it is streamed.
//!
//! ## Features
//!
//! - Local files, HTTP/HTTPS URLs (Range requests) and in-memory buffers
//! - ZIP64 archives and entries
//! - CRX container headers in front of the ZIP payload
//! - Split archives presented as one concatenated source
//! - Traditional PKWARE encryption
//! - STORED and DEFLATE entries, with CRC32 verification
//! - Concurrent extraction that refuses paths escaping the destination
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tailzip::{Archive, ExtractOptions, HttpRangeSource, OpenOptions};
//!
//! #[tokio::main]
//! async fn main() -> tailzip::Result<()> {
//!     let url = "https://example.com/archive.zip".to_string();
//!     let source = Arc::new(HttpRangeSource::new(url).await?);
//!     let archive = Archive::open(source, OpenOptions::default()).await?;
//!
//!     for file in archive.files() {
//!         println!("{} ({} bytes)", file.path, file.uncompressed_size);
//!     }
//!
//!     archive
//!         .extract(ExtractOptions::new("/tmp/out").concurrency(4))
//!         .await
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{ByteStream, HttpRangeSource, LocalFileSource, MemorySource, Source, SourceOptions};
pub use zip::{Archive, Entry, EntryKind, ExtractOptions, OpenOptions, WriterFactory};
