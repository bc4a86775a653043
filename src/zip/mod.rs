//! ZIP archive parsing and extraction.
//!
//! ## Architecture
//!
//! - `pull`: positional pull interface over a pushed byte stream
//! - `schema`: fixed-width record decoding shared by every record type
//! - `structures`: typed ZIP records (EOCD, Zip64 locator and end record,
//!   central directory and local file headers, CRX header)
//! - `parser`: trailer location, Zip64 resolution and central directory parsing
//! - `entry`: per-entry local header reconciliation, decryption and streaming
//! - `extractor`: path-safe, concurrency-bounded extraction
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The EOCD is read first, then the Central Directory, which allows listing
//! files without reading the archive body - well suited to HTTP Range
//! requests.
//!
//! ## Supported Features
//!
//! - ZIP64 extensions for archives and entries over 4GB
//! - CRX container headers in front of the archive
//! - Split archives presented as one concatenated source
//! - Traditional PKWARE encryption
//! - STORED and DEFLATE compression methods

mod archive;
mod crypto;
mod datetime;
mod entry;
mod extra;
mod extractor;
mod parser;
mod pull;
mod schema;
mod structures;

pub use archive::Archive;
pub use crypto::{ENCRYPTION_HEADER_SIZE, ZipCrypto, ZipCryptoReader, check_byte};
pub use datetime::dos_to_datetime;
pub use entry::{Entry, EntryKind, EntryReader};
pub use extra::{ExtraField, ExtraFields, Zip64Sentinels};
pub use extractor::{
    EntryWriter, ExtractOptions, FsWriterFactory, WriterFactory, normalize_path, resolve_target,
};
pub use parser::{ArchiveLayout, DEFAULT_TAIL_WINDOW, OpenOptions, ZipParser};
pub use pull::PullStream;
pub use structures::*;
