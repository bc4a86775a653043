//! Error types for archive reading and extraction.
//!
//! Structural failures ([`Error::MalformedSignature`], [`Error::StructuralDesync`])
//! abort the whole open operation: once the central directory is out of step,
//! every later offset is meaningless. Per-entry failures ([`Error::MissingPassword`],
//! [`Error::BadPassword`], [`Error::CrcMismatch`], writer I/O) only fail the
//! stream or extraction they belong to.

use std::io;

/// Errors produced while opening, streaming or extracting an archive.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error from the underlying source or a writer.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// HTTP transport error from a range-fetching source.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The source refused or could not serve a request.
    #[error("source error: {0}")]
    Source(String),

    /// A record signature was not found or did not match.
    #[error(
        "malformed {record} signature{}",
        .found.map(|f| format!(" (found {f:#010x})")).unwrap_or_default()
    )]
    MalformedSignature {
        record: &'static str,
        found: Option<u32>,
    },

    /// A declared length exceeds the bytes actually available.
    #[error("truncated {context}: needed {expected} bytes, only {available} available")]
    StructuralDesync {
        context: &'static str,
        expected: u64,
        available: u64,
    },

    /// `extract` was called without a destination path.
    #[error("extraction destination path is missing")]
    PathMissing,

    /// An encrypted entry was opened without a password.
    #[error("entry '{path}' is encrypted and no password was given")]
    MissingPassword { path: String },

    /// The password failed the encryption header check byte.
    #[error("wrong password for entry '{path}'")]
    BadPassword { path: String },

    /// The entry uses a compression method this crate cannot decode.
    #[error("unsupported compression method {method} for entry '{path}'")]
    UnsupportedCompression { method: u16, path: String },

    /// The decompressed bytes do not match the stored CRC32.
    #[error("CRC32 mismatch for entry '{path}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// An offset taken from a record that overflows once biased or translated.
    pub(crate) fn offset_overflow(context: &'static str, offset: u64, available: u64) -> Self {
        Error::StructuralDesync {
            context,
            expected: offset,
            available,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        // Errors raised inside AsyncRead adapters travel wrapped in io::Error.
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return match err.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(other)) => Error::Io(io::Error::other(other)),
                None => Error::Io(io::Error::other("lost wrapped error")),
            };
        }
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            Error::StructuralDesync { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
