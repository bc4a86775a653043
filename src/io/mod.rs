mod http;
mod local;
mod memory;

pub use http::HttpRangeSource;
pub use local::LocalFileSource;
pub use memory::MemorySource;

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

/// A byte range opened on a [`Source`].
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Layout of a split archive whose volumes are presented as one
/// concatenated byte stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceOptions {
    /// The source is a concatenation of several volumes.
    pub multi_volume: bool,
    /// Size of the final volume, which holds the central directory.
    pub last_volume_size: u64,
    /// Number of volumes; compensates for per-volume marker bytes.
    pub volume_count: u64,
}

impl SourceOptions {
    pub fn multi_volume(last_volume_size: u64, volume_count: u64) -> Self {
        Self {
            multi_volume: true,
            last_volume_size,
            volume_count,
        }
    }

    /// Translate an offset read out of an archive record into a position
    /// within the concatenated source.
    ///
    /// Offsets stored in split archives are relative to the last volume, so
    /// the start of that volume is added back along with the marker overhead.
    /// Returns `None` when the result does not fit in a `u64`.
    pub fn physical_offset(&self, archive_size: u64, logical: u64) -> Option<u64> {
        if !self.multi_volume {
            return Some(logical);
        }
        archive_size
            .saturating_sub(self.last_volume_size)
            .checked_add(logical)?
            .checked_add(self.volume_count)
    }
}

/// Random-access byte source an archive is read from.
#[async_trait]
pub trait Source: Send + Sync {
    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Open a stream of `length` bytes (or up to the end) at a physical offset.
    async fn stream(&self, offset: u64, length: Option<u64>) -> Result<ByteStream>;

    /// Volume layout of the source.
    fn opts(&self) -> SourceOptions {
        SourceOptions::default()
    }

    /// Open a stream at an offset read out of an archive record,
    /// translating it for multi-volume sources.
    async fn stream_logical(&self, offset: u64, length: Option<u64>) -> Result<ByteStream> {
        let size = self.size();
        let physical = self
            .opts()
            .physical_offset(size, offset)
            .ok_or_else(|| Error::offset_overflow("volume offset", offset, size))?;
        self.stream(physical, length).await
    }
}
