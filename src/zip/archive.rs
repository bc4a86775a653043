use std::sync::Arc;

use super::entry::Entry;
use super::extractor::{ExtractOptions, extract_entries};
use super::parser::{ArchiveLayout, OpenOptions, ZipParser};
use super::structures::{CrxHeader, DirectoryRecord};
use crate::error::Result;
use crate::io::{MemorySource, Source};

/// An opened archive: its trailer records and the parsed central directory.
///
/// Opening reads only the trailer and the central directory. Entry contents
/// are fetched from the source when an entry is streamed.
#[derive(Debug, Clone)]
pub struct Archive {
    layout: ArchiveLayout,
}

impl Archive {
    /// Resolve the central directory of the archive held by `source`.
    pub async fn open<S: Source + 'static>(source: Arc<S>, options: OpenOptions) -> Result<Self> {
        let source: Arc<dyn Source> = source;
        let layout = ZipParser::new(source, options).parse().await?;
        Ok(Self { layout })
    }

    /// Open an archive held in memory.
    pub async fn open_buffer(data: impl Into<Arc<[u8]>>, options: OpenOptions) -> Result<Self> {
        Self::open(Arc::new(MemorySource::new(data)), options).await
    }

    /// Entries in central directory order.
    pub fn files(&self) -> &[Entry] {
        &self.layout.entries
    }

    /// Look up an entry by its path.
    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.layout.entries.iter().find(|entry| entry.path == path)
    }

    pub fn comment(&self) -> &str {
        &self.layout.comment
    }

    /// Trailer records the directory was resolved from.
    pub fn directory(&self) -> &DirectoryRecord {
        &self.layout.record
    }

    /// Central directory position, including any container header bias.
    pub fn directory_offset(&self) -> u64 {
        self.layout.directory_offset
    }

    pub fn container_header(&self) -> Option<&CrxHeader> {
        self.layout.container.as_ref()
    }

    /// Extract every file entry below `options.path`.
    pub async fn extract(&self, options: ExtractOptions) -> Result<()> {
        extract_entries(&self.layout.entries, options).await
    }
}
