//! Central directory resolution.
//!
//! This module handles the binary parsing of the archive trailer and the
//! central directory, reading from any [`Source`].
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Optionally strip a CRX container header, which shifts every offset
//! 2. Scan a trailing window for the End of Central Directory (EOCD)
//! 3. If the EOCD holds overflow sentinels, follow the Zip64 locator to the
//!    Zip64 end record, which replaces the EOCD's count, size and offset
//! 4. Read exactly the declared number of Central Directory records
//!
//! Local file headers are not touched here; each [`Entry`] reads its own
//! when it is streamed.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::entry::Entry;
use super::extra::{ExtraFields, Zip64Sentinels};
use super::pull::PullStream;
use super::structures::*;
use crate::error::{Error, Result};
use crate::io::Source;

/// Default size of the trailing window searched for the EOCD.
pub const DEFAULT_TAIL_WINDOW: usize = 80;

/// Shift an offset read out of a record by the container header size.
pub(crate) fn apply_bias(context: &'static str, offset: u64, bias: u64) -> Result<u64> {
    offset
        .checked_add(bias)
        .ok_or_else(|| Error::offset_overflow(context, offset, u64::MAX - bias))
}

/// Options controlling how an archive is located within its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Bytes at the end of the source searched for the EOCD signature.
    /// An archive comment longer than this window minus 22 bytes cannot be
    /// found. Windows smaller than the EOCD itself are widened to fit it.
    pub tail_window_size: usize,
    /// Detect and skip a leading CRX container header.
    pub container_header: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            tail_window_size: DEFAULT_TAIL_WINDOW,
            container_header: false,
        }
    }
}

impl OpenOptions {
    pub fn tail_window_size(mut self, size: usize) -> Self {
        self.tail_window_size = size.max(EndOfCentralDirectory::SIZE);
        self
    }

    pub fn container_header(mut self, enabled: bool) -> Self {
        self.container_header = enabled;
        self
    }
}

/// Everything resolved while opening an archive.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    pub container: Option<CrxHeader>,
    pub record: DirectoryRecord,
    pub comment: String,
    /// Central directory position, including the container bias.
    pub directory_offset: u64,
    pub entries: Vec<Entry>,
}

/// Low-level ZIP parser.
///
/// Typically used through [`Archive`](super::Archive) rather than directly.
pub struct ZipParser {
    source: Arc<dyn Source>,
    size: u64,
    options: OpenOptions,
}

impl ZipParser {
    pub fn new(source: Arc<dyn Source>, options: OpenOptions) -> Self {
        let size = source.size();
        Self {
            source,
            size,
            options,
        }
    }

    /// Resolve the trailer and read the whole central directory.
    pub async fn parse(&self) -> Result<ArchiveLayout> {
        let container = if self.options.container_header {
            self.read_container_header().await?
        } else {
            None
        };
        let bias = container.as_ref().map_or(0, |header| header.size);

        let (record, comment) = self.read_trailer(bias).await?;
        let directory_offset =
            apply_bias("central directory offset", record.directory_offset(), bias)?;
        let entries = self.read_directory(&record, directory_offset, bias).await?;

        Ok(ArchiveLayout {
            container,
            record,
            comment,
            directory_offset,
            entries,
        })
    }

    /// Read a CRX header at the start of the source, if there is one.
    pub async fn read_container_header(&self) -> Result<Option<CrxHeader>> {
        if self.size < CrxHeader::FIXED_SIZE as u64 {
            return Ok(None);
        }

        let raw = self
            .source
            .stream(0, Some(CrxHeader::FIXED_SIZE as u64))
            .await?;
        let mut fixed = PullStream::new(raw, "container header");

        let magic = fixed.pull(CrxHeader::MAGIC_SIZE).await?;
        if magic != CrxHeader::MAGIC.to_le_bytes() {
            return Ok(None);
        }
        let lengths = fixed
            .pull(CrxHeader::FIXED_SIZE - CrxHeader::MAGIC_SIZE)
            .await?;
        let (version, key_len, sig_len) = CrxHeader::parse_lengths(&lengths)?;

        let variable = key_len as u64 + sig_len as u64;
        let raw = self
            .source
            .stream(CrxHeader::FIXED_SIZE as u64, Some(variable))
            .await?;
        let key_and_signature = PullStream::new(raw, "container header")
            .pull(variable as usize)
            .await?;

        let header = CrxHeader::new(version, key_and_signature, key_len as usize);
        debug!(version, size = header.size, "found container header");
        Ok(Some(header))
    }

    /// Locate the EOCD in the trailing window and resolve Zip64 if needed.
    ///
    /// Returns the directory record and the archive comment.
    pub async fn read_trailer(&self, bias: u64) -> Result<(DirectoryRecord, String)> {
        let window = self
            .options
            .tail_window_size
            .max(EndOfCentralDirectory::SIZE) as u64;
        let window = window.min(self.size);
        let window_start = self.size - window;

        // Positions measured from the physical end need no volume translation.
        let raw = self.source.stream(window_start, Some(window)).await?;
        let mut tail = PullStream::new(raw, "end of central directory");

        let not_found = || Error::MalformedSignature {
            record: "end of central directory",
            found: None,
        };
        let signature = EndOfCentralDirectory::SIGNATURE.to_le_bytes();

        // The signature bytes may also occur in the tail of the central
        // directory. Only a record whose comment ends the source is the EOCD.
        let (eocd, matched) = loop {
            if tail.pull_until(signature).await?.is_none() {
                return Err(not_found());
            }
            let matched = tail.matched().unwrap_or_default();
            let Some(fixed) = tail.peek(EndOfCentralDirectory::SIZE).await? else {
                return Err(not_found());
            };
            let candidate = EndOfCentralDirectory::parse(&fixed)?;
            let end = matched
                + EndOfCentralDirectory::SIZE as u64
                + candidate.comment_length as u64;
            if end == window {
                tail.pull(EndOfCentralDirectory::SIZE).await?;
                break (candidate, matched);
            }
            trace!(
                position = window_start + matched,
                "signature does not end the source, scanning on"
            );
            tail.pull(1).await?;
        };
        let eocd_position = window_start + matched;
        debug!(
            position = eocd_position,
            records = eocd.total_records,
            "found end of central directory"
        );

        let comment = if eocd.comment_length > 0 {
            tail.set_context("archive comment");
            let bytes = tail.pull(eocd.comment_length as usize).await?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            String::new()
        };

        let record = if eocd.is_zip64() {
            self.read_zip64(eocd, eocd_position, bias).await?
        } else {
            DirectoryRecord::Standard(eocd)
        };

        Ok((record, comment))
    }

    /// Follow the Zip64 locator, which sits immediately before the EOCD.
    async fn read_zip64(
        &self,
        eocd: EndOfCentralDirectory,
        eocd_position: u64,
        bias: u64,
    ) -> Result<DirectoryRecord> {
        let locator_position = eocd_position
            .checked_sub(Zip64Locator::SIZE as u64)
            .ok_or(Error::StructuralDesync {
                context: "zip64 locator",
                expected: Zip64Locator::SIZE as u64,
                available: eocd_position,
            })?;

        let raw = self
            .source
            .stream(locator_position, Some(Zip64Locator::SIZE as u64))
            .await?;
        let locator = Zip64Locator::parse(
            &PullStream::new(raw, "zip64 locator")
                .pull(Zip64Locator::SIZE)
                .await?,
        )?;

        let raw = self
            .source
            .stream_logical(
                apply_bias(
                    "zip64 end of central directory offset",
                    locator.zip64_directory_offset,
                    bias,
                )?,
                Some(Zip64EndOfCentralDirectory::SIZE as u64),
            )
            .await?;
        let record = Zip64EndOfCentralDirectory::parse(
            &PullStream::new(raw, "zip64 end of central directory")
                .pull(Zip64EndOfCentralDirectory::SIZE)
                .await?,
        )?;

        debug!(
            records = record.total_records,
            offset = record.directory_offset,
            "resolved zip64 end of central directory"
        );
        Ok(DirectoryRecord::Zip64 {
            eocd,
            locator,
            record,
        })
    }

    /// Read exactly `record.total_records()` central directory entries.
    pub async fn read_directory(
        &self,
        record: &DirectoryRecord,
        directory_offset: u64,
        bias: u64,
    ) -> Result<Vec<Entry>> {
        let total = record.total_records();
        let size = record.directory_size();

        let raw = self
            .source
            .stream_logical(directory_offset, Some(size))
            .await?;
        let mut records = PullStream::new(raw, "central directory");

        let capacity = total.min(size / CentralDirectoryHeader::SIZE as u64) as usize;
        let mut entries = Vec::with_capacity(capacity);

        for _ in 0..total {
            let header =
                CentralDirectoryHeader::parse(&records.pull(CentralDirectoryHeader::SIZE).await?)?;
            let raw_path = records.pull(header.name_length as usize).await?;

            let sentinels = Zip64Sentinels {
                local_header_offset: header.local_header_offset == ZIP64_SENTINEL_U32,
                disk_start: header.disk_number == ZIP64_SENTINEL_U16,
                ..Zip64Sentinels::from_sizes(header.uncompressed_size, header.compressed_size)
            };
            let extra =
                ExtraFields::parse(&records.pull(header.extra_length as usize).await?, sentinels)?;
            let comment = records.pull(header.comment_length as usize).await?;

            let entry = Entry::from_directory(
                &header,
                raw_path,
                extra,
                comment,
                bias,
                Arc::clone(&self.source),
            )?;
            trace!(
                path = %entry.path,
                size = entry.uncompressed_size,
                offset = entry.local_header_offset,
                "parsed central directory entry"
            );
            entries.push(entry);
        }

        if records.position() != size {
            warn!(
                consumed = records.position(),
                declared = size,
                "central directory size does not match its records"
            );
        }
        debug!(entries = entries.len(), "read central directory");

        Ok(entries)
    }
}
