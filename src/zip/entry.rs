//! Archive entries and per-entry streaming.
//!
//! Opening an entry re-reads its local file header, reconciles it with the
//! central directory record, checks the password for encrypted entries and
//! then streams the body through decryption, decompression and a CRC check.
//! All of that state is created per call, so entries can be streamed
//! concurrently.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use async_compression::tokio::bufread::DeflateDecoder;
use time::PrimitiveDateTime;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};
use tracing::trace;

use super::crypto::{ENCRYPTION_HEADER_SIZE, ZipCrypto, ZipCryptoReader, check_byte};
use super::extra::{ExtraFields, Zip64Sentinels};
use super::parser::apply_bias;
use super::pull::PullStream;
use super::structures::{
    CentralDirectoryHeader, CompressionMethod, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED, FLAG_UTF8,
    LocalFileHeader,
};
use crate::error::{Error, Result};
use crate::io::Source;

/// Decrypted and decompressed entry contents.
pub type EntryReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One central directory record, with everything needed to stream it.
#[derive(Clone)]
pub struct Entry {
    /// Entry name; lossily decoded when the name is not flagged UTF-8.
    pub path: String,
    /// Name bytes exactly as stored.
    pub raw_path: Vec<u8>,
    /// Name and comment are flagged as UTF-8.
    pub is_unicode: bool,
    pub kind: EntryKind,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub mod_time: u16,
    pub mod_date: u16,
    pub last_modified: Option<PrimitiveDateTime>,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub disk_number: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    /// Local header position, including any container header bias.
    pub local_header_offset: u64,
    pub extra: ExtraFields,
    pub comment: Vec<u8>,
    source: Arc<dyn Source>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("compression_method", &self.compression_method)
            .field("compressed_size", &self.compressed_size)
            .field("uncompressed_size", &self.uncompressed_size)
            .field("crc32", &format_args!("{:#010x}", self.crc32))
            .field("local_header_offset", &self.local_header_offset)
            .finish_non_exhaustive()
    }
}

/// Fields the body is framed with, taken from whichever header is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Framing {
    pub flags: u16,
    pub compression_method: u16,
    pub mod_time: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl Framing {
    /// The directory record is authoritative whenever it knows the
    /// compressed size; local header sizes may be zero for streamed entries.
    pub(crate) fn reconcile(
        entry: &Entry,
        local: &LocalFileHeader,
        local_extra: &ExtraFields,
    ) -> Self {
        if entry.compressed_size != 0 {
            return Self {
                flags: entry.flags,
                compression_method: entry.compression_method.into(),
                mod_time: entry.mod_time,
                crc32: entry.crc32,
                compressed_size: entry.compressed_size,
                uncompressed_size: entry.uncompressed_size,
            };
        }

        let (zip64_uncompressed, zip64_compressed, _) = local_extra.zip64().unwrap_or_default();
        Self {
            flags: local.flags,
            compression_method: local.compression_method,
            mod_time: local.mod_time,
            crc32: local.crc32,
            compressed_size: zip64_compressed.unwrap_or(local.compressed_size as u64),
            uncompressed_size: zip64_uncompressed.unwrap_or(local.uncompressed_size as u64),
        }
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub(crate) fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

impl Entry {
    pub(crate) fn from_directory(
        header: &CentralDirectoryHeader,
        raw_path: Vec<u8>,
        extra: ExtraFields,
        comment: Vec<u8>,
        bias: u64,
        source: Arc<dyn Source>,
    ) -> Result<Self> {
        let (zip64_uncompressed, zip64_compressed, zip64_offset) =
            extra.zip64().unwrap_or_default();
        let uncompressed_size = zip64_uncompressed.unwrap_or(header.uncompressed_size as u64);
        let compressed_size = zip64_compressed.unwrap_or(header.compressed_size as u64);
        let local_header_offset = apply_bias(
            "local header offset",
            zip64_offset.unwrap_or(header.local_header_offset as u64),
            bias,
        )?;

        let is_unicode = header.flags & FLAG_UTF8 != 0;
        let path = String::from_utf8_lossy(&raw_path).into_owned();
        let kind = if uncompressed_size == 0 && matches!(raw_path.last(), Some(b'/' | b'\\')) {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        Ok(Self {
            path,
            raw_path,
            is_unicode,
            kind,
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            flags: header.flags,
            compression_method: CompressionMethod::from(header.compression_method),
            mod_time: header.mod_time,
            mod_date: header.mod_date,
            last_modified: super::datetime::dos_to_datetime(header.mod_date, header.mod_time),
            crc32: header.crc32,
            compressed_size,
            uncompressed_size,
            disk_number: header.disk_number,
            internal_attrs: header.internal_attrs,
            external_attrs: header.external_attrs,
            local_header_offset,
            extra,
            comment,
            source,
        })
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Entry name as a relative filesystem path.
    ///
    /// Names not flagged UTF-8 keep their raw bytes on Unix.
    pub fn fs_path(&self) -> PathBuf {
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            if !self.is_unicode {
                return PathBuf::from(std::ffi::OsStr::from_bytes(&self.raw_path));
            }
        }
        PathBuf::from(&self.path)
    }

    /// Comment decoded as text.
    pub fn comment_text(&self) -> String {
        String::from_utf8_lossy(&self.comment).into_owned()
    }

    /// Open the entry's contents.
    ///
    /// Fails with [`Error::MissingPassword`] or [`Error::BadPassword`] before
    /// any data is produced when the entry is encrypted.
    pub async fn stream(&self, password: Option<&str>) -> Result<EntryReader> {
        let fixed_size = LocalFileHeader::SIZE as u64;
        let raw = self
            .source
            .stream_logical(self.local_header_offset, Some(fixed_size))
            .await?;
        let local = LocalFileHeader::parse(
            &PullStream::new(raw, "local file header")
                .pull(LocalFileHeader::SIZE)
                .await?,
        )?;

        // Name, extra field and body are fetched as one exact range when the
        // directory record knows the compressed size.
        let variable_start = self
            .local_header_offset
            .checked_add(fixed_size)
            .ok_or_else(|| {
                Error::offset_overflow(
                    "local file header",
                    self.local_header_offset,
                    u64::MAX - fixed_size,
                )
            })?;
        let variable = local.name_length as u64 + local.extra_length as u64;
        let raw = self
            .source
            .stream_logical(variable_start, Some(variable.saturating_add(self.compressed_size)))
            .await?;
        let mut file = PullStream::new(raw, "local file header");

        file.pull(local.name_length as usize).await?;
        let local_extra = ExtraFields::parse(
            &file.pull(local.extra_length as usize).await?,
            Zip64Sentinels::from_sizes(local.uncompressed_size, local.compressed_size),
        )?;

        let mut framing = Framing::reconcile(self, &local, &local_extra);
        if self.compressed_size == 0 && framing.compressed_size != 0 {
            // Only the local header knew the size; open the body on its own.
            let raw = self
                .source
                .stream_logical(
                    variable_start.saturating_add(variable),
                    Some(framing.compressed_size),
                )
                .await?;
            file = PullStream::new(raw, "entry data");
        }
        file.set_context("entry data");

        let cipher = if framing.is_encrypted() {
            let header = file.pull(ENCRYPTION_HEADER_SIZE).await?;
            let cipher = self.unlock(password, &header, &framing)?;
            framing.compressed_size = framing
                .compressed_size
                .saturating_sub(ENCRYPTION_HEADER_SIZE as u64);
            Some(cipher)
        } else {
            None
        };

        trace!(
            path = %self.path,
            compressed = framing.compressed_size,
            encrypted = cipher.is_some(),
            "opening entry body"
        );

        let body = file.into_reader().take(framing.compressed_size);
        let body: EntryReader = match cipher {
            Some(cipher) => Box::pin(ZipCryptoReader::new(body, cipher)),
            None => Box::pin(body),
        };

        let plain: EntryReader = match CompressionMethod::from(framing.compression_method) {
            CompressionMethod::Stored => body,
            CompressionMethod::Deflate => Box::pin(DeflateDecoder::new(BufReader::new(body))),
            CompressionMethod::Unknown(method) => {
                return Err(Error::UnsupportedCompression {
                    method,
                    path: self.path.clone(),
                });
            }
        };

        Ok(Box::pin(Crc32Reader::new(plain, framing.crc32, self.path.clone())))
    }

    /// Read the whole entry into memory.
    pub async fn buffer(&self, password: Option<&str>) -> Result<Vec<u8>> {
        let mut reader = self.stream(password).await?;
        let mut data = Vec::with_capacity(self.uncompressed_size.min(1 << 24) as usize);
        reader.read_to_end(&mut data).await?;
        Ok(data)
    }

    fn unlock(
        &self,
        password: Option<&str>,
        header: &[u8],
        framing: &Framing,
    ) -> Result<ZipCrypto> {
        let password = password.ok_or_else(|| Error::MissingPassword {
            path: self.path.clone(),
        })?;

        let mut header: [u8; ENCRYPTION_HEADER_SIZE] =
            header.try_into().map_err(|_| Error::StructuralDesync {
                context: "encryption header",
                expected: ENCRYPTION_HEADER_SIZE as u64,
                available: header.len() as u64,
            })?;

        let mut cipher = ZipCrypto::new(password.as_bytes());
        let check = check_byte(framing.has_data_descriptor(), framing.mod_time, framing.crc32);
        if !cipher.verify_header(&mut header, check) {
            return Err(Error::BadPassword {
                path: self.path.clone(),
            });
        }
        Ok(cipher)
    }
}

/// Verifies the CRC32 of everything read once the inner reader is exhausted.
struct Crc32Reader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    expected: u32,
    path: String,
    checked: bool,
}

impl<R> Crc32Reader<R> {
    fn new(inner: R, expected: u32, path: String) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            expected,
            path,
            checked: false,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Crc32Reader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        let had_room = buf.remaining() > 0;
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        let read = &buf.filled()[before..];
        if !read.is_empty() {
            this.hasher.update(read);
        } else if had_room && !this.checked {
            this.checked = true;
            let actual = this.hasher.clone().finalize();
            if actual != this.expected {
                return Poll::Ready(Err(Error::CrcMismatch {
                    path: this.path.clone(),
                    expected: this.expected,
                    actual,
                }
                .into()));
            }
        }
        Poll::Ready(Ok(()))
    }
}
