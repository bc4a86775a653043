//! Typed ZIP records.
//!
//! Each record is decoded through its [`Layout`] and validated against its
//! signature. Values read from the archive are kept as stored; bias and Zip64
//! overrides are applied by the parser, never inside these types.

use super::schema::{Layout, decode, field, layout_size};
use crate::error::{Error, Result};

/// Sentinel for a 16-bit field that overflowed into Zip64.
pub const ZIP64_SENTINEL_U16: u16 = 0xFFFF;
/// Sentinel for a 32-bit field that overflowed into Zip64.
pub const ZIP64_SENTINEL_U32: u32 = 0xFFFF_FFFF;

/// General purpose flag: entry is encrypted with traditional encryption.
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag: sizes and CRC follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Compression method id of an entry. Only the methods that can be
/// decoded get their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(id: u16) -> Self {
        match id {
            0 => Self::Stored,
            8 => Self::Deflate,
            other => Self::Unknown(other),
        }
    }
}

impl From<CompressionMethod> for u16 {
    fn from(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(id) => id,
        }
    }
}

fn check_signature(record: &'static str, expected: u32, found: u64) -> Result<()> {
    if found != expected as u64 {
        return Err(Error::MalformedSignature {
            record,
            found: Some(found as u32),
        });
    }
    Ok(())
}

/// Optional CRX (browser extension package) header in front of the ZIP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrxHeader {
    pub version: u32,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    /// Bytes occupied by the header; every archive offset is shifted by this.
    pub size: u64,
}

impl CrxHeader {
    pub const MAGIC: u32 = 0x3432_7243;
    pub const MAGIC_SIZE: usize = 4;
    pub const LAYOUT: Layout<3> = [
        field("version", 4),
        field("public_key_length", 4),
        field("signature_length", 4),
    ];
    pub const FIXED_SIZE: usize = Self::MAGIC_SIZE + layout_size(&Self::LAYOUT);

    /// Lengths of the public key and signature that follow the fixed part.
    pub fn parse_lengths(data: &[u8]) -> Result<(u32, u32, u32)> {
        let [version, key_len, sig_len] = decode("container header", &Self::LAYOUT, data)?;
        Ok((version as u32, key_len as u32, sig_len as u32))
    }

    pub fn new(version: u32, mut key_and_signature: Vec<u8>, key_len: usize) -> Self {
        let signature = key_and_signature.split_off(key_len.min(key_and_signature.len()));
        let size = (Self::FIXED_SIZE + key_and_signature.len() + signature.len()) as u64;
        Self {
            version,
            public_key: key_and_signature,
            signature,
            size,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes plus comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_start: u16,
    pub records_on_disk: u16,
    pub total_records: u16,
    pub directory_size: u32,
    pub directory_offset: u32,
    pub comment_length: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const LAYOUT: Layout<8> = [
        field("signature", 4),
        field("disk_number", 2),
        field("disk_start", 2),
        field("records_on_disk", 2),
        field("total_records", 2),
        field("directory_size", 4),
        field("directory_offset", 4),
        field("comment_length", 2),
    ];
    pub const SIZE: usize = layout_size(&Self::LAYOUT);

    pub fn parse(data: &[u8]) -> Result<Self> {
        let [sig, disk, start, on_disk, total, size, offset, comment] =
            decode("end of central directory", &Self::LAYOUT, data)?;
        check_signature("end of central directory", Self::SIGNATURE, sig)?;

        Ok(Self {
            disk_number: disk as u16,
            disk_start: start as u16,
            records_on_disk: on_disk as u16,
            total_records: total as u16,
            directory_size: size as u32,
            directory_offset: offset as u32,
            comment_length: comment as u16,
        })
    }

    /// Whether the record defers to a Zip64 end record.
    pub fn is_zip64(&self) -> bool {
        self.disk_number == ZIP64_SENTINEL_U16
            || self.total_records == ZIP64_SENTINEL_U16
            || self.directory_offset == ZIP64_SENTINEL_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64Locator {
    pub disk_number: u32,
    pub zip64_directory_offset: u64,
    pub number_of_disks: u32,
}

impl Zip64Locator {
    pub const SIGNATURE: u32 = 0x0706_4b50;
    pub const LAYOUT: Layout<4> = [
        field("signature", 4),
        field("disk_number", 4),
        field("zip64_directory_offset", 8),
        field("number_of_disks", 4),
    ];
    pub const SIZE: usize = layout_size(&Self::LAYOUT);

    pub fn parse(data: &[u8]) -> Result<Self> {
        let [sig, disk, offset, disks] = decode("zip64 locator", &Self::LAYOUT, data)?;
        check_signature("zip64 locator", Self::SIGNATURE, sig)?;

        Ok(Self {
            disk_number: disk as u32,
            zip64_directory_offset: offset,
            number_of_disks: disks as u32,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zip64EndOfCentralDirectory {
    pub record_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_start: u32,
    pub records_on_disk: u64,
    pub total_records: u64,
    pub directory_size: u64,
    pub directory_offset: u64,
}

impl Zip64EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0606_4b50;
    pub const LAYOUT: Layout<10> = [
        field("signature", 4),
        field("record_size", 8),
        field("version_made_by", 2),
        field("version_needed", 2),
        field("disk_number", 4),
        field("disk_start", 4),
        field("records_on_disk", 8),
        field("total_records", 8),
        field("directory_size", 8),
        field("directory_offset", 8),
    ];
    pub const SIZE: usize = layout_size(&Self::LAYOUT);

    pub fn parse(data: &[u8]) -> Result<Self> {
        let [sig, record_size, made_by, needed, disk, start, on_disk, total, size, offset] =
            decode("zip64 end of central directory", &Self::LAYOUT, data)?;
        check_signature("zip64 end of central directory", Self::SIGNATURE, sig)?;

        Ok(Self {
            record_size,
            version_made_by: made_by as u16,
            version_needed: needed as u16,
            disk_number: disk as u32,
            disk_start: start as u32,
            records_on_disk: on_disk,
            total_records: total,
            directory_size: size,
            directory_offset: offset,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes plus name/extra/comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_length: u16,
    pub extra_length: u16,
    pub comment_length: u16,
    pub disk_number: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = 0x0201_4b50;
    pub const LAYOUT: Layout<17> = [
        field("signature", 4),
        field("version_made_by", 2),
        field("version_needed", 2),
        field("flags", 2),
        field("compression_method", 2),
        field("mod_time", 2),
        field("mod_date", 2),
        field("crc32", 4),
        field("compressed_size", 4),
        field("uncompressed_size", 4),
        field("name_length", 2),
        field("extra_length", 2),
        field("comment_length", 2),
        field("disk_number", 2),
        field("internal_attrs", 2),
        field("external_attrs", 4),
        field("local_header_offset", 4),
    ];
    pub const SIZE: usize = layout_size(&Self::LAYOUT);

    pub fn parse(data: &[u8]) -> Result<Self> {
        let [
            sig,
            made_by,
            needed,
            flags,
            method,
            time,
            date,
            crc,
            csize,
            usize_,
            name_len,
            extra_len,
            comment_len,
            disk,
            internal,
            external,
            offset,
        ] = decode("central directory header", &Self::LAYOUT, data)?;
        check_signature("central directory header", Self::SIGNATURE, sig)?;

        Ok(Self {
            version_made_by: made_by as u16,
            version_needed: needed as u16,
            flags: flags as u16,
            compression_method: method as u16,
            mod_time: time as u16,
            mod_date: date as u16,
            crc32: crc as u32,
            compressed_size: csize as u32,
            uncompressed_size: usize_ as u32,
            name_length: name_len as u16,
            extra_length: extra_len as u16,
            comment_length: comment_len as u16,
            disk_number: disk as u16,
            internal_attrs: internal as u16,
            external_attrs: external as u32,
            local_header_offset: offset as u32,
        })
    }
}

/// Local File Header (LFH) - 30 bytes plus name/extra
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_length: u16,
    pub extra_length: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x0403_4b50;
    pub const LAYOUT: Layout<11> = [
        field("signature", 4),
        field("version_needed", 2),
        field("flags", 2),
        field("compression_method", 2),
        field("mod_time", 2),
        field("mod_date", 2),
        field("crc32", 4),
        field("compressed_size", 4),
        field("uncompressed_size", 4),
        field("name_length", 2),
        field("extra_length", 2),
    ];
    pub const SIZE: usize = layout_size(&Self::LAYOUT);

    pub fn parse(data: &[u8]) -> Result<Self> {
        let [sig, needed, flags, method, time, date, crc, csize, usize_, name_len, extra_len] =
            decode("local file header", &Self::LAYOUT, data)?;
        check_signature("local file header", Self::SIGNATURE, sig)?;

        Ok(Self {
            version_needed: needed as u16,
            flags: flags as u16,
            compression_method: method as u16,
            mod_time: time as u16,
            mod_date: date as u16,
            crc32: crc as u32,
            compressed_size: csize as u32,
            uncompressed_size: usize_ as u32,
            name_length: name_len as u16,
            extra_length: extra_len as u16,
        })
    }
}

/// Trailer records that describe where the central directory lives.
///
/// A Zip64 end record supersedes the record count, directory size and
/// directory offset of the base record; the comment always comes from the
/// base record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryRecord {
    Standard(EndOfCentralDirectory),
    Zip64 {
        eocd: EndOfCentralDirectory,
        locator: Zip64Locator,
        record: Zip64EndOfCentralDirectory,
    },
}

impl DirectoryRecord {
    pub fn eocd(&self) -> &EndOfCentralDirectory {
        match self {
            DirectoryRecord::Standard(eocd) | DirectoryRecord::Zip64 { eocd, .. } => eocd,
        }
    }

    pub fn is_zip64(&self) -> bool {
        matches!(self, DirectoryRecord::Zip64 { .. })
    }

    pub fn total_records(&self) -> u64 {
        match self {
            DirectoryRecord::Standard(eocd) => eocd.total_records as u64,
            DirectoryRecord::Zip64 { record, .. } => record.total_records,
        }
    }

    pub fn directory_size(&self) -> u64 {
        match self {
            DirectoryRecord::Standard(eocd) => eocd.directory_size as u64,
            DirectoryRecord::Zip64 { record, .. } => record.directory_size,
        }
    }

    /// Directory offset as stored, before any container bias.
    pub fn directory_offset(&self) -> u64 {
        match self {
            DirectoryRecord::Standard(eocd) => eocd.directory_offset as u64,
            DirectoryRecord::Zip64 { record, .. } => record.directory_offset,
        }
    }
}
