//! Extra field sub-records.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::BTreeMap;
use std::io::Cursor;

use super::structures::ZIP64_SENTINEL_U32;
use crate::error::{Error, Result};

pub const ZIP64_EXTRA_ID: u16 = 0x0001;
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;

/// A decoded extra field sub-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Zip64 extended information. A value is present only when the matching
    /// 32-bit field of the header holds the sentinel.
    Zip64 {
        uncompressed_size: Option<u64>,
        compressed_size: Option<u64>,
        local_header_offset: Option<u64>,
        disk_start: Option<u32>,
    },
    /// Unix modification time in seconds.
    ExtendedTimestamp { modified: Option<i64> },
    Unknown(Vec<u8>),
}

/// Which 32-bit header fields overflowed, in the order Zip64 values follow.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zip64Sentinels {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub local_header_offset: bool,
    pub disk_start: bool,
}

impl Zip64Sentinels {
    pub fn from_sizes(uncompressed: u32, compressed: u32) -> Self {
        Self {
            uncompressed_size: uncompressed == ZIP64_SENTINEL_U32,
            compressed_size: compressed == ZIP64_SENTINEL_U32,
            ..Self::default()
        }
    }
}

/// Extra field sub-records keyed by their 2-byte id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields(BTreeMap<u16, ExtraField>);

impl ExtraFields {
    pub fn parse(data: &[u8], sentinels: Zip64Sentinels) -> Result<Self> {
        let mut fields = BTreeMap::new();
        let mut cursor = Cursor::new(data);

        while (cursor.position() as usize) + 4 <= data.len() {
            let id = cursor.read_u16::<LittleEndian>()?;
            let len = cursor.read_u16::<LittleEndian>()? as usize;
            let start = cursor.position() as usize;
            let Some(body) = data.get(start..start + len) else {
                return Err(Error::StructuralDesync {
                    context: "extra field",
                    expected: len as u64,
                    available: (data.len() - start) as u64,
                });
            };

            let field = match id {
                ZIP64_EXTRA_ID => parse_zip64(body, sentinels)?,
                EXTENDED_TIMESTAMP_ID => parse_timestamp(body),
                _ => ExtraField::Unknown(body.to_vec()),
            };
            fields.insert(id, field);
            cursor.set_position((start + len) as u64);
        }

        Ok(Self(fields))
    }

    pub fn get(&self, id: u16) -> Option<&ExtraField> {
        self.0.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &ExtraField)> {
        self.0.iter().map(|(id, field)| (*id, field))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values carried by the Zip64 sub-record, if any.
    pub fn zip64(&self) -> Option<(Option<u64>, Option<u64>, Option<u64>)> {
        match self.get(ZIP64_EXTRA_ID) {
            Some(ExtraField::Zip64 {
                uncompressed_size,
                compressed_size,
                local_header_offset,
                ..
            }) => Some((*uncompressed_size, *compressed_size, *local_header_offset)),
            _ => None,
        }
    }

    pub fn modified_unix(&self) -> Option<i64> {
        match self.get(EXTENDED_TIMESTAMP_ID) {
            Some(ExtraField::ExtendedTimestamp { modified }) => *modified,
            _ => None,
        }
    }
}

fn parse_zip64(body: &[u8], sentinels: Zip64Sentinels) -> Result<ExtraField> {
    let mut cursor = Cursor::new(body);
    let mut next_u64 = |present: bool| -> Result<Option<u64>> {
        if !present {
            return Ok(None);
        }
        let available = (body.len() as u64).saturating_sub(cursor.position());
        cursor
            .read_u64::<LittleEndian>()
            .map(Some)
            .map_err(|_| Error::StructuralDesync {
                context: "zip64 extra field",
                expected: 8,
                available,
            })
    };

    let uncompressed_size = next_u64(sentinels.uncompressed_size)?;
    let compressed_size = next_u64(sentinels.compressed_size)?;
    let local_header_offset = next_u64(sentinels.local_header_offset)?;
    // Disk start is optional even when flagged; a short record just omits it.
    let disk_start = if sentinels.disk_start {
        cursor.read_u32::<LittleEndian>().ok()
    } else {
        None
    };

    Ok(ExtraField::Zip64 {
        uncompressed_size,
        compressed_size,
        local_header_offset,
        disk_start,
    })
}

fn parse_timestamp(body: &[u8]) -> ExtraField {
    // Flag byte, then mtime if bit 0 is set.
    let modified = match body {
        [flags, a, b, c, d, ..] if flags & 0x01 != 0 => {
            Some(i32::from_le_bytes([*a, *b, *c, *d]) as i64)
        }
        _ => None,
    };
    ExtraField::ExtendedTimestamp { modified }
}
