//! Fixed-width record decoding.
//!
//! Every fixed part of a ZIP structure is described by an ordered [`Layout`]
//! of little-endian fields. The central directory header and the local file
//! header share this decoder, so the two can never disagree about where a
//! field lives.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};

/// One little-endian field of a fixed record.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub width: usize,
}

pub const fn field(name: &'static str, width: usize) -> Field {
    Field { name, width }
}

/// Ordered fields of a fixed record.
pub type Layout<const N: usize> = [Field; N];

/// Total byte size of a layout.
pub const fn layout_size<const N: usize>(layout: &Layout<N>) -> usize {
    let mut size = 0;
    let mut i = 0;
    while i < N {
        size += layout[i].width;
        i += 1;
    }
    size
}

/// Decode `data` according to `layout`, one value per field.
///
/// `context` names the record in the error raised when `data` is too short.
pub fn decode<const N: usize>(
    context: &'static str,
    layout: &Layout<N>,
    data: &[u8],
) -> Result<[u64; N]> {
    let needed = layout_size(layout);
    if data.len() < needed {
        return Err(Error::StructuralDesync {
            context,
            expected: needed as u64,
            available: data.len() as u64,
        });
    }

    let mut cursor = Cursor::new(data);
    let mut values = [0u64; N];
    for (value, field) in values.iter_mut().zip(layout) {
        *value = match field.width {
            1 => cursor.read_u8()? as u64,
            2 => cursor.read_u16::<LittleEndian>()? as u64,
            4 => cursor.read_u32::<LittleEndian>()? as u64,
            8 => cursor.read_u64::<LittleEndian>()?,
            width => unreachable!("field {} has unsupported width {width}", field.name),
        };
    }
    Ok(values)
}
