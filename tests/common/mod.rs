//! Hand-built ZIP archives for integration tests.

#![allow(dead_code)]

use std::io::Write;

use tailzip::zip::{ZipCrypto, check_byte};

pub const FLAG_ENCRYPTED: u16 = 0x0001;
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
pub const FLAG_UTF8: u16 = 0x0800;

/// 2021-03-14
pub const MOD_DATE: u16 = (41 << 9) | (3 << 5) | 14;
/// 15:09:26
pub const MOD_TIME: u16 = (15 << 11) | (9 << 5) | 13;

/// Filler bytes of the encryption header before the check byte.
pub const ENCRYPTION_FILLER: [u8; 11] = [
    0x5a, 0x13, 0xc7, 0x02, 0x99, 0x41, 0xee, 0x70, 0x08, 0xb3, 0x6d,
];

#[derive(Debug, Clone)]
pub struct TestEntry {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
    pub method: u16,
    pub password: Option<String>,
    pub data_descriptor: bool,
    pub utf8: bool,
    pub comment: Vec<u8>,
    /// Directory record carries zero sizes; only the local header frames the body.
    pub local_sizes_only: bool,
    /// Local header carries 0xFFFFFFFF sizes and a Zip64 extra with the real ones.
    pub local_zip64: bool,
}

impl TestEntry {
    pub fn stored(name: impl AsRef<[u8]>, data: impl AsRef<[u8]>) -> Self {
        Self {
            name: name.as_ref().to_vec(),
            data: data.as_ref().to_vec(),
            method: 0,
            password: None,
            data_descriptor: false,
            utf8: true,
            comment: Vec::new(),
            local_sizes_only: false,
            local_zip64: false,
        }
    }

    pub fn deflated(name: impl AsRef<[u8]>, data: impl AsRef<[u8]>) -> Self {
        Self {
            method: 8,
            ..Self::stored(name, data)
        }
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn data_descriptor(mut self) -> Self {
        self.data_descriptor = true;
        self
    }

    pub fn method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    pub fn raw_name(mut self) -> Self {
        self.utf8 = false;
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    pub fn local_sizes_only(mut self) -> Self {
        self.local_sizes_only = true;
        self
    }

    pub fn local_zip64(mut self) -> Self {
        self.local_zip64 = true;
        self
    }

    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.password.is_some() {
            flags |= FLAG_ENCRYPTED;
        }
        if self.data_descriptor {
            flags |= FLAG_DATA_DESCRIPTOR;
        }
        if self.utf8 {
            flags |= FLAG_UTF8;
        }
        flags
    }

    pub fn crc(&self) -> u32 {
        crc32fast::hash(&self.data)
    }

    fn compressed(&self) -> Vec<u8> {
        match self.method {
            8 => {
                let mut encoder =
                    flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&self.data).unwrap();
                encoder.finish().unwrap()
            }
            _ => self.data.clone(),
        }
    }

    /// Body as stored in the archive, encryption header included.
    fn payload(&self) -> Vec<u8> {
        let compressed = self.compressed();
        let Some(password) = &self.password else {
            return compressed;
        };

        let mut plain = ENCRYPTION_FILLER.to_vec();
        plain.push(check_byte(self.data_descriptor, MOD_TIME, self.crc()));
        plain.extend_from_slice(&compressed);

        let mut cipher = ZipCrypto::new(password.as_bytes());
        plain
            .into_iter()
            .map(|p| {
                let c = p ^ cipher.keystream_byte();
                cipher.update(p);
                c
            })
            .collect()
    }
}

/// Builds a complete archive from [`TestEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct ZipBuilder {
    entries: Vec<TestEntry>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: TestEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(TestEntry::stored(name, data))
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    /// Write the trailer through a Zip64 end record with sentinels in the
    /// EOCD, and move entry sizes and offsets into Zip64 extra fields.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::new();
        let mut payload_sizes = Vec::new();

        for entry in &self.entries {
            offsets.push(out.len() as u64);
            let payload = entry.payload();
            payload_sizes.push(payload.len() as u64);

            let mut local_extra = Vec::new();
            let (crc, csize, usize_) = if entry.data_descriptor {
                (0, 0, 0)
            } else if entry.local_zip64 {
                put_u16(&mut local_extra, 0x0001);
                put_u16(&mut local_extra, 16);
                put_u64(&mut local_extra, entry.data.len() as u64);
                put_u64(&mut local_extra, payload.len() as u64);
                (entry.crc(), 0xFFFF_FFFF, 0xFFFF_FFFF)
            } else {
                (entry.crc(), payload.len() as u32, entry.data.len() as u32)
            };

            put_u32(&mut out, 0x0403_4b50);
            put_u16(&mut out, 20);
            put_u16(&mut out, entry.flags());
            put_u16(&mut out, entry.method);
            put_u16(&mut out, MOD_TIME);
            put_u16(&mut out, MOD_DATE);
            put_u32(&mut out, crc);
            put_u32(&mut out, csize);
            put_u32(&mut out, usize_);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, local_extra.len() as u16);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&local_extra);
            out.extend_from_slice(&payload);

            if entry.data_descriptor {
                put_u32(&mut out, 0x0807_4b50);
                put_u32(&mut out, entry.crc());
                put_u32(&mut out, payload.len() as u32);
                put_u32(&mut out, entry.data.len() as u32);
            }
        }

        let cd_offset = out.len() as u64;
        for ((entry, offset), payload_size) in self.entries.iter().zip(&offsets).zip(&payload_sizes)
        {
            let (csize, usize_) = if entry.local_sizes_only {
                (0, 0)
            } else {
                (*payload_size, entry.data.len() as u64)
            };
            let mut extra = Vec::new();
            let (csize32, usize32, offset32) = if self.zip64 {
                put_u16(&mut extra, 0x0001);
                put_u16(&mut extra, 24);
                put_u64(&mut extra, usize_);
                put_u64(&mut extra, csize);
                put_u64(&mut extra, *offset);
                (0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFF)
            } else {
                (csize as u32, usize_ as u32, *offset as u32)
            };

            put_u32(&mut out, 0x0201_4b50);
            put_u16(&mut out, 0x031e);
            put_u16(&mut out, if self.zip64 { 45 } else { 20 });
            put_u16(&mut out, entry.flags());
            put_u16(&mut out, entry.method);
            put_u16(&mut out, MOD_TIME);
            put_u16(&mut out, MOD_DATE);
            put_u32(&mut out, entry.crc());
            put_u32(&mut out, csize32);
            put_u32(&mut out, usize32);
            put_u16(&mut out, entry.name.len() as u16);
            put_u16(&mut out, extra.len() as u16);
            put_u16(&mut out, entry.comment.len() as u16);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u32(&mut out, 0o100644 << 16);
            put_u32(&mut out, offset32);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&extra);
            out.extend_from_slice(&entry.comment);
        }
        let cd_size = out.len() as u64 - cd_offset;
        let count = self.entries.len() as u64;

        if self.zip64 {
            let record_offset = out.len() as u64;
            put_u32(&mut out, 0x0606_4b50);
            put_u64(&mut out, 44);
            put_u16(&mut out, 45);
            put_u16(&mut out, 45);
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
            put_u64(&mut out, count);
            put_u64(&mut out, count);
            put_u64(&mut out, cd_size);
            put_u64(&mut out, cd_offset);

            put_u32(&mut out, 0x0706_4b50);
            put_u32(&mut out, 0);
            put_u64(&mut out, record_offset);
            put_u32(&mut out, 1);
        }

        put_u32(&mut out, 0x0605_4b50);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        if self.zip64 {
            put_u16(&mut out, 0xFFFF);
            put_u16(&mut out, 0xFFFF);
            put_u32(&mut out, 0xFFFF_FFFF);
            put_u32(&mut out, 0xFFFF_FFFF);
        } else {
            put_u16(&mut out, count as u16);
            put_u16(&mut out, count as u16);
            put_u32(&mut out, cd_size as u32);
            put_u32(&mut out, cd_offset as u32);
        }
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);

        out
    }
}

/// Prefix `zip` with a CRX2 header carrying the given key and signature.
pub fn crx_wrap(zip: &[u8], public_key: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = b"Cr24".to_vec();
    put_u32(&mut out, 2);
    put_u32(&mut out, public_key.len() as u32);
    put_u32(&mut out, signature.len() as u32);
    out.extend_from_slice(public_key);
    out.extend_from_slice(signature);
    out.extend_from_slice(zip);
    out
}

/// Offset of the first entry's encryption header in a built archive.
pub fn first_encryption_header(archive: &[u8], name_len: usize) -> [u8; 12] {
    let start = 30 + name_len;
    archive[start..start + 12].try_into().unwrap()
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}
