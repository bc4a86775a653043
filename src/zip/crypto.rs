//! Traditional PKWARE encryption.
//!
//! This scheme is cryptographically weak; it is supported only so that
//! existing archives can be read. A 12-byte header precedes the entry data,
//! and its last byte is a check value that lets a wrong password be rejected
//! before any data is produced (with a 1 in 256 chance of a false accept).

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, ReadBuf};

/// Size of the encryption header preceding encrypted entry data.
pub const ENCRYPTION_HEADER_SIZE: usize = 12;

/// Raw CRC-32 step as used by the key schedule (no pre/post inversion).
fn crc32_update(crc: u32, byte: u8) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(!crc);
    hasher.update(&[byte]);
    !hasher.finalize()
}

/// Key state of the traditional stream cipher.
#[derive(Debug, Clone)]
pub struct ZipCrypto {
    keys: [u32; 3],
}

impl ZipCrypto {
    /// Initialize the key state from a password, one byte at a time.
    pub fn new(password: &[u8]) -> Self {
        let mut cipher = Self {
            keys: [0x1234_5678, 0x2345_6789, 0x3456_7890],
        };
        for &byte in password {
            cipher.update(byte);
        }
        cipher
    }

    /// Advance the key state with one plaintext byte.
    pub fn update(&mut self, byte: u8) {
        self.keys[0] = crc32_update(self.keys[0], byte);
        self.keys[1] = self.keys[1]
            .wrapping_add(self.keys[0] & 0xff)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.keys[2] = crc32_update(self.keys[2], (self.keys[1] >> 24) as u8);
    }

    /// Next keystream byte.
    pub fn keystream_byte(&self) -> u8 {
        let temp = (self.keys[2] | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    pub fn decrypt_byte(&mut self, byte: u8) -> u8 {
        let plain = byte ^ self.keystream_byte();
        self.update(plain);
        plain
    }

    pub fn decrypt_in_place(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte = self.decrypt_byte(*byte);
        }
    }

    /// Decrypt the 12-byte encryption header and compare its last byte with
    /// the expected check byte.
    pub fn verify_header(&mut self, header: &mut [u8; ENCRYPTION_HEADER_SIZE], check: u8) -> bool {
        self.decrypt_in_place(header);
        header[ENCRYPTION_HEADER_SIZE - 1] == check
    }
}

/// Check byte for the encryption header: high byte of the modification time
/// when sizes are deferred to a data descriptor, otherwise of the CRC32.
pub fn check_byte(flags_data_descriptor: bool, mod_time: u16, crc32: u32) -> u8 {
    if flags_data_descriptor {
        (mod_time >> 8) as u8
    } else {
        (crc32 >> 24) as u8
    }
}

/// Decrypts an encrypted entry body as it is read.
pub struct ZipCryptoReader<R> {
    inner: R,
    cipher: ZipCrypto,
}

impl<R> ZipCryptoReader<R> {
    pub fn new(inner: R, cipher: ZipCrypto) -> Self {
        Self { inner, cipher }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ZipCryptoReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.cipher.decrypt_in_place(&mut buf.filled_mut()[before..]);
        Poll::Ready(Ok(()))
    }
}
