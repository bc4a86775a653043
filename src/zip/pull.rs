//! Positional pull interface over a pushed byte stream.
//!
//! ZIP structures are parsed strictly in order: every read depends on how
//! many bytes the previous one consumed. [`PullStream`] hands out exactly the
//! number of bytes asked for, buffering whatever the source delivers beyond
//! that. All methods take `&mut self`, so only one pull can be in flight.

use std::collections::VecDeque;
use std::io::Cursor;

use tokio::io::{AsyncRead, AsyncReadExt, Chain};

use crate::error::{Error, Result};

const READ_CHUNK: usize = 8 * 1024;

pub struct PullStream<R> {
    inner: R,
    buffer: VecDeque<u8>,
    consumed: u64,
    matched: Option<u64>,
    exhausted: bool,
    context: &'static str,
}

impl<R: AsyncRead + Unpin> PullStream<R> {
    /// `context` names the structure being read in truncation errors.
    pub fn new(inner: R, context: &'static str) -> Self {
        Self {
            inner,
            buffer: VecDeque::new(),
            consumed: 0,
            matched: None,
            exhausted: false,
            context,
        }
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Stream position at which the last [`pull_until`](Self::pull_until) matched.
    pub fn matched(&self) -> Option<u64> {
        self.matched
    }

    pub fn set_context(&mut self, context: &'static str) {
        self.context = context;
    }

    async fn fill(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.inner.read(&mut chunk).await?;
        if n == 0 {
            self.exhausted = true;
            return Ok(false);
        }
        self.buffer.extend(&chunk[..n]);
        Ok(true)
    }

    /// Take exactly `n` bytes from the front of the stream.
    pub async fn pull(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.buffer.len() < n {
            if !self.fill().await? {
                return Err(Error::StructuralDesync {
                    context: self.context,
                    expected: n as u64,
                    available: self.buffer.len() as u64,
                });
            }
        }
        self.consumed += n as u64;
        Ok(self.buffer.drain(..n).collect())
    }

    /// Copy of the next `n` bytes without consuming them, or `None` if the
    /// stream ends first.
    pub async fn peek(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        while self.buffer.len() < n {
            if !self.fill().await? {
                return Ok(None);
            }
        }
        Ok(Some(self.buffer.range(..n).copied().collect()))
    }

    /// Discard bytes up to the first occurrence of `signature`.
    ///
    /// The signature itself stays buffered so the next pull starts with it.
    /// Returns the discarded bytes, or `None` if the stream ended first.
    pub async fn pull_until(&mut self, signature: [u8; 4]) -> Result<Option<Vec<u8>>> {
        let mut searched = 0;
        loop {
            let haystack = self.buffer.make_contiguous();
            if let Some(index) = haystack[searched..]
                .windows(signature.len())
                .position(|window| window == signature)
            {
                let index = searched + index;
                self.matched = Some(self.consumed + index as u64);
                self.consumed += index as u64;
                return Ok(Some(self.buffer.drain(..index).collect()));
            }
            // A match may straddle the next chunk boundary.
            searched = haystack.len().saturating_sub(signature.len() - 1);

            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Leftover buffered bytes followed by the unread rest of the stream.
    pub fn into_reader(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(Vec::from(self.buffer)).chain(self.inner)
    }
}
