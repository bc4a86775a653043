use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;

use super::{ByteStream, Source, SourceOptions};
use crate::error::Result;

/// In-memory archive bytes
pub struct MemorySource {
    data: Arc<[u8]>,
    options: SourceOptions,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            options: SourceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Source for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn stream(&self, offset: u64, length: Option<u64>) -> Result<ByteStream> {
        let len = self.data.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
        let end = match length {
            Some(length) => start.saturating_add(usize::try_from(length).unwrap_or(usize::MAX)),
            None => len,
        }
        .min(len);

        Ok(Box::pin(Cursor::new(self.data[start..end].to_vec())))
    }

    fn opts(&self) -> SourceOptions {
        self.options
    }
}
