use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{ByteStream, Source, SourceOptions};
use crate::error::Result;

/// Local file source; every stream opens its own handle so entries can be
/// read concurrently.
pub struct LocalFileSource {
    path: PathBuf,
    size: u64,
    options: SourceOptions,
}

impl LocalFileSource {
    pub fn new(path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            size,
            options: SourceOptions::default(),
        })
    }

    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Source for LocalFileSource {
    fn size(&self) -> u64 {
        self.size
    }

    async fn stream(&self, offset: u64, length: Option<u64>) -> Result<ByteStream> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let length = length.unwrap_or_else(|| self.size.saturating_sub(offset));
        Ok(Box::pin(file.take(length)))
    }

    fn opts(&self) -> SourceOptions {
        self.options
    }
}
