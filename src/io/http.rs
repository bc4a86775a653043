use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::warn;

use super::{ByteStream, Source, SourceOptions};
use crate::error::{Error, Result};

/// HTTP Range source for remote ZIP files
pub struct HttpRangeSource {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
    options: SourceOptions,
}

impl HttpRangeSource {
    /// Create a new HTTP Range source
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        // Send HEAD request to check capabilities
        let resp = client.head(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Source(format!(
                "HTTP request failed with status: {}",
                resp.status()
            )));
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            return Err(Error::Source(
                "remote server does not support Range requests".to_string(),
            ));
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Source("remote server did not return Content-Length".into()))?;

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
            options: SourceOptions::default(),
        })
    }

    pub fn with_options(mut self, options: SourceOptions) -> Self {
        self.options = options;
        self
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    async fn send_range(&self, range: &str) -> Result<reqwest::Response> {
        let mut retry_count = 0;
        loop {
            match self
                .client
                .get(&self.url)
                .header("Range", range)
                .send()
                .await
            {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(Error::Source(format!("max retries exceeded: {e}")));
                    }
                    warn!(
                        "connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Source for HttpRangeSource {
    async fn stream(&self, offset: u64, length: Option<u64>) -> Result<ByteStream> {
        let available = self.size.saturating_sub(offset);
        let length = length.map_or(available, |l| l.min(available));
        if length == 0 {
            return Ok(Box::pin(tokio::io::empty()));
        }

        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let resp = self.send_range(&range).await?;

        if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
            return Err(Error::Source(format!(
                "HTTP request failed with status: {}",
                resp.status()
            )));
        }

        let transferred = Arc::clone(&self.transferred_bytes);
        let body = resp
            .bytes_stream()
            .inspect_ok(move |chunk| {
                transferred.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            })
            .map_err(std::io::Error::other);

        Ok(Box::pin(StreamReader::new(body)))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn opts(&self) -> SourceOptions {
        self.options
    }
}
