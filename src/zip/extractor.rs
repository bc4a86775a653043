use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::entry::Entry;
use crate::error::{Error, Result};

/// Destination for one extracted entry.
pub type EntryWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Creates the writer each extracted entry is piped into.
#[async_trait]
pub trait WriterFactory: Send + Sync {
    async fn create(&self, path: &Path) -> Result<EntryWriter>;
}

/// Writes entries as regular files, creating parent directories as needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriterFactory;

#[async_trait]
impl WriterFactory for FsWriterFactory {
    async fn create(&self, path: &Path) -> Result<EntryWriter> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(Box::new(fs::File::create(path).await?))
    }
}

/// Options for [`Archive::extract`](super::Archive::extract).
#[derive(Clone)]
pub struct ExtractOptions {
    /// Destination root; required.
    pub path: Option<PathBuf>,
    pub password: Option<String>,
    /// Entries extracted at once; values below 1 are treated as 1.
    pub concurrency: usize,
    /// Defaults to [`FsWriterFactory`].
    pub writer_factory: Option<Arc<dyn WriterFactory>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            path: None,
            password: None,
            concurrency: 1,
            writer_factory: None,
        }
    }
}

impl fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("concurrency", &self.concurrency)
            .field("custom_writer", &self.writer_factory.is_some())
            .finish()
    }
}

impl ExtractOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn writer_factory(mut self, factory: Arc<dyn WriterFactory>) -> Self {
        self.writer_factory = Some(factory);
        self
    }
}

/// Lexically resolve `.` and `..` components. `..` never climbs above the
/// root or prefix.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push(component);
                }
            }
            Component::Normal(name) => normalized.push(name),
        }
    }
    normalized
}

/// Where `entry_path` lands under `root`, or `None` if it would escape it.
///
/// `root` must already be absolute and normalized.
pub fn resolve_target(root: &Path, entry_path: &Path) -> Option<PathBuf> {
    let candidate = normalize_path(&root.join(entry_path));
    (candidate.starts_with(root) && candidate != root).then_some(candidate)
}

pub(crate) async fn extract_entries(entries: &[Entry], options: ExtractOptions) -> Result<()> {
    let root = options.path.as_deref().ok_or(Error::PathMissing)?;
    let root = normalize_path(&std::path::absolute(root)?);
    let concurrency = options.concurrency.max(1);
    let factory: Arc<dyn WriterFactory> = match options.writer_factory {
        Some(factory) => factory,
        None => Arc::new(FsWriterFactory),
    };
    let password: Option<Arc<str>> = options.password.map(Arc::from);

    let jobs: Vec<(Entry, PathBuf)> = entries
        .iter()
        .filter(|entry| !entry.is_directory())
        .filter_map(|entry| match resolve_target(&root, &entry.fs_path()) {
            Some(target) => Some((entry.clone(), target)),
            None => {
                warn!(path = %entry.path, "skipping entry outside the destination");
                None
            }
        })
        .collect();
    debug!(
        entries = jobs.len(),
        concurrency,
        root = %root.display(),
        "extracting"
    );

    // Each entry runs as its own task. Returning early drops the handles,
    // which detaches tasks already running instead of aborting them.
    let mut running = futures::stream::iter(jobs)
        .map(|(entry, target)| {
            let factory = Arc::clone(&factory);
            let password = password.clone();
            tokio::spawn(async move {
                extract_one(&entry, &target, password.as_deref(), factory.as_ref()).await
            })
        })
        .buffer_unordered(concurrency);

    while let Some(joined) = running.next().await {
        joined.map_err(|e| Error::Io(io::Error::other(e)))??;
    }
    Ok(())
}

async fn extract_one(
    entry: &Entry,
    target: &Path,
    password: Option<&str>,
    factory: &dyn WriterFactory,
) -> Result<()> {
    // The stream is opened first so a rejected password creates no file.
    let mut reader = entry.stream(password).await?;
    let mut writer = factory.create(target).await?;

    let written = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;

    debug!(path = %entry.path, bytes = written, "extracted entry");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(
            normalize_path(Path::new("/a/../../../etc")),
            PathBuf::from("/etc")
        );
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_target_rejects_escapes() {
        let root = Path::new("/dest");

        assert_eq!(
            resolve_target(root, Path::new("dir/file.txt")),
            Some(PathBuf::from("/dest/dir/file.txt"))
        );
        assert_eq!(
            resolve_target(root, Path::new("dir/../file.txt")),
            Some(PathBuf::from("/dest/file.txt"))
        );
        assert_eq!(resolve_target(root, Path::new("../../etc/passwd")), None);
        assert_eq!(resolve_target(root, Path::new("/etc/passwd")), None);
        assert_eq!(resolve_target(root, Path::new("dir/../..")), None);
        assert_eq!(resolve_target(root, Path::new(".")), None);
        // A sibling sharing the root's name as a prefix is still outside.
        assert_eq!(resolve_target(root, Path::new("../dest-evil/x")), None);
    }

    #[tokio::test]
    async fn test_missing_path_is_rejected() {
        let err = extract_entries(&[], ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PathMissing));
    }

    #[tokio::test]
    async fn test_fs_writer_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/file.bin");

        let mut writer = FsWriterFactory.create(&target).await.unwrap();
        writer.write_all(b"payload").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
    }
}
