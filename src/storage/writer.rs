//! Durable whole-file writes of downloaded payloads.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use ferry::storage::{ArtifactWriter, FsArtifactWriter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let writer = FsArtifactWriter::new();
//! writer.write("data/model.xml".as_ref(), Bytes::from_static(b"<root/>")).await?;
//! let back = writer.read("data/model.xml".as_ref()).await?;
//! assert_eq!(&back[..], b"<root/>");
//! # Ok(())
//! # }
//! ```

use crate::item::ErrorKind;

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{fs, fs::OpenOptions, io::AsyncWriteExt};
use tracing::debug;

/// Why a write did not complete.
#[derive(Debug, Error)]
#[error("{kind} for {path:?}")]
pub struct WriteError {
    /// `OpenFailed` or `WriteFailed`.
    pub kind: ErrorKind,
    /// Destination of the write.
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WriteError {
    /// The destination could not be opened or created.
    pub fn open_failed(path: &Path, source: io::Error) -> Self {
        Self {
            kind: ErrorKind::OpenFailed,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The destination was opened but the payload was not fully persisted.
    pub fn write_failed(path: &Path, source: io::Error) -> Self {
        Self {
            kind: ErrorKind::WriteFailed,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Persists payloads to named destinations.
///
/// A write either overwrites the destination from byte zero and makes it
/// durable, or fails. After a failed write the destination content is
/// unspecified and the caller retries the whole write.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Write `bytes` to `path`.
    async fn write(&self, path: &Path, bytes: Bytes) -> Result<(), WriteError>;

    /// Read back what was persisted at `path`.
    async fn read(&self, path: &Path) -> io::Result<Bytes>;
}

/// [`ArtifactWriter`] over the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsArtifactWriter;

impl FsArtifactWriter {
    /// A filesystem writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactWriter for FsArtifactWriter {
    async fn write(&self, path: &Path, bytes: Bytes) -> Result<(), WriteError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            debug!("Creating destination directory {:?}", dir);
            fs::create_dir_all(dir)
                .await
                .map_err(|e| WriteError::open_failed(path, e))?;
        }

        debug!("Writing {} bytes to {:?}", bytes.len(), path);
        // The handle is closed when it goes out of scope, on every path.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| WriteError::open_failed(path, e))?;

        file.write_all(&bytes)
            .await
            .map_err(|e| WriteError::write_failed(path, e))?;
        file.flush()
            .await
            .map_err(|e| WriteError::write_failed(path, e))?;
        file.sync_all()
            .await
            .map_err(|e| WriteError::write_failed(path, e))?;

        Ok(())
    }

    async fn read(&self, path: &Path) -> io::Result<Bytes> {
        fs::read(path).await.map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("model.xml");
        let writer = FsArtifactWriter::new();

        writer
            .write(&path, Bytes::from_static(b"a much longer first payload"))
            .await
            .unwrap();
        writer
            .write(&path, Bytes::from_static(b"short"))
            .await
            .unwrap();

        assert_eq!(&writer.read(&path).await.unwrap()[..], b"short");
    }

    #[tokio::test]
    async fn test_identical_writes_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.xml");
        let writer = FsArtifactWriter::new();
        let payload = Bytes::from_static(b"<model><item/></model>");

        writer.write(&path, payload.clone()).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        writer.write(&path, payload).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a file.
        let err = FsArtifactWriter::new()
            .write(dir.path(), Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::OpenFailed);
        assert_eq!(err.path, dir.path());
    }

    #[tokio::test]
    async fn test_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let err = FsArtifactWriter::new()
            .write(&blocker.join("model.xml"), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::OpenFailed);
    }
}
