//! Temporary spool files for intermediate pipeline output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::io::AsyncRead;
use tracing::debug;

use super::error::ContentError;
use super::file::FileContentWriter;
use super::traits::{ContentOutputStream, ContentReader, ContentWriter};

/// A spool file on disk. Deleted when the last share is dropped.
#[derive(Debug)]
pub struct SpoolFile {
    path: TempPath,
    outstanding: Arc<AtomicUsize>,
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug!(path = %self.path.display(), "Discarding spool file");
    }
}

/// Allocates spool writers in a directory and tracks their lifetime.
#[derive(Debug)]
pub struct SpoolProvider {
    dir: PathBuf,
    created: AtomicUsize,
    outstanding: Arc<AtomicUsize>,
}

impl SpoolProvider {
    /// Creates a provider spooling into `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: AtomicUsize::new(0),
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Directory spool files are created in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of spool files created over the provider's life.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of spool files not yet deleted.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Allocates a new spool writer for `mimetype`, named with `extension`.
    pub async fn create_writer(
        &self,
        mimetype: &str,
        extension: &str,
    ) -> Result<SpoolContentWriter, ContentError> {
        if tokio::fs::create_dir_all(&self.dir).await.is_err() {
            return Err(ContentError::SpoolDirectoryFailed {
                path: self.dir.clone(),
            });
        }

        let suffix = format!(".{}", extension);
        let temp = tempfile::Builder::new()
            .prefix("transform-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        let path = temp.into_temp_path();

        self.created.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path.display(), mimetype, "Created spool file");

        let inner = FileContentWriter::new(path.to_path_buf(), mimetype);
        Ok(SpoolContentWriter {
            inner,
            spool: Arc::new(SpoolFile {
                path,
                outstanding: Arc::clone(&self.outstanding),
            }),
        })
    }
}

/// Writer over a spool file. Readers obtained from it share the file.
#[derive(Debug)]
pub struct SpoolContentWriter {
    inner: FileContentWriter,
    spool: Arc<SpoolFile>,
}

impl SpoolContentWriter {
    /// Path of the spool file.
    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

#[async_trait]
impl ContentWriter for SpoolContentWriter {
    fn mimetype(&self) -> &str {
        self.inner.mimetype()
    }

    fn set_mimetype(&mut self, mimetype: &str) {
        self.inner.set_mimetype(mimetype);
    }

    fn encoding(&self) -> Option<&str> {
        self.inner.encoding()
    }

    fn set_encoding(&mut self, encoding: Option<&str>) {
        self.inner.set_encoding(encoding);
    }

    async fn put_content(
        &mut self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, ContentError> {
        self.inner.put_content(stream).await
    }

    async fn content_output_stream(&mut self) -> Result<ContentOutputStream<'_>, ContentError> {
        self.inner.content_output_stream().await
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn is_written(&self) -> bool {
        self.inner.is_written()
    }

    fn reader(&self) -> Result<Box<dyn ContentReader>, ContentError> {
        Ok(Box::new(
            self.inner.reader_holding(Some(Arc::clone(&self.spool)))?,
        ))
    }

    fn describe(&self) -> String {
        format!("spool[{} {}]", self.path().display(), self.mimetype())
    }
}
