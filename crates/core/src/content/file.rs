//! File-backed content readers and writers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};

use super::error::ContentError;
use super::spool::SpoolFile;
use super::traits::{ContentInputStream, ContentOutputStream, ContentReader, ContentWriter};

/// Reader over a file on disk.
///
/// When the file is a spool file, the reader holds a share of it so the file
/// outlives the writer that produced it.
#[derive(Debug, Clone)]
pub struct FileContentReader {
    path: PathBuf,
    mimetype: String,
    encoding: Option<String>,
    size: u64,
    spool: Option<Arc<SpoolFile>>,
}

impl FileContentReader {
    /// Opens a reader over an existing file.
    pub async fn open(
        path: impl AsRef<Path>,
        mimetype: impl Into<String>,
    ) -> Result<Self, ContentError> {
        let path = path.as_ref().to_path_buf();
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContentError::NotFound { path });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            mimetype: mimetype.into(),
            encoding: None,
            size: metadata.len(),
            spool: None,
        })
    }

    /// Sets the declared character encoding.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ContentReader for FileContentReader {
    fn mimetype(&self) -> &str {
        &self.mimetype
    }

    fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn content_input_stream(&self) -> Result<ContentInputStream, ContentError> {
        match File::open(&self.path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ContentError::NotFound {
                path: self.path.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn reader(&self) -> Box<dyn ContentReader> {
        Box::new(self.clone())
    }

    fn describe(&self) -> String {
        format!(
            "file[{} {} {} bytes]",
            self.path.display(),
            self.mimetype,
            self.size
        )
    }
}

/// Writer that stores content in a file, truncating on every write.
#[derive(Debug)]
pub struct FileContentWriter {
    path: PathBuf,
    mimetype: String,
    encoding: Option<String>,
    size: u64,
    written: bool,
}

impl FileContentWriter {
    /// Creates a writer targeting `path`. Nothing is touched until content is put.
    pub fn new(path: impl Into<PathBuf>, mimetype: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mimetype: mimetype.into(),
            encoding: None,
            size: 0,
            written: false,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Builds a reader that keeps `spool` alive for as long as it exists.
    pub(crate) fn reader_holding(
        &self,
        spool: Option<Arc<SpoolFile>>,
    ) -> Result<FileContentReader, ContentError> {
        if !self.written {
            return Err(ContentError::NotWritten {
                description: self.describe(),
            });
        }
        Ok(FileContentReader {
            path: self.path.clone(),
            mimetype: self.mimetype.clone(),
            encoding: self.encoding.clone(),
            size: self.current_size(),
            spool,
        })
    }

    // Streams opened through content_output_stream bypass the size counter.
    fn current_size(&self) -> u64 {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .unwrap_or(self.size)
    }
}

#[async_trait]
impl ContentWriter for FileContentWriter {
    fn mimetype(&self) -> &str {
        &self.mimetype
    }

    fn set_mimetype(&mut self, mimetype: &str) {
        self.mimetype = mimetype.to_string();
    }

    fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    fn set_encoding(&mut self, encoding: Option<&str>) {
        self.encoding = encoding.map(str::to_string);
    }

    async fn put_content(
        &mut self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, ContentError> {
        let mut file = File::create(&self.path).await?;
        let n = tokio::io::copy(stream, &mut file).await?;
        file.flush().await?;
        self.size = n;
        self.written = true;
        Ok(n)
    }

    async fn content_output_stream(&mut self) -> Result<ContentOutputStream<'_>, ContentError> {
        let file = File::create(&self.path).await?;
        self.size = 0;
        self.written = true;
        Ok(Box::new(file))
    }

    fn size(&self) -> u64 {
        if self.written {
            self.current_size()
        } else {
            0
        }
    }

    fn is_written(&self) -> bool {
        self.written
    }

    fn reader(&self) -> Result<Box<dyn ContentReader>, ContentError> {
        Ok(Box::new(self.reader_holding(None)?))
    }

    fn describe(&self) -> String {
        format!("file[{} {}]", self.path.display(), self.mimetype)
    }
}
