//! Reader and writer capabilities consumed by the transform engine.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use super::error::ContentError;

/// Boxed async byte source.
pub type ContentInputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed async byte sink borrowed from a writer.
pub type ContentOutputStream<'a> = Box<dyn AsyncWrite + Send + Unpin + 'a>;

/// Read access to a piece of content.
///
/// Readers are cheap handles: [`ContentReader::reader`] must return a fresh,
/// independent reader over the same bytes so that failover attempts and
/// mimetype re-detection can replay the source.
#[async_trait]
pub trait ContentReader: Send + Sync {
    /// Declared mimetype of the content.
    fn mimetype(&self) -> &str;

    /// Declared character encoding, if any.
    fn encoding(&self) -> Option<&str>;

    /// Size of the content in bytes.
    fn size(&self) -> u64;

    /// Opens a stream over the content.
    async fn content_input_stream(&self) -> Result<ContentInputStream, ContentError>;

    /// Reads the whole content into memory.
    async fn read_bytes(&self) -> Result<Vec<u8>, ContentError> {
        let mut stream = self.content_input_stream().await?;
        let mut buf = Vec::with_capacity(self.size() as usize);
        stream.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Returns a fresh reader over the same content.
    fn reader(&self) -> Box<dyn ContentReader>;

    /// Short human readable description used in diagnostics.
    fn describe(&self) -> String;
}

/// Write access to a piece of content.
#[async_trait]
pub trait ContentWriter: Send + Sync {
    /// Mimetype the content is being written as.
    fn mimetype(&self) -> &str;

    /// Changes the mimetype the content is being written as.
    fn set_mimetype(&mut self, mimetype: &str);

    /// Character encoding of the written content, if any.
    fn encoding(&self) -> Option<&str>;

    /// Changes the character encoding.
    fn set_encoding(&mut self, encoding: Option<&str>);

    /// Copies a stream into the writer, returning the number of bytes written.
    async fn put_content(
        &mut self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, ContentError>;

    /// Writes a byte slice as the whole content.
    async fn put_bytes(&mut self, bytes: &[u8]) -> Result<u64, ContentError> {
        let mut cursor = bytes;
        self.put_content(&mut cursor).await
    }

    /// Opens a sink for callers that produce content incrementally.
    async fn content_output_stream(&mut self) -> Result<ContentOutputStream<'_>, ContentError>;

    /// Number of bytes written so far.
    fn size(&self) -> u64;

    /// Whether any content has been written.
    fn is_written(&self) -> bool;

    /// Returns a reader over what has been written.
    fn reader(&self) -> Result<Box<dyn ContentReader>, ContentError>;

    /// Short human readable description used in diagnostics.
    fn describe(&self) -> String;
}

/// Reader that claims a different mimetype than the one it wraps.
struct RelabelledReader {
    inner: Box<dyn ContentReader>,
    mimetype: String,
}

#[async_trait]
impl ContentReader for RelabelledReader {
    fn mimetype(&self) -> &str {
        &self.mimetype
    }

    fn encoding(&self) -> Option<&str> {
        self.inner.encoding()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn content_input_stream(&self) -> Result<ContentInputStream, ContentError> {
        self.inner.content_input_stream().await
    }

    fn reader(&self) -> Box<dyn ContentReader> {
        Box::new(RelabelledReader {
            inner: self.inner.reader(),
            mimetype: self.mimetype.clone(),
        })
    }

    fn describe(&self) -> String {
        format!("{} (as {})", self.inner.describe(), self.mimetype)
    }
}

/// Returns a private copy of `reader` that claims `mimetype`.
pub fn relabel(reader: &dyn ContentReader, mimetype: &str) -> Box<dyn ContentReader> {
    Box::new(RelabelledReader {
        inner: reader.reader(),
        mimetype: mimetype.to_string(),
    })
}
