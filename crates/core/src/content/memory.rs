//! In-memory content readers and writers.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::ContentError;
use super::traits::{ContentInputStream, ContentOutputStream, ContentReader, ContentWriter};

/// Reader over an immutable shared buffer.
#[derive(Debug, Clone)]
pub struct MemoryContentReader {
    data: Arc<[u8]>,
    mimetype: String,
    encoding: Option<String>,
}

impl MemoryContentReader {
    /// Creates a reader over `data` declared as `mimetype`.
    pub fn new(data: impl Into<Vec<u8>>, mimetype: impl Into<String>) -> Self {
        Self {
            data: Arc::from(data.into()),
            mimetype: mimetype.into(),
            encoding: None,
        }
    }

    /// Sets the declared character encoding.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Raw bytes of the content.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

#[async_trait]
impl ContentReader for MemoryContentReader {
    fn mimetype(&self) -> &str {
        &self.mimetype
    }

    fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn content_input_stream(&self) -> Result<ContentInputStream, ContentError> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, ContentError> {
        Ok(self.data.to_vec())
    }

    fn reader(&self) -> Box<dyn ContentReader> {
        Box::new(self.clone())
    }

    fn describe(&self) -> String {
        format!("memory[{} {} bytes]", self.mimetype, self.data.len())
    }
}

/// Writer that accumulates content in a growable buffer.
///
/// Writing again replaces the previous content, so a retried transform can
/// reuse the same writer.
#[derive(Debug, Clone)]
pub struct MemoryContentWriter {
    buffer: Vec<u8>,
    mimetype: String,
    encoding: Option<String>,
    written: bool,
}

impl MemoryContentWriter {
    /// Creates an empty writer targeting `mimetype`.
    pub fn new(mimetype: impl Into<String>) -> Self {
        Self {
            buffer: Vec::new(),
            mimetype: mimetype.into(),
            encoding: None,
            written: false,
        }
    }

    /// Sets the target character encoding.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[async_trait]
impl ContentWriter for MemoryContentWriter {
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
        self.buffer.clear();
        let n = stream.read_to_end(&mut self.buffer).await?;
        self.written = true;
        Ok(n as u64)
    }

    async fn content_output_stream(&mut self) -> Result<ContentOutputStream<'_>, ContentError> {
        self.buffer.clear();
        self.written = true;
        Ok(Box::new(&mut self.buffer))
    }

    fn size(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn is_written(&self) -> bool {
        self.written
    }

    fn reader(&self) -> Result<Box<dyn ContentReader>, ContentError> {
        if !self.written {
            return Err(ContentError::NotWritten {
                description: self.describe(),
            });
        }
        let mut reader = MemoryContentReader::new(self.buffer.clone(), self.mimetype.clone());
        reader.encoding = self.encoding.clone();
        Ok(Box::new(reader))
    }

    fn describe(&self) -> String {
        format!("memory[{} {} bytes]", self.mimetype, self.buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reader_replays_content() {
        let reader = MemoryContentReader::new(b"hello".to_vec(), "text/plain");
        let fresh = reader.reader();
        assert_eq!(reader.read_bytes().await.unwrap(), b"hello");
        assert_eq!(fresh.read_bytes().await.unwrap(), b"hello");
        assert_eq!(fresh.size(), 5);
        assert_eq!(fresh.mimetype(), "text/plain");
    }

    #[tokio::test]
    async fn test_writer_put_bytes_and_read_back() {
        let mut writer = MemoryContentWriter::new("application/pdf");
        assert!(!writer.is_written());
        assert!(writer.reader().is_err());

        writer.put_bytes(b"%PDF-1.4").await.unwrap();
        assert!(writer.is_written());
        assert_eq!(writer.size(), 8);

        let reader = writer.reader().unwrap();
        assert_eq!(reader.mimetype(), "application/pdf");
        assert_eq!(reader.read_bytes().await.unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_writer_rewrite_replaces_content() {
        let mut writer = MemoryContentWriter::new("text/plain");
        writer.put_bytes(b"first attempt").await.unwrap();
        writer.put_bytes(b"second").await.unwrap();
        assert_eq!(writer.bytes(), b"second");
    }

    #[tokio::test]
    async fn test_output_stream_writes_into_buffer() {
        let mut writer = MemoryContentWriter::new("text/plain");
        {
            let mut out = writer.content_output_stream().await.unwrap();
            out.write_all(b"streamed").await.unwrap();
        }
        assert_eq!(writer.bytes(), b"streamed");
        assert!(writer.is_written());
    }

    #[tokio::test]
    async fn test_empty_content_is_written() {
        let mut writer = MemoryContentWriter::new("text/plain");
        writer.put_bytes(b"").await.unwrap();
        assert!(writer.is_written());
        assert_eq!(writer.reader().unwrap().size(), 0);
    }
}
