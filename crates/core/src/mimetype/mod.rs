//! Mimetype to extension mapping and content-type detection.

mod map;

pub use map::{
    is_text_compatible, sniff, MimetypeMap, MIMETYPE_OLE2, MIMETYPE_PDF, MIMETYPE_TEXT_PLAIN,
    MIMETYPE_ZIP,
};

use async_trait::async_trait;

use crate::content::ContentReader;

/// Mimetype knowledge the engine consults before dispatching a transform.
#[async_trait]
pub trait MimetypeLookup: Send + Sync {
    /// Canonical file extension for a mimetype.
    fn extension_for(&self, mimetype: &str) -> Option<String>;

    /// Mimetype registered for a file extension.
    fn mimetype_for(&self, extension: &str) -> Option<String>;

    /// Detects the actual type of some content.
    ///
    /// Returns `None` when the detected type matches the declared one or when
    /// nothing could be detected.
    async fn detect_mimetype(&self, reader: &dyn ContentReader) -> Option<String>;
}
