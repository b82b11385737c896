//! Built-in mimetype table and magic-byte detection.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::warn;

use super::MimetypeLookup;
use crate::content::ContentReader;

pub const MIMETYPE_TEXT_PLAIN: &str = "text/plain";
pub const MIMETYPE_PDF: &str = "application/pdf";
pub const MIMETYPE_ZIP: &str = "application/zip";
pub const MIMETYPE_OLE2: &str = "application/x-tika-msoffice";

const SNIFF_LEN: usize = 16;

/// Mimetype and canonical extension pairs. First extension wins for a mimetype.
const DEFAULT_EXTENSIONS: &[(&str, &str)] = &[
    // Text
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/csv", "csv"),
    ("text/xml", "xml"),
    ("text/css", "css"),
    ("text/markdown", "md"),
    ("text/javascript", "js"),
    ("application/x-javascript", "js"),
    ("application/json", "json"),
    ("application/xml", "xml"),
    ("application/dita+xml", "dita"),
    ("application/rtf", "rtf"),
    // Office
    ("application/pdf", "pdf"),
    ("application/msword", "doc"),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.ms-powerpoint", "ppt"),
    ("application/vnd.visio", "vsd"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    ("application/vnd.oasis.opendocument.text", "odt"),
    ("application/vnd.oasis.opendocument.spreadsheet", "ods"),
    ("application/vnd.oasis.opendocument.presentation", "odp"),
    ("application/vnd.stardivision.math", "smf"),
    ("application/x-iwork-pages", "pages"),
    ("application/x-iwork-numbers", "numbers"),
    ("application/x-iwork-keynote", "key"),
    ("application/epub+zip", "epub"),
    ("application/illustrator", "ai"),
    ("application/eps", "eps"),
    ("application/postscript", "ps"),
    ("application/acp", "acp"),
    // Images
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/tiff", "tiff"),
    ("image/bmp", "bmp"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
    // Archives
    ("application/zip", "zip"),
    ("application/x-tar", "tar"),
    ("application/x-gtar", "gtar"),
    ("application/gzip", "gz"),
    ("application/x-tika-msoffice", "ole2"),
];

/// Formats stored inside a ZIP container. iWork documents are excluded, so a
/// ZIP detection for them has to go through the exception table.
fn is_zip_container(mimetype: &str) -> bool {
    mimetype.starts_with("application/vnd.openxmlformats-officedocument.")
        || mimetype.starts_with("application/vnd.oasis.opendocument.")
        || mimetype == "application/epub+zip"
        || mimetype == "application/java-archive"
}

/// Legacy Office formats stored in an OLE2 compound document.
fn is_ole2_container(mimetype: &str) -> bool {
    matches!(
        mimetype,
        "application/msword"
            | "application/vnd.ms-excel"
            | "application/vnd.ms-powerpoint"
            | "application/vnd.visio"
            | "application/vnd.ms-outlook"
    )
}

/// Whether pass-through may treat `source` as plain text when producing `target`.
pub fn is_text_compatible(source: &str, target: &str) -> bool {
    target == MIMETYPE_TEXT_PLAIN
        && (source.starts_with("text/")
            || source == "application/x-javascript"
            || source == "application/javascript"
            || source == "application/dita+xml")
}

/// Sniffs a mimetype from the leading bytes of some content.
pub fn sniff(head: &[u8]) -> Option<&'static str> {
    const OLE2: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    if head.starts_with(b"%PDF-") {
        Some(MIMETYPE_PDF)
    } else if head.starts_with(b"PK\x03\x04") {
        Some(MIMETYPE_ZIP)
    } else if head.starts_with(PNG) {
        Some("image/png")
    } else if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if head.starts_with(b"II*\0") || head.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if head.starts_with(b"%!PS") {
        Some("application/postscript")
    } else if head.starts_with(OLE2) {
        Some(MIMETYPE_OLE2)
    } else if head.starts_with(b"BM") && head.len() >= 14 {
        Some("image/bmp")
    } else {
        None
    }
}

/// Table-driven [`MimetypeLookup`] with magic-byte detection.
#[derive(Debug, Clone)]
pub struct MimetypeMap {
    extensions: HashMap<String, String>,
    mimetypes: HashMap<String, String>,
}

impl Default for MimetypeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MimetypeMap {
    /// Creates a map loaded with the built-in table.
    pub fn new() -> Self {
        let mut map = Self {
            extensions: HashMap::new(),
            mimetypes: HashMap::new(),
        };
        for (mimetype, ext) in DEFAULT_EXTENSIONS {
            map.insert(mimetype, ext);
        }
        map
    }

    /// Adds or replaces an entry.
    pub fn with_extension(mut self, mimetype: &str, extension: &str) -> Self {
        self.extensions.insert(
            mimetype.to_ascii_lowercase(),
            extension.to_ascii_lowercase(),
        );
        self.mimetypes.insert(
            extension.to_ascii_lowercase(),
            mimetype.to_ascii_lowercase(),
        );
        self
    }

    fn insert(&mut self, mimetype: &str, ext: &str) {
        self.extensions
            .entry(mimetype.to_string())
            .or_insert_with(|| ext.to_string());
        self.mimetypes
            .entry(ext.to_string())
            .or_insert_with(|| mimetype.to_string());
    }

    /// Whether a detected type is consistent with what the caller declared.
    fn matches_declared(declared: &str, detected: &str) -> bool {
        declared == detected
            || (detected == MIMETYPE_ZIP && is_zip_container(declared))
            || (detected == MIMETYPE_OLE2 && is_ole2_container(declared))
    }
}

#[async_trait]
impl MimetypeLookup for MimetypeMap {
    fn extension_for(&self, mimetype: &str) -> Option<String> {
        self.extensions.get(&mimetype.to_ascii_lowercase()).cloned()
    }

    fn mimetype_for(&self, extension: &str) -> Option<String> {
        self.mimetypes.get(&extension.to_ascii_lowercase()).cloned()
    }

    async fn detect_mimetype(&self, reader: &dyn ContentReader) -> Option<String> {
        let stream = match reader.content_input_stream().await {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    reader = %reader.describe(),
                    error = %e,
                    "Could not open content for detection"
                );
                return None;
            }
        };

        let mut head = Vec::with_capacity(SNIFF_LEN);
        if let Err(e) = stream.take(SNIFF_LEN as u64).read_to_end(&mut head).await {
            warn!(
                reader = %reader.describe(),
                error = %e,
                "Could not read content for detection"
            );
            return None;
        }

        let detected = sniff(&head)?;
        let declared = reader.mimetype().to_ascii_lowercase();
        if Self::matches_declared(&declared, detected) {
            None
        } else {
            Some(detected.to_string())
        }
    }
}
