//! Mock mimetype lookup for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::content::ContentReader;
use crate::mimetype::{MimetypeLookup, MimetypeMap};

/// Mock implementation of the MimetypeLookup trait.
///
/// Extensions come from the built-in [`MimetypeMap`]. Detection is scripted:
/// content declared as a given mimetype is reported as another one, and
/// everything else is reported as matching its declaration. Detection is
/// therefore stable: content relabelled to its detected type detects as
/// nothing new.
///
/// Provides controllable behavior for testing:
/// - Script a detected mimetype per declared mimetype
/// - Clear scripted detections mid-test
/// - Count detections for assertions
///
/// # Example
///
/// ```rust,ignore
/// use transform_core::testing::MockMimetypeLookup;
///
/// let lookup = MockMimetypeLookup::new();
/// lookup.set_detected("application/msword", "application/pdf");
///
/// let reader = MemoryContentReader::new(b"%PDF-1.4".to_vec(), "application/msword");
/// assert_eq!(
///     lookup.detect_mimetype(&reader).await.as_deref(),
///     Some("application/pdf")
/// );
/// assert_eq!(lookup.detect_count(), 1);
/// ```
#[derive(Default)]
pub struct MockMimetypeLookup {
    map: MimetypeMap,
    detected: Mutex<HashMap<String, String>>,
    detections: Mutex<usize>,
}

impl MockMimetypeLookup {
    /// Create a lookup that never detects a mismatch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report content declared as `declared` as `detected`.
    pub fn set_detected(&self, declared: &str, detected: &str) {
        self.detected
            .lock()
            .insert(declared.to_string(), detected.to_string());
    }

    /// Forget every scripted detection.
    pub fn clear_detected(&self) {
        self.detected.lock().clear();
    }

    /// Get the number of detections performed.
    pub fn detect_count(&self) -> usize {
        *self.detections.lock()
    }
}

#[async_trait]
impl MimetypeLookup for MockMimetypeLookup {
    fn extension_for(&self, mimetype: &str) -> Option<String> {
        self.map.extension_for(mimetype)
    }

    fn mimetype_for(&self, extension: &str) -> Option<String> {
        self.map.mimetype_for(extension)
    }

    async fn detect_mimetype(&self, reader: &dyn ContentReader) -> Option<String> {
        *self.detections.lock() += 1;
        let declared = reader.mimetype();
        self.detected
            .lock()
            .get(declared)
            .filter(|detected| detected.as_str() != declared)
            .cloned()
    }
}
