//! Shared services the executors run against.

use std::sync::Arc;

use crate::availability::AvailabilityTracker;
use crate::content::{ContentReader, SpoolProvider};
use crate::debug::TransformTracer;
use crate::mimetype::MimetypeLookup;

use super::guard::StrictMimetypeExceptions;

/// Behaviour switches of the mismatch guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Refuse top-level transforms whose content does not match the declared type.
    pub strict_mimetype_check: bool,
    /// After a failure, retry with the detected mimetype.
    pub retry_transform_on_different_mimetype: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            strict_mimetype_check: true,
            retry_transform_on_different_mimetype: true,
        }
    }
}

/// Process-wide collaborators shared by every call.
pub struct TransformEnv {
    pub(crate) tracker: AvailabilityTracker,
    pub(crate) lookup: Arc<dyn MimetypeLookup>,
    pub(crate) spool: SpoolProvider,
    pub(crate) tracer: Arc<TransformTracer>,
    pub(crate) settings: EngineSettings,
    pub(crate) exceptions: StrictMimetypeExceptions,
}

impl TransformEnv {
    pub fn new(
        tracker: AvailabilityTracker,
        lookup: Arc<dyn MimetypeLookup>,
        spool: SpoolProvider,
        tracer: Arc<TransformTracer>,
        settings: EngineSettings,
        exceptions: StrictMimetypeExceptions,
    ) -> Self {
        Self {
            tracker,
            lookup,
            spool,
            tracer,
            settings,
            exceptions,
        }
    }

    pub(crate) fn extension_of(&self, mimetype: &str) -> Option<String> {
        self.lookup.extension_for(mimetype)
    }

    pub(crate) fn source_size(reader: &dyn ContentReader) -> i64 {
        i64::try_from(reader.size()).unwrap_or(i64::MAX)
    }
}

impl std::fmt::Debug for TransformEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEnv")
            .field("tracker", &self.tracker)
            .field("spool", &self.spool)
            .field("settings", &self.settings)
            .finish()
    }
}
