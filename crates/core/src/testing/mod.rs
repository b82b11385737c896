//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits,
//! allowing the engine to be exercised end to end without real T-Engines.
//!
//! # Example
//!
//! ```rust,ignore
//! use transform_core::testing::{fixtures, MockChannelFactory, MockMimetypeLookup};
//!
//! let factory = Arc::new(MockChannelFactory::new());
//! let lookup = Arc::new(MockMimetypeLookup::new());
//! let service = fixtures::service(lookup.clone(), factory.clone(), spool_dir);
//!
//! // Configure mock responses
//! factory.mock("libreoffice").set_output(b"%PDF-1.4".to_vec());
//! lookup.set_detected("application/x-iwork-pages", "application/zip");
//! ```

mod mock_channel;
mod mock_lookup;

pub use mock_channel::{MockChannelFactory, MockTransformChannel, RecordedSend};
pub use mock_lookup::MockMimetypeLookup;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::availability::AvailabilityTracker;
    use crate::channel::ChannelFactory;
    use crate::content::{MemoryContentReader, SpoolProvider};
    use crate::debug::TransformTracer;
    use crate::engine::TransformService;
    use crate::mimetype::MimetypeLookup;
    use crate::registry::{SupportedTransform, TransformerSpec, PASS_THROUGH_NAME};
    use crate::transform::{
        EngineSettings, FailoverTransform, LocalTransform, PassThroughTransform, PipelineStage,
        PipelineTransform, StrictMimetypeExceptions, TransformEnv,
    };

    pub const DOCX: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    pub const PDF: &str = "application/pdf";
    pub const JPEG: &str = "image/jpeg";

    /// A standalone pass-through executor.
    pub fn pass_through() -> LocalTransform {
        LocalTransform::PassThrough(PassThroughTransform {
            name: PASS_THROUGH_NAME.to_string(),
            all_option_names: Arc::new(HashSet::new()),
        })
    }

    /// A pipeline over `steps`, with a generic intermediate mimetype between
    /// each pair of steps.
    pub fn pipeline_of(name: &str, steps: Vec<Arc<LocalTransform>>) -> LocalTransform {
        let last = steps.len().saturating_sub(1);
        LocalTransform::Pipeline(PipelineTransform {
            name: name.to_string(),
            all_option_names: Arc::new(HashSet::new()),
            stages: steps
                .into_iter()
                .enumerate()
                .map(|(i, transform)| PipelineStage {
                    transform,
                    target_mimetype: (i < last).then(|| "application/octet-stream".to_string()),
                })
                .collect(),
        })
    }

    /// A failover over `candidates`.
    pub fn failover_of(name: &str, candidates: Vec<Arc<LocalTransform>>) -> LocalTransform {
        LocalTransform::Failover(FailoverTransform {
            name: name.to_string(),
            all_option_names: Arc::new(HashSet::new()),
            candidates,
        })
    }

    /// A remote transformer spec supporting one pair.
    pub fn simple_spec(name: &str, source: &str, target: &str) -> TransformerSpec {
        TransformerSpec::simple(name, &format!("http://{}:8090", name.to_lowercase()))
            .supports(SupportedTransform::new(source, target))
    }

    /// `size` bytes of filler declared as `mimetype`.
    pub fn reader_of_size(mimetype: &str, size: usize) -> MemoryContentReader {
        MemoryContentReader::new(vec![b'x'; size], mimetype)
    }

    /// Engine collaborators with default settings and the stock exception
    /// table, spooling into `spool_dir`.
    pub fn env(lookup: Arc<dyn MimetypeLookup>, spool_dir: &Path) -> TransformEnv {
        env_with(
            lookup,
            spool_dir,
            EngineSettings::default(),
            StrictMimetypeExceptions::default(),
        )
    }

    pub fn env_with(
        lookup: Arc<dyn MimetypeLookup>,
        spool_dir: &Path,
        settings: EngineSettings,
        exceptions: StrictMimetypeExceptions,
    ) -> TransformEnv {
        TransformEnv::new(
            AvailabilityTracker::new(Duration::from_secs(5)),
            lookup,
            SpoolProvider::new(spool_dir),
            Arc::new(TransformTracer::new(true)),
            settings,
            exceptions,
        )
    }

    /// A service with default settings and an empty registry.
    pub fn service(
        lookup: Arc<dyn MimetypeLookup>,
        factory: Arc<dyn ChannelFactory>,
        spool_dir: &Path,
    ) -> TransformService {
        TransformService::new(env(lookup, spool_dir), factory)
    }
}
