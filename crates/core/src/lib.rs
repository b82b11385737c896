pub mod availability;
pub mod channel;
pub mod config;
pub mod content;
pub mod debug;
pub mod engine;
pub mod metrics;
pub mod mimetype;
pub mod registry;
pub mod testing;
pub mod transform;

pub use availability::{AvailabilityState, AvailabilityTracker, ProbeRound};
pub use channel::{
    ChannelFactory, HttpChannelFactory, HttpTransformChannel, ProbeResult, RemoteError,
    RemoteTransformChannel, RemoteTransformRequest,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use content::{
    ContentError, ContentReader, ContentWriter, FileContentReader, FileContentWriter,
    MemoryContentReader, MemoryContentWriter, SpoolProvider,
};
pub use debug::{TraceRecord, TraceStack, TransformTracer};
pub use engine::TransformService;
pub use mimetype::{MimetypeLookup, MimetypeMap};
pub use registry::{
    RegistryBuilder, RegistryError, RegistrySnapshot, SupportedTransform, TransformerDefinition,
    TransformerSpec,
};
pub use transform::{
    EngineSettings, FailureContext, LocalTransform, StrictMimetypeExceptions, TransformContext,
    TransformEnv, TransformError,
};
