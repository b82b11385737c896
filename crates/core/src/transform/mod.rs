//! Transform executors.
//!
//! Every registered transformer becomes a [`LocalTransform`]. All variants run
//! through one dispatch function that handles availability, extension lookup,
//! option stripping, tracing and the mimetype-mismatch guard, so each variant
//! only implements its own step.

mod context;
mod env;
mod error;
mod failover;
mod guard;
mod local;
mod pass_through;
mod pipeline;
mod remote;
mod run;

pub use context::TransformContext;
pub use env::{EngineSettings, TransformEnv};
pub use error::{root_cause_message, FailureContext, TransformError};
pub use guard::StrictMimetypeExceptions;
pub use local::{
    build_transforms, FailoverTransform, LocalTransform, PassThroughTransform, PipelineStage,
    PipelineTransform, RemoteTransform,
};

pub(crate) use run::{run_transform, TransformRequest};
