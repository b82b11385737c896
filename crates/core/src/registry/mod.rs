//! Capability registry.
//!
//! Transformer definitions are validated and registered in declaration order
//! into a [`RegistryBuilder`], which produces an immutable
//! [`RegistrySnapshot`]. Reloading builds a new snapshot; nothing mutates a
//! published one.

mod builder;
mod error;
mod options;
mod types;

pub use builder::{RegistryBuilder, RegistrySnapshot};
pub use error::RegistryError;
pub use options::{strip_options, TIMEOUT_OPTION};
pub use types::{
    CapabilityEntry, PipelineStep, RegisteredTransformer, SupportedTransform, TransformerDefinition,
    TransformerSpec, DEFAULT_PRIORITY, PASS_THROUGH_NAME, UNLIMITED,
};
