//! Errors raised while registering transformer definitions.

use thiserror::Error;

/// A transformer definition that cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Transformer name must not be empty")]
    EmptyName,

    #[error("Transformer {name} is already registered")]
    DuplicateName { name: String },

    #[error("Transformer name {name} is reserved for the pass-through transformer")]
    ReservedName { name: String },

    #[error("Transformer {name} has no base URL")]
    MissingBaseUrl { name: String },

    #[error("Pipeline {name} must have at least 2 steps, found {count}")]
    TooFewSteps { name: String, count: usize },

    #[error("Pipeline {name} step {index} ({step}) has no intermediate mimetype")]
    MissingIntermediateMimetype {
        name: String,
        index: usize,
        step: String,
    },

    #[error("Failover {name} must have at least 2 candidates, found {count}")]
    TooFewCandidates { name: String, count: usize },

    #[error("Transformer {name} references {child}, which is not registered")]
    UnknownChild { name: String, child: String },
}

impl RegistryError {
    /// Name of the offending transformer.
    pub fn transformer_name(&self) -> &str {
        match self {
            Self::EmptyName => "",
            Self::DuplicateName { name }
            | Self::ReservedName { name }
            | Self::MissingBaseUrl { name }
            | Self::TooFewSteps { name, .. }
            | Self::MissingIntermediateMimetype { name, .. }
            | Self::TooFewCandidates { name, .. }
            | Self::UnknownChild { name, .. } => name,
        }
    }
}
