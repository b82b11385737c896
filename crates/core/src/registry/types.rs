//! Types describing registered transformers and their capabilities.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Reserved name of the pass-through transformer.
pub const PASS_THROUGH_NAME: &str = "PassThrough";

/// Default priority of a supported transform. Lower wins.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Size limit meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    /// Name of the child transformer.
    pub transformer: String,
    /// Mimetype the step produces. Only the last step may leave it unset.
    pub target_mimetype: Option<String>,
}

impl PipelineStep {
    pub fn new(transformer: impl Into<String>, target_mimetype: Option<&str>) -> Self {
        Self {
            transformer: transformer.into(),
            target_mimetype: target_mimetype.map(str::to_string),
        }
    }
}

/// What kind of transformer a name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformerDefinition {
    /// A remote T-Engine.
    Simple {
        base_url: String,
        startup_retry_period: Duration,
    },
    /// Copies or text-recodes without a remote call.
    PassThrough,
    /// Chains child transformers through intermediate mimetypes.
    Pipeline { steps: Vec<PipelineStep> },
    /// Tries child transformers in order until one succeeds.
    Failover { candidates: Vec<String> },
}

impl TransformerDefinition {
    /// Short label used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Simple { .. } => "simple",
            Self::PassThrough => "pass_through",
            Self::Pipeline { .. } => "pipeline",
            Self::Failover { .. } => "failover",
        }
    }

    /// Names of directly referenced children, in order.
    pub fn children(&self) -> Vec<&str> {
        match self {
            Self::Pipeline { steps } => steps.iter().map(|s| s.transformer.as_str()).collect(),
            Self::Failover { candidates } => candidates.iter().map(String::as_str).collect(),
            Self::Simple { .. } | Self::PassThrough => Vec::new(),
        }
    }
}

/// A source/target pair a transformer declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedTransform {
    pub source_mimetype: String,
    pub target_mimetype: String,
    /// Largest accepted source in bytes, or [`UNLIMITED`].
    pub max_source_size_bytes: i64,
    pub priority: i32,
}

impl SupportedTransform {
    /// An unlimited pair at the default priority.
    pub fn new(source_mimetype: &str, target_mimetype: &str) -> Self {
        Self {
            source_mimetype: source_mimetype.to_string(),
            target_mimetype: target_mimetype.to_string(),
            max_source_size_bytes: UNLIMITED,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_size(mut self, max_source_size_bytes: i64) -> Self {
        self.max_source_size_bytes = max_source_size_bytes;
        self
    }
}

/// Everything needed to register one transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerSpec {
    pub name: String,
    pub definition: TransformerDefinition,
    pub supported: Vec<SupportedTransform>,
    /// Option names the transformer itself declares.
    pub option_names: BTreeSet<String>,
}

impl TransformerSpec {
    pub fn new(name: impl Into<String>, definition: TransformerDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
            supported: Vec::new(),
            option_names: BTreeSet::new(),
        }
    }

    /// A remote transformer with the default retry period.
    pub fn simple(name: impl Into<String>, base_url: &str) -> Self {
        Self::new(
            name,
            TransformerDefinition::Simple {
                base_url: base_url.to_string(),
                startup_retry_period: Duration::from_secs(60),
            },
        )
    }

    pub fn pass_through() -> Self {
        Self::new(PASS_THROUGH_NAME, TransformerDefinition::PassThrough)
    }

    pub fn pipeline(name: impl Into<String>, steps: Vec<PipelineStep>) -> Self {
        Self::new(name, TransformerDefinition::Pipeline { steps })
    }

    pub fn failover<S: Into<String>>(name: impl Into<String>, candidates: Vec<S>) -> Self {
        Self::new(
            name,
            TransformerDefinition::Failover {
                candidates: candidates.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn supports(mut self, supported: SupportedTransform) -> Self {
        self.supported.push(supported);
        self
    }

    pub fn with_options<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.option_names
            .extend(names.iter().map(|n| n.as_ref().to_string()));
        self
    }
}

/// A transformer accepted into the registry.
#[derive(Debug, Clone)]
pub struct RegisteredTransformer {
    pub name: String,
    pub definition: TransformerDefinition,
    /// Position in registration order.
    pub order: usize,
    /// Own option names plus, for composites, those of every child.
    pub all_option_names: Arc<HashSet<String>>,
}

/// One (transformer, source, target) capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEntry {
    pub transformer_name: String,
    pub source_mimetype: String,
    pub target_mimetype: String,
    pub max_source_size_bytes: i64,
    pub declared_option_names: Arc<HashSet<String>>,
    pub priority: i32,
    /// Position in declaration order across the whole registry.
    pub order: usize,
}

impl CapabilityEntry {
    /// Whether a source of `size` bytes fits. Negative sizes mean unknown and always fit.
    pub fn accepts_size(&self, size: i64) -> bool {
        self.max_source_size_bytes < 0 || size < 0 || size <= self.max_source_size_bytes
    }

    /// Whether this entry converts `source` to `target`.
    pub fn matches(&self, source: &str, target: &str) -> bool {
        self.source_mimetype.eq_ignore_ascii_case(source)
            && self.target_mimetype.eq_ignore_ascii_case(target)
    }
}
