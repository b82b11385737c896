use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::{
    PipelineStep, SupportedTransform, TransformerDefinition, TransformerSpec, DEFAULT_PRIORITY,
    UNLIMITED,
};
use crate::transform::{EngineSettings, StrictMimetypeExceptions};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub availability: AvailabilityConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    /// Declared mimetype to the detected mimetypes tolerated for it
    #[serde(default = "default_strict_mimetype_exceptions")]
    pub strict_mimetype_exceptions: HashMap<String, Vec<String>>,
    /// Base URL overrides by transformer name
    #[serde(default)]
    pub transformer_urls: HashMap<String, String>,
    #[serde(default)]
    pub transformers: Vec<TransformerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            availability: AvailabilityConfig::default(),
            debug: DebugConfig::default(),
            strict_mimetype_exceptions: default_strict_mimetype_exceptions(),
            transformer_urls: HashMap::new(),
            transformers: Vec::new(),
        }
    }
}

fn default_strict_mimetype_exceptions() -> HashMap<String, Vec<String>> {
    StrictMimetypeExceptions::default().to_map()
}

/// Mismatch guard switches and spool location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub strict_mimetype_check: bool,
    #[serde(default = "default_true")]
    pub retry_transform_on_different_mimetype: bool,
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_mimetype_check: true,
            retry_transform_on_different_mimetype: true,
            spool_dir: default_spool_dir(),
        }
    }
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            strict_mimetype_check: self.strict_mimetype_check,
            retry_transform_on_different_mimetype: self.retry_transform_on_different_mimetype,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_spool_dir() -> PathBuf {
    std::env::temp_dir().join("transform-spool")
}

/// Liveness probing of remote transformers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvailabilityConfig {
    /// Probe timeout in seconds (default: 5)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Retry period for transformers that do not set one (default: 60)
    #[serde(default = "default_retry_period")]
    pub default_retry_period_secs: u64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout(),
            default_retry_period_secs: default_retry_period(),
        }
    }
}

impl AvailabilityConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_retry_period() -> u64 {
    60
}

/// Transform tracing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebugConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// One `[[transformers]]` descriptor
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformerConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: TransformerKindConfig,
    #[serde(default)]
    pub supported: Vec<SupportedConfig>,
    /// Option names this transformer accepts
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerKindConfig {
    Simple {
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        startup_retry_period_secs: Option<u64>,
    },
    PassThrough,
    Pipeline {
        steps: Vec<PipelineStepConfig>,
    },
    Failover {
        candidates: Vec<String>,
    },
}

impl TransformerKindConfig {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simple { .. } => "simple",
            Self::PassThrough => "pass_through",
            Self::Pipeline { .. } => "pipeline",
            Self::Failover { .. } => "failover",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PipelineStepConfig {
    pub transformer: String,
    /// Intermediate mimetype, omitted on the last step
    #[serde(default)]
    pub target_mimetype: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SupportedConfig {
    pub source_mimetype: String,
    pub target_mimetype: String,
    /// -1 means unlimited
    #[serde(default = "default_max_source_size")]
    pub max_source_size_bytes: i64,
    /// Lower wins (default: 50)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_max_source_size() -> i64 {
    UNLIMITED
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl Config {
    /// URL override for a transformer. Names match case-insensitively since
    /// environment overrides arrive lowercased.
    pub fn url_override(&self, name: &str) -> Option<&str> {
        self.transformer_urls
            .get(name)
            .or_else(|| {
                self.transformer_urls
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    /// Registry input in declaration order, with URL overrides applied.
    pub fn to_specs(&self) -> Vec<TransformerSpec> {
        self.transformers
            .iter()
            .map(|t| self.to_spec(t))
            .collect()
    }

    fn to_spec(&self, transformer: &TransformerConfig) -> TransformerSpec {
        let definition = match &transformer.kind {
            TransformerKindConfig::Simple {
                base_url,
                startup_retry_period_secs,
            } => TransformerDefinition::Simple {
                base_url: self
                    .url_override(&transformer.name)
                    .or(base_url.as_deref())
                    .unwrap_or_default()
                    .to_string(),
                startup_retry_period: Duration::from_secs(
                    startup_retry_period_secs
                        .unwrap_or(self.availability.default_retry_period_secs),
                ),
            },
            TransformerKindConfig::PassThrough => TransformerDefinition::PassThrough,
            TransformerKindConfig::Pipeline { steps } => TransformerDefinition::Pipeline {
                steps: steps
                    .iter()
                    .map(|s| PipelineStep::new(s.transformer.clone(), s.target_mimetype.as_deref()))
                    .collect(),
            },
            TransformerKindConfig::Failover { candidates } => TransformerDefinition::Failover {
                candidates: candidates.clone(),
            },
        };

        let mut spec = TransformerSpec::new(transformer.name.clone(), definition)
            .with_options(&transformer.options);
        for s in &transformer.supported {
            spec = spec.supports(
                SupportedTransform::new(&s.source_mimetype, &s.target_mimetype)
                    .with_max_size(s.max_source_size_bytes)
                    .with_priority(s.priority),
            );
        }
        spec
    }
}

/// Sanitized config for diagnostics (transformer URLs hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub engine: EngineConfig,
    pub availability: AvailabilityConfig,
    pub debug: DebugConfig,
    pub strict_mimetype_exceptions: usize,
    pub transformers: Vec<SanitizedTransformerConfig>,
}

/// Sanitized transformer (URL hidden, only shows if configured)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTransformerConfig {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_configured: Option<bool>,
    pub supported: usize,
    pub options: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            engine: config.engine.clone(),
            availability: config.availability.clone(),
            debug: config.debug.clone(),
            strict_mimetype_exceptions: config
                .strict_mimetype_exceptions
                .values()
                .map(Vec::len)
                .sum(),
            transformers: config
                .transformers
                .iter()
                .map(|t| SanitizedTransformerConfig {
                    name: t.name.clone(),
                    kind: t.kind.label().to_string(),
                    url_configured: match &t.kind {
                        TransformerKindConfig::Simple { base_url, .. } => Some(
                            config.url_override(&t.name).is_some()
                                || base_url.as_deref().is_some_and(|u| !u.trim().is_empty()),
                        ),
                        _ => None,
                    },
                    supported: t.supported.len(),
                    options: t.options.clone(),
                })
                .collect(),
        }
    }
}
