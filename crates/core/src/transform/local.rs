//! The closed set of local transform executors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::channel::{ChannelFactory, RemoteTransformChannel};
use crate::registry::{RegistrySnapshot, TransformerDefinition};

/// Copies or text-recodes the source without a remote call.
#[derive(Debug, Clone)]
pub struct PassThroughTransform {
    pub name: String,
    pub all_option_names: Arc<HashSet<String>>,
}

/// Delegates to one remote T-Engine.
#[derive(Clone)]
pub struct RemoteTransform {
    pub name: String,
    pub all_option_names: Arc<HashSet<String>>,
    pub channel: Arc<dyn RemoteTransformChannel>,
    /// How long a failed probe keeps the engine marked down.
    pub retry_period: Duration,
}

impl std::fmt::Debug for RemoteTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTransform")
            .field("name", &self.name)
            .field("endpoint", &self.channel.endpoint())
            .field("retry_period", &self.retry_period)
            .finish()
    }
}

/// One resolved pipeline step.
#[derive(Debug, Clone)]
pub struct PipelineStage {
    pub transform: Arc<LocalTransform>,
    /// Intermediate mimetype, `None` only for the last step.
    pub target_mimetype: Option<String>,
}

/// Runs child transforms in sequence through spooled intermediates.
#[derive(Debug, Clone)]
pub struct PipelineTransform {
    pub name: String,
    pub all_option_names: Arc<HashSet<String>>,
    pub stages: Vec<PipelineStage>,
}

/// Tries child transforms in order until one succeeds.
#[derive(Debug, Clone)]
pub struct FailoverTransform {
    pub name: String,
    pub all_option_names: Arc<HashSet<String>>,
    pub candidates: Vec<Arc<LocalTransform>>,
}

/// A registered transformer ready to execute.
#[derive(Debug, Clone)]
pub enum LocalTransform {
    PassThrough(PassThroughTransform),
    Remote(RemoteTransform),
    Pipeline(PipelineTransform),
    Failover(FailoverTransform),
}

impl LocalTransform {
    pub fn name(&self) -> &str {
        match self {
            Self::PassThrough(t) => &t.name,
            Self::Remote(t) => &t.name,
            Self::Pipeline(t) => &t.name,
            Self::Failover(t) => &t.name,
        }
    }

    pub fn all_option_names(&self) -> &HashSet<String> {
        match self {
            Self::PassThrough(t) => &t.all_option_names,
            Self::Remote(t) => &t.all_option_names,
            Self::Pipeline(t) => &t.all_option_names,
            Self::Failover(t) => &t.all_option_names,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PassThrough(_) => "pass_through",
            Self::Remote(_) => "simple",
            Self::Pipeline(_) => "pipeline",
            Self::Failover(_) => "failover",
        }
    }
}

/// Builds an executor for every registered transformer.
///
/// Children are always registered before their parents, so a single pass in
/// registration order can link composites to already-built children.
pub fn build_transforms(
    snapshot: &RegistrySnapshot,
    factory: &dyn ChannelFactory,
) -> HashMap<String, Arc<LocalTransform>> {
    let mut built: HashMap<String, Arc<LocalTransform>> = HashMap::new();

    for registered in snapshot.transformers() {
        let name = registered.name.clone();
        let all_option_names = Arc::clone(&registered.all_option_names);

        let transform = match &registered.definition {
            TransformerDefinition::PassThrough => {
                LocalTransform::PassThrough(PassThroughTransform {
                    name,
                    all_option_names,
                })
            }
            TransformerDefinition::Simple {
                base_url,
                startup_retry_period,
            } => LocalTransform::Remote(RemoteTransform {
                channel: factory.channel(&name, base_url),
                name,
                all_option_names,
                retry_period: *startup_retry_period,
            }),
            TransformerDefinition::Pipeline { steps } => {
                let stages: Option<Vec<_>> = steps
                    .iter()
                    .map(|step| {
                        built.get(&step.transformer).map(|t| PipelineStage {
                            transform: Arc::clone(t),
                            target_mimetype: step.target_mimetype.clone(),
                        })
                    })
                    .collect();
                let Some(stages) = stages else {
                    warn!(
                        transformer = %name,
                        "Pipeline references an unbuilt step, skipping"
                    );
                    continue;
                };
                LocalTransform::Pipeline(PipelineTransform {
                    name,
                    all_option_names,
                    stages,
                })
            }
            TransformerDefinition::Failover { candidates } => {
                let children: Option<Vec<_>> =
                    candidates.iter().map(|c| built.get(c).cloned()).collect();
                let Some(candidates) = children else {
                    warn!(
                        transformer = %name,
                        "Failover references an unbuilt candidate, skipping"
                    );
                    continue;
                };
                LocalTransform::Failover(FailoverTransform {
                    name,
                    all_option_names,
                    candidates,
                })
            }
        };

        built.insert(registered.name.clone(), Arc::new(transform));
    }

    built
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PipelineStep, RegistryBuilder, SupportedTransform, TransformerSpec};
    use crate::testing::MockChannelFactory;

    #[test]
    fn test_build_links_composites_to_children() {
        let mut builder = RegistryBuilder::new();
        builder.register(TransformerSpec::pass_through()).unwrap();
        builder
            .register(
                TransformerSpec::simple("libreoffice", "http://lo")
                    .supports(SupportedTransform::new("application/msword", "application/pdf")),
            )
            .unwrap();
        builder
            .register(TransformerSpec::simple("pdfrenderer", "http://pdf"))
            .unwrap();
        builder
            .register(TransformerSpec::pipeline(
                "docToPng",
                vec![
                    PipelineStep::new("libreoffice", Some("application/pdf")),
                    PipelineStep::new("pdfrenderer", None),
                ],
            ))
            .unwrap();
        builder
            .register(TransformerSpec::failover(
                "anyToPdf",
                vec!["libreoffice", "PassThrough"],
            ))
            .unwrap();

        let factory = MockChannelFactory::new();
        let built = build_transforms(&builder.build(), &factory);
        assert_eq!(built.len(), 5);

        match built["docToPng"].as_ref() {
            LocalTransform::Pipeline(p) => {
                assert_eq!(p.stages.len(), 2);
                assert_eq!(p.stages[0].transform.name(), "libreoffice");
                assert!(Arc::ptr_eq(&p.stages[0].transform, &built["libreoffice"]));
                assert_eq!(p.stages[1].target_mimetype, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(built["anyToPdf"].kind(), "failover");
        assert_eq!(built["PassThrough"].kind(), "pass_through");
        assert_eq!(
            factory.created_channels(),
            vec!["libreoffice", "pdfrenderer"]
        );
    }
}
