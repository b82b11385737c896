//! The transform service callers talk to.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::loaded::Loaded;
use super::report;
use crate::availability::AvailabilityTracker;
use crate::channel::ChannelFactory;
use crate::config::Config;
use crate::content::{ContentReader, ContentWriter, SpoolProvider};
use crate::debug::{file_size, options_summary, FrameDetails, TransformTracer, NO_TRANSFORMERS};
use crate::mimetype::MimetypeLookup;
use crate::registry::{RegistryBuilder, RegistryError, RegistrySnapshot, TransformerSpec};
use crate::transform::{
    run_transform, StrictMimetypeExceptions, TransformContext, TransformEnv, TransformError,
    TransformRequest,
};

/// Resolves and runs transforms against the current registry.
///
/// The registry and its executors are replaced as a whole on [`reload`], so
/// calls already running keep the snapshot they started with.
///
/// [`reload`]: TransformService::reload
pub struct TransformService {
    env: TransformEnv,
    loaded: RwLock<Arc<Loaded>>,
    factory: Arc<dyn ChannelFactory>,
}

impl TransformService {
    /// A service with an empty registry.
    pub fn new(env: TransformEnv, factory: Arc<dyn ChannelFactory>) -> Self {
        let loaded = Loaded::new(RegistrySnapshot::empty(), factory.as_ref());
        Self {
            env,
            loaded: RwLock::new(Arc::new(loaded)),
            factory,
        }
    }

    /// Builds the service and registers the configured transformers. Invalid
    /// definitions are skipped and returned.
    pub fn from_config(
        config: &Config,
        lookup: Arc<dyn MimetypeLookup>,
        factory: Arc<dyn ChannelFactory>,
    ) -> (Self, Vec<RegistryError>) {
        let env = TransformEnv::new(
            AvailabilityTracker::new(config.availability.probe_timeout()),
            lookup,
            SpoolProvider::new(config.engine.spool_dir.clone()),
            Arc::new(TransformTracer::new(config.debug.enabled)),
            config.engine.settings(),
            StrictMimetypeExceptions::from_map(&config.strict_mimetype_exceptions),
        );
        let service = Self::new(env, factory);
        let skipped = service.reload(config.to_specs());
        (service, skipped)
    }

    /// Replaces the registry. Availability is forgotten so every transformer
    /// is probed afresh.
    pub fn reload(&self, specs: Vec<TransformerSpec>) -> Vec<RegistryError> {
        let mut builder = RegistryBuilder::new();
        let skipped = builder.register_all(specs);
        let loaded = Loaded::new(builder.build(), self.factory.as_ref());
        info!(
            transformers = loaded.snapshot().transformers().len(),
            transforms = loaded.snapshot().count_supported_transforms(false),
            skipped = skipped.len(),
            "Loaded transformer registry"
        );

        *self.loaded.write() = Arc::new(loaded);
        self.env.tracker.reset();
        skipped
    }

    fn current(&self) -> Arc<Loaded> {
        Arc::clone(&self.loaded.read())
    }

    /// Name of the transformer that would run, or `None` when unsupported.
    ///
    /// Options and rendition do not narrow the choice; they are logged only.
    pub async fn resolve(
        &self,
        source_mimetype: &str,
        source_size: i64,
        target_mimetype: &str,
        options: &HashMap<String, String>,
        rendition: Option<&str>,
    ) -> Option<String> {
        let loaded = self.current();
        let found = loaded
            .resolve(
                &self.env.tracker,
                source_mimetype,
                source_size,
                target_mimetype,
            )
            .await
            .map(|t| t.name().to_string());
        debug!(
            source = source_mimetype,
            target = target_mimetype,
            size = %file_size(source_size),
            options = %options_summary(options),
            rendition,
            transformer = found.as_deref().unwrap_or("none"),
            "Resolved transformer"
        );
        found
    }

    pub async fn is_supported(
        &self,
        source_mimetype: &str,
        source_size: i64,
        target_mimetype: &str,
        options: &HashMap<String, String>,
        rendition: Option<&str>,
    ) -> bool {
        self.resolve(
            source_mimetype,
            source_size,
            target_mimetype,
            options,
            rendition,
        )
        .await
        .is_some()
    }

    /// Largest source the available transformers accept for the pair.
    /// -1 means unlimited and 0 means unsupported.
    pub async fn find_max_source_size_bytes(
        &self,
        source_mimetype: &str,
        target_mimetype: &str,
        options: &HashMap<String, String>,
        rendition: Option<&str>,
    ) -> i64 {
        let loaded = self.current();
        let max = loaded
            .find_max_source_size_bytes(&self.env.tracker, source_mimetype, target_mimetype)
            .await;
        debug!(
            source = source_mimetype,
            target = target_mimetype,
            options = %options_summary(options),
            rendition,
            max = %file_size(max),
            "Max source size"
        );
        max
    }

    /// A fresh per-call context.
    pub fn new_context(&self) -> TransformContext {
        TransformContext::new(&self.env.tracer)
    }

    /// Transforms `reader` into `writer`, choosing the transformer from their
    /// mimetypes.
    pub async fn transform(
        &self,
        reader: &dyn ContentReader,
        writer: &mut dyn ContentWriter,
        options: &HashMap<String, String>,
        rendition: Option<&str>,
        source_ref: Option<&str>,
    ) -> Result<(), TransformError> {
        let mut ctx = self.new_context();
        self.transform_traced(&mut ctx, reader, writer, options, rendition, source_ref)
            .await
    }

    /// Like [`transform`](Self::transform), recording into `ctx`.
    pub async fn transform_traced(
        &self,
        ctx: &mut TransformContext,
        reader: &dyn ContentReader,
        writer: &mut dyn ContentWriter,
        options: &HashMap<String, String>,
        rendition: Option<&str>,
        source_ref: Option<&str>,
    ) -> Result<(), TransformError> {
        let loaded = self.current();
        let source_mimetype = reader.mimetype().to_string();
        let target_mimetype = writer.mimetype().to_string();
        let source_ext = self.env.extension_of(&source_mimetype);
        let target_ext = self.env.extension_of(&target_mimetype);
        let source_size = TransformEnv::source_size(reader);

        ctx.trace.push_available(FrameDetails {
            transformer_name: None,
            source_mimetype: &source_mimetype,
            target_mimetype: &target_mimetype,
            source_extension: source_ext.as_deref(),
            target_extension: target_ext.as_deref(),
            source_size,
            rendition,
            source_ref,
        });

        let result = match loaded
            .resolve(
                &self.env.tracker,
                &source_mimetype,
                source_size,
                &target_mimetype,
            )
            .await
        {
            Some(transform) => {
                let request = TransformRequest {
                    reader,
                    options,
                    rendition,
                    source_ref,
                };
                run_transform(&self.env, &loaded, &transform, request, writer, ctx).await
            }
            None => {
                ctx.trace.set_failure_reason(NO_TRANSFORMERS);
                Err(TransformError::unsupported(format!(
                    "No transformer for {} ({}) to {}",
                    source_mimetype,
                    file_size(source_size),
                    target_mimetype
                )))
            }
        };

        ctx.trace.pop();
        result
    }

    /// Runs the named transformer directly, without resolution.
    pub async fn transform_with(
        &self,
        ctx: &mut TransformContext,
        name: &str,
        reader: &dyn ContentReader,
        writer: &mut dyn ContentWriter,
        options: &HashMap<String, String>,
    ) -> Result<(), TransformError> {
        let loaded = self.current();
        let Some(transform) = loaded.transform(name).cloned() else {
            return Err(TransformError::unsupported(format!(
                "No transformer named {}",
                name
            )));
        };
        let request = TransformRequest {
            reader,
            options,
            rendition: None,
            source_ref: None,
        };
        run_transform(&self.env, &loaded, &transform, request, writer, ctx).await
    }

    /// Capability table, optionally narrowed to source and target extensions.
    pub fn transformations_report(
        &self,
        source_extension: Option<&str>,
        target_extension: Option<&str>,
    ) -> String {
        let loaded = self.current();
        report::render(
            loaded.snapshot(),
            self.env.lookup.as_ref(),
            &self.env.tracker,
            source_extension,
            target_extension,
        )
    }

    /// The registry currently in use.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(self.current().snapshot())
    }

    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.env.tracker
    }

    pub fn tracer(&self) -> &Arc<TransformTracer> {
        &self.env.tracer
    }

    pub fn spool(&self) -> &SpoolProvider {
        &self.env.spool
    }
}

impl std::fmt::Debug for TransformService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformService")
            .field("env", &self.env)
            .field("loaded", &self.loaded.read())
            .finish()
    }
}
