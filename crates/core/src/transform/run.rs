//! The single dispatch point shared by every executor.

use std::collections::HashMap;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use super::context::TransformContext;
use super::env::TransformEnv;
use super::error::TransformError;
use super::local::LocalTransform;
use super::{failover, guard, pass_through, pipeline, remote};
use crate::content::{ContentReader, ContentWriter};
use crate::debug::FrameDetails;
use crate::engine::Loaded;
use crate::metrics;
use crate::registry::strip_options;

/// Inputs of one transform invocation other than the writer.
#[derive(Clone, Copy)]
pub(crate) struct TransformRequest<'a> {
    pub reader: &'a dyn ContentReader,
    pub options: &'a HashMap<String, String>,
    pub rendition: Option<&'a str>,
    pub source_ref: Option<&'a str>,
}

/// Runs `transform` with the shared pre and post steps around it.
///
/// An unavailable transform is a silent no-op. Unknown extensions are
/// unsupported. Options are stripped to what the transform declares, a trace
/// frame is pushed, and the strict mimetype check runs for the outermost call.
/// A content failure goes through the mismatch guard. The frame is popped and
/// the depth restored on every path.
pub(crate) fn run_transform<'a>(
    env: &'a TransformEnv,
    loaded: &'a Loaded,
    transform: &'a LocalTransform,
    request: TransformRequest<'a>,
    writer: &'a mut dyn ContentWriter,
    ctx: &'a mut TransformContext,
) -> BoxFuture<'a, Result<(), TransformError>> {
    async move {
        if !env.tracker.is_available(transform).await {
            debug!(
                transformer = transform.name(),
                "Transformer is not available, skipping"
            );
            return Ok(());
        }

        let source_mimetype = request.reader.mimetype().to_string();
        let target_mimetype = writer.mimetype().to_string();
        let source_ext = env.extension_of(&source_mimetype).ok_or_else(|| {
            TransformError::unsupported(format!(
                "No file extension for source mimetype {}",
                source_mimetype
            ))
        })?;
        let target_ext = env.extension_of(&target_mimetype).ok_or_else(|| {
            TransformError::unsupported(format!(
                "No file extension for target mimetype {}",
                target_mimetype
            ))
        })?;

        let options = strip_options(transform.all_option_names(), request.options);
        let request = TransformRequest {
            options: &options,
            ..request
        };

        ctx.depth += 1;
        ctx.trace.push_transform(
            FrameDetails {
                transformer_name: Some(transform.name()),
                source_mimetype: &source_mimetype,
                target_mimetype: &target_mimetype,
                source_extension: Some(&source_ext),
                target_extension: Some(&target_ext),
                source_size: TransformEnv::source_size(request.reader),
                rendition: request.rendition,
                source_ref: request.source_ref,
            },
            &options,
        );
        let started = Instant::now();

        let result = execute(
            env,
            loaded,
            transform,
            request,
            &source_ext,
            &target_ext,
            writer,
            ctx,
        )
        .await;

        let outcome = match &result {
            Ok(()) => "success",
            Err(e) if e.is_unsupported() => "unsupported",
            Err(_) => "failed",
        };
        if let Err(e) = &result {
            ctx.trace.fail("Failed", e);
        }
        ctx.trace.pop();
        ctx.depth -= 1;

        metrics::TRANSFORM_REQUESTS
            .with_label_values(&[transform.name(), outcome])
            .inc();
        metrics::TRANSFORM_DURATION
            .with_label_values(&[transform.name()])
            .observe(started.elapsed().as_secs_f64());

        result
    }
    .boxed()
}

#[allow(clippy::too_many_arguments)]
async fn execute(
    env: &TransformEnv,
    loaded: &Loaded,
    transform: &LocalTransform,
    request: TransformRequest<'_>,
    source_ext: &str,
    target_ext: &str,
    writer: &mut dyn ContentWriter,
    ctx: &mut TransformContext,
) -> Result<(), TransformError> {
    if ctx.depth == 1 && env.settings.strict_mimetype_check {
        guard::strict_check(env, request.reader).await?;
    }

    let result = match transform {
        LocalTransform::PassThrough(_) => pass_through::transform(request.reader, writer).await,
        LocalTransform::Remote(remote) => {
            remote::transform(remote, request, source_ext, target_ext, writer).await
        }
        LocalTransform::Pipeline(pipeline) => {
            pipeline::transform(env, loaded, pipeline, request, writer, ctx).await
        }
        LocalTransform::Failover(failover) => {
            failover::transform(env, loaded, failover, request, writer, ctx).await
        }
    };

    match result {
        Err(e) if !e.is_unsupported() => guard::recover(env, loaded, request, writer, ctx, e).await,
        other => other,
    }
}
