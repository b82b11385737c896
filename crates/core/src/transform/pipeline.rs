//! Pipeline executor.

use super::context::TransformContext;
use super::env::TransformEnv;
use super::error::TransformError;
use super::local::PipelineTransform;
use super::run::{run_transform, TransformRequest};
use crate::content::{ContentReader, ContentWriter};
use crate::engine::Loaded;

const FALLBACK_SPOOL_EXTENSION: &str = "tmp";

/// Runs each stage on the previous stage's output. Intermediates live in
/// spool files that are released as soon as the next stage has consumed them.
/// Only the first stage sees the caller's source reference.
pub(crate) async fn transform(
    env: &TransformEnv,
    loaded: &Loaded,
    pipeline: &PipelineTransform,
    request: TransformRequest<'_>,
    writer: &mut dyn ContentWriter,
    ctx: &mut TransformContext,
) -> Result<(), TransformError> {
    let last = pipeline.stages.len().saturating_sub(1);
    let mut spooled: Option<Box<dyn ContentReader>> = None;

    for (i, stage) in pipeline.stages.iter().enumerate() {
        let reader: &dyn ContentReader = match &spooled {
            Some(reader) => reader.as_ref(),
            None => request.reader,
        };
        let step_request = TransformRequest {
            reader,
            options: request.options,
            rendition: request.rendition,
            source_ref: if i == 0 { request.source_ref } else { None },
        };

        if i == last {
            return run_transform(env, loaded, &stage.transform, step_request, writer, ctx).await;
        }

        let Some(mimetype) = stage.target_mimetype.as_deref() else {
            return Err(TransformError::content_io(format!(
                "Pipeline {} step {} ({}) has no intermediate mimetype",
                pipeline.name,
                i,
                stage.transform.name()
            )));
        };
        let extension = env
            .extension_of(mimetype)
            .unwrap_or_else(|| FALLBACK_SPOOL_EXTENSION.to_string());
        let mut spool = env.spool.create_writer(mimetype, &extension).await?;
        run_transform(env, loaded, &stage.transform, step_request, &mut spool, ctx).await?;

        // Replacing the previous reader releases its spool file
        spooled = Some(spool.reader()?);
    }

    Ok(())
}
