//! Failover executor.

use tracing::debug;

use super::context::TransformContext;
use super::env::TransformEnv;
use super::error::TransformError;
use super::local::FailoverTransform;
use super::run::{run_transform, TransformRequest};
use crate::content::ContentWriter;
use crate::engine::Loaded;

/// Tries each available candidate in order on a fresh copy of the source.
/// The first success wins. Every failure, unsupported ones included, is
/// kept and the next candidate tried.
pub(crate) async fn transform(
    env: &TransformEnv,
    loaded: &Loaded,
    failover: &FailoverTransform,
    request: TransformRequest<'_>,
    writer: &mut dyn ContentWriter,
    ctx: &mut TransformContext,
) -> Result<(), TransformError> {
    let mut last_error: Option<TransformError> = None;

    for candidate in &failover.candidates {
        if !env.tracker.is_available(candidate).await {
            debug!(
                failover = %failover.name,
                candidate = candidate.name(),
                "Skipping unavailable candidate"
            );
            continue;
        }

        let fresh = request.reader.reader();
        let attempt = TransformRequest {
            reader: fresh.as_ref(),
            ..request
        };
        match run_transform(env, loaded, candidate, attempt, writer, ctx).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!(
                    failover = %failover.name,
                    candidate = candidate.name(),
                    error = %e,
                    "Candidate failed"
                );
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(cause) => Err(TransformError::content_io_caused_by(
            format!("All {} transformers failed", failover.candidates.len()),
            cause,
        )),
        None => Err(TransformError::content_io(format!(
            "Failover {} has no available transformers",
            failover.name
        ))),
    }
}
