//! Simple remote executor.

use std::collections::HashMap;
use std::time::Duration;

use super::error::TransformError;
use super::local::RemoteTransform;
use super::run::TransformRequest;
use crate::channel::{RemoteError, RemoteTransformRequest};
use crate::content::ContentWriter;
use crate::debug::ms;
use crate::registry::TIMEOUT_OPTION;

/// Sends the source to the transformer's engine and streams the result back.
pub(crate) async fn transform(
    remote: &RemoteTransform,
    request: TransformRequest<'_>,
    source_ext: &str,
    target_ext: &str,
    writer: &mut dyn ContentWriter,
) -> Result<(), TransformError> {
    let (args, timeout_ms) = flatten_options(request.options);
    let target_mimetype = writer.mimetype().to_string();

    let outbound = RemoteTransformRequest {
        reader: request.reader,
        source_mimetype: request.reader.mimetype(),
        source_extension: source_ext,
        target_extension: target_ext,
        timeout_ms,
        args,
    };
    let send = remote.channel.send(outbound, writer);

    let sent = match timeout_ms {
        Some(limit) => match tokio::time::timeout(Duration::from_millis(limit), send).await {
            Ok(result) => result,
            Err(_) => {
                return Err(TransformError::content_io_caused_by(
                    format!(
                        "{} did not respond within {}",
                        remote.name,
                        ms(u128::from(limit))
                    ),
                    RemoteError::Timeout,
                ));
            }
        },
        None => send.await,
    };
    sent.map_err(|e| {
        TransformError::content_io_caused_by(
            format!("Remote transform {} failed: {}", remote.name, e),
            e,
        )
    })?;

    if writer.mimetype().is_empty() {
        writer.set_mimetype(&target_mimetype);
    }
    Ok(())
}

/// Splits options into sorted (name, value) pairs and the timeout.
pub(crate) fn flatten_options(
    options: &HashMap<String, String>,
) -> (Vec<(String, String)>, Option<u64>) {
    let mut args = Vec::with_capacity(options.len());
    let mut timeout_ms = None;
    for (name, value) in options {
        if name == TIMEOUT_OPTION {
            timeout_ms = parse_timeout(value);
        } else {
            args.push((name.clone(), value.clone()));
        }
    }
    args.sort();
    (args, timeout_ms)
}

/// Timeout in milliseconds. Negative or malformed values mean no deadline.
pub(crate) fn parse_timeout(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|ms| u64::try_from(ms).ok())
}
