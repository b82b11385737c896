//! Mimetype-mismatch guard.
//!
//! The strict check refuses an outermost transform whose content does not
//! look like its declared type. Recovery runs after a content failure at any
//! depth and, when the content turns out to be something else, retries once
//! with the detected type.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use super::context::TransformContext;
use super::env::TransformEnv;
use super::error::{FailureContext, TransformError};
use super::run::{run_transform, TransformRequest};
use crate::content::{relabel, ContentReader, ContentWriter};
use crate::debug::loggable_options;
use crate::engine::Loaded;
use crate::metrics;

const STOCK_EXCEPTIONS: &[(&str, &str)] = &[
    ("application/eps", "application/postscript"),
    ("application/illustrator", "application/pdf"),
    ("application/x-tar", "application/x-gtar"),
    ("application/acp", "application/zip"),
    ("application/vnd.stardivision.math", "application/x-tika-msoffice"),
    ("application/x-iwork-pages", "application/zip"),
    ("application/x-iwork-numbers", "application/zip"),
    ("application/x-iwork-keynote", "application/zip"),
];

/// Declared mimetypes whose content may legitimately be detected as
/// something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrictMimetypeExceptions {
    allowed: HashMap<String, BTreeSet<String>>,
}

impl Default for StrictMimetypeExceptions {
    fn default() -> Self {
        let mut exceptions = Self::empty();
        for (declared, detected) in STOCK_EXCEPTIONS {
            exceptions.allow(declared, detected);
        }
        exceptions
    }
}

impl StrictMimetypeExceptions {
    /// A table tolerating nothing.
    pub fn empty() -> Self {
        Self {
            allowed: HashMap::new(),
        }
    }

    /// Builds a table from declared mimetype to tolerated detected mimetypes.
    pub fn from_map(map: &HashMap<String, Vec<String>>) -> Self {
        let mut exceptions = Self::empty();
        for (declared, detected) in map {
            for d in detected {
                exceptions.allow(declared, d);
            }
        }
        exceptions
    }

    pub fn allow(&mut self, declared: &str, detected: &str) {
        self.allowed
            .entry(declared.to_ascii_lowercase())
            .or_default()
            .insert(detected.to_ascii_lowercase());
    }

    pub fn is_allowed(&self, declared: &str, detected: &str) -> bool {
        self.allowed
            .get(&declared.to_ascii_lowercase())
            .is_some_and(|set| set.contains(&detected.to_ascii_lowercase()))
    }

    /// The table in its configuration shape.
    pub fn to_map(&self) -> HashMap<String, Vec<String>> {
        self.allowed
            .iter()
            .map(|(declared, detected)| (declared.clone(), detected.iter().cloned().collect()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.allowed.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Refuses content whose detected type differs from the declared one, unless
/// the pair is tolerated.
pub(crate) async fn strict_check(
    env: &TransformEnv,
    reader: &dyn ContentReader,
) -> Result<(), TransformError> {
    let declared = reader.mimetype();
    let Some(detected) = env.lookup.detect_mimetype(reader).await else {
        return Ok(());
    };
    if env.exceptions.is_allowed(declared, &detected) {
        debug!(
            declared,
            detected = %detected,
            "Tolerated mimetype mismatch"
        );
        return Ok(());
    }
    warn!(
        declared,
        detected = %detected,
        reader = %reader.describe(),
        "Content does not match its declared mimetype"
    );
    Err(TransformError::unsupported(format!(
        "Transformation of ({}) has not taken place because the declared mimetype ({}) \
         does not match the detected mimetype ({})",
        reader.describe(),
        declared,
        detected
    )))
}

/// Handles a content failure. When the content is really of another type
/// and retrying is enabled, the transform is retried once with that type.
pub(crate) async fn recover(
    env: &TransformEnv,
    loaded: &Loaded,
    request: TransformRequest<'_>,
    writer: &mut dyn ContentWriter,
    ctx: &mut TransformContext,
    err: TransformError,
) -> Result<(), TransformError> {
    let claimed = request.reader.mimetype().to_string();
    let fresh = request.reader.reader();
    let detected = env.lookup.detect_mimetype(fresh.as_ref()).await;

    let failure = FailureContext {
        claimed_mimetype: Some(claimed.clone()),
        detected_mimetype: detected.clone(),
        reader: Some(request.reader.describe()),
        writer: Some(writer.describe()),
        options: loggable_options(request.options),
    };

    let Some(detected) = detected else {
        return Err(attach(err, failure));
    };

    if !env.settings.retry_transform_on_different_mimetype {
        metrics::MIMETYPE_RETRIES.with_label_values(&["disabled"]).inc();
        return Err(TransformError::content_io_caused_by(
            format!(
                "Content claimed to be {} but was detected as {}",
                claimed, detected
            ),
            err,
        )
        .with_context(failure));
    }

    let relabelled = relabel(fresh.as_ref(), &detected);
    let target = writer.mimetype().to_string();
    let size = TransformEnv::source_size(relabelled.as_ref());
    let Some(retry) = loaded
        .resolve(&env.tracker, &detected, size, &target)
        .await
    else {
        metrics::MIMETYPE_RETRIES
            .with_label_values(&["no_transformer"])
            .inc();
        return Err(TransformError::content_io_caused_by(
            format!(
                "Content claimed to be {} was detected as {}, which cannot be transformed to {}",
                claimed, detected, target
            ),
            err,
        )
        .with_context(failure));
    };

    metrics::MIMETYPE_RETRIES.with_label_values(&["retried"]).inc();
    ctx.trace.debug(&format!(
        "Retrying as {} with {} after: {}",
        detected,
        retry.name(),
        err
    ));

    let retried = TransformRequest {
        reader: relabelled.as_ref(),
        ..request
    };
    match run_transform(env, loaded, &retry, retried, writer, ctx).await {
        Err(e) if e.is_unsupported() => Err(TransformError::content_io_caused_by(
            format!("Retry as {} was refused", detected),
            e,
        )
        .with_context(failure)),
        other => other,
    }
}

// Keeps context already attached by a deeper frame.
fn attach(err: TransformError, failure: FailureContext) -> TransformError {
    match err.context() {
        Some(existing) if *existing == FailureContext::default() => err.with_context(failure),
        _ => err,
    }
}
