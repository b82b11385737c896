//! Error types at the transform boundary.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::channel::RemoteError;
use crate::content::ContentError;

type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Diagnostic context attached to a content I/O failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    /// Mimetype the caller claimed for the source.
    pub claimed_mimetype: Option<String>,
    /// Mimetype detected from the source bytes, if it differed.
    pub detected_mimetype: Option<String>,
    /// Description of the source reader.
    pub reader: Option<String>,
    /// Description of the target writer.
    pub writer: Option<String>,
    /// Options in effect when the failure happened.
    pub options: HashMap<String, String>,
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reader) = &self.reader {
            write!(f, "\n   reader: {}", reader)?;
        }
        if let Some(writer) = &self.writer {
            write!(f, "\n   writer: {}", writer)?;
        }
        if !self.options.is_empty() {
            let mut keys: Vec<_> = self.options.keys().collect();
            keys.sort();
            write!(f, "\n   options: {:?}", keys)?;
        }
        Ok(())
    }
}

/// The two failure kinds a transform can surface.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The requested combination cannot or should not be performed.
    #[error("Unsupported transformation: {message}")]
    Unsupported { message: String },

    /// An unexpected failure while executing the transform.
    #[error("{message}")]
    ContentIo {
        message: String,
        context: Box<FailureContext>,
        #[source]
        source: Option<BoxedCause>,
    },
}

impl TransformError {
    /// Creates an unsupported transformation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates a content I/O failure without a cause.
    pub fn content_io(message: impl Into<String>) -> Self {
        Self::ContentIo {
            message: message.into(),
            context: Box::default(),
            source: None,
        }
    }

    /// Creates a content I/O failure wrapping a cause.
    pub fn content_io_caused_by(message: impl Into<String>, cause: impl Into<BoxedCause>) -> Self {
        Self::ContentIo {
            message: message.into(),
            context: Box::default(),
            source: Some(cause.into()),
        }
    }

    /// Attaches diagnostic context. No-op for unsupported errors.
    pub fn with_context(mut self, ctx: FailureContext) -> Self {
        if let Self::ContentIo { context, .. } = &mut self {
            **context = ctx;
        }
        self
    }

    /// Whether this error signals an unsupported transformation.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Diagnostic context, if any.
    pub fn context(&self) -> Option<&FailureContext> {
        match self {
            Self::ContentIo { context, .. } => Some(context),
            Self::Unsupported { .. } => None,
        }
    }

    /// The message of the innermost error in the `source()` chain.
    pub fn root_cause_message(&self) -> String {
        root_cause_message(self)
    }
}

/// Walks the `source()` chain and returns the innermost message.
pub fn root_cause_message(err: &(dyn StdError + 'static)) -> String {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    let message = current.to_string();
    if message.is_empty() {
        "unknown error".to_string()
    } else {
        message
    }
}

impl From<ContentError> for TransformError {
    fn from(err: ContentError) -> Self {
        Self::content_io_caused_by(format!("Content I/O failed: {}", err), err)
    }
}

impl From<RemoteError> for TransformError {
    fn from(err: RemoteError) -> Self {
        Self::content_io_caused_by(format!("Remote transform failed: {}", err), err)
    }
}
