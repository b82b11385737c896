//! Trait definitions for remote transform channels.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::RemoteError;
use crate::content::{ContentReader, ContentWriter};

/// Outcome of a liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub available: bool,
    /// Free-text diagnostic, usually the engine's version string or the failure.
    pub message: String,
}

impl ProbeResult {
    pub fn up(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
        }
    }
}

/// One outbound transform request.
pub struct RemoteTransformRequest<'a> {
    pub reader: &'a dyn ContentReader,
    pub source_mimetype: &'a str,
    pub source_extension: &'a str,
    pub target_extension: &'a str,
    /// Hard deadline in milliseconds, if any.
    pub timeout_ms: Option<u64>,
    /// Flattened options, already filtered and without the timeout.
    pub args: Vec<(String, String)>,
}

/// Request/response channel to one remote transform engine.
#[async_trait]
pub trait RemoteTransformChannel: Send + Sync {
    /// Base URL or other address of the engine.
    fn endpoint(&self) -> &str;

    /// Asks the engine whether it is alive. Never fails; failures report down.
    async fn probe(&self) -> ProbeResult;

    /// Sends the source and streams the result into `writer`.
    async fn send(
        &self,
        request: RemoteTransformRequest<'_>,
        writer: &mut dyn ContentWriter,
    ) -> Result<(), RemoteError>;
}

/// Creates channels for configured transformers.
pub trait ChannelFactory: Send + Sync {
    fn channel(&self, name: &str, base_url: &str) -> Arc<dyn RemoteTransformChannel>;
}
