//! Mock remote transform channel for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::{
    ChannelFactory, ProbeResult, RemoteError, RemoteTransformChannel, RemoteTransformRequest,
};
use crate::content::ContentWriter;

/// A recorded send for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub source_mimetype: String,
    pub source_extension: String,
    pub target_extension: String,
    /// Mimetype of the writer the result went to.
    pub target_mimetype: String,
    pub timeout_ms: Option<u64>,
    pub args: Vec<(String, String)>,
    /// Source bytes as the channel received them.
    pub content: Vec<u8>,
}

/// Mock implementation of the RemoteTransformChannel trait.
///
/// Provides controllable behavior for testing:
/// - Scripted probe results and probe latency
/// - Scripted output bytes or a failure for every send
/// - Every send recorded for assertions
///
/// # Example
///
/// ```rust,ignore
/// use transform_core::testing::MockTransformChannel;
///
/// let channel = MockTransformChannel::new("http://libreoffice:8090");
/// channel.set_output(b"%PDF-1.4".to_vec());
///
/// // ... run a transform through the channel ...
///
/// assert_eq!(channel.send_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockTransformChannel {
    endpoint: String,
    probe_result: Mutex<ProbeResult>,
    probe_delay: Mutex<Option<Duration>>,
    probes: Mutex<usize>,
    output: Mutex<Vec<u8>>,
    failure: Mutex<Option<String>>,
    send_delay: Mutex<Option<Duration>>,
    sends: Mutex<Vec<RecordedSend>>,
}

impl MockTransformChannel {
    /// Create a mock channel that is up and answers with placeholder output.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            probe_result: Mutex::new(ProbeResult::up("mock 1.0")),
            probe_delay: Mutex::new(None),
            probes: Mutex::new(0),
            output: Mutex::new(b"mock output".to_vec()),
            failure: Mutex::new(None),
            send_delay: Mutex::new(None),
            sends: Mutex::new(Vec::new()),
        }
    }

    /// Set what the next probes report.
    pub fn set_probe_result(&self, result: ProbeResult) {
        *self.probe_result.lock() = result;
    }

    /// Make probes take this long.
    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock() = Some(delay);
    }

    /// Get the number of probes received.
    pub fn probe_count(&self) -> usize {
        *self.probes.lock()
    }

    /// Set the bytes written for every successful send.
    pub fn set_output(&self, output: Vec<u8>) {
        *self.output.lock() = output;
    }

    /// Make every send fail as if the engine rejected it.
    pub fn fail_sends_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Let sends succeed again.
    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Make sends take this long before answering.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = Some(delay);
    }

    /// Get all recorded sends.
    pub fn sends(&self) -> Vec<RecordedSend> {
        self.sends.lock().clone()
    }

    /// Get the number of sends received.
    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }
}

#[async_trait]
impl RemoteTransformChannel for MockTransformChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn probe(&self) -> ProbeResult {
        *self.probes.lock() += 1;
        let delay = *self.probe_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.probe_result.lock().clone()
    }

    async fn send(
        &self,
        request: RemoteTransformRequest<'_>,
        writer: &mut dyn ContentWriter,
    ) -> Result<(), RemoteError> {
        let content = request.reader.read_bytes().await?;
        self.sends.lock().push(RecordedSend {
            source_mimetype: request.source_mimetype.to_string(),
            source_extension: request.source_extension.to_string(),
            target_extension: request.target_extension.to_string(),
            target_mimetype: writer.mimetype().to_string(),
            timeout_ms: request.timeout_ms,
            args: request.args,
            content,
        });

        let delay = *self.send_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().clone();
        if let Some(body) = failure {
            return Err(RemoteError::Rejected { status: 500, body });
        }

        let output = self.output.lock().clone();
        writer.put_bytes(&output).await?;
        Ok(())
    }
}

/// Mock implementation of the ChannelFactory trait.
///
/// Hands out one [`MockTransformChannel`] per transformer name. Channels can
/// be fetched with [`mock`](Self::mock) before or after the registry is
/// loaded to script their behaviour.
///
/// Provides controllable behavior for testing:
/// - Script any transformer's channel by name
/// - Record which channels the registry asked for, in order
/// - Count sends across every channel
///
/// # Example
///
/// ```rust,ignore
/// use transform_core::testing::MockChannelFactory;
///
/// let factory = Arc::new(MockChannelFactory::new());
/// factory.mock("libreoffice").fail_sends_with("renderer crashed");
///
/// // ... reload a service built on the factory and run a transform ...
///
/// assert_eq!(factory.created_channels(), vec!["libreoffice".to_string()]);
/// assert_eq!(factory.total_sends(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockChannelFactory {
    channels: Mutex<HashMap<String, Arc<MockTransformChannel>>>,
    created: Mutex<Vec<String>>,
}

impl MockChannelFactory {
    /// Create a new mock factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel for `name`, created on first use.
    pub fn mock(&self, name: &str) -> Arc<MockTransformChannel> {
        self.get_or_create(name, &format!("mock://{}", name))
    }

    /// Names passed to [`ChannelFactory::channel`], in call order.
    pub fn created_channels(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    /// Total sends across every channel.
    pub fn total_sends(&self) -> usize {
        self.channels.lock().values().map(|c| c.send_count()).sum()
    }

    fn get_or_create(&self, name: &str, endpoint: &str) -> Arc<MockTransformChannel> {
        Arc::clone(
            self.channels
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MockTransformChannel::new(endpoint))),
        )
    }
}

impl ChannelFactory for MockChannelFactory {
    fn channel(&self, name: &str, base_url: &str) -> Arc<dyn RemoteTransformChannel> {
        self.created.lock().push(name.to_string());
        self.get_or_create(name, base_url)
    }
}
