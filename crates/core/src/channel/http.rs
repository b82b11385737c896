//! HTTP channel to a T-Engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::RemoteError;
use super::traits::{ChannelFactory, ProbeResult, RemoteTransformChannel, RemoteTransformRequest};
use crate::content::{ContentError, ContentWriter};

/// Channel speaking the T-Engine HTTP protocol.
///
/// The probe is `GET {base}/version`; a transform is a multipart
/// `POST {base}/transform` whose response body is the result.
pub struct HttpTransformChannel {
    client: Client,
    base_url: String,
    probe_timeout: Duration,
}

impl HttpTransformChannel {
    /// Create a channel sharing `client`.
    pub fn new(client: Client, base_url: &str, probe_timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            probe_timeout,
        }
    }

    fn version_url(&self) -> String {
        format!("{}/version", self.base_url)
    }

    fn transform_url(&self) -> String {
        format!("{}/transform", self.base_url)
    }

    async fn build_form(&self, request: &RemoteTransformRequest<'_>) -> Result<Form, RemoteError> {
        let bytes = request.reader.read_bytes().await?;
        let file_part = Part::bytes(bytes)
            .file_name(format!("source.{}", request.source_extension))
            .mime_str(request.source_mimetype)
            .map_err(|e| RemoteError::Transport(format!("Invalid source mimetype: {}", e)))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("sourceMimetype", request.source_mimetype.to_string())
            .text("sourceExtension", request.source_extension.to_string())
            .text("targetExtension", request.target_extension.to_string());
        if let Some(timeout) = request.timeout_ms {
            form = form.text("timeout", timeout.to_string());
        }
        for (key, value) in &request.args {
            form = form.text(key.clone(), value.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl RemoteTransformChannel for HttpTransformChannel {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn probe(&self) -> ProbeResult {
        let response = match self
            .client
            .get(self.version_url())
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ProbeResult::down(RemoteError::from(e).to_string()),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            ProbeResult::up(body.trim().to_string())
        } else {
            ProbeResult::down(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ))
        }
    }

    async fn send(
        &self,
        request: RemoteTransformRequest<'_>,
        writer: &mut dyn ContentWriter,
    ) -> Result<(), RemoteError> {
        let form = self.build_form(&request).await?;
        debug!(
            url = %self.transform_url(),
            source_extension = request.source_extension,
            target_extension = request.target_extension,
            args = request.args.len(),
            "Sending transform request"
        );

        let mut builder = self.client.post(self.transform_url()).multipart(form);
        if let Some(timeout) = request.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        let mut response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let mut out = writer.content_output_stream().await?;
        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).await.map_err(ContentError::from)?;
        }
        out.shutdown().await.map_err(ContentError::from)?;
        Ok(())
    }
}

/// Factory producing [`HttpTransformChannel`]s over one shared client.
pub struct HttpChannelFactory {
    client: Client,
    probe_timeout: Duration,
}

impl HttpChannelFactory {
    /// Create a factory whose probes give up after `probe_timeout`.
    pub fn new(probe_timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            probe_timeout,
        })
    }
}

impl ChannelFactory for HttpChannelFactory {
    fn channel(&self, _name: &str, base_url: &str) -> Arc<dyn RemoteTransformChannel> {
        Arc::new(HttpTransformChannel::new(
            self.client.clone(),
            base_url,
            self.probe_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let channel = HttpTransformChannel::new(
            Client::new(),
            "http://localhost:8090/",
            Duration::from_secs(1),
        );
        assert_eq!(channel.endpoint(), "http://localhost:8090");
        assert_eq!(channel.version_url(), "http://localhost:8090/version");
        assert_eq!(channel.transform_url(), "http://localhost:8090/transform");
    }

    #[test]
    fn test_factory_builds_channel_for_url() {
        let factory = HttpChannelFactory::new(Duration::from_secs(1)).unwrap();
        let channel = factory.channel("libreoffice", "http://engine:8090");
        assert_eq!(channel.endpoint(), "http://engine:8090");
    }

    #[tokio::test]
    async fn test_probe_unreachable_engine_reports_down() {
        // Port 1 on loopback refuses connections
        let channel = HttpTransformChannel::new(
            Client::new(),
            "http://127.0.0.1:1",
            Duration::from_secs(2),
        );
        let result = channel.probe().await;
        assert!(!result.available);
        assert!(!result.message.is_empty());
    }
}
