//! Remote Transport
//!
//! Opens a streaming HTTP request against an analysis server and decodes its
//! newline-delimited `data: ` frames as they arrive. Byte chunks are fed
//! through [`FrameDecoder`], so frame boundaries never depend on how the
//! network split the response. Undecodable lines are skipped, a stalled
//! connection is closed after the idle timeout, and the reader stops at the
//! first terminal frame.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use sop_pilot_core::{Frame, FrameDecoder, PipelineError, PipelineResult};

use super::{FrameStream, StreamRequest, StreamingTransport, TransportError, CHANNEL_CAPACITY};
use crate::config::TransportMode;

const ANALYZE_PATH: &str = "ai/analyze";
const CHAT_PATH: &str = "ai/chat";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport backed by a remote analysis server.
pub struct RemoteTransport {
    client: reqwest::Client,
    analyze_url: Url,
    chat_url: Url,
    idle_timeout: Duration,
}

impl RemoteTransport {
    pub fn new(base_url: &str, idle_timeout_ms: u64) -> PipelineResult<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| PipelineError::config(format!("Invalid remote base URL: {}", e)))?;
        let analyze_url = base
            .join(ANALYZE_PATH)
            .map_err(|e| PipelineError::config(format!("Invalid remote base URL: {}", e)))?;
        let chat_url = base
            .join(CHAT_PATH)
            .map_err(|e| PipelineError::config(format!("Invalid remote base URL: {}", e)))?;

        // No overall request timeout: a reasoning stream is long-lived and
        // paced by the model. Staleness is handled per read instead.
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            analyze_url,
            chat_url,
            idle_timeout: Duration::from_millis(idle_timeout_ms),
        })
    }

    fn endpoint(&self, request: &StreamRequest) -> (Url, serde_json::Value) {
        match request {
            StreamRequest::Analyze { item } => (
                self.analyze_url.clone(),
                serde_json::json!({ "item": item }),
            ),
            StreamRequest::Chat { message, context } => (
                self.chat_url.clone(),
                serde_json::json!({ "message": message, "context": context }),
            ),
        }
    }
}

#[async_trait]
impl StreamingTransport for RemoteTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Remote
    }

    async fn open(
        &self,
        request: StreamRequest,
        cancel: CancellationToken,
    ) -> Result<FrameStream, TransportError> {
        let (url, body) = self.endpoint(&request);
        debug!("Opening remote stream: {} ({})", url, request.describe());

        let response = self
            .client
            .post(url)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::OpenFailed(format!(
                "analysis server returned HTTP {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            read_frames(response, tx, cancel, idle_timeout).await;
        });
        Ok(ReceiverStream::new(rx))
    }
}

/// Pumps response bytes through the decoder until the stream ends, stalls,
/// is cancelled, or delivers a terminal frame.
async fn read_frames(
    response: reqwest::Response,
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    idle_timeout: Duration,
) {
    let mut body = response.bytes_stream();
    let mut decoder = FrameDecoder::new();

    'read: loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'read,
            read = tokio::time::timeout(idle_timeout, body.next()) => read,
        };

        let chunk = match read {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(err))) => {
                // Connection dropped mid-stream; the consumer sees the
                // closed channel and reports the stream as incomplete.
                warn!("Remote stream read failed: {}", err);
                break 'read;
            }
            Ok(None) => break 'read,
            Err(_) => {
                warn!(
                    "Remote stream idle for {}ms, closing",
                    idle_timeout.as_millis()
                );
                break 'read;
            }
        };

        decoder.push(&chunk);
        while let Some(decoded) = decoder.next_frame() {
            match decoded {
                Ok(frame) => {
                    let terminal = frame.is_terminal();
                    if tx.send(frame).await.is_err() {
                        break 'read;
                    }
                    if terminal {
                        break 'read;
                    }
                }
                Err(err) => {
                    warn!("Skipping undecodable frame: {}", err);
                }
            }
        }
    }
}
