//! Streaming Transport
//!
//! One interface, two implementations. Direct mode runs the orchestrator and
//! chat agent in-process; remote mode consumes framed output from an
//! analysis server over a long-lived connection. The engine selects one at
//! construction time from configuration, so callers never branch on mode.

pub mod direct;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use sop_pilot_core::{ChatContext, Frame, PipelineResult, ProcedureSource, WorkItem};

use crate::config::{EngineConfig, TransportMode};
use self::direct::DirectTransport;
use self::remote::RemoteTransport;

/// Frames delivered to the consumer, in production order.
pub type FrameStream = ReceiverStream<Frame>;

/// Capacity of the producer-to-consumer frame channel.
pub(crate) const CHANNEL_CAPACITY: usize = 100;

/// What the caller wants streamed.
#[derive(Debug, Clone)]
pub enum StreamRequest {
    /// Run the four-stage pipeline over an item
    Analyze { item: WorkItem },
    /// Answer a follow-up question in context
    Chat {
        message: String,
        context: ChatContext,
    },
}

impl StreamRequest {
    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            StreamRequest::Analyze { item } => format!("analyze item {}", item.id),
            StreamRequest::Chat { context, .. } => {
                format!("chat about item {}", context.item.id)
            }
        }
    }
}

/// Failure to start a stream at all.
///
/// Anything that goes wrong after a successful open arrives in-band: as an
/// error frame or as stream termination.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not be opened (connection refused, endpoint down)
    #[error("Transport open failed: {0}")]
    OpenFailed(String),
    /// The configuration lacks what this mode needs
    #[error("Transport not configured: {0}")]
    NotConfigured(String),
}

/// A source of reasoning and chat frames.
#[async_trait]
pub trait StreamingTransport: Send + Sync {
    /// Which mode this transport implements.
    fn mode(&self) -> TransportMode;

    /// Opens a frame stream for the request.
    async fn open(
        &self,
        request: StreamRequest,
        cancel: CancellationToken,
    ) -> Result<FrameStream, TransportError>;
}

/// Builds the transport selected by the configuration.
pub fn build_transport(
    config: &EngineConfig,
    procedures: Arc<dyn ProcedureSource>,
) -> PipelineResult<Arc<dyn StreamingTransport>> {
    match config.mode {
        TransportMode::Direct => Ok(Arc::new(DirectTransport::from_config(
            config, procedures,
        )?)),
        TransportMode::Remote => {
            let remote = config
                .remote
                .as_ref()
                .ok_or_else(|| {
                    sop_pilot_core::PipelineError::config(
                        "remote mode requires a remote endpoint",
                    )
                })?;
            Ok(Arc::new(RemoteTransport::new(
                &remote.base_url,
                config.idle_timeout_ms,
            )?))
        }
    }
}
