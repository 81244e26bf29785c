//! Direct Transport
//!
//! Runs producers in-process and hands the consumer the receiving end of a
//! channel. The same frame sequence crosses this boundary as crosses the
//! remote one, so consumers cannot tell the modes apart.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use sop_pilot_core::{PipelineError, PipelineResult, ProcedureSource};
use sop_pilot_llm::{HttpModelClient, ModelClient};

use crate::chat::ChatAgent;
use crate::config::{EngineConfig, SolutionLabels, StagePolicy, TransportMode};
use crate::pipeline::Orchestrator;

use super::{FrameStream, StreamRequest, StreamingTransport, TransportError, CHANNEL_CAPACITY};

/// In-process transport: orchestrator and chat agent behind the frame
/// channel.
pub struct DirectTransport {
    orchestrator: Arc<Orchestrator>,
    chat: Arc<ChatAgent>,
}

impl DirectTransport {
    /// Builds from configuration: an HTTP-backed client when model settings
    /// are present, the scripted client otherwise.
    pub fn from_config(
        config: &EngineConfig,
        procedures: Arc<dyn ProcedureSource>,
    ) -> PipelineResult<Self> {
        match &config.model {
            Some(model) => {
                let client: Arc<dyn ModelClient> = Arc::new(
                    HttpModelClient::new(model.clone())
                        .map_err(|e| PipelineError::config(e.to_string()))?,
                );
                Ok(Self::new(
                    client,
                    procedures,
                    config.policy.clone(),
                    config.labels.clone(),
                ))
            }
            None => Ok(Self::simulated(
                procedures,
                config.policy.clone(),
                config.labels.clone(),
            )),
        }
    }

    /// Builds around an explicit model client.
    pub fn new(
        client: Arc<dyn ModelClient>,
        procedures: Arc<dyn ProcedureSource>,
        policy: StagePolicy,
        labels: SolutionLabels,
    ) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(
                client.clone(),
                procedures.clone(),
                policy,
            )),
            chat: Arc::new(ChatAgent::new(client, procedures).with_labels(labels)),
        }
    }

    /// Builds the scripted variant. Results it produces are flagged as
    /// simulated.
    pub fn simulated(
        procedures: Arc<dyn ProcedureSource>,
        policy: StagePolicy,
        labels: SolutionLabels,
    ) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::simulated(procedures.clone(), policy)),
            chat: Arc::new(ChatAgent::simulated(procedures).with_labels(labels)),
        }
    }
}

#[async_trait]
impl StreamingTransport for DirectTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Direct
    }

    async fn open(
        &self,
        request: StreamRequest,
        cancel: CancellationToken,
    ) -> Result<FrameStream, TransportError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        match request {
            StreamRequest::Analyze { item } => {
                let orchestrator = self.orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator.execute(item, tx, cancel).await;
                });
            }
            StreamRequest::Chat { message, context } => {
                let chat = self.chat.clone();
                tokio::spawn(async move {
                    chat.respond(&message, &context, tx, cancel).await;
                });
            }
        }
        Ok(ReceiverStream::new(rx))
    }
}
