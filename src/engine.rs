//! Reasoning Engine
//!
//! The caller-facing surface. Owns a transport, consumes its frame streams,
//! and turns them into typed results: a [`ReasoningResult`] for pipeline
//! runs, a [`ChatResponse`] for chat turns. Stream closure before a terminal
//! frame is reported as incomplete, never passed off as success. When the
//! remote transport cannot be opened at all, the engine substitutes a
//! simulated in-process run so the caller still gets a usable, clearly
//! flagged result.

use std::sync::Arc;

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sop_pilot_core::{
    ChatContext, ChatResponse, Frame, PipelineError, PipelineResult, ProcedureSource,
    ReasoningResult, ReasoningStep, WorkItem,
};

use crate::config::EngineConfig;
use crate::transport::direct::DirectTransport;
use crate::transport::{build_transport, FrameStream, StreamRequest, StreamingTransport};

/// Streaming reasoning over work items, plus grounded follow-up chat.
pub struct ReasoningEngine {
    transport: Arc<dyn StreamingTransport>,
    procedures: Arc<dyn ProcedureSource>,
    config: EngineConfig,
}

impl ReasoningEngine {
    /// Builds an engine from configuration.
    pub fn new(
        config: EngineConfig,
        procedures: Arc<dyn ProcedureSource>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let transport = build_transport(&config, procedures.clone())?;
        Ok(Self {
            transport,
            procedures,
            config,
        })
    }

    /// Builds an engine around an explicit transport.
    pub fn with_transport(
        transport: Arc<dyn StreamingTransport>,
        procedures: Arc<dyn ProcedureSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            procedures,
            config,
        }
    }

    /// The mode of the underlying transport.
    pub fn mode(&self) -> crate::config::TransportMode {
        self.transport.mode()
    }

    /// Runs the full pipeline over an item and waits for the result.
    pub async fn run(&self, item: WorkItem) -> PipelineResult<ReasoningResult> {
        self.run_controlled(item, |_| {}, CancellationToken::new())
            .await
    }

    /// Runs the pipeline, invoking `on_step` as each stage completes.
    pub async fn run_with(
        &self,
        item: WorkItem,
        on_step: impl FnMut(&ReasoningStep) + Send,
    ) -> PipelineResult<ReasoningResult> {
        self.run_controlled(item, on_step, CancellationToken::new())
            .await
    }

    /// Runs the pipeline with step observation and external cancellation.
    pub async fn run_controlled(
        &self,
        item: WorkItem,
        on_step: impl FnMut(&ReasoningStep) + Send,
        cancel: CancellationToken,
    ) -> PipelineResult<ReasoningResult> {
        item.validate()?;
        info!("Starting reasoning run for item {}", item.id);

        let request = StreamRequest::Analyze { item };
        let stream = self.open_stream(request, &cancel).await?;
        self.consume_analysis(stream, on_step, &cancel).await
    }

    /// Sends a chat message grounded in the given context.
    pub async fn send(
        &self,
        message: &str,
        context: ChatContext,
    ) -> PipelineResult<ChatResponse> {
        self.send_controlled(message, context, |_| {}, CancellationToken::new())
            .await
    }

    /// Sends a chat message, invoking `on_token` for each streamed token.
    pub async fn send_with(
        &self,
        message: &str,
        context: ChatContext,
        on_token: impl FnMut(&str) + Send,
    ) -> PipelineResult<ChatResponse> {
        self.send_controlled(message, context, on_token, CancellationToken::new())
            .await
    }

    /// Sends a chat message with token observation and cancellation.
    pub async fn send_controlled(
        &self,
        message: &str,
        context: ChatContext,
        on_token: impl FnMut(&str) + Send,
        cancel: CancellationToken,
    ) -> PipelineResult<ChatResponse> {
        if message.trim().is_empty() {
            return Err(PipelineError::validation("chat message must not be empty"));
        }

        let request = StreamRequest::Chat {
            message: message.to_string(),
            context,
        };
        let stream = self.open_stream(request, &cancel).await?;
        self.consume_chat(stream, on_token, &cancel).await
    }

    /// Opens the stream, substituting a simulated run if the transport
    /// cannot be opened and the fallback is enabled.
    async fn open_stream(
        &self,
        request: StreamRequest,
        cancel: &CancellationToken,
    ) -> PipelineResult<FrameStream> {
        match self.transport.open(request.clone(), cancel.clone()).await {
            Ok(stream) => Ok(stream),
            Err(err) if self.config.simulate_on_unavailable => {
                warn!("{}; serving a simulated run instead", err);
                let fallback = DirectTransport::simulated(
                    self.procedures.clone(),
                    self.config.policy.clone(),
                    self.config.labels.clone(),
                );
                fallback
                    .open(request, cancel.clone())
                    .await
                    .map_err(|e| PipelineError::transport(e.to_string()))
            }
            Err(err) => Err(PipelineError::transport(err.to_string())),
        }
    }

    async fn consume_analysis(
        &self,
        mut stream: FrameStream,
        mut on_step: impl FnMut(&ReasoningStep) + Send,
        cancel: &CancellationToken,
    ) -> PipelineResult<ReasoningResult> {
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                frame = stream.next() => frame,
            };
            let frame = match frame {
                Some(frame) => frame,
                None => {
                    // The producer stops without a terminal frame when it
                    // was cancelled; otherwise the stream broke early.
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    return Err(PipelineError::stream_incomplete(
                        "stream closed before a terminal frame",
                    ));
                }
            };

            match frame {
                Frame::Connection { message, model } => {
                    debug!(
                        "Stream connected: {} (model: {:?})",
                        message.unwrap_or_default(),
                        model
                    );
                }
                Frame::Step { step } => on_step(&step),
                Frame::Complete { result } => {
                    let result: ReasoningResult = serde_json::from_value(result)?;
                    info!(
                        "Run {} finished: {} step(s), resolution {:?}",
                        result.run_id,
                        result.steps.len(),
                        result.resolution
                    );
                    return Ok(result);
                }
                Frame::Error { message } => return Err(PipelineError::transport(message)),
                Frame::Token { .. } | Frame::End => {
                    debug!("Ignoring non-analysis frame");
                }
            }
        }
    }

    async fn consume_chat(
        &self,
        mut stream: FrameStream,
        mut on_token: impl FnMut(&str) + Send,
        cancel: &CancellationToken,
    ) -> PipelineResult<ChatResponse> {
        let mut text = String::new();
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                frame = stream.next() => frame,
            };
            let frame = match frame {
                Some(frame) => frame,
                None => {
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    return Err(PipelineError::stream_incomplete(
                        "chat stream closed before a terminal frame",
                    ));
                }
            };

            match frame {
                Frame::Token { token } => {
                    on_token(&token);
                    text.push_str(&token);
                }
                Frame::Complete { result } => {
                    let mut response =
                        serde_json::from_value::<ChatResponse>(result).unwrap_or_default();
                    if response.text.is_empty() {
                        response.text = text;
                    }
                    return Ok(response);
                }
                Frame::Error { message } => return Err(PipelineError::transport(message)),
                Frame::End => {
                    // Some servers close a chat turn with a bare end frame;
                    // the accumulated tokens are the answer.
                    debug!("Chat stream ended without a structured response");
                    return Ok(ChatResponse {
                        text,
                        ..Default::default()
                    });
                }
                Frame::Connection { .. } | Frame::Step { .. } => {
                    debug!("Ignoring non-chat frame");
                }
            }
        }
    }
}
