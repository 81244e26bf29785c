//! Chat Agent
//!
//! Conversational follow-up grounded in a work item, the reasoning steps the
//! pipeline already produced, and the visible turn history. Tokens stream
//! out as they arrive; the final frame carries the structured response.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sop_pilot_core::{ChatContext, ChatResponse, ChatRole, Frame, ProcedureSource};
use sop_pilot_llm::{CompletionRequest, Message, ModelClient, ScriptedModelClient};

use crate::config::SolutionLabels;
use crate::pipeline::stages::extract_procedure_refs;

/// Chat runs warmer than any pipeline stage for conversational tone.
const CHAT_TEMPERATURE: f32 = 0.7;

/// Reasoning-step excerpts in the grounding prompt are capped at this many
/// characters.
const STEP_EXCERPT_CHARS: usize = 300;

const TOKEN_BUFFER: usize = 64;

/// Answers follow-up questions about an item, citing the same procedure
/// identifiers the pipeline surfaced.
pub struct ChatAgent {
    client: Arc<dyn ModelClient>,
    procedures: Arc<dyn ProcedureSource>,
    labels: SolutionLabels,
    simulated: bool,
}

impl ChatAgent {
    pub fn new(client: Arc<dyn ModelClient>, procedures: Arc<dyn ProcedureSource>) -> Self {
        Self {
            client,
            procedures,
            labels: SolutionLabels::default(),
            simulated: false,
        }
    }

    /// Chat agent over the scripted client, used when no model endpoint is
    /// reachable. Responses it produces are flagged `simulated`.
    pub fn simulated(procedures: Arc<dyn ProcedureSource>) -> Self {
        Self {
            client: Arc::new(ScriptedModelClient::new()),
            procedures,
            labels: SolutionLabels::default(),
            simulated: true,
        }
    }

    /// Brand the agent with a solution's labels.
    pub fn with_labels(mut self, labels: SolutionLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Streams an answer for `message`, sending token frames on `tx` and a
    /// terminal complete frame carrying the [`ChatResponse`].
    ///
    /// The message is assumed non-empty; callers validate before any
    /// transport or model work starts. Cancellation stops frame emission
    /// without a terminal frame.
    pub async fn respond(
        &self,
        message: &str,
        context: &ChatContext,
        tx: mpsc::Sender<Frame>,
        cancel: CancellationToken,
    ) {
        if cancel.is_cancelled() {
            return;
        }

        let messages = self.build_chat_messages(message, context);
        let request = CompletionRequest::new(messages).with_temperature(CHAT_TEMPERATURE);

        let (token_tx, mut token_rx) = mpsc::channel::<String>(TOKEN_BUFFER);
        let client = self.client.clone();
        let call =
            tokio::spawn(async move { client.stream_completion(request, token_tx).await });

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Chat turn cancelled mid-stream");
                    call.abort();
                    return;
                }
                token = token_rx.recv() => match token {
                    Some(token) => {
                        if tx.send(Frame::Token { token }).await.is_err() {
                            call.abort();
                            return;
                        }
                    }
                    None => break,
                }
            }
        }

        let completion = match call.await {
            Ok(Ok(completion)) => completion,
            Ok(Err(err)) => {
                let _ = tx
                    .send(Frame::Error {
                        message: err.to_string(),
                    })
                    .await;
                return;
            }
            Err(err) => {
                let _ = tx
                    .send(Frame::Error {
                        message: format!("Chat task failed: {}", err),
                    })
                    .await;
                return;
            }
        };

        let response = ChatResponse {
            referenced_procedures: extract_procedure_refs(&completion.content),
            text: completion.content,
            suggestions: self.suggested_questions(),
            simulated: self.simulated,
        };

        match serde_json::to_value(&response) {
            Ok(value) => {
                let _ = tx.send(Frame::Complete { result: value }).await;
            }
            Err(err) => {
                let _ = tx
                    .send(Frame::Error {
                        message: format!("Failed to encode chat response: {}", err),
                    })
                    .await;
            }
        }
    }

    /// Builds the grounding system prompt plus the turn history.
    fn build_chat_messages(&self, message: &str, context: &ChatContext) -> Vec<Message> {
        let item = &context.item;
        let mut system = format!(
            "You are an expert assistant for {}, an AI-powered {} intelligence \
             platform. Your role is to help users understand {}, SOPs (Standard \
             Operating Procedures), and provide actionable insights.\n\n\
             Key capabilities:\n\
             - Explain item details and status\n\
             - Reference relevant SOPs and procedures\n\
             - Interpret AI reasoning steps and recommendations\n\
             - Answer questions about processing\n\
             - Provide guidance on next steps\n\n\
             Always be helpful, accurate, and reference SOPs when relevant.",
            self.labels.solution, self.labels.domain, self.labels.domain
        );

        system.push_str(&format!(
            "\n\nCurrent Item Context:\n- Item ID: {}\n- Status: {}",
            item.id, item.status
        ));
        if let Some(amount) = item.amount {
            system.push_str(&format!("\n- Amount: ${}", amount));
        }
        if let Some(scenario) = &item.scenario {
            system.push_str(&format!("\n- Scenario: {}", scenario));
            if let Some(sop) = self.procedures.lookup_by_scenario(scenario) {
                system.push_str(&format!("\n- Relevant SOP: {}", sop.title));
            }
        }

        if !context.reasoning_steps.is_empty() {
            system.push_str("\n\nAI Reasoning Summary:");
            for (idx, step) in context.reasoning_steps.iter().enumerate() {
                system.push_str(&format!(
                    "\n{}. {} ({})",
                    idx + 1,
                    excerpt(&step.text),
                    step.role.title()
                ));
            }
        }

        let mut messages = vec![Message::system(system)];
        for turn in &context.history {
            messages.push(match turn.role {
                ChatRole::User => Message::user(turn.content.clone()),
                ChatRole::Assistant => Message::assistant(turn.content.clone()),
            });
        }
        messages.push(Message::user(message));
        messages
    }

    fn suggested_questions(&self) -> Vec<String> {
        vec![
            format!("What SOPs apply to this {}?", self.labels.item_noun),
            "Explain the recommendation in more detail".to_string(),
            "What are the next steps?".to_string(),
        ]
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= STEP_EXCERPT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(STEP_EXCERPT_CHARS).collect();
    format!("{}...", cut)
}
