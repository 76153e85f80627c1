//! Agent-transport collaborator contract.
//!
//! The core never talks to the conversational agent directly; it goes
//! through [`AgentTransport`], implemented by the service layer (a Gemini
//! Live WebSocket client in `docent-api`). Events flowing the other way are
//! surfaced as [`TransportEvent`]s on a channel owned by the session loop.

use crate::dispatch::{ToolCall, ToolResponse};
use anyhow::Result;
use async_trait::async_trait;

/// Outbound half of the transport: content turns and tool acknowledgements.
///
/// Establishing the connection is the implementation's constructor
/// (`connect`); by the time a value of this trait exists it is ready to
/// accept sends. Delivery failures are returned to the caller and never
/// retried here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Pushes an utterance/content turn to the agent.
    async fn send(&self, text: &str) -> Result<()>;

    /// Delivers one acknowledgement batch for one incoming tool-call batch.
    async fn send_tool_response(&self, responses: Vec<ToolResponse>) -> Result<()>;
}

/// Inbound events the transport implementation surfaces to the session loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The agent invoked one or more declared tools.
    ToolCall(Vec<ToolCall>),
    /// A transcription of the learner's speech.
    Transcription { text: String, is_final: bool },
    /// A chunk of spoken audio from the agent (base64 encoded PCM16).
    AudioChunk(String),
    /// The agent is about to start speaking.
    SpeakingStart,
    /// The agent finished its spoken turn.
    SpeakingDone,
    /// The upstream connection closed.
    Closed,
}
