//! Handles the real-time WebSocket connection to Google Gemini Live.
//!
//! One connection per lesson session. The setup message declares the lesson
//! script's system instruction and tool bindings; after `setupComplete` the
//! task proxies audio both ways and surfaces the agent's `toolCall` batches
//! as [`TransportEvent`]s for the session loop to dispatch.

use crate::config::Config;
use anyhow::{Context as _, Result, anyhow, bail};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use docent_core::{
    dispatch::{ToolCall, ToolResponse},
    script::LessonScript,
    transport::{AgentTransport, TransportEvent},
};
use futures_util::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{error, info, warn};

// --- Local Gemini Live wire types (for encapsulation) ---
mod live_api {
    use serde::{Deserialize, Serialize};
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) enum ClientMessage {
        Setup(BidiGenerateContentSetup),
        RealtimeInput(BidiGenerateContentRealtimeInput),
        ClientContent(BidiGenerateContentClientContent),
        ToolResponse(BidiGenerateContentToolResponse),
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BidiGenerateContentSetup {
        pub model: String,
        pub generation_config: GenerationConfig,
        pub system_instruction: Content,
        pub tools: Vec<Tool>,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Tool {
        pub function_declarations: Vec<FunctionDeclaration>,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct FunctionDeclaration {
        pub name: String,
        pub description: String,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BidiGenerateContentClientContent {
        pub turns: Vec<Content>,
        pub turn_complete: bool,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct Content {
        pub role: String,
        pub parts: Vec<Part>,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct Part {
        pub text: String,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig {
        pub response_modalities: Vec<ResponseModality>,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "UPPERCASE")]
    pub(super) enum ResponseModality {
        Audio,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BidiGenerateContentRealtimeInput {
        pub audio: Blob,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Blob {
        pub mime_type: String,
        pub data: String,
    }
    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BidiGenerateContentToolResponse {
        pub function_responses: Vec<FunctionResponse>,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct FunctionResponse {
        pub id: String,
        pub name: String,
        pub response: FunctionResult,
    }
    #[derive(Serialize, Debug)]
    pub(super) struct FunctionResult {
        pub result: String,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ServerMessage {
        pub setup_complete: Option<serde_json::Value>,
        pub server_content: Option<LiveServerContent>,
        pub tool_call: Option<LiveToolCall>,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct LiveToolCall {
        pub function_calls: Vec<LiveFunctionCall>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct LiveFunctionCall {
        pub id: String,
        pub name: String,
        pub args: Option<serde_json::Value>,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct LiveServerContent {
        pub model_turn: Option<ServerContentTurn>,
        pub input_transcription: Option<ServerTranscription>,
        pub turn_complete: Option<bool>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct ServerContentTurn {
        pub parts: Vec<ServerPart>,
    }
    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ServerPart {
        pub inline_data: Option<ServerBlob>,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct ServerBlob {
        pub data: String,
    }
    #[derive(Deserialize, Debug)]
    pub(super) struct ServerTranscription {
        pub text: String,
    }
}

/// Handle for the outbound half of a live Gemini connection.
///
/// Cloneable; all clones feed the same connection task. Dropping every clone
/// (or aborting the task) tears the connection down.
#[derive(Clone)]
pub struct GeminiLive {
    outbound: mpsc::Sender<live_api::ClientMessage>,
}

impl GeminiLive {
    /// Connects, performs the setup handshake, and spawns the proxy task.
    ///
    /// Returns the outbound handle, the inbound event stream for the session
    /// loop, and the task handle so the caller can abort on teardown.
    pub async fn connect(
        config: &Config,
        script: &LessonScript,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>, JoinHandle<()>)> {
        let url = format!(
            "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key={}",
            config.gemini_api_key
        );

        let (ws_stream, _) = connect_async(url)
            .await
            .context("Failed to connect to the Gemini Live WebSocket")?;
        info!("Connected to Gemini Live WebSocket.");
        let (mut gemini_tx, mut gemini_rx) = ws_stream.split();

        let setup_msg = live_api::ClientMessage::Setup(live_api::BidiGenerateContentSetup {
            model: config.live_model.clone(),
            generation_config: live_api::GenerationConfig {
                response_modalities: vec![live_api::ResponseModality::Audio],
            },
            system_instruction: live_api::Content {
                role: "system".to_string(),
                parts: vec![live_api::Part {
                    text: script.system_instruction.clone(),
                }],
            },
            tools: vec![live_api::Tool {
                function_declarations: script
                    .tools
                    .iter()
                    .map(|binding| live_api::FunctionDeclaration {
                        name: binding.name.clone(),
                        description: binding.description.clone(),
                    })
                    .collect(),
            }],
        });
        gemini_tx
            .send(WsMessage::Text(serde_json::to_string(&setup_msg)?.into()))
            .await?;

        // The connection is not usable until the server confirms setup.
        loop {
            let msg = gemini_rx
                .next()
                .await
                .context("Gemini closed the connection during setup")??;
            match msg {
                WsMessage::Text(text) => {
                    let server_msg: live_api::ServerMessage = serde_json::from_str(&text)
                        .with_context(|| format!("Unparseable Gemini setup reply: {}", text))?;
                    if server_msg.setup_complete.is_some() {
                        info!("Gemini session setup is complete.");
                        break;
                    }
                    warn!(?server_msg, "Unexpected message during Gemini setup");
                }
                WsMessage::Close(frame) => bail!("Gemini closed during setup: {:?}", frame),
                _ => {}
            }
        }

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<live_api::ClientMessage>(128);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(128);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Outbound traffic from the application.
                    outbound = outbound_rx.recv() => {
                        let Some(msg) = outbound else { break };
                        let payload = match serde_json::to_string(&msg) {
                            Ok(payload) => payload,
                            Err(e) => {
                                error!("Failed to serialize outbound Gemini message: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = gemini_tx.send(WsMessage::Text(payload.into())).await {
                            error!("Failed to send to Gemini: {}", e);
                            let _ = event_tx.send(TransportEvent::Closed).await;
                            break;
                        }
                    },
                    // Inbound traffic from the Gemini server.
                    inbound = gemini_rx.next() => {
                        match inbound {
                            Some(Ok(WsMessage::Text(text))) => {
                                match serde_json::from_str::<live_api::ServerMessage>(&text) {
                                    Ok(server_msg) => {
                                        if forward_events(server_msg, &event_tx).await.is_err() {
                                            // Session loop is gone; stop proxying.
                                            break;
                                        }
                                    }
                                    Err(_) => warn!("Unparseable Gemini message: {}", text),
                                }
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                error!(?frame, "Gemini WebSocket closed by server.");
                                let _ = event_tx.send(TransportEvent::Closed).await;
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("Error reading from Gemini WebSocket: {}", e);
                                let _ = event_tx.send(TransportEvent::Closed).await;
                                break;
                            }
                            None => {
                                let _ = event_tx.send(TransportEvent::Closed).await;
                                break;
                            }
                        }
                    },
                }
            }
        });

        Ok((
            Self {
                outbound: outbound_tx,
            },
            event_rx,
            handle,
        ))
    }

    /// Forwards a chunk of learner microphone audio (raw PCM16).
    pub async fn send_audio(&self, data: Bytes) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
        self.enqueue(live_api::ClientMessage::RealtimeInput(
            live_api::BidiGenerateContentRealtimeInput {
                audio: live_api::Blob {
                    mime_type: "audio/pcm;rate=16000".to_string(),
                    data: encoded,
                },
            },
        ))
        .await
    }

    async fn enqueue(&self, msg: live_api::ClientMessage) -> Result<()> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| anyhow!("Gemini connection task is gone"))
    }
}

#[async_trait]
impl AgentTransport for GeminiLive {
    async fn send(&self, text: &str) -> Result<()> {
        self.enqueue(live_api::ClientMessage::ClientContent(
            live_api::BidiGenerateContentClientContent {
                turns: vec![live_api::Content {
                    role: "user".to_string(),
                    parts: vec![live_api::Part {
                        text: text.to_string(),
                    }],
                }],
                turn_complete: true,
            },
        ))
        .await
    }

    async fn send_tool_response(&self, responses: Vec<ToolResponse>) -> Result<()> {
        self.enqueue(live_api::ClientMessage::ToolResponse(
            live_api::BidiGenerateContentToolResponse {
                function_responses: responses
                    .into_iter()
                    .map(|r| live_api::FunctionResponse {
                        id: r.id,
                        name: r.name,
                        response: live_api::FunctionResult { result: r.result },
                    })
                    .collect(),
            },
        ))
        .await
    }
}

/// Translates one Gemini server message into transport events.
///
/// Errors only when the event channel is closed, which means the session
/// loop has gone away.
async fn forward_events(
    msg: live_api::ServerMessage,
    event_tx: &mpsc::Sender<TransportEvent>,
) -> Result<(), mpsc::error::SendError<TransportEvent>> {
    if let Some(tool_call) = msg.tool_call {
        let calls = tool_call
            .function_calls
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.name,
                args: c.args,
            })
            .collect();
        event_tx.send(TransportEvent::ToolCall(calls)).await?;
    }
    if let Some(content) = msg.server_content {
        if let Some(transcription) = content.input_transcription {
            event_tx
                .send(TransportEvent::Transcription {
                    text: transcription.text,
                    is_final: true,
                })
                .await?;
        }
        if let Some(ref model_turn) = content.model_turn {
            event_tx.send(TransportEvent::SpeakingStart).await?;
            for part in &model_turn.parts {
                if let Some(blob) = &part.inline_data {
                    event_tx
                        .send(TransportEvent::AudioChunk(blob.data.clone()))
                        .await?;
                }
            }
        }
        if content.turn_complete == Some(true) {
            event_tx.send(TransportEvent::SpeakingDone).await?;
        }
    }
    Ok(())
}
