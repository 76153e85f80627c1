//! Manages the primary WebSocket connection lifecycle for a lesson session.

use super::{
    gemini::GeminiLive,
    protocol::{ClientMessage, ServerMessage},
};
use crate::state::AppState;
use anyhow::{Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use docent_core::{
    dispatch::ToolDispatcher,
    script::LessonScript,
    transport::{AgentTransport, TransportEvent},
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Performs the `init` handshake to resolve the requested lesson script and
/// then spawns the session event loop. Exactly one lesson session exists per
/// connection; closing the socket discards it.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (mut socket_tx, mut socket_rx) = socket.split();

    // The first message from the client must be an `init` message.
    let script = match read_init(&mut socket_rx, &state).await {
        Ok(script) => script,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let session_span = tracing::info_span!("lesson_session", %session_id, lesson = %script.slug);
    tokio::spawn(
        async move {
            if let Err(e) = run_lesson_session(state, socket_tx, socket_rx, script).await {
                error!(error = ?e, "Lesson session terminated with error.");
            }
            info!("Lesson session finished.");
        }
        .instrument(session_span),
    );
}

/// Parses the `init` message and resolves the lesson script from the catalog.
async fn read_init(
    socket_rx: &mut SplitStream<WebSocket>,
    state: &Arc<AppState>,
) -> Result<Arc<LessonScript>> {
    let Some(Ok(ws_msg)) = socket_rx.next().await else {
        return Err(anyhow!("Client disconnected before sending init message"));
    };
    let Message::Text(text) = ws_msg else {
        return Err(anyhow!("First message was not a text `init` message"));
    };
    let init_msg: ClientMessage = serde_json::from_str(&text)?;
    let ClientMessage::Init { lesson } = init_msg else {
        return Err(anyhow!("First message must be `init`"));
    };

    state
        .catalog
        .get(&lesson)
        .ok_or_else(|| anyhow!("Unknown lesson '{}'", lesson))
}

/// The main event loop for an active lesson session.
///
/// Owns the single mutable `LessonSession` for this connection and listens
/// for browser frames and transport events. Each tool-call batch is mapped,
/// applied, and acknowledged to completion before the next event is taken,
/// so batches are processed strictly in arrival order.
async fn run_lesson_session(
    state: Arc<AppState>,
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
    script: Arc<LessonScript>,
) -> Result<()> {
    let mut session = script.session();
    let dispatcher = ToolDispatcher::new(script.action_map());

    let (transport, mut transport_rx, transport_handle) =
        match GeminiLive::connect(&state.config, &script).await {
            Ok(connected) => connected,
            Err(e) => {
                let _ = send_msg(
                    &mut socket_tx,
                    ServerMessage::Error {
                        message: format!("Agent connection failed: {}", e),
                    },
                )
                .await;
                return Err(e);
            }
        };

    send_msg(
        &mut socket_tx,
        ServerMessage::Initialized {
            title: script.title.clone(),
            session: session.clone(),
        },
    )
    .await?;

    loop {
        tokio::select! {
            // Handle messages from the client WebSocket.
            Some(msg_result) = socket_rx.next() => {
                match msg_result {
                    Ok(ws_msg) => match ws_msg {
                        Message::Text(text) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(ClientMessage::StartLesson) => {
                                    info!("Learner started the lesson; sending opening line to the agent.");
                                    transport.send(&script.opening_line).await?;
                                }
                                Ok(ClientMessage::Init { .. }) => {
                                    warn!("Ignoring duplicate init message.");
                                }
                                Err(_) => warn!("Ignoring unparseable client message."),
                            }
                        },
                        Message::Binary(data) => {
                            if let Err(e) = transport.send_audio(data).await {
                                error!("Failed to forward audio to the agent: {}", e);
                            }
                        },
                        Message::Close(_) => {
                            info!("Client sent close frame. Shutting down session.");
                            break;
                        },
                        Message::Ping(_) | Message::Pong(_) => {},
                    },
                    Err(e) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                }
            },
            // Handle events surfaced by the agent transport.
            Some(event) = transport_rx.recv() => {
                match event {
                    TransportEvent::ToolCall(calls) => {
                        session = dispatcher
                            .dispatch_and_ack(session, &calls, &transport)
                            .await?;
                        send_msg(
                            &mut socket_tx,
                            ServerMessage::StateUpdate { session: session.clone() },
                        )
                        .await?;
                    }
                    TransportEvent::Transcription { text, is_final } => {
                        send_msg(
                            &mut socket_tx,
                            ServerMessage::TranscriptionUpdate { text, is_final },
                        )
                        .await?;
                    }
                    TransportEvent::AudioChunk(data) => {
                        send_msg(&mut socket_tx, ServerMessage::AudioChunk { data }).await?;
                    }
                    TransportEvent::SpeakingStart => {
                        send_msg(&mut socket_tx, ServerMessage::AiSpeakingStart).await?;
                    }
                    TransportEvent::SpeakingDone => {
                        send_msg(&mut socket_tx, ServerMessage::AiSpeakingEnd).await?;
                    }
                    TransportEvent::Closed => {
                        let _ = send_msg(
                            &mut socket_tx,
                            ServerMessage::Error {
                                message: "Agent connection closed.".to_string(),
                            },
                        )
                        .await;
                        break;
                    }
                }
            },
            // If both channels close, exit the loop.
            else => break,
        }
    }

    // The session is discarded with the connection; any in-flight
    // acknowledgement delivery is best-effort.
    transport_handle.abort();
    info!("WebSocket connection closed and lesson session discarded.");
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
