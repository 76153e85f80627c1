//! Defines the WebSocket message protocol between the browser client and the API server.

use docent_core::lesson::LessonSession;
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
///
/// Microphone audio arrives as raw binary frames, not as JSON.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Selects the lesson for this connection. This must be the first message.
    #[serde(rename = "init")]
    Init {
        /// Slug of the lesson script to run.
        lesson: String,
    },
    /// The learner pressed start: the opening line is forwarded to the agent.
    #[serde(rename = "start_lesson")]
    StartLesson,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful initialization and provides the initial state.
    Initialized {
        title: String,
        session: LessonSession,
    },
    /// Pushes the full lesson state after a tool-call batch was applied.
    StateUpdate { session: LessonSession },
    /// Reports a fatal error to the client.
    Error { message: String },
    /// An update on the learner's speech-to-text transcription.
    TranscriptionUpdate { text: String, is_final: bool },
    /// A chunk of audio data (base64 encoded PCM16) for the agent's voice.
    AudioChunk { data: String },
    /// Signals that the agent has started speaking.
    AiSpeakingStart,
    /// Signals that the agent has finished speaking.
    AiSpeakingEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_message_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "init", "lesson": "editor-basics"}"#).unwrap();
        match msg {
            ClientMessage::Init { lesson } => assert_eq!(lesson, "editor-basics"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn start_message_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "start_lesson"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::StartLesson));
    }

    #[test]
    fn unknown_client_message_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "reboot_everything"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_messages_are_tagged_snake_case() {
        let json = serde_json::to_string(&ServerMessage::AiSpeakingStart).unwrap();
        assert_eq!(json, r#"{"type":"ai_speaking_start"}"#);

        let json = serde_json::to_string(&ServerMessage::Error {
            message: "boom".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("boom"));
    }
}
