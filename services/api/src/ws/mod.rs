//! WebSocket Session Management
//!
//! This module contains the logic for running real-time lesson sessions over
//! WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, from handshake to termination.
//! - `gemini`: The Gemini Live connection implementing the agent transport.

mod gemini;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
