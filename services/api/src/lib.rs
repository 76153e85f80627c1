//! Docent API Library Crate
//!
//! This library contains all the logic for the Docent web service: the
//! application state, REST handlers for the lesson catalog, the WebSocket
//! session layer, and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
