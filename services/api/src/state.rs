//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the lesson catalog and the service configuration.

use crate::config::Config;
use docent_core::script::LessonCatalog;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: LessonCatalog,
    pub config: Arc<Config>,
}
