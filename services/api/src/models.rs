//! REST API Models
//!
//! Payload types for the lesson catalog endpoints, annotated with `utoipa`
//! schemas for the generated OpenAPI documentation.

use docent_core::script::LessonScript;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A catalog listing entry for one lesson.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct LessonSummary {
    #[schema(example = "editor-basics")]
    pub slug: String,
    #[schema(example = "Getting around a 3D editor")]
    pub title: String,
    /// Number of steps in the lesson.
    pub steps: usize,
}

impl From<&LessonScript> for LessonSummary {
    fn from(script: &LessonScript) -> Self {
        Self {
            slug: script.slug.clone(),
            title: script.title.clone(),
            steps: script.steps.len(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
