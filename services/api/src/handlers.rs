//! Axum Handlers for the REST API
//!
//! This module contains the logic for serving the lesson catalog.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    models::{ErrorResponse, LessonSummary},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// List the available lessons.
#[utoipa::path(
    get,
    path = "/lessons",
    responses(
        (status = 200, description = "List of available lessons", body = [LessonSummary]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_lessons(State(state): State<Arc<AppState>>) -> Json<Vec<LessonSummary>> {
    let summaries = state
        .catalog
        .list()
        .iter()
        .map(|script| LessonSummary::from(script.as_ref()))
        .collect();
    Json(summaries)
}

/// Get a full lesson script by its slug.
#[utoipa::path(
    get,
    path = "/lessons/{slug}",
    responses(
        (status = 200, description = "The full lesson script", body = Object),
        (status = 404, description = "Lesson not found", body = ErrorResponse)
    ),
    params(
        ("slug" = String, Path, description = "Lesson slug")
    )
)]
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let script = state
        .catalog
        .get(&slug)
        .ok_or_else(|| ApiError::NotFound(format!("Lesson '{}' not found", slug)))?;

    Ok((StatusCode::OK, Json((*script).clone())))
}
