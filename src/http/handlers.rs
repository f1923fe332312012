use super::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub file_name: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_loaded() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "No recording loaded".to_string(),
        }),
    )
        .into_response()
}

/// GET /record
/// Download info of the recording in the viewer
pub async fn get_record(State(state): State<AppState>) -> Response {
    let viewer = state.viewer.read().await;

    match viewer.as_ref() {
        Some(viewer) => (StatusCode::OK, Json(viewer.info().clone())).into_response(),
        None => not_loaded(),
    }
}

/// GET /record/video
/// The recorded media itself
pub async fn get_record_video(State(state): State<AppState>) -> Response {
    let viewer = state.viewer.read().await;

    match viewer.as_ref() {
        Some(viewer) => {
            let blob = viewer.blob();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, blob.mime_type.clone())],
                blob.data.as_ref().clone(),
            )
                .into_response()
        }
        None => not_loaded(),
    }
}

/// POST /record/download
/// Save the recording in the viewer
pub async fn download_record(State(state): State<AppState>) -> Response {
    let viewer = state.viewer.read().await;

    let Some(viewer) = viewer.as_ref() else {
        return not_loaded();
    };

    match viewer.download().await {
        Ok(path) => {
            info!("Viewer download saved to {}", path.display());
            (
                StatusCode::OK,
                Json(DownloadResponse {
                    file_name: viewer.file_name(),
                    path: path.display().to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Viewer download failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Download failed: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
