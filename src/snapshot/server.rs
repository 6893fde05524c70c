//! HTTP routes that serve the compiled artifact.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};

use crate::error::ArtifactError;

/// Shared handler state.
#[derive(Clone)]
pub struct ArtifactServerState {
    pub dir: Arc<PathBuf>,
}

/// Build the router: `GET /vcf/{file}` and `GET /health`.
pub fn artifact_routes(dir: PathBuf) -> Router {
    let state = ArtifactServerState { dir: Arc::new(dir) };

    Router::new()
        .route("/health", get(health))
        .route("/vcf/{file}", get(get_artifact))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Plain file names only; hidden files (the in-progress temp file) are not served.
fn is_servable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

async fn get_artifact(
    State(state): State<ArtifactServerState>,
    Path(file): Path<String>,
) -> axum::response::Response {
    if !is_servable_name(&file) {
        return (StatusCode::BAD_REQUEST, "invalid file name").into_response();
    }

    let path = state.dir.join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/vcard; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(source) => {
            let err = ArtifactError::Read { path, source };
            tracing::error!("{}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to read artifact").into_response()
        }
    }
}
