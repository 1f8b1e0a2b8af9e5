use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    core::state::AppState,
    models::{
        error::{ApiError, ApiResult},
        requests::{LibraryHistoryParams, MemorySearchRequest},
    },
};

const DEFAULT_HISTORY_LIMIT: usize = 5;

#[derive(Debug, Serialize)]
pub struct LibraryHistory {
    pub library_name: String,
    pub episodes: Vec<Value>,
}

pub async fn search_memory(
    State(state): State<AppState>,
    Json(request): Json<MemorySearchRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BlankField("query".into()));
    }

    let response = state
        .context
        .pipeline()
        .search_memory(request.query.trim(), &request.user_id)
        .await;
    Ok(Json(response))
}

pub async fn library_history(
    State(state): State<AppState>,
    Path(library_name): Path<String>,
    Query(params): Query<LibraryHistoryParams>,
) -> ApiResult<impl IntoResponse> {
    let episodes = state
        .context
        .memory()
        .library_history(
            &library_name,
            &params.user_id,
            params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        )
        .await;

    Ok(Json(LibraryHistory {
        library_name,
        episodes,
    }))
}
