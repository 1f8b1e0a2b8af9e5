use axum::{Json, extract::State, response::IntoResponse};
use docinject::{Query, RetrievalResponse};
use tracing::info;

use crate::{
    core::state::AppState,
    models::{
        error::{ApiError, ApiResult},
        requests::DocsRequest,
    },
};

/// Run the retrieval pipeline for one library.
///
/// "Not found" outcomes are regular responses with `success: false`.
pub async fn get_library_docs(
    State(state): State<AppState>,
    Json(request): Json<DocsRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.library_name.trim().is_empty() {
        return Err(ApiError::BlankField("library_name".into()));
    }

    let query = Query::new(request.library_name, request.topic, request.user_id);
    info!(
        "Documentation request for '{}' from {}",
        query.library_name, query.user_id
    );

    let session = state.context.pipeline().run(query).await;
    Ok(Json(RetrievalResponse::from_session(&session)))
}
