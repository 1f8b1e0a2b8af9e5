use axum::{Json, extract::State, response::IntoResponse};
use docinject::Feedback;

use crate::{
    core::state::AppState,
    models::{
        error::{ApiError, ApiResult},
        requests::{FeedbackRequest, FeedbackResponse},
    },
};

pub async fn get_status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.context.status().await))
}

pub async fn get_analytics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state
        .context
        .require_telemetry()?
        .project_stats()
        .ok_or_else(|| ApiError::Internal("telemetry sink reported no stats".into()))?;
    Ok(Json(stats))
}

pub async fn log_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.trace_id.trim().is_empty() {
        return Err(ApiError::BlankField("trace_id".into()));
    }
    if !request.score.is_finite() {
        return Err(ApiError::BadRequest("score must be a finite number".into()));
    }

    let telemetry = state.context.require_telemetry()?;

    let mut feedback = Feedback::thumbs(request.score);
    if let Some(kind) = request.feedback_type {
        feedback.feedback_type = kind;
    }
    feedback.comment = request.comment;

    let logged = telemetry.log_feedback(&request.trace_id, &feedback).await;
    Ok(Json(FeedbackResponse {
        trace_id: request.trace_id,
        logged,
    }))
}
