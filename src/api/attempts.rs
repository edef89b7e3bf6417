use axum::{
    extract::{Path, State},
    http::Method,
    routing::{get, post},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::extractors::AppJson;
use crate::api::router::RouteTable;
use crate::api::validation::{parse_id, validate_payload};
use crate::core::state::AppState;
use crate::schemas::analytics::{ModuleAnalyticsResponse, QuizAnalyticsResponse};
use crate::schemas::attempt::{
    ModuleResultsResponse, ModuleSubmission, StartModuleResponse, SubmitModuleResponse,
};
use crate::schemas::MessageResponse;
use crate::services::{analytics, attempts};

const RESET_MESSAGE: &str = "Module attempt reset successfully";

pub(crate) fn routes(table: RouteTable) -> RouteTable {
    table
        .session_route(Method::GET, "/module/:id/start", get(start_module))
        .session_route(Method::POST, "/user/:userId/module/:id/submit", post(submit_module))
        .session_route(Method::GET, "/user/:userId/module/:id/results", get(module_results))
        .session_route(Method::GET, "/module/:id/analytics", get(module_analytics))
        .session_route(Method::POST, "/user/:userId/module/:id/reset", post(reset_module))
        .session_route(Method::GET, "/module/:id/quiz/analytics", get(quiz_analytics))
}

/// Attempts are addressed by the path user, not the session user, so reviewers with route
/// access can act on a learner's attempt. Restrict with route levels.
fn user_module_ids(raw: &(String, String)) -> Result<(i64, i64), ApiError> {
    Ok((parse_id(&raw.0, "user")?, parse_id(&raw.1, "module")?))
}

async fn start_module(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Json<StartModuleResponse>, ApiError> {
    let module_id = parse_id(&module_id, "module")?;
    Ok(Json(attempts::start(state.store(), module_id).await?))
}

async fn submit_module(
    State(state): State<AppState>,
    Path(ids): Path<(String, String)>,
    AppJson(submission): AppJson<ModuleSubmission>,
) -> Result<Json<SubmitModuleResponse>, ApiError> {
    let (user_id, module_id) = user_module_ids(&ids)?;
    validate_payload(&submission)?;
    let response =
        attempts::submit(state.store(), state.grading_options(), user_id, module_id, submission)
            .await?;
    Ok(Json(response))
}

async fn module_results(
    State(state): State<AppState>,
    Path(ids): Path<(String, String)>,
) -> Result<Json<ModuleResultsResponse>, ApiError> {
    let (user_id, module_id) = user_module_ids(&ids)?;
    let reveal = state.settings().grading().reveal_answers_in_results;
    Ok(Json(attempts::results(state.store(), user_id, module_id, reveal).await?))
}

async fn module_analytics(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Json<ModuleAnalyticsResponse>, ApiError> {
    let module_id = parse_id(&module_id, "module")?;
    Ok(Json(analytics::module_analytics(state.store(), module_id).await?))
}

async fn quiz_analytics(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Json<QuizAnalyticsResponse>, ApiError> {
    let module_id = parse_id(&module_id, "module")?;
    let threshold = state.settings().grading().quiz_passing_threshold;
    Ok(Json(analytics::quiz_analytics(state.store(), module_id, threshold).await?))
}

async fn reset_module(
    State(state): State<AppState>,
    Path(ids): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (user_id, module_id) = user_module_ids(&ids)?;
    attempts::reset(state.store(), user_id, module_id).await?;
    Ok(Json(MessageResponse::new(RESET_MESSAGE)))
}
