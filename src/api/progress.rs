use axum::{
    extract::{Path, State},
    http::Method,
    routing::get,
    Json,
};

use crate::api::errors::ApiError;
use crate::api::router::RouteTable;
use crate::api::validation::parse_id;
use crate::core::state::AppState;
use crate::schemas::progress::{CourseProgress, UserProgressSummary};
use crate::services::progress;

pub(crate) fn routes(table: RouteTable) -> RouteTable {
    table
        .session_route(Method::GET, "/user/:userId/progress", get(user_progress))
        .session_route(
            Method::GET,
            "/user/:userId/course/:courseId/progress",
            get(course_progress),
        )
}

async fn user_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProgressSummary>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    Ok(Json(progress::user_progress(state.store(), user_id).await?))
}

async fn course_progress(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> Result<Json<CourseProgress>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    let course_id = parse_id(&course_id, "course")?;
    Ok(Json(progress::course_progress_for(state.store(), user_id, course_id).await?))
}
