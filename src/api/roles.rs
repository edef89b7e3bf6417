use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    routing::{delete, get, post, put},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::extractors::AppJson;
use crate::api::router::RouteTable;
use crate::api::validation::{parse_id, validate_payload};
use crate::core::state::AppState;
use crate::db::models::Role;
use crate::repositories;
use crate::schemas::permission::RolePayload;
use crate::schemas::MessageResponse;
use crate::services::permissions;

pub(crate) fn routes(table: RouteTable) -> RouteTable {
    table
        .route(Method::POST, "/role", post(create_role))
        .route(Method::GET, "/role", get(list_roles))
        .route(Method::GET, "/role/:id", get(get_role))
        .route(Method::PUT, "/role/:id", put(update_role))
        .route(Method::DELETE, "/role/:id", delete(delete_role))
}

async fn reload_registry(state: &AppState) -> Result<(), ApiError> {
    state.roles().reload(state.store()).await?;
    Ok(())
}

async fn create_role(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RolePayload>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    validate_payload(&payload)?;
    permissions::role_bit(payload.numeric_value)?;

    let mut role =
        Role { name: payload.name, numeric_value: payload.numeric_value, ..Role::default() };
    repositories::create(state.store(), &mut role).await?;
    reload_registry(&state).await?;
    tracing::info!(role = %role.name, value = role.numeric_value, "role created");

    Ok((StatusCode::CREATED, Json(role)))
}

async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(repositories::list(state.store()).await?))
}

async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<Json<Role>, ApiError> {
    let role_id = parse_id(&role_id, "role")?;
    repositories::find::<Role>(state.store(), role_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Role not found".to_string()))
}

async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    AppJson(payload): AppJson<RolePayload>,
) -> Result<Json<Role>, ApiError> {
    let role_id = parse_id(&role_id, "role")?;
    validate_payload(&payload)?;
    permissions::role_bit(payload.numeric_value)?;

    let role = Role { id: role_id, name: payload.name, numeric_value: payload.numeric_value };
    if !repositories::save(state.store(), &role).await? {
        return Err(ApiError::NotFound("Role not found".to_string()));
    }
    reload_registry(&state).await?;
    tracing::info!(role = %role.name, value = role.numeric_value, "role updated");

    Ok(Json(role))
}

async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let role_id = parse_id(&role_id, "role")?;
    if !repositories::remove::<Role>(state.store(), role_id).await? {
        return Err(ApiError::NotFound("Role not found".to_string()));
    }
    reload_registry(&state).await?;

    Ok(Json(MessageResponse::new("Role deleted successfully")))
}
