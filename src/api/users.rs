use axum::{
    extract::{Path, State},
    http::Method,
    routing::{delete, get, put},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::extractors::AppJson;
use crate::api::router::RouteTable;
use crate::api::validation::{parse_id, validate_payload};
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::user::{UserResponse, UserUpdate};
use crate::schemas::MessageResponse;

pub(crate) fn routes(table: RouteTable) -> RouteTable {
    table
        .session_route(Method::GET, "/user/:userId", get(get_user))
        .session_route(Method::PUT, "/user/:userId", put(update_user))
        .session_route(Method::DELETE, "/user/:userId", delete(delete_user))
}

async fn load_user(state: &AppState, raw_id: &str) -> Result<User, ApiError> {
    let user_id = parse_id(raw_id, "user")?;
    repositories::find::<User>(state.store(), user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = load_user(&state, &user_id).await?;
    Ok(Json(UserResponse::from_db(user)))
}

/// Partial update. Module attempts and the password are not writable here.
async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(payload): AppJson<UserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_payload(&payload)?;
    let mut user = load_user(&state, &user_id).await?;

    if let Some(email) = payload.email {
        user.email = email;
    }
    if let Some(firstname) = payload.firstname {
        user.firstname = firstname;
    }
    if let Some(lastname) = payload.lastname {
        user.lastname = lastname;
    }
    if let Some(bio) = payload.bio {
        user.bio = bio;
    }
    if let Some(avatar) = payload.avatar {
        user.avatar = avatar;
    }
    if let Some(roles) = payload.roles {
        tracing::info!(user_id = user.id, roles = ?roles, "user roles changed");
        user.roles = roles;
    }

    if !repositories::save(state.store(), &user).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(Json(UserResponse::from_db(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = parse_id(&user_id, "user")?;
    if !repositories::remove::<User>(state.store(), user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
