use axum::{
    extract::{Path, State},
    http::Method,
    routing::{get, put},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::extractors::AppJson;
use crate::api::router::RouteTable;
use crate::api::validation::parse_id;
use crate::core::state::AppState;
use crate::db::models::Route;
use crate::repositories;
use crate::schemas::permission::RouteLevelUpdate;

pub(crate) fn routes(table: RouteTable) -> RouteTable {
    table
        .route(Method::GET, "/route", get(list_routes))
        .route(Method::PUT, "/route/:id", put(update_route_level))
}

async fn list_routes(State(state): State<AppState>) -> Result<Json<Vec<Route>>, ApiError> {
    Ok(Json(repositories::list(state.store()).await?))
}

/// Any mask is accepted; a level of 0 makes the route public.
async fn update_route_level(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
    AppJson(payload): AppJson<RouteLevelUpdate>,
) -> Result<Json<Route>, ApiError> {
    let route_id = parse_id(&route_id, "route")?;
    let Some(mut route) = repositories::find::<Route>(state.store(), route_id).await? else {
        return Err(ApiError::NotFound("Route not found".to_string()));
    };

    route.permission_level = payload.permission_level;
    repositories::save(state.store(), &route).await?;
    tracing::info!(route = %route.name, level = route.permission_level, "route permission level changed");

    Ok(Json(route))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn locking_the_role_table_to_admins() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/route", None, None))
            .await
            .expect("list routes");
        let routes = test_support::read_json(response).await;
        let role_create = routes
            .as_array()
            .expect("routes")
            .iter()
            .find(|route| route["name"] == "/role_POST")
            .cloned()
            .expect("role create route synced");
        assert_eq!(role_create["numeric_value"], 0);
        let route_id = role_create["id"].as_i64().expect("route id");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::PUT,
                &format!("/route/{route_id}"),
                None,
                Some(json!({"permission_level": 4})),
            ))
            .await
            .expect("update level");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["numeric_value"], 4);

        let new_role = json!({"name": "ta", "numeric_value": 8});
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::POST, "/role", None, Some(new_role.clone())))
            .await
            .expect("anonymous create");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        test_support::insert_user(&ctx.state, "root", "root-password", &["admin"]).await;
        let token = test_support::open_session(&ctx.state, "root").await;
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::POST, "/role", Some(&token), Some(new_role)))
            .await
            .expect("admin create");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::PUT,
                "/route/999999",
                None,
                Some(json!({"numeric_value": 1})),
            ))
            .await
            .expect("missing route");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
