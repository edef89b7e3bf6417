use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::api::errors::ApiError;
use crate::api::extractors::AppJson;
use crate::api::guards;
use crate::api::router::RouteTable;
use crate::api::validation::{validate_password_len, validate_payload};
use crate::core::{security, state::AppState, time};
use crate::db::models::User;
use crate::repositories::{self, users};
use crate::schemas::auth::{LoginRequest, LoginResponse};
use crate::schemas::user::{UserCreate, UserResponse};

const LOGIN_REDIRECT_PATH: &str = "/app.html";
const DEFAULT_ROLE: &str = "student";
const BAD_CREDENTIALS: &str = "Incorrect username or password";

pub(crate) fn routes(table: RouteTable) -> RouteTable {
    table
        .route(Method::POST, "/login", post(login))
        .route(Method::GET, "/logout", get(logout))
        .route(Method::POST, "/user", post(register))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    validate_payload(&payload)?;

    let Some(user) = users::find_by_username(state.store(), &payload.username).await? else {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    };

    let verified = security::verify_password(&payload.password, &user.password).unwrap_or(false);
    if !verified {
        tracing::info!(username = %payload.username, "login rejected");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    let (token, _) = state.sessions().open(&user.username).await?;
    tracing::info!(user_id = user.id, "user logged in");

    let jar = jar.add(guards::session_cookie(&state, token));
    Ok((
        jar,
        Json(LoginResponse {
            user: UserResponse::from_db(user),
            redirect_path: LOGIN_REDIRECT_PATH.to_string(),
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let cookie_name = &state.settings().session().cookie_name;
    if let Some(token) = guards::session_token(&headers, &jar, cookie_name) {
        state.sessions().close(&token).await?;
    }

    let jar = jar.add(guards::expired_session_cookie(&state));
    Ok((jar, Redirect::temporary("/")))
}

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<UserCreate>,
) -> Result<(StatusCode, CookieJar, Json<UserResponse>), ApiError> {
    validate_payload(&payload)?;
    validate_password_len(&payload.password)?;

    let mut user = User {
        username: payload.username,
        email: payload.email,
        password: security::hash_password(&payload.password)?,
        firstname: payload.firstname,
        lastname: payload.lastname,
        roles: vec![DEFAULT_ROLE.to_string()],
        created_on: time::now_rfc3339(),
        ..User::default()
    };
    repositories::create(state.store(), &mut user).await?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    let (token, _) = state.sessions().open(&user.username).await?;
    let jar = jar.add(guards::session_cookie(&state, token));

    Ok((StatusCode::CREATED, jar, Json(UserResponse::from_db(user))))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn register_login_logout_round() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/user",
                None,
                Some(json!({"username": "ada", "password": "analytical", "email": "ada@example.com"})),
            ))
            .await
            .expect("register");
        let status = response.status();
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        let created = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {created}");
        assert_eq!(created["username"], "ada");
        assert_eq!(created["roles"], json!(["student"]));
        assert!(created.get("password").is_none());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/login",
                None,
                Some(json!({"username": "ada", "password": "analytical"})),
            ))
            .await
            .expect("login");
        let status = response.status();
        let token = test_support::cookie_token(&response).expect("session cookie");
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["redirect_path"], "/app.html");
        assert_eq!(body["user"]["username"], "ada");
        assert!(ctx.state.sessions().validate(&token).await.unwrap().is_some());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/logout", Some(&token), None))
            .await
            .expect("logout");
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert!(ctx.state.sessions().validate(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let ctx = test_support::setup_test_context().await;
        test_support::insert_user(&ctx.state, "grace", "compiler-pass", &["student"]).await;

        for (username, password) in [("grace", "wrong-password"), ("nobody", "compiler-pass")] {
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    "/login",
                    None,
                    Some(json!({"username": username, "password": password})),
                ))
                .await
                .expect("login");
            let status = response.status();
            let body = test_support::read_json(response).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "response: {body}");
            assert_eq!(body["detail"], "Incorrect username or password");
        }
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let ctx = test_support::setup_test_context().await;
        test_support::insert_user(&ctx.state, "grace", "compiler-pass", &[]).await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/user",
                None,
                Some(json!({"username": "grace", "password": "another-pass"})),
            ))
            .await
            .expect("register");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn malformed_login_body_is_bad_request() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/login",
                None,
                Some(json!({"username": 5})),
            ))
            .await
            .expect("login");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
        assert_eq!(body["status"], 400);
    }
}
