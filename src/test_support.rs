use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{bootstrap, config::Settings, security, state::AppState, time};
use crate::db::models::{Choice, Element, Module, ModuleElement, Route, User};
use crate::repositories::{self, memory::MemoryEntityStore, routes};
use crate::services::sessions::{MemorySessionStore, SessionManager};

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("COURSEKIT_ENV", "test");
    std::env::set_var("COURSEKIT_STRICT_CONFIG", "0");
    std::env::set_var("STORE_BACKEND", "memory");
    std::env::set_var("SESSION_BACKEND", "memory");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("SESSION_TTL_SECONDS");
    std::env::remove_var("FIRST_SUPERUSER_PASSWORD");
    std::env::remove_var("GRADING_MISSING_ELEMENTS");
    std::env::remove_var("GRADING_TEXT_REGEX_MATCHING");
    std::env::remove_var("GRADING_REVEAL_ANSWERS_IN_RESULTS");
    std::env::remove_var("QUIZ_PASSING_THRESHOLD");
}

/// State over fresh in-memory backends. Callers must hold [`env_lock`].
pub(crate) fn build_state() -> AppState {
    let settings = Settings::load().expect("settings");
    let sessions =
        SessionManager::new(Arc::new(MemorySessionStore::new()), settings.session().ttl_seconds);
    AppState::new(settings, Arc::new(MemoryEntityStore::new()), sessions, None)
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let state = build_state();
    bootstrap::prepare(&state, &api::router::route_identities()).await.expect("bootstrap");
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

pub(crate) async fn insert_user(
    state: &AppState,
    username: &str,
    password: &str,
    roles: &[&str],
) -> User {
    let mut user = User {
        username: username.to_string(),
        password: security::hash_password(password).expect("hash password"),
        roles: roles.iter().map(|role| role.to_string()).collect(),
        created_on: time::now_rfc3339(),
        ..User::default()
    };
    repositories::create(state.store(), &mut user).await.expect("insert user");
    user
}

pub(crate) async fn reload_user(state: &AppState, id: i64) -> User {
    repositories::find::<User>(state.store(), id).await.expect("load user").expect("user exists")
}

pub(crate) async fn open_session(state: &AppState, username: &str) -> String {
    state.sessions().open(username).await.expect("open session").0
}

pub(crate) async fn insert_module(state: &AppState, name: &str, min_passing: i32) -> Module {
    let mut module = Module { name: name.to_string(), min_passing, ..Module::default() };
    repositories::create(state.store(), &mut module).await.expect("insert module");
    module
}

pub(crate) fn choices(flags: &[bool]) -> Vec<Choice> {
    flags
        .iter()
        .enumerate()
        .map(|(index, correct)| Choice { text: format!("choice {index}"), correct: *correct })
        .collect()
}

pub(crate) async fn insert_element(state: &AppState, mut element: Element) -> Element {
    repositories::create(state.store(), &mut element).await.expect("insert element");
    element
}

pub(crate) async fn link_element(
    state: &AppState,
    module_id: i64,
    element_id: i64,
    sort_key: i64,
) -> ModuleElement {
    let mut link = ModuleElement { module_id, element_id, sort_key, ..ModuleElement::default() };
    repositories::create(state.store(), &mut link).await.expect("link element");
    link
}

pub(crate) async fn set_route_level(state: &AppState, identity: &str, level: u32) {
    let mut route = routes::find_by_name(state.store(), identity)
        .await
        .expect("find route")
        .unwrap_or_else(|| Route { name: identity.to_string(), ..Route::default() });
    route.permission_level = level;

    if route.id == 0 {
        repositories::create(state.store(), &mut route).await.expect("create route");
    } else {
        repositories::save(state.store(), &route).await.expect("save route");
    }
}

/// Builds a request; `token` travels in the session cookie.
pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session_token={token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

/// Value of the `session_token` cookie set by a response, if any.
pub(crate) fn cookie_token(response: &axum::response::Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| value.strip_prefix("session_token="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        .filter(|token| !token.is_empty())
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
