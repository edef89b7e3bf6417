//! Request guards: the session requirement and the route permission gate.
//!
//! Both run as route layers so that `MatchedPath` is available. The gate is the outer layer;
//! when it already validated a session it leaves it in the request extensions and the session
//! layer reuses it.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::{header, request::Parts, HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::api::errors::ApiError;
use crate::core::{metrics, state::AppState};
use crate::repositories::{routes, users};
use crate::services::permissions::{self, PermissionMask};
use crate::services::sessions::Session;

const NOT_AUTHENTICATED: &str = "Not authenticated";
const NOT_AUTHORIZED: &str = "Not authorized";

/// Token and session of an authenticated request.
#[derive(Debug, Clone)]
pub(crate) struct CurrentSession {
    pub(crate) token: String,
    pub(crate) session: Session,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(ApiError::Unauthorized(NOT_AUTHENTICATED))
    }
}

/// `/user/:userId/module/:id/submit` + POST becomes `/user/{userId}/module/{id}/submit_POST`.
pub(crate) fn route_identity(path: &str, method: &Method) -> String {
    let template = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/");
    let method = if method == Method::HEAD { "GET" } else { method.as_str() };
    format!("{template}_{method}")
}

/// The session cookie wins over an `Authorization: Bearer` header.
pub(crate) fn session_token(headers: &HeaderMap, jar: &CookieJar, cookie_name: &str) -> Option<String> {
    if let Some(cookie) = jar.get(cookie_name) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub(crate) fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let settings = state.settings().session();
    Cookie::build((settings.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(settings.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(state.sessions().ttl())
        .build()
}

pub(crate) fn expired_session_cookie(state: &AppState) -> Cookie<'static> {
    let mut cookie = session_cookie(state, String::new());
    cookie.make_removal();
    cookie
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<CurrentSession, ApiError> {
    let cookie_name = &state.settings().session().cookie_name;
    let Some(token) = session_token(headers, jar, cookie_name) else {
        metrics::record_denied("missing_session");
        return Err(ApiError::Unauthorized(NOT_AUTHENTICATED));
    };

    match state.sessions().validate(&token).await? {
        Some(session) => Ok(CurrentSession { token, session }),
        None => {
            metrics::record_denied("expired_session");
            Err(ApiError::Unauthorized(NOT_AUTHENTICATED))
        }
    }
}

/// Requires a live session, renews it and re-issues the cookie on the response.
pub(crate) async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.extensions().get::<CurrentSession>().is_some() {
        return Ok(next.run(request).await);
    }

    let current = authenticate(&state, request.headers(), &jar).await?;
    let jar = jar.add(session_cookie(&state, current.token.clone()));
    request.extensions_mut().insert(current);
    Ok((jar, next.run(request).await).into_response())
}

/// Admits the request when its route is public or the caller's role key shares a bit with the
/// route's permission level.
pub(crate) async fn permission_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let matched = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| route_identity(path.as_str(), request.method()));
    let Some(identity) = matched else {
        return Ok(next.run(request).await);
    };

    let level = routes::find_by_name(state.store(), &identity)
        .await?
        .map(|route| PermissionMask::new(route.permission_level))
        .unwrap_or(PermissionMask::PUBLIC);
    if level.is_public() {
        return Ok(next.run(request).await);
    }

    let current = authenticate(&state, request.headers(), &jar).await?;

    let Some(user) = users::find_by_username(state.store(), &current.session.username).await?
    else {
        tracing::warn!(route = %identity, username = %current.session.username, "session user no longer exists");
        metrics::record_denied("unknown_user");
        return Err(ApiError::Unauthorized(NOT_AUTHENTICATED));
    };

    let key = state.roles().role_key(&user.roles).await;
    if !permissions::authorize(level, key) {
        tracing::info!(
            route = %identity,
            username = %user.username,
            level = level.bits(),
            key = key.bits(),
            "request denied by route permission level"
        );
        metrics::record_denied("insufficient_permissions");
        return Err(ApiError::Unauthorized(NOT_AUTHORIZED));
    }

    let jar = jar.add(session_cookie(&state, current.token.clone()));
    request.extensions_mut().insert(current);
    Ok((jar, next.run(request).await).into_response())
}
