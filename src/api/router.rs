use axum::{
    http::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    http::{HeaderName, Method, Request, Response},
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::api::{attempts, auth, content, guards, handlers, progress, roles, routes, users};
use crate::core::{config::Settings, state::AppState};

/// Collects the application routes while remembering the identity of each one, so the
/// permission table can be synced with exactly what the router serves.
pub(crate) struct RouteTable {
    open: Router<AppState>,
    session: Router<AppState>,
    identities: Vec<String>,
}

impl RouteTable {
    fn new() -> Self {
        Self { open: Router::new(), session: Router::new(), identities: Vec::new() }
    }

    pub(crate) fn route(
        mut self,
        method: Method,
        path: &'static str,
        handler: MethodRouter<AppState>,
    ) -> Self {
        self.identities.push(guards::route_identity(path, &method));
        self.open = self.open.route(path, handler);
        self
    }

    /// Like [`RouteTable::route`], but the handler only runs for a live session.
    pub(crate) fn session_route(
        mut self,
        method: Method,
        path: &'static str,
        handler: MethodRouter<AppState>,
    ) -> Self {
        self.identities.push(guards::route_identity(path, &method));
        self.session = self.session.route(path, handler);
        self
    }

    fn into_router(self, state: &AppState) -> Router<AppState> {
        let session = self
            .session
            .route_layer(middleware::from_fn_with_state(state.clone(), guards::require_session));

        self.open
            .merge(session)
            .route_layer(middleware::from_fn_with_state(state.clone(), guards::permission_gate))
    }
}

fn route_table() -> RouteTable {
    let table = RouteTable::new();
    let table = auth::routes(table);
    let table = users::routes(table);
    let table = attempts::routes(table);
    let table = progress::routes(table);
    let table = content::routes(table);
    let table = roles::routes(table);
    routes::routes(table)
}

/// Identities of every gated route, e.g. `/module/{id}/start_GET`.
pub(crate) fn route_identities() -> Vec<String> {
    route_table().identities
}

pub(crate) fn router(state: AppState) -> Router {
    let cors = build_cors_layer(state.settings());
    let application = route_table().into_router(&state);

    let request_id_header = HeaderName::from_static("x-request-id");
    let request_id_header_for_span = request_id_header.clone();
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(move |request: &Request<_>| {
            let request_id = request
                .headers()
                .get(&request_id_header_for_span)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_response(|response: &Response<axum::body::Body>, latency: Duration, _span: &Span| {
            let status_label = response.status().as_u16().to_string();
            tracing::info!(status = response.status().as_u16(), latency_ms = latency.as_millis() as u64, "response");
            metrics::counter!(
                "http_requests_total",
                "status" => status_label.clone()
            )
            .increment(1);
            metrics::histogram!(
                "http_request_duration_seconds",
                "status" => status_label
            )
            .record(latency.as_secs_f64());
        });

    let mut router: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .merge(application);

    if state.settings().telemetry().prometheus_enabled {
        router = router.route("/metrics", get(handlers::metrics));
    }

    router
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins = settings
        .cors()
        .origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        // Wildcard origin cannot be combined with allow_credentials
        base.allow_origin(Any)
    } else {
        base.allow_credentials(true).allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use super::{route_identities, router};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use crate::core::{config::Settings, metrics};
    use crate::test_support;

    #[tokio::test]
    async fn root_returns_message() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = test_support::read_json(response).await;
        assert_eq!(json["message"], "Coursekit API");
    }

    #[tokio::test]
    async fn healthz_reports_memory_backends() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = test_support::read_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"]["store"], "healthy");
        assert_eq!(json["components"]["sessions"], "memory");
    }

    #[tokio::test]
    async fn metrics_disabled_returns_404() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_enabled_returns_200() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("PROMETHEUS_ENABLED", "1");

        let settings = Settings::load().expect("settings");
        metrics::init(&settings).expect("metrics init");
        let app = router(test_support::build_state());
        std::env::set_var("PROMETHEUS_ENABLED", "0");

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn identities_cover_the_attempt_routes() {
        let identities = route_identities();
        for expected in [
            "/module/{id}/start_GET",
            "/user/{userId}/module/{id}/submit_POST",
            "/user/{userId}/module/{id}/results_GET",
            "/module/{id}/analytics_GET",
            "/user/{userId}/module/{id}/reset_POST",
            "/login_POST",
            "/role/{id}_PUT",
            "/user/{userId}/progress_GET",
            "/user/{userId}/course/{courseId}/progress_GET",
        ] {
            assert!(identities.iter().any(|identity| identity == expected), "missing {expected}");
        }
    }
}
