//! HTTP agent API.
//!
//! Serves the service map to dashboards:
//! - `GET /health`
//! - `GET /services`: known services from the registry
//! - `GET /map?from=<µs>&to=<µs>`: service map for the window
//! - `GET /analytics/graph?name=&namespace=`: edges touching one service
//! - `GET /analytics/services?name=&namespace=`: services linked to it
//! - `GET /analytics/traces?name=&namespace=`: traces it appears in
//!
//! The analytics routes take the same optional `from`/`to` as `/map`.

use crate::core::config::ServerConfig;
use crate::core::{KnmapError, Result, ServiceIdentity, TimeWindow};
use crate::service_map::{ServiceMapper, Snapshot};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// API server state.
#[derive(Clone)]
struct ApiState {
    mapper: Arc<ServiceMapper>,
    default_window: Duration,
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Error response.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

/// Query parameters for the map endpoint, in microseconds since the epoch.
#[derive(Debug, Deserialize)]
struct MapQuery {
    from: Option<i64>,
    to: Option<i64>,
}

/// Query parameters for the analytics endpoints.
#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    from: Option<i64>,
    to: Option<i64>,
    name: Option<String>,
    namespace: Option<String>,
}

impl AnalyticsQuery {
    fn focus(&self) -> std::result::Result<ServiceIdentity, Response> {
        match (self.name.as_deref(), self.namespace.as_deref()) {
            (Some(name), Some(namespace)) if !name.is_empty() && !namespace.is_empty() => {
                Ok(ServiceIdentity::new(name, namespace))
            },
            _ => Err(error_response(
                StatusCode::BAD_REQUEST,
                "Both 'name' and 'namespace' are required".to_string(),
            )),
        }
    }
}

/// Builds the API router.
pub fn router(mapper: Arc<ServiceMapper>, config: &ServerConfig) -> Router {
    let state = ApiState {
        mapper,
        default_window: config.default_window,
    };

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/services", get(services_handler))
        .route("/map", get(map_handler))
        .route("/analytics/graph", get(analytics_graph_handler))
        .route("/analytics/services", get(analytics_services_handler))
        .route("/analytics/traces", get(analytics_traces_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Start the API server and run until `shutdown` resolves.
pub async fn serve<F>(mapper: Arc<ServiceMapper>, config: &ServerConfig, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        KnmapError::Io(std::io::Error::new(e.kind(), format!("Failed to bind to {}: {}", addr, e)))
    })?;
    tracing::info!("Starting API server on http://{}", addr);

    axum::serve(listener, router(mapper, config))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn error_response(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            code: status.as_u16(),
        }),
    )
        .into_response()
}

fn status_for(err: &KnmapError) -> StatusCode {
    match err.category() {
        "validation" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "network" | "timeout" | "serialization" | "registry" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /services
async fn services_handler(State(state): State<ApiState>) -> Response {
    match state.mapper.registry().list_services().await {
        Ok(services) => Json(services).into_response(),
        Err(e) => {
            tracing::error!("Failed to list services: {}", e);
            error_response(status_for(&e), format!("Failed to list services: {}", e))
        },
    }
}

fn window_from(state: &ApiState, from: Option<i64>, to: Option<i64>) -> std::result::Result<TimeWindow, Response> {
    let window = match (from, to) {
        (Some(from), Some(to)) => TimeWindow::from_micros(from, to),
        (None, None) => TimeWindow::last(state.default_window),
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Both 'from' and 'to' are required when either is given".to_string(),
            ))
        },
    };
    window.map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))
}

/// GET /map
async fn map_handler(State(state): State<ApiState>, Query(params): Query<MapQuery>) -> Response {
    let window = match window_from(&state, params.from, params.to) {
        Ok(w) => w,
        Err(response) => return response,
    };

    match state.mapper.build(window).await {
        Ok(map) => Json(map).into_response(),
        Err(e) => {
            tracing::error!("Failed to build service map: {}", e);
            error_response(status_for(&e), format!("Failed to build service map: {}", e))
        },
    }
}

/// Resolves the focus and window, then computes the snapshot and hands it
/// to `view`.
async fn analytics<T, F>(state: ApiState, params: AnalyticsQuery, what: &str, view: F) -> Response
where
    T: Serialize,
    F: FnOnce(&Snapshot, &ServiceIdentity) -> Result<T>,
{
    let focus = match params.focus() {
        Ok(focus) => focus,
        Err(response) => return response,
    };
    let window = match window_from(&state, params.from, params.to) {
        Ok(w) => w,
        Err(response) => return response,
    };

    let result = match state.mapper.snapshot(window).await {
        Ok(snapshot) => view(&snapshot, &focus),
        Err(e) => Err(e),
    };
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            if e.category() == "not_found" {
                tracing::debug!("{} for {}: {}", what, focus, e);
            } else {
                tracing::error!("Failed to compute {} for {}: {}", what, focus, e);
            }
            error_response(status_for(&e), format!("Failed to compute {}: {}", what, e))
        },
    }
}

/// GET /analytics/graph
async fn analytics_graph_handler(State(state): State<ApiState>, Query(params): Query<AnalyticsQuery>) -> Response {
    analytics(state, params, "service graph", Snapshot::focus_map).await
}

/// GET /analytics/services
async fn analytics_services_handler(
    State(state): State<ApiState>,
    Query(params): Query<AnalyticsQuery>,
) -> Response {
    analytics(state, params, "linked services", Snapshot::linked_services).await
}

/// GET /analytics/traces
async fn analytics_traces_handler(State(state): State<ApiState>, Query(params): Query<AnalyticsQuery>) -> Response {
    analytics(state, params, "service traces", Snapshot::traces_with).await
}
