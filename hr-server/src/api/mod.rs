//! HTTP API
//!
//! - Per-resource CRUD routes (department, group, team, shift)
//! - `POST /authen/logout`
//! - `GET /health` (public)
//!
//! Everything except `/health` sits behind the application key and session
//! checks, in that order.

pub mod authen;
pub mod health;
pub mod resource;

use axum::{Router, middleware};
use http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{require_app_key, require_session};
use crate::db::RESOURCES;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// uuid v4 request ids
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Routes behind the auth gate, without state
fn protected_routes() -> Router<AppState> {
    RESOURCES
        .iter()
        .copied()
        .fold(Router::new(), |router, def| router.merge(resource::router(def)))
        .merge(authen::router())
}

/// Build the fully layered application
pub fn build_app(state: AppState) -> Router {
    let protected = protected_routes()
        // route_layer: the last one added runs first
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_session,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_app_key,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers(Any);

    Router::new()
        .merge(protected)
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            XRequestId,
        ))
        .with_state(state)
}
