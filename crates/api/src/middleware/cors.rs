use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Read endpoints are consumed by front ends on other origins; every method the router
/// serves is allowed.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
