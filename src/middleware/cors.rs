use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Open to any origin; the API carries no cookies or credentials.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}
