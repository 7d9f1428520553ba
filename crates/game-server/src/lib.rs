pub mod config;
pub mod error;
pub mod lobby;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod session;
pub mod state;

use axum::{routing::get, Extension, Router};
use tower_http::cors::{Any, CorsLayer};

pub use config::Config;
pub use error::GameError;
pub use state::Services;

pub fn router(services: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ws", get(routes::ws::ws_handler))
        .layer(Extension(services))
        .layer(cors)
}
