use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, patch},
};
use sqlx::SqlitePool;

use crate::{auth::JwksCache, config::Environment, routes};

pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub jwks: JwksCache,
}

pub fn init_router(db: SqlitePool, config: Environment) -> Router {
    let state = Arc::new(AppState {
        db: Arc::new(db),
        jwks: JwksCache::new(),
    });
    Router::new()
        .route("/", get(routes::welcome))
        .route(
            "/drinks",
            get(routes::fetch_drinks).post(routes::create_drink),
        )
        .route("/drinks-detail", get(routes::fetch_drinks_detail))
        .route(
            "/drinks/{id}",
            patch(routes::update_drink).delete(routes::delete_drink),
        )
        .layer(Extension(config))
        .with_state(state)
}
