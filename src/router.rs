use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::db::{BackendKind, Backends, Relational};
use crate::error::StoreError;
use crate::handlers;

/// Shared by every request. The backends inside are never mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub backends: Arc<Backends>,
}

impl AppState {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends: Arc::new(backends),
        }
    }

    pub fn relational(&self) -> Result<&Relational, StoreError> {
        self.backends
            .relational()
            .ok_or(StoreError::BackendInactive(BackendKind::Relational))
    }
}

pub fn app_router(state: AppState) -> Router {
    let mut v1 = Router::new().route("/health", get(handlers::health::health_handler));

    if state.backends.relational().is_some() {
        v1 = v1
            .route("/register", post(handlers::auth::register_handler))
            .route("/posts", get(handlers::catalog::list_posts_handler))
            .route("/hobbies", get(handlers::catalog::list_hobbies_handler));
    }

    Router::new().nest("/api/v1", v1).with_state(state)
}
