//! Development backend for the course notes client.
//!
//! Serves the same REST surface the client talks to (cookie sessions, CSRF
//! header on mutating requests, field-map validation errors) from memory.

pub mod routes;
pub mod store;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::trace::TraceLayer;

pub use store::{SeedUser, Store, StoreError};

/// Application state shared across handlers
#[derive(Clone, Default)]
pub struct AppState {
    store: Arc<Mutex<Store>>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds the full router: `/health` and login are public, the rest of
/// `/api/v1` needs a session.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/login", post(routes::login));

    let protected_routes = Router::new()
        .route(
            "/api/v1/profile/{id}",
            get(routes::profile)
                .patch(routes::update_profile)
                .delete(routes::delete_profile),
        )
        .route("/api/v1/courses", get(routes::courses))
        .route("/api/v1/courses/new", post(routes::create_course))
        .route(
            "/api/v1/courses/{course_id}",
            patch(routes::update_course).delete(routes::delete_course),
        )
        .route(
            "/api/v1/courses/{course_id}/topics",
            post(routes::create_topic),
        )
        .route(
            "/api/v1/courses/{course_id}/topics/{topic_id}",
            patch(routes::update_topic).delete(routes::delete_topic),
        )
        .route(
            "/api/v1/courses/{course_id}/topics/{topic_id}/notes",
            post(routes::create_note),
        )
        .route(
            "/api/v1/courses/{course_id}/topics/{topic_id}/notes/{note_id}",
            patch(routes::update_note).delete(routes::delete_note),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
