//! HTTP server: axum router, shared state, and per-resource handlers.

pub mod auth;
pub mod categories;
pub mod extract;
pub mod tags;
pub mod tasks;

use crate::config::Config;
use crate::db::Database;
use anyhow::Result;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub db: Database,
    /// Lifetime of a newly issued session, in milliseconds.
    pub session_ttl_ms: i64,
}

/// Build the application router. Every route is an explicit handler
/// function; the authenticated principal is injected by the
/// [`extract::CurrentUser`] extractor.
pub fn router(state: ApiState) -> Router {
    Router::new()
        // User and auth routes
        .route("/register/", post(auth::register))
        .route("/auth/", post(auth::login))
        .route("/logout/", post(auth::logout))
        .route("/users/me/", get(auth::me))
        .route(
            "/profile/",
            get(auth::profile).patch(auth::update_profile),
        )
        // Task routes
        .route("/tasks/", get(tasks::list).post(tasks::create))
        .route("/tasks/top-level/", get(tasks::top_level))
        .route(
            "/tasks/{id}/",
            get(tasks::get)
                .put(tasks::replace)
                .patch(tasks::patch)
                .delete(tasks::delete),
        )
        .route("/tasks/{id}/subtasks/", get(tasks::subtasks))
        // Category routes
        .route(
            "/categories/",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/{id}/",
            get(categories::get)
                .patch(categories::patch)
                .delete(categories::delete),
        )
        // Tag routes
        .route("/tags/", get(tags::list).post(tags::create))
        .route(
            "/tags/{id}/",
            get(tags::get).patch(tags::patch).delete(tags::delete),
        )
        .with_state(state)
}

/// Bind and serve the API until the process is stopped.
pub async fn serve(db: Database, config: &Config) -> Result<()> {
    let state = ApiState {
        db,
        session_ttl_ms: config.server.session_ttl_hours as i64 * 60 * 60 * 1000,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
