//! FieldOps Backend
//!
//! REST backend for field attendance and lecture reporting across teachers,
//! coordinators and heads, with SQLite persistence and a local media store.

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod errors;
mod lifecycle;
mod media;
mod models;
mod reports;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use lifecycle::Reconciler;
use media::{LocalMediaStore, MediaStore};
use models::MAX_REPORT_IMAGES;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub media: Arc<dyn MediaStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FieldOps Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Media directory: {:?}", config.media_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.bootstrap_key.is_none() {
        tracing::warn!(
            "No bootstrap key configured (FIELDOPS_BOOTSTRAP_KEY). Head registration is open!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize media store
    tokio::fs::create_dir_all(&config.media_dir).await?;
    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(
        config.media_dir.clone(),
        config.media_base_url.clone(),
        config.max_upload_bytes,
    ));

    // Background cleanup
    Reconciler::new(
        repo.clone(),
        config.reconcile_interval_secs,
        config.student_retention_days,
    )
    .spawn();

    // Create application state
    let state = AppState {
        repo,
        media,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone the bootstrap key for the auth layer
    let psk = state.config.bootstrap_key.clone();

    // Room for a full lecture upload plus form fields
    let body_limit = state.config.max_upload_bytes * MAX_REPORT_IMAGES + 64 * 1024;

    let bootstrap_routes = Router::new()
        .route("/auth/heads", post(api::register_head))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    let session_routes = Router::new()
        // Auth
        .route("/auth/login/{role}", post(api::login))
        .route("/auth/logout", post(api::logout))
        // Account
        .route("/account/settings", get(api::get_settings))
        .route("/account/username", put(api::update_username))
        .route("/account/password", put(api::update_password))
        .route("/account/picture", post(api::upload_picture))
        .route("/account/attendance", get(api::get_attendance))
        .route("/account/attendance", post(api::upload_attendance))
        // Teacher
        .route("/teacher/home", get(api::teacher_home))
        .route("/teacher/students", get(api::list_students))
        .route("/teacher/students", post(api::add_student))
        .route("/teacher/students/{id}", delete(api::delete_student))
        .route("/teacher/lectures", post(api::submit_lecture))
        .route("/teacher/reports", get(api::list_reports))
        .route("/teacher/reports/{id}", get(api::get_report))
        // Coordinator
        .route("/coordinator/home", get(api::coordinator_home))
        .route("/coordinator/teachers", post(api::create_teacher))
        .route("/coordinator/teachers/{id}", get(api::get_teacher_overview))
        .route("/coordinator/teachers/{id}", delete(api::delete_teacher))
        .route("/coordinator/teachers/{id}/clear", post(api::clear_teacher))
        .route("/coordinator/clear", post(api::clear_all_teachers))
        .route("/coordinator/lectures/{id}", get(api::get_teacher_lecture))
        .route("/coordinator/staging", get(api::get_staging))
        .route("/coordinator/staging", post(api::stage_report))
        .route("/coordinator/staging/{report_id}", delete(api::unstage_report))
        .route("/coordinator/reports", post(api::commit_report))
        .route("/coordinator/reports", get(api::list_committed_reports))
        // Head
        .route("/head/home", get(api::head_home))
        .route("/head/coordinators", post(api::create_coordinator))
        .route("/head/coordinators/{id}", delete(api::delete_coordinator))
        .route(
            "/head/coordinators/{id}/reports",
            get(api::get_coordinator_reports),
        )
        .route(
            "/head/coordinators/{id}/clear-attendance",
            post(api::clear_coordinator_attendance),
        )
        .route("/head/teachers/{id}/reassign", post(api::reassign_teacher))
        .route("/head/lectures/{id}", get(api::get_lecture));

    // Stored media and health check (no auth required)
    let media_prefix = format!("/{}", state.config.media_base_url.trim_matches('/'));
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .nest_service(&media_prefix, ServeDir::new(&state.config.media_dir));

    Router::new()
        .merge(bootstrap_routes)
        .merge(session_routes)
        .merge(public_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
