// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, progress, quiz, submission},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Everything lives under `/api`.
/// * Progress, submission, result, attempts and logout routes sit behind the
///   session-token middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/quiz", get(quiz::get_questions));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route(
            "/progress",
            get(progress::get_progress)
                .post(progress::save_progress)
                .delete(progress::clear_progress),
        )
        .route("/submit", post(submission::submit))
        .route("/result", get(submission::get_result))
        .route("/result/report", get(submission::get_report))
        .route("/attempts", get(submission::list_attempts))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
