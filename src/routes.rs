// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    docs::ApiDoc,
    handlers::{access, classes, exams, health},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (access, classes, exams, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (config and enrollment cache).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let access_routes = Router::new().route("/evaluate", post(access::evaluate_access));

    let class_routes = Router::new()
        .route("/{class_id}/tracking", get(classes::get_tracking))
        .route("/{class_id}/payments", put(classes::put_payments))
        .route("/{class_id}/payments/import", post(classes::import_payments))
        .route("/{class_id}/payment-completed", post(classes::payment_completed))
        .route("/{class_id}/access", get(access::class_access));

    let exam_routes = Router::new()
        .route("/results/tree", post(exams::build_results_tree))
        .route("/results/tree/import", post(exams::import_results_tree));

    let student_routes = Router::new()
        .nest("/api/access", access_routes)
        .nest("/api/classes", class_routes)
        .nest("/api/exams", exam_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/classes/{class_id}/tracking", put(classes::put_tracking))
        .route("/classes/{class_id}/cache", delete(classes::invalidate_class))
        .route("/cache", delete(classes::refresh_cache))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/api/health", get(health::health))
        .merge(student_routes)
        .nest("/api/admin", admin_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
