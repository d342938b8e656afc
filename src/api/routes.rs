use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and observability
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
        // Decision surface
        .route("/v1/evaluate", post(handlers::evaluate))
        .route("/v1/decide", post(handlers::submit_intent))
        // Approvals
        .route("/v1/approvals", get(handlers::list_approvals))
        .route("/v1/approvals/pending", get(handlers::list_pending_approvals))
        .route("/v1/approvals/:id", get(handlers::get_approval))
        .route("/v1/approvals/:id/approve", post(handlers::approve))
        .route("/v1/approvals/:id/deny", post(handlers::deny))
        // Policies
        .route(
            "/v1/policies",
            get(handlers::list_policies).post(handlers::create_policy),
        )
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}
