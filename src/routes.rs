use crate::{auth, handlers, middleware::add_security_headers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Extra room on top of the two photo uploads for the text fields and
/// multipart framing.
const FORM_OVERHEAD_BYTES: usize = 1 << 20;

pub fn app_router(state: AppState) -> Router {
    let upload_limit = state
        .config
        .max_upload_size_bytes()
        .saturating_mul(2)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let public_routes = Router::new()
        .route(
            "/whitelist/request",
            post(handlers::register).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/whitelist/confirm_email", get(handlers::confirm_email));

    let admin_routes = Router::new()
        .route("/admin/basic-auth", get(handlers::basic_auth_check))
        .route("/admin/whitelist/list", get(handlers::list_whitelists))
        .route(
            "/admin/whitelist/{id}/accept",
            post(handlers::accept_whitelist),
        )
        .route(
            "/admin/whitelist/{id}/decline",
            post(handlers::decline_whitelist),
        )
        .route(
            "/admin/whitelist/{id}/question",
            post(handlers::question_whitelist),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let mut app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http());

    // The admin SPA is served from another origin during development
    if state.config.debug {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.with_state(state)
}
