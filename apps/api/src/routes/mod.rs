pub mod health;
pub mod me;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::activity;
use crate::auth;
use crate::perimeter;
use crate::session;
use crate::state::AppState;
use crate::twofactor;
use crate::verification;

/// Assembles the full surface. Layer order matters: the perimeter gate is
/// outermost and runs before the session gate, which runs before routing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Email verification (session-exempt)
        .route(
            "/verify-email",
            get(verification::handlers::handle_verify_email)
                .post(verification::handlers::handle_verify_email),
        )
        .route(
            "/resend-verification",
            post(verification::handlers::handle_resend_verification),
        )
        // Auth
        .route("/api/v1/auth/register", post(auth::handlers::handle_register))
        .route("/api/v1/auth/login", post(auth::handlers::handle_login))
        .route("/api/v1/auth/logout", post(auth::handlers::handle_logout))
        // Short alias used by the frontend sign-out form
        .route("/logout", post(auth::handlers::handle_logout))
        .route(
            "/api/v1/auth/change-password",
            post(auth::handlers::handle_change_password),
        )
        .route(
            "/api/v1/auth/federated/:provider",
            get(auth::handlers::handle_federated_start),
        )
        .route(
            "/api/v1/auth/federated/:provider/callback",
            get(auth::handlers::handle_federated_callback),
        )
        // Current principal
        .route("/api/v1/me", get(me::handle_me))
        // Two-factor
        .route(
            "/api/v1/twofactor/setup",
            get(twofactor::handlers::handle_setup).post(twofactor::handlers::handle_setup),
        )
        .route(
            "/api/v1/twofactor/enable",
            post(twofactor::handlers::handle_enable),
        )
        .route(
            "/api/v1/twofactor/disable",
            post(twofactor::handlers::handle_disable),
        )
        .route(
            "/api/v1/twofactor/verify",
            post(twofactor::handlers::handle_verify),
        )
        // Activity
        .route(
            "/api/v1/activity",
            get(activity::handlers::handle_recent).post(activity::handlers::handle_log),
        )
        .route(
            "/api/v1/activity/summary",
            get(activity::handlers::handle_summary),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::guard::session_gate,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            perimeter::perimeter_gate,
        ))
        .with_state(state)
}
