use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use gymbot_booking::LifecycleManager;
use gymbot_core::config::GymbotConfig;
use gymbot_provider::BookingProvider;
use gymbot_scheduler::SchedulerHandle;
use gymbot_store::Store;
use gymbot_vault::CredentialVault;

use crate::auth::TokenAuth;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: GymbotConfig,
    pub store: Store,
    pub lifecycle: LifecycleManager,
    pub provider: Arc<dyn BookingProvider>,
    pub vault: Arc<CredentialVault>,
    pub auth: TokenAuth,
    pub scheduler: Arc<SchedulerHandle>,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/v1/login", post(crate::http::login::login_handler))
        .route(
            "/api/v1/reservations",
            post(crate::http::reservations::create_handler)
                .get(crate::http::reservations::list_handler),
        )
        .route(
            "/api/v1/reservations/{id}",
            put(crate::http::reservations::update_handler)
                .delete(crate::http::reservations::delete_handler),
        )
        .route("/api/v1/logs", get(crate::http::reservations::logs_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
