pub mod error;
pub mod events;
pub mod memberships;
pub mod middleware;
pub mod sweeps;
pub mod tokens;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};

use turnstile_access::PipelineConfig;
use turnstile_channel::ChannelAdapter;
use turnstile_db::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub adapter: Arc<dyn ChannelAdapter>,
    pub config: PipelineConfig,
    pub service_secret: String,
}

/// Full application router. Everything except the health probe sits behind
/// the service-token check.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/tokens", post(tokens::issue_token))
        .route("/api/v1/tokens/redeem", post(tokens::redeem_token))
        .route("/api/v1/tokens/{token}/revoke", post(tokens::revoke_token))
        .route("/api/v1/events/member", post(events::member_event))
        .route(
            "/api/v1/memberships/{channel_id}/{external_id}",
            get(memberships::get_membership),
        )
        .route(
            "/api/v1/memberships/{channel_id}/{external_id}/revoke",
            post(memberships::revoke_membership),
        )
        .route("/api/v1/sweeps/tokens", post(sweeps::sweep_tokens))
        .route("/api/v1/sweeps/invites", post(sweeps::sweep_invites))
        .route("/api/v1/sweeps/memberships", post(sweeps::sweep_memberships))
        .route("/api/v1/sweeps/notifications", post(sweeps::sweep_notifications))
        .route("/api/v1/sweeps/purge", post(sweeps::sweep_purge))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_service_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(protected)
        .route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
