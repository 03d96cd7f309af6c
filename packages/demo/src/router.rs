//! Assembles the Axum [`Router`] for a demo role.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    config::Role,
    handlers::{bank, common, holder, issuer, AppState},
};

/// Build the complete application router with shared state.
pub fn build_router(state: AppState) -> Router {
    let common = Router::new()
        .route("/", get(common::index))
        .route("/.well-known/did.json", get(common::did_document))
        .route("/agent/{method}", post(common::agent_method))
        .route("/open-api.json", get(common::open_api));

    let app = match state.role {
        Role::Issuer => common
            .route("/.well-known/issuer.json", get(issuer::credential_manifest))
            .route("/messaging", post(common::receive_message)),
        Role::Holder => common
            .route("/credentials", get(holder::credentials))
            .route("/messaging", post(common::receive_message))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                holder::resolve_identity,
            )),
        Role::Bank => common
            .route("/services", get(bank::services))
            .route("/didcomm", post(common::receive_message)),
    };

    app.with_state(state).layer(TraceLayer::new_for_http())
}
