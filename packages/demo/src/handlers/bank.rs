//! Bank routes.

use axum::{extract::State, Json};

use super::{AppState, RequestHost};
use crate::error::AppError;
use crate::manifest::{self, RelyingPartyService};

/// `GET /services`
pub async fn services(
    State(state): State<AppState>,
    host: RequestHost,
) -> Result<Json<Vec<RelyingPartyService>>, AppError> {
    let identity = state.identity(&host).await?;
    Ok(Json(manifest::bank_services(&identity)?))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
