use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ledger::{client_summary, client_wallet_balance, ClientSummary};
use crate::engine::tiers::{set_client_tier, update_tier_settings};
use crate::error::AppError;
use crate::models::tier::TierSetting;
use crate::models::user::User;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tiers", put(replace_tiers))
        .route("/clients/:id/tier", put(override_tier))
        .route("/clients/:id/wallet", get(wallet))
        .route("/clients/:id/summary", get(summary))
}

#[derive(Deserialize)]
pub struct TierOverrideRequest {
    /// `null` clears the override.
    pub tier: Option<String>,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub client_id: Uuid,
    pub balance: Decimal,
}

async fn replace_tiers(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Vec<TierSetting>>,
) -> Result<Json<Vec<TierSetting>>, AppError> {
    Ok(Json(update_tier_settings(&state, payload).await?))
}

async fn override_tier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TierOverrideRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(set_client_tier(&state, id, payload.tier).await?))
}

async fn wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let balance = client_wallet_balance(&state, id).await?;
    Ok(Json(WalletResponse {
        client_id: id,
        balance,
    }))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientSummary>, AppError> {
    Ok(Json(client_summary(&state, id).await?))
}
