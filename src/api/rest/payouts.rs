use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::ledger::{decline_payout, process_payout, request_payout};
use crate::error::AppError;
use crate::models::ledger::{LedgerEntry, LedgerKind};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payouts", post(request))
        .route("/payouts/:ledger/:id/process", post(process))
        .route("/payouts/:ledger/:id/decline", post(decline))
}

#[derive(Deserialize)]
pub struct PayoutRequest {
    pub ledger: LedgerKind,
    pub owner_id: Uuid,
    pub amount: Decimal,
}

#[derive(Deserialize, Default)]
pub struct ProcessRequest {
    #[serde(default)]
    pub evidence: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PayoutRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), AppError> {
    let entry = request_payout(&state, payload.ledger, payload.owner_id, payload.amount).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn process(
    State(state): State<Arc<AppState>>,
    Path((ledger, id)): Path<(LedgerKind, Uuid)>,
    Json(payload): Json<ProcessRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    Ok(Json(process_payout(&state, ledger, id, payload.evidence).await?))
}

async fn decline(
    State(state): State<Arc<AppState>>,
    Path((ledger, id)): Path<(LedgerKind, Uuid)>,
    Json(payload): Json<DeclineRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    Ok(Json(decline_payout(&state, ledger, id, payload.reason).await?))
}
