use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::ledger::{apply_bonus, apply_penalty, courier_financials, CourierFinancials};
use crate::engine::performance::{update_courier_settings, CourierSettingsUpdate};
use crate::error::AppError;
use crate::models::ledger::LedgerEntry;
use crate::models::performance::CourierPerformance;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers/:id/penalties", post(penalize))
        .route("/couriers/:id/bonuses", post(reward))
        .route("/couriers/:id/settings", patch(update_settings))
        .route("/couriers/:id/financials", get(financials))
}

#[derive(Deserialize)]
pub struct AdjustmentRequest {
    pub amount: Decimal,
    pub reason: String,
    #[serde(default)]
    pub shipment_id: Option<Uuid>,
}

async fn penalize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), AppError> {
    let entry =
        apply_penalty(&state, id, payload.amount, &payload.reason, payload.shipment_id).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn reward(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustmentRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), AppError> {
    let entry =
        apply_bonus(&state, id, payload.amount, &payload.reason, payload.shipment_id).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourierSettingsUpdate>,
) -> Result<Json<CourierPerformance>, AppError> {
    Ok(Json(update_courier_settings(&state, id, payload).await?))
}

async fn financials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourierFinancials>, AppError> {
    Ok(Json(courier_financials(&state, id).await?))
}
