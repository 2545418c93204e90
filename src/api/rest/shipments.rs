use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::assignment::{assign, auto_assign, bulk_assign};
use crate::engine::directory::{create_shipment, get_shipment, NewShipment};
use crate::engine::lifecycle::{advance, revert, TransitionDetails};
use crate::engine::verification::{issue_code, verify, IssuedCode};
use crate::error::AppError;
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shipments", post(create))
        .route("/shipments/:id", get(show))
        .route("/shipments/:id/status", post(update_status))
        .route("/shipments/:id/revert", post(revert_status))
        .route("/shipments/:id/assign", post(assign_one))
        .route("/shipments/:id/verification", post(send_code))
        .route("/shipments/:id/verification/confirm", post(confirm_code))
        .route("/assignments/bulk", post(assign_bulk))
        .route("/assignments/auto", post(assign_auto))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(flatten)]
    pub details: TransitionDetails,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct BulkAssignRequest {
    pub shipment_ids: Vec<Uuid>,
    pub courier_id: Uuid,
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct AssignedCount {
    pub assigned: usize,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewShipment>,
) -> Result<(StatusCode, Json<Shipment>), AppError> {
    let shipment = create_shipment(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(get_shipment(&state, id).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Shipment>, AppError> {
    let target: ShipmentStatus = payload.status.parse()?;
    Ok(Json(advance(&state, id, target, payload.details).await?))
}

async fn revert_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(revert(&state, id).await?))
}

async fn assign_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(assign(&state, id, payload.courier_id).await?))
}

async fn assign_bulk(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BulkAssignRequest>,
) -> Result<Json<AssignedCount>, AppError> {
    let assigned = bulk_assign(&state, &payload.shipment_ids, payload.courier_id).await?;
    Ok(Json(AssignedCount { assigned }))
}

async fn assign_auto(State(state): State<Arc<AppState>>) -> Result<Json<AssignedCount>, AppError> {
    let assigned = auto_assign(&state).await?;
    Ok(Json(AssignedCount { assigned }))
}

async fn send_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<IssuedCode>, AppError> {
    Ok(Json(issue_code(&state, id).await?))
}

async fn confirm_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Json<Shipment>, AppError> {
    Ok(Json(verify(&state, id, &payload.code).await?))
}
