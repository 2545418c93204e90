//! Shipment state machine.
//!
//! `advance` moves a shipment to any status except `Delivered`, which is only
//! reachable through [`complete_delivery`] once the recipient's code has been
//! confirmed. `Delivered` is terminal. `revert` undoes one of two specific forward steps.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::dispatch::publish;
use crate::engine::ledger::post;
use crate::engine::performance::{load_or_default, record_failure};
use crate::engine::settlement::settle_delivery;
use crate::engine::{notify_client_status, notify_user};
use crate::error::AppError;
use crate::models::ledger::{EntryKind, LedgerEntry, LedgerKind};
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::observability::metrics::Metrics;
use crate::state::AppState;
use crate::store::Tx;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionDetails {
    #[serde(default)]
    pub packaging_notes: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub failure_photo: Option<String>,
}

pub async fn advance(
    state: &AppState,
    shipment_id: Uuid,
    target: ShipmentStatus,
    details: TransitionDetails,
) -> Result<Shipment, AppError> {
    if target == ShipmentStatus::Delivered {
        return Err(AppError::InvalidStatus(
            "delivery must be confirmed with the recipient's verification code".to_string(),
        ));
    }

    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    let mut shipment = tx.require_shipment(shipment_id)?;
    if shipment.status() == ShipmentStatus::Delivered {
        return Err(AppError::InvalidStatus(format!(
            "shipment {} is already delivered",
            shipment.tracking_code
        )));
    }

    if !shipment.status_history.push(target, now) {
        debug!(shipment_id = %shipment_id, status = %target, "status already current");
        return Ok(shipment);
    }

    match target {
        ShipmentStatus::PackagedAwaitingAssignment => {
            if details.packaging_notes.is_some() {
                shipment.packaging_notes = details.packaging_notes;
            }
        }
        ShipmentStatus::DeliveryFailed => {
            shipment.failure_reason = details.failure_reason;
            shipment.failure_photo = details.failure_photo;
            record_delivery_failure(&mut tx, &state.metrics, &shipment, now);
        }
        _ => {}
    }

    notify_client_status(&mut tx, &shipment, now);
    tx.put_shipment(shipment.clone());
    let outbox = tx.commit();

    state
        .metrics
        .status_transitions_total
        .with_label_values(&[target.as_str()])
        .inc();
    info!(
        shipment_id = %shipment_id,
        tracking_code = %shipment.tracking_code,
        status = %target,
        "shipment status advanced"
    );

    publish(state, outbox).await;
    Ok(shipment)
}

fn record_delivery_failure(
    tx: &mut Tx<'_>,
    metrics: &Metrics,
    shipment: &Shipment,
    now: DateTime<Utc>,
) {
    if let Some(courier_id) = shipment.courier_id {
        let mut record = load_or_default(tx, courier_id, now);
        let restricted = record_failure(&mut record, now);
        let failures = record.consecutive_failures;
        tx.put_performance(record);

        let mut message = format!(
            "Delivery of shipment {} failed ({failures} consecutive failures)",
            shipment.tracking_code
        );
        if restricted {
            warn!(courier_id = %courier_id, failures, "courier restricted after repeated failures");
            message.push_str(". Your account is restricted from new assignments");
        }
        notify_user(tx, courier_id, Some(shipment.id), message, now);
    }

    if shipment.client_fee > Decimal::ZERO {
        post(
            tx,
            metrics,
            LedgerKind::Client,
            LedgerEntry::processed(
                shipment.client_id,
                -shipment.client_fee,
                EntryKind::Penalty,
                Some(shipment.id),
                format!("Failed delivery charge for shipment {}", shipment.tracking_code),
                now,
            ),
        );
    }
}

pub async fn revert(state: &AppState, shipment_id: Uuid) -> Result<Shipment, AppError> {
    let mut tx = state.store.begin().await;
    let mut shipment = tx.require_shipment(shipment_id)?;

    let current = shipment.status();
    let previous = shipment
        .status_history
        .previous()
        .ok_or(AppError::InvalidRevert)?;

    match (current, previous) {
        (ShipmentStatus::PackagedAwaitingAssignment, ShipmentStatus::WaitingForPackaging) => {
            shipment.packaging_notes = None;
        }
        (ShipmentStatus::AssignedToCourier, ShipmentStatus::PackagedAwaitingAssignment) => {
            shipment.courier_id = None;
            shipment.courier_commission = Decimal::ZERO;
        }
        (from, to) => return Err(AppError::UnsupportedRevert { from, to }),
    }

    shipment.status_history.pop_last();
    tx.put_shipment(shipment.clone());
    tx.commit();

    info!(
        shipment_id = %shipment_id,
        from = %current,
        to = %previous,
        "shipment status reverted"
    );
    Ok(shipment)
}

/// Marks a shipment delivered and settles it. Callers must have confirmed
/// the recipient's verification code in the same transaction.
pub(crate) fn complete_delivery(
    tx: &mut Tx<'_>,
    metrics: &Metrics,
    shipment_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Shipment, AppError> {
    let mut shipment = tx.require_shipment(shipment_id)?;
    if shipment.status() == ShipmentStatus::Delivered {
        return Err(AppError::InvalidStatus(format!(
            "shipment {} is already delivered",
            shipment.tracking_code
        )));
    }

    shipment.status_history.push(ShipmentStatus::Delivered, now);
    shipment.delivered_at = Some(now);
    notify_client_status(tx, &shipment, now);

    settle_delivery(tx, metrics, &shipment, now);
    tx.put_shipment(shipment.clone());

    metrics
        .status_transitions_total
        .with_label_values(&[ShipmentStatus::Delivered.as_str()])
        .inc();
    Ok(shipment)
}
