use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::commission::{client_fee, commission};
use crate::engine::dispatch::publish;
use crate::engine::performance::load_or_default;
use crate::engine::{notify_client_status, notify_user, require_client, require_courier};
use crate::error::AppError;
use crate::models::shipment::{Shipment, ShipmentStatus};
use crate::models::user::Role;
use crate::state::AppState;
use crate::store::Tx;

pub async fn assign(
    state: &AppState,
    shipment_id: Uuid,
    courier_id: Uuid,
) -> Result<Shipment, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;

    let shipment = assign_in(&mut tx, shipment_id, courier_id, now)?;
    let outbox = tx.commit();

    record(state, "manual", 1);
    info!(
        shipment_id = %shipment_id,
        courier_id = %courier_id,
        commission = %shipment.courier_commission,
        "shipment assigned"
    );

    publish(state, outbox).await;
    Ok(shipment)
}

/// Assigns every listed shipment that is waiting for a courier. Shipments in
/// any other state, or unknown ids, are skipped.
pub async fn bulk_assign(
    state: &AppState,
    shipment_ids: &[Uuid],
    courier_id: Uuid,
) -> Result<usize, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    require_courier(&tx, courier_id)?;

    let mut assigned = 0;
    for &shipment_id in shipment_ids {
        let ready = tx
            .shipment(shipment_id)
            .is_some_and(|shipment| shipment.status() == ShipmentStatus::PackagedAwaitingAssignment);
        if !ready {
            debug!(shipment_id = %shipment_id, "skipping shipment not awaiting assignment");
            continue;
        }

        assign_in(&mut tx, shipment_id, courier_id, now)?;
        assigned += 1;
    }

    let outbox = tx.commit();
    record(state, "bulk", assigned);
    info!(courier_id = %courier_id, assigned, requested = shipment_ids.len(), "bulk assignment finished");

    publish(state, outbox).await;
    Ok(assigned)
}

struct Candidate {
    id: Uuid,
    workload: usize,
}

/// Greedy balancer: each waiting shipment, in intake order, goes to the
/// least-loaded unrestricted courier serving its destination zone.
pub async fn auto_assign(state: &AppState) -> Result<usize, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;

    let mut workload: HashMap<Uuid, usize> = HashMap::new();
    for shipment in tx.shipments().filter(|shipment| shipment.status().is_active()) {
        if let Some(courier_id) = shipment.courier_id {
            *workload.entry(courier_id).or_default() += 1;
        }
    }

    // registration order
    let mut pool: Vec<Candidate> = tx
        .users()
        .filter(|user| user.has_role(Role::Courier))
        .filter(|user| {
            !tx.performance(user.id)
                .is_some_and(|record| record.is_restricted)
        })
        .map(|user| Candidate {
            id: user.id,
            workload: workload.get(&user.id).copied().unwrap_or(0),
        })
        .collect();

    let mut waiting: Vec<(u64, Uuid, String)> = tx
        .shipments()
        .filter(|shipment| shipment.status() == ShipmentStatus::PackagedAwaitingAssignment)
        .map(|shipment| (shipment.sequence, shipment.id, shipment.destination.zone.clone()))
        .collect();
    waiting.sort();

    let mut assigned = 0;
    for (_, shipment_id, zone) in waiting {
        let mut matches: Vec<usize> = (0..pool.len())
            .filter(|&idx| {
                tx.user(pool[idx].id)
                    .is_some_and(|courier| courier.serves_zone(&zone))
            })
            .collect();
        // stable: equal workloads keep pool order
        matches.sort_by_key(|&idx| pool[idx].workload);

        let Some(&winner) = matches.first() else {
            debug!(shipment_id = %shipment_id, zone = %zone, "no courier serves zone");
            continue;
        };

        let courier_id = pool[winner].id;
        assign_in(&mut tx, shipment_id, courier_id, now)?;
        pool[winner].workload += 1;
        assigned += 1;

        debug!(
            shipment_id = %shipment_id,
            courier_id = %courier_id,
            workload = pool[winner].workload,
            "shipment auto-assigned"
        );
    }

    let outbox = tx.commit();
    record(state, "auto", assigned);
    info!(assigned, "auto assignment finished");

    publish(state, outbox).await;
    Ok(assigned)
}

/// Per-shipment assignment step shared by every mode. Freezes the client fee
/// and the courier commission onto the shipment.
fn assign_in(
    tx: &mut Tx<'_>,
    shipment_id: Uuid,
    courier_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Shipment, AppError> {
    let mut shipment = tx.require_shipment(shipment_id)?;
    if shipment.status() == ShipmentStatus::Delivered {
        return Err(AppError::InvalidStatus(format!(
            "shipment {} is already delivered",
            shipment.tracking_code
        )));
    }

    let (_, profile) = require_client(tx, shipment.client_id)?;
    require_courier(tx, courier_id)?;

    let record = load_or_default(tx, courier_id, now);
    if record.is_restricted {
        return Err(AppError::ValidationFailed(format!(
            "courier {courier_id} is restricted: {}",
            record.restriction_reason.as_deref().unwrap_or("no reason recorded")
        )));
    }
    if tx.performance(courier_id).is_none() {
        tx.put_performance(record.clone());
    }

    shipment.client_fee = client_fee(&profile, shipment.priority, tx.tier_settings());
    shipment.courier_commission = commission(&shipment, &record.commission);
    shipment.courier_id = Some(courier_id);
    shipment.status_history.push(ShipmentStatus::AssignedToCourier, now);

    notify_user(
        tx,
        courier_id,
        Some(shipment.id),
        format!(
            "Shipment {} has been assigned to you (zone {})",
            shipment.tracking_code, shipment.destination.zone
        ),
        now,
    );
    notify_client_status(tx, &shipment, now);

    tx.put_shipment(shipment.clone());
    Ok(shipment)
}

fn record(state: &AppState, mode: &str, count: usize) {
    state
        .metrics
        .assignments_total
        .with_label_values(&[mode])
        .inc_by(count as u64);
}
