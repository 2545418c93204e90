use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::dispatch::publish;
use crate::engine::{notify_user, require_client, require_courier};
use crate::error::AppError;
use crate::models::ledger::{EntryKind, EntryStatus, LedgerEntry, LedgerKind};
use crate::models::notification::{Notification, NotificationKind};
use crate::models::shipment::ShipmentStatus;
use crate::observability::metrics::Metrics;
use crate::state::AppState;
use crate::store::Tx;

/// Appends an entry to one of the books.
pub(crate) fn post(tx: &mut Tx<'_>, metrics: &Metrics, ledger: LedgerKind, entry: LedgerEntry) {
    metrics
        .ledger_entries_total
        .with_label_values(&[ledger.as_str(), entry.kind.as_str()])
        .inc();
    tx.append_entry(ledger, entry);
}

/// Sum of every entry of `owner_id` that has not failed.
pub fn balance(entries: &[LedgerEntry], owner_id: Uuid) -> Decimal {
    entries
        .iter()
        .filter(|entry| entry.owner_id == owner_id && entry.counts())
        .map(|entry| entry.amount)
        .sum()
}

fn positive(amount: Decimal, what: &str) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::ValidationFailed(format!(
            "{what} must be greater than zero"
        )));
    }
    Ok(())
}

pub async fn apply_penalty(
    state: &AppState,
    courier_id: Uuid,
    amount: Decimal,
    reason: &str,
    shipment_id: Option<Uuid>,
) -> Result<LedgerEntry, AppError> {
    adjust_courier(state, courier_id, amount, EntryKind::Penalty, reason, shipment_id).await
}

pub async fn apply_bonus(
    state: &AppState,
    courier_id: Uuid,
    amount: Decimal,
    reason: &str,
    shipment_id: Option<Uuid>,
) -> Result<LedgerEntry, AppError> {
    adjust_courier(state, courier_id, amount, EntryKind::Bonus, reason, shipment_id).await
}

async fn adjust_courier(
    state: &AppState,
    courier_id: Uuid,
    amount: Decimal,
    kind: EntryKind,
    reason: &str,
    shipment_id: Option<Uuid>,
) -> Result<LedgerEntry, AppError> {
    positive(amount, "amount")?;
    if reason.trim().is_empty() {
        return Err(AppError::ValidationFailed("reason is required".to_string()));
    }

    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    require_courier(&tx, courier_id)?;
    if let Some(shipment_id) = shipment_id {
        tx.require_shipment(shipment_id)?;
    }

    let signed_amount = if kind == EntryKind::Penalty {
        -amount
    } else {
        amount
    };
    let entry = LedgerEntry::processed(
        courier_id,
        signed_amount,
        kind,
        shipment_id,
        reason.trim(),
        now,
    );
    post(&mut tx, &state.metrics, LedgerKind::Courier, entry.clone());

    let label = if kind == EntryKind::Penalty {
        "penalty"
    } else {
        "bonus"
    };
    notify_user(
        &mut tx,
        courier_id,
        shipment_id,
        format!("A {label} of {amount} was recorded: {}", entry.description),
        now,
    );

    let outbox = tx.commit();
    info!(courier_id = %courier_id, amount = %signed_amount, kind = kind.as_str(), "courier ledger adjusted");
    publish(state, outbox).await;

    Ok(entry)
}

pub async fn request_payout(
    state: &AppState,
    ledger: LedgerKind,
    owner_id: Uuid,
    amount: Decimal,
) -> Result<LedgerEntry, AppError> {
    positive(amount, "payout amount")?;

    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    match ledger {
        LedgerKind::Client => {
            require_client(&tx, owner_id)?;
        }
        LedgerKind::Courier => {
            require_courier(&tx, owner_id)?;
        }
    }

    let available = balance(tx.ledger(ledger), owner_id);
    if amount > available {
        return Err(AppError::ValidationFailed(format!(
            "payout of {amount} exceeds available balance {available}"
        )));
    }

    let entry = LedgerEntry {
        id: Uuid::new_v4(),
        owner_id,
        amount: -amount,
        kind: EntryKind::WithdrawalRequest,
        status: EntryStatus::Pending,
        shipment_id: None,
        description: "Payout request".to_string(),
        evidence: None,
        created_at: now,
    };
    post(&mut tx, &state.metrics, ledger, entry.clone());
    tx.commit();

    info!(owner_id = %owner_id, ledger = ledger.as_str(), amount = %amount, "payout requested");
    Ok(entry)
}

pub async fn process_payout(
    state: &AppState,
    ledger: LedgerKind,
    entry_id: Uuid,
    evidence: Option<String>,
) -> Result<LedgerEntry, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    let mut entry = pending_payout(&tx, ledger, entry_id)?;

    entry.status = EntryStatus::Processed;
    entry.evidence = evidence.filter(|reference| !reference.trim().is_empty());
    tx.replace_entry(ledger, entry.clone())?;

    tx.notify(Notification::in_app(
        entry.owner_id,
        NotificationKind::Payout,
        None,
        format!("Your payout of {} has been processed", entry.amount.abs()),
        now,
    ));

    let outbox = tx.commit();
    info!(entry_id = %entry_id, ledger = ledger.as_str(), "payout processed");
    publish(state, outbox).await;

    Ok(entry)
}

pub async fn decline_payout(
    state: &AppState,
    ledger: LedgerKind,
    entry_id: Uuid,
    reason: Option<String>,
) -> Result<LedgerEntry, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    let mut entry = pending_payout(&tx, ledger, entry_id)?;

    entry.status = EntryStatus::Failed;
    tx.replace_entry(ledger, entry.clone())?;

    let message = match reason.as_deref().map(str::trim) {
        Some(reason) if !reason.is_empty() => format!(
            "Your payout of {} was declined: {reason}",
            entry.amount.abs()
        ),
        _ => format!("Your payout of {} was declined", entry.amount.abs()),
    };
    tx.notify(Notification::in_app(
        entry.owner_id,
        NotificationKind::Payout,
        None,
        message,
        now,
    ));

    let outbox = tx.commit();
    info!(entry_id = %entry_id, ledger = ledger.as_str(), "payout declined");
    publish(state, outbox).await;

    Ok(entry)
}

fn pending_payout(tx: &Tx<'_>, ledger: LedgerKind, entry_id: Uuid) -> Result<LedgerEntry, AppError> {
    let entry = tx
        .ledger(ledger)
        .iter()
        .find(|entry| entry.id == entry_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("ledger entry {entry_id} not found")))?;

    if !entry.is_pending_payout() {
        return Err(AppError::ValidationFailed(format!(
            "entry {entry_id} is not a pending payout request"
        )));
    }
    Ok(entry)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourierFinancials {
    pub courier_id: Uuid,
    pub balance: Decimal,
    pub earnings: Decimal,
    pub pending_payouts: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClientSummary {
    pub client_id: Uuid,
    pub balance: Decimal,
    pub deposits: Decimal,
    pub payments: Decimal,
    pub penalties: Decimal,
    pub shipments: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub async fn courier_financials(
    state: &AppState,
    courier_id: Uuid,
) -> Result<CourierFinancials, AppError> {
    let tx = state.store.begin().await;
    require_courier(&tx, courier_id)?;

    let entries: Vec<&LedgerEntry> = tx
        .ledger(LedgerKind::Courier)
        .iter()
        .filter(|entry| entry.owner_id == courier_id)
        .collect();

    Ok(CourierFinancials {
        courier_id,
        balance: balance(tx.ledger(LedgerKind::Courier), courier_id),
        earnings: entries
            .iter()
            .filter(|entry| entry.kind.is_earning() && entry.counts())
            .map(|entry| entry.amount)
            .sum(),
        pending_payouts: entries
            .iter()
            .filter(|entry| entry.is_pending_payout())
            .map(|entry| entry.amount.abs())
            .sum(),
    })
}

pub async fn client_wallet_balance(state: &AppState, client_id: Uuid) -> Result<Decimal, AppError> {
    let tx = state.store.begin().await;
    require_client(&tx, client_id)?;
    Ok(balance(tx.ledger(LedgerKind::Client), client_id))
}

pub async fn client_summary(state: &AppState, client_id: Uuid) -> Result<ClientSummary, AppError> {
    let tx = state.store.begin().await;
    require_client(&tx, client_id)?;

    let entries: Vec<&LedgerEntry> = tx
        .ledger(LedgerKind::Client)
        .iter()
        .filter(|entry| entry.owner_id == client_id && entry.counts())
        .collect();
    let total = |kind: EntryKind| -> Decimal {
        entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.amount.abs())
            .sum()
    };

    let shipments: Vec<ShipmentStatus> = tx
        .shipments()
        .filter(|shipment| shipment.client_id == client_id)
        .map(|shipment| shipment.status())
        .collect();

    Ok(ClientSummary {
        client_id,
        balance: entries.iter().map(|entry| entry.amount).sum(),
        deposits: total(EntryKind::Deposit),
        payments: total(EntryKind::Payment),
        penalties: total(EntryKind::Penalty),
        shipments: shipments.len(),
        delivered: shipments
            .iter()
            .filter(|status| **status == ShipmentStatus::Delivered)
            .count(),
        failed: shipments
            .iter()
            .filter(|status| **status == ShipmentStatus::DeliveryFailed)
            .count(),
    })
}
