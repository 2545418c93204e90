//! Timer-driven consistency jobs.
//!
//! Each job is safe to run concurrently with request handling: it re-checks
//! its preconditions inside its own transaction before writing anything.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::dispatch::publish;
use crate::engine::tiers::recompute_tiers;
use crate::error::AppError;
use crate::models::ledger::LedgerKind;
use crate::models::notification::{Channel, Notification, NotificationKind};
use crate::models::shipment::ShipmentStatus;
use crate::state::AppState;

pub const OVERDUE_AFTER_HOURS: i64 = 60;
pub const EVIDENCE_RETENTION_DAYS: i64 = 3;

/// Flags active shipments that have been in the network too long. A shipment
/// is flagged at most once.
pub async fn flag_overdue(state: &AppState) -> Result<usize, AppError> {
    let now = state.clock.now();
    let cutoff = now - Duration::hours(OVERDUE_AFTER_HOURS);
    let mut tx = state.store.begin().await;

    let already_flagged: Vec<Uuid> = tx
        .notifications()
        .iter()
        .filter(|n| n.channel == Channel::System && n.kind == NotificationKind::Overdue)
        .filter_map(|n| n.shipment_id)
        .collect();

    let mut overdue: Vec<(u64, Uuid, String, ShipmentStatus)> = tx
        .shipments()
        .filter(|shipment| shipment.status().is_active() && shipment.created_at < cutoff)
        .filter(|shipment| !already_flagged.contains(&shipment.id))
        .map(|shipment| {
            (
                shipment.sequence,
                shipment.id,
                shipment.tracking_code.clone(),
                shipment.status(),
            )
        })
        .collect();
    overdue.sort_by_key(|(sequence, ..)| *sequence);

    for (_, shipment_id, tracking_code, status) in &overdue {
        warn!(shipment_id = %shipment_id, tracking_code = %tracking_code, "shipment overdue");
        tx.notify(Notification::system(
            NotificationKind::Overdue,
            Some(*shipment_id),
            format!(
                "OVERDUE: shipment {tracking_code} is still {status} more than {OVERDUE_AFTER_HOURS} hours after creation"
            ),
            now,
        ));
    }

    let outbox = tx.commit();
    publish(state, outbox).await;
    Ok(overdue.len())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub payout_evidence: usize,
    pub failure_photos: usize,
}

enum Attachment {
    Payout { ledger: LedgerKind, entry_id: Uuid },
    FailurePhoto { shipment_id: Uuid },
}

/// Deletes payout evidence and failure photos past retention, then clears the
/// stored references. A file that cannot be deleted keeps its reference so
/// the next run retries it.
pub async fn cleanup_evidence(state: &AppState) -> Result<CleanupReport, AppError> {
    let now = state.clock.now();
    let cutoff = now - Duration::days(EVIDENCE_RETENTION_DAYS);

    let candidates: Vec<(Attachment, String)> = {
        let tx = state.store.begin().await;
        let mut found = Vec::new();

        for ledger in [LedgerKind::Client, LedgerKind::Courier] {
            for entry in tx.ledger(ledger) {
                if let Some(reference) = entry.evidence.as_ref().filter(|_| entry.created_at < cutoff) {
                    found.push((
                        Attachment::Payout {
                            ledger,
                            entry_id: entry.id,
                        },
                        reference.clone(),
                    ));
                }
            }
        }

        for shipment in tx.shipments() {
            let Some(reference) = shipment.failure_photo.as_ref() else {
                continue;
            };
            let expired = shipment
                .status_history
                .last_time_of(ShipmentStatus::DeliveryFailed)
                .is_some_and(|failed_at| failed_at < cutoff);
            if expired {
                found.push((
                    Attachment::FailurePhoto {
                        shipment_id: shipment.id,
                    },
                    reference.clone(),
                ));
            }
        }

        found
    };

    let mut removed = Vec::new();
    for (attachment, reference) in candidates {
        match state.evidence.remove(&reference).await {
            Ok(()) => removed.push((attachment, reference)),
            Err(err) => {
                warn!(reference = %reference, error = %err, "failed to delete evidence file");
            }
        }
    }

    let mut report = CleanupReport::default();
    let mut tx = state.store.begin().await;
    for (attachment, reference) in removed {
        match attachment {
            Attachment::Payout { ledger, entry_id } => {
                let Some(mut entry) = tx
                    .ledger(ledger)
                    .iter()
                    .find(|entry| entry.id == entry_id)
                    .cloned()
                else {
                    continue;
                };
                if entry.evidence.as_deref() != Some(reference.as_str()) {
                    continue;
                }
                entry.evidence = None;
                tx.replace_entry(ledger, entry)?;
                report.payout_evidence += 1;
            }
            Attachment::FailurePhoto { shipment_id } => {
                let Some(mut shipment) = tx.shipment(shipment_id).cloned() else {
                    continue;
                };
                if shipment.failure_photo.as_deref() != Some(reference.as_str()) {
                    continue;
                }
                shipment.failure_photo = None;
                tx.put_shipment(shipment);
                report.failure_photos += 1;
            }
        }
    }
    tx.commit();

    if report != CleanupReport::default() {
        info!(
            payout_evidence = report.payout_evidence,
            failure_photos = report.failure_photos,
            "expired evidence cleaned up"
        );
    }
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Overdue,
    Cleanup,
    Tiers,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Overdue => "overdue",
            Job::Cleanup => "evidence_cleanup",
            Job::Tiers => "tier_recompute",
        }
    }

    pub async fn run(&self, state: &AppState) -> Result<(), AppError> {
        match self {
            Job::Overdue => {
                let flagged = flag_overdue(state).await?;
                debug!(flagged, "overdue scan finished");
            }
            Job::Cleanup => {
                cleanup_evidence(state).await?;
            }
            Job::Tiers => {
                let changed = recompute_tiers(state).await?;
                debug!(changed, "tier recompute finished");
            }
        }
        Ok(())
    }
}

/// Runs `job` immediately and then once every `period`, until the task is
/// aborted.
pub async fn run_scheduled(state: Arc<AppState>, job: Job, period: StdDuration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(job = job.name(), period_secs = period.as_secs(), "scheduled job started");
    loop {
        interval.tick().await;

        let outcome = match job.run(&state).await {
            Ok(()) => "ok",
            Err(err) => {
                error!(job = job.name(), error = %err, "scheduled job failed");
                "error"
            }
        };
        state
            .metrics
            .job_runs_total
            .with_label_values(&[job.name(), outcome])
            .inc();
    }
}

pub fn spawn(state: Arc<AppState>, job: Job, period: StdDuration) -> JoinHandle<()> {
    tokio::spawn(run_scheduled(state, job, period))
}
