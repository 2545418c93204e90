use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::require_courier;
use crate::error::AppError;
use crate::models::performance::{CommissionConfig, CourierPerformance};
use crate::state::AppState;
use crate::store::Tx;

/// Consecutive failed deliveries that restrict a courier.
pub const FAILURE_THRESHOLD: u32 = 3;

/// Returns the stored record or a fresh default one. The caller persists it.
pub fn load_or_default(tx: &Tx<'_>, courier_id: Uuid, now: DateTime<Utc>) -> CourierPerformance {
    tx.performance(courier_id)
        .cloned()
        .unwrap_or_else(|| CourierPerformance::new(courier_id, now))
}

/// Counts a failed delivery. Returns true when this failure restricted the
/// courier.
pub fn record_failure(record: &mut CourierPerformance, now: DateTime<Utc>) -> bool {
    record.consecutive_failures = record.consecutive_failures.saturating_add(1);
    record.updated_at = now;

    if record.consecutive_failures >= FAILURE_THRESHOLD && !record.is_restricted {
        record.is_restricted = true;
        record.restriction_reason = Some(format!(
            "{} consecutive failed deliveries",
            record.consecutive_failures
        ));
        return true;
    }

    false
}

/// A successful delivery ends the failure streak. An existing restriction
/// stays until an administrator lifts it.
pub fn record_success(record: &mut CourierPerformance, now: DateTime<Utc>) {
    record.consecutive_failures = 0;
    record.updated_at = now;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourierSettingsUpdate {
    #[serde(default)]
    pub commission: Option<CommissionConfig>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub lift_restriction: bool,
}

pub async fn update_courier_settings(
    state: &AppState,
    courier_id: Uuid,
    update: CourierSettingsUpdate,
) -> Result<CourierPerformance, AppError> {
    if let Some(CommissionConfig::Flat(value) | CommissionConfig::Percentage(value)) =
        update.commission
    {
        if value.is_sign_negative() {
            return Err(AppError::ValidationFailed(
                "commission value cannot be negative".to_string(),
            ));
        }
    }

    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    require_courier(&tx, courier_id)?;

    let mut record = load_or_default(&tx, courier_id, now);
    if let Some(commission) = update.commission {
        record.commission = commission;
    }
    if let Some(rating) = update.rating {
        record.rating = rating.clamp(0.0, 5.0);
    }
    if update.lift_restriction {
        if record.is_restricted {
            warn!(courier_id = %courier_id, "courier restriction lifted by administrator");
        }
        record.is_restricted = false;
        record.restriction_reason = None;
        record.consecutive_failures = 0;
    }
    record.updated_at = now;

    tx.put_performance(record.clone());
    tx.commit();

    info!(courier_id = %courier_id, "courier settings updated");
    Ok(record)
}
