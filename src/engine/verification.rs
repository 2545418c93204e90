use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::dispatch::publish;
use crate::engine::lifecycle::complete_delivery;
use crate::error::AppError;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::shipment::Shipment;
use crate::models::verification::VerificationCode;
use crate::state::AppState;

/// Lifetime of an issued delivery code.
pub const CODE_TTL_MINUTES: i64 = 10;

pub trait CodeSource: Send + Sync {
    /// Returns a fresh six-digit code.
    fn generate(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn generate(&self) -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
    }
}

/// Hands out a predetermined sequence of codes, then repeats the last one.
#[derive(Debug)]
pub struct SequenceCodeSource {
    codes: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl SequenceCodeSource {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: Mutex::new(codes.into_iter().map(Into::into).collect()),
            last: Mutex::new("000000".to_string()),
        }
    }
}

impl CodeSource for SequenceCodeSource {
    fn generate(&self) -> String {
        let mut codes = self.codes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(next) = codes.pop_front() {
            *last = next;
        }
        last.clone()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedCode {
    pub shipment_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issues a delivery code for the shipment, replacing any earlier one, and
/// texts it to the recipient.
pub async fn issue_code(state: &AppState, shipment_id: Uuid) -> Result<IssuedCode, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    let shipment = tx.require_shipment(shipment_id)?;

    let phone = shipment
        .recipient
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|phone| !phone.is_empty())
        .ok_or_else(|| AppError::MissingContact(shipment.tracking_code.clone()))?
        .to_string();

    let code = state.codes.generate();
    let expires_at = now + Duration::minutes(CODE_TTL_MINUTES);
    tx.put_code(
        shipment_id,
        VerificationCode {
            code: code.clone(),
            expires_at,
        },
    );

    tx.notify(Notification::sms(
        phone,
        NotificationKind::VerificationCode,
        Some(shipment_id),
        format!(
            "Your delivery code for shipment {} is {code}. It expires in {CODE_TTL_MINUTES} minutes.",
            shipment.tracking_code
        ),
        now,
    ));

    let outbox = tx.commit();
    info!(shipment_id = %shipment_id, expires_at = %expires_at, "verification code issued");
    publish(state, outbox).await;

    Ok(IssuedCode {
        shipment_id,
        expires_at,
    })
}

/// Confirms the recipient's code and completes the delivery. The code is
/// consumed in the same transaction as the settlement.
pub async fn verify(
    state: &AppState,
    shipment_id: Uuid,
    submitted: &str,
) -> Result<Shipment, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    tx.require_shipment(shipment_id)?;

    let outcome = match tx.code(shipment_id) {
        None => Err(AppError::CodeExpired),
        Some(stored) if stored.is_expired(now) => Err(AppError::CodeExpired),
        Some(stored) if stored.code != submitted => Err(AppError::CodeMismatch),
        Some(_) => Ok(()),
    };
    if let Err(err) = outcome {
        state
            .metrics
            .verification_attempts_total
            .with_label_values(&[err.kind()])
            .inc();
        return Err(err);
    }

    let shipment = complete_delivery(&mut tx, &state.metrics, shipment_id, now)?;
    tx.delete_code(shipment_id);
    let outbox = tx.commit();

    state
        .metrics
        .verification_attempts_total
        .with_label_values(&["confirmed"])
        .inc();
    info!(
        shipment_id = %shipment_id,
        tracking_code = %shipment.tracking_code,
        "delivery confirmed"
    );

    publish(state, outbox).await;
    Ok(shipment)
}
