pub mod assignment;
pub mod commission;
pub mod directory;
pub mod dispatch;
pub mod jobs;
pub mod ledger;
pub mod lifecycle;
pub mod performance;
pub mod settlement;
pub mod tiers;
pub mod verification;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::shipment::Shipment;
use crate::models::user::{ClientProfile, Role, User};
use crate::store::Tx;

pub(crate) fn require_courier(tx: &Tx<'_>, courier_id: Uuid) -> Result<User, AppError> {
    let user = tx.require_user(courier_id)?;
    if !user.has_role(Role::Courier) {
        return Err(AppError::NotFound(format!("courier {courier_id} not found")));
    }
    Ok(user)
}

pub(crate) fn require_client(tx: &Tx<'_>, client_id: Uuid) -> Result<(User, ClientProfile), AppError> {
    let user = tx.require_user(client_id)?;
    let profile = match (&user.client, user.has_role(Role::Client)) {
        (Some(profile), true) => profile.clone(),
        _ => return Err(AppError::NotFound(format!("client {client_id} not found"))),
    };
    Ok((user, profile))
}

pub(crate) fn notify_client_status(tx: &mut Tx<'_>, shipment: &Shipment, now: DateTime<Utc>) {
    tx.notify(Notification::in_app(
        shipment.client_id,
        NotificationKind::StatusUpdate,
        Some(shipment.id),
        format!(
            "Shipment {} is now {}",
            shipment.tracking_code,
            shipment.status()
        ),
        now,
    ));
}

pub(crate) fn notify_user(
    tx: &mut Tx<'_>,
    user_id: Uuid,
    shipment_id: Option<Uuid>,
    message: String,
    now: DateTime<Utc>,
) {
    tx.notify(Notification::in_app(
        user_id,
        NotificationKind::Notice,
        shipment_id,
        message,
        now,
    ));
}
