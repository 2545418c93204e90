use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::commission::client_fee;
use crate::engine::dispatch::publish;
use crate::engine::{notify_client_status, require_client, require_courier};
use crate::error::AppError;
use crate::models::shipment::{
    tracking_code, Address, PaymentMethod, Priority, Recipient, Shipment, ShipmentStatus,
    StatusHistory,
};
use crate::models::user::{ClientProfile, CourierProfile, Role, User};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub client: Option<ClientProfile>,
    #[serde(default)]
    pub courier: Option<CourierProfile>,
}

pub async fn create_user(state: &AppState, new: NewUser) -> Result<User, AppError> {
    let name = new.name.trim().to_string();
    let email = new.email.trim().to_string();

    if name.is_empty() {
        return Err(AppError::ValidationFailed("name cannot be empty".to_string()));
    }
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid_email {
        return Err(AppError::ValidationFailed(format!("invalid email: {email}")));
    }
    if new.roles.is_empty() {
        return Err(AppError::ValidationFailed(
            "at least one role is required".to_string(),
        ));
    }

    let client = profile_for(&new.roles, Role::Client, new.client)?;
    let courier = profile_for(&new.roles, Role::Courier, new.courier)?;

    if let Some(profile) = &client {
        if profile.flat_rate < Decimal::ZERO {
            return Err(AppError::ValidationFailed(
                "flat rate cannot be negative".to_string(),
            ));
        }
        if profile
            .priority_multipliers
            .values()
            .any(|multiplier| *multiplier <= Decimal::ZERO)
        {
            return Err(AppError::ValidationFailed(
                "priority multipliers must be positive".to_string(),
            ));
        }
    }
    if let Some(profile) = &courier {
        if profile.referral_rate < Decimal::ZERO {
            return Err(AppError::ValidationFailed(
                "referral rate cannot be negative".to_string(),
            ));
        }
    }

    let now = state.clock.now();
    let mut tx = state.store.begin().await;

    if tx.user_by_email(&email).is_some() {
        return Err(AppError::DuplicateEmail(email));
    }
    if let Some(referrer_id) = courier.as_ref().and_then(|profile| profile.referrer_id) {
        require_courier(&tx, referrer_id)?;
    }

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        phone: new.phone.filter(|phone| !phone.trim().is_empty()),
        roles: new.roles,
        client,
        courier,
        created_at: now,
    };
    tx.put_user(user.clone());
    tx.commit();

    info!(user_id = %user.id, roles = ?user.roles, "user created");
    Ok(user)
}

/// Role-specific attributes are kept only for users holding the role; a role
/// without attributes gets the defaults.
fn profile_for<P: Default>(
    roles: &BTreeSet<Role>,
    role: Role,
    profile: Option<P>,
) -> Result<Option<P>, AppError> {
    match (roles.contains(&role), profile) {
        (true, profile) => Ok(Some(profile.unwrap_or_default())),
        (false, None) => Ok(None),
        (false, Some(_)) => Err(AppError::ValidationFailed(format!(
            "{role:?} attributes given for a user without the {role:?} role"
        ))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShipment {
    pub client_id: Uuid,
    pub recipient: Recipient,
    pub origin: Address,
    pub destination: Address,
    pub package_value: Decimal,
    #[serde(default)]
    pub amount_to_collect: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub priority: Priority,
}

pub async fn create_shipment(state: &AppState, new: NewShipment) -> Result<Shipment, AppError> {
    if new.recipient.name.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "recipient name is required".to_string(),
        ));
    }
    if new.destination.zone.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "destination zone is required".to_string(),
        ));
    }
    if new.package_value < Decimal::ZERO || new.amount_to_collect < Decimal::ZERO {
        return Err(AppError::ValidationFailed(
            "amounts cannot be negative".to_string(),
        ));
    }

    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    let (_, profile) = require_client(&tx, new.client_id)?;

    let fee = client_fee(&profile, new.priority, tx.tier_settings());
    let sequence = tx.next_sequence();

    let shipment = Shipment {
        id: Uuid::new_v4(),
        sequence,
        tracking_code: tracking_code(&new.destination.city, now, sequence),
        client_id: new.client_id,
        courier_id: None,
        recipient: new.recipient,
        origin: new.origin,
        destination: new.destination,
        package_value: new.package_value,
        price: Some(new.package_value + fee),
        amount_to_collect: new.amount_to_collect,
        payment_method: new.payment_method,
        priority: new.priority,
        client_fee: fee,
        courier_commission: Decimal::ZERO,
        status_history: StatusHistory::new(ShipmentStatus::WaitingForPackaging, now),
        packaging_notes: None,
        failure_reason: None,
        failure_photo: None,
        created_at: now,
        delivered_at: None,
    };

    tx.put_shipment(shipment.clone());
    notify_client_status(&mut tx, &shipment, now);
    let outbox = tx.commit();

    info!(
        shipment_id = %shipment.id,
        tracking_code = %shipment.tracking_code,
        client_id = %shipment.client_id,
        "shipment created"
    );
    publish(state, outbox).await;
    Ok(shipment)
}

pub async fn get_shipment(state: &AppState, shipment_id: Uuid) -> Result<Shipment, AppError> {
    let tx = state.store.begin().await;
    tx.require_shipment(shipment_id)
}
