use std::collections::BTreeSet;

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::engine::dispatch::publish;
use crate::engine::require_client;
use crate::error::AppError;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::tier::TierSetting;
use crate::models::user::{Role, User};
use crate::state::AppState;

/// Trailing window of shipment volume used for tier placement.
pub const TIER_WINDOW_DAYS: i64 = 30;

/// Highest tier whose threshold `count` meets.
pub fn select_tier(settings: &[TierSetting], count: u32) -> Option<&TierSetting> {
    let mut ordered: Vec<&TierSetting> = settings.iter().collect();
    ordered.sort_by(|a, b| b.threshold.cmp(&a.threshold));
    ordered.into_iter().find(|tier| count >= tier.threshold)
}

pub async fn update_tier_settings(
    state: &AppState,
    mut settings: Vec<TierSetting>,
) -> Result<Vec<TierSetting>, AppError> {
    let mut names = BTreeSet::new();
    for tier in &mut settings {
        tier.name = tier.name.trim().to_string();
        if tier.name.is_empty() {
            return Err(AppError::ValidationFailed(
                "tier name cannot be empty".to_string(),
            ));
        }
        if !names.insert(tier.name.clone()) {
            return Err(AppError::ValidationFailed(format!(
                "duplicate tier name: {}",
                tier.name
            )));
        }
        if tier.discount_percent < Decimal::ZERO || tier.discount_percent > Decimal::ONE_HUNDRED {
            return Err(AppError::ValidationFailed(format!(
                "discount for tier {} must be between 0 and 100",
                tier.name
            )));
        }
    }
    settings.sort_by(|a, b| b.threshold.cmp(&a.threshold));

    let mut tx = state.store.begin().await;
    tx.set_tier_settings(settings.clone());
    tx.commit();

    info!(tiers = settings.len(), "partner tier settings updated");
    Ok(settings)
}

/// Sets a manual tier override, or clears it with `None` so the client goes
/// back to automatic placement on the next recompute.
pub async fn set_client_tier(
    state: &AppState,
    client_id: Uuid,
    tier: Option<String>,
) -> Result<User, AppError> {
    let now = state.clock.now();
    let mut tx = state.store.begin().await;
    let (mut user, mut profile) = require_client(&tx, client_id)?;

    match tier {
        Some(name) => {
            if !tx.tier_settings().iter().any(|setting| setting.name == name) {
                return Err(AppError::NotFound(format!("tier {name} not found")));
            }
            profile.tier = Some(name.clone());
            profile.tier_locked = true;
            tx.notify(Notification::in_app(
                client_id,
                NotificationKind::TierChange,
                None,
                format!("Your partner tier has been set to {name}"),
                now,
            ));
        }
        None => {
            profile.tier_locked = false;
        }
    }

    user.client = Some(profile);
    tx.put_user(user.clone());
    let outbox = tx.commit();

    info!(client_id = %client_id, "client tier override updated");
    publish(state, outbox).await;
    Ok(user)
}

/// Re-places every client without a manual override according to their
/// shipment volume over the trailing window. Returns the number of clients
/// whose tier changed.
pub async fn recompute_tiers(state: &AppState) -> Result<usize, AppError> {
    let now = state.clock.now();
    let since = now - Duration::days(TIER_WINDOW_DAYS);
    let mut tx = state.store.begin().await;
    let settings = tx.tier_settings().to_vec();

    let clients: Vec<User> = tx
        .users()
        .filter(|user| user.has_role(Role::Client))
        .filter(|user| user.client.as_ref().is_some_and(|profile| !profile.tier_locked))
        .cloned()
        .collect();

    let mut changed = 0;
    for mut user in clients {
        let Some(mut profile) = user.client.clone() else {
            continue;
        };

        let count = tx
            .shipments()
            .filter(|shipment| shipment.client_id == user.id && shipment.created_at >= since)
            .count();
        let count = u32::try_from(count).unwrap_or(u32::MAX);

        let computed = select_tier(&settings, count);
        let computed_name = computed.map(|tier| tier.name.clone());
        if computed_name == profile.tier {
            continue;
        }

        let previous_threshold = profile
            .tier
            .as_deref()
            .and_then(|name| settings.iter().find(|tier| tier.name == name))
            .map(|tier| tier.threshold);
        let message = match (computed, previous_threshold) {
            (Some(tier), None) => promotion(tier),
            (Some(tier), Some(previous)) if tier.threshold > previous => promotion(tier),
            (Some(tier), _) => format!("Your partner tier has been updated to {}", tier.name),
            (None, _) => "Your partner tier has been removed".to_string(),
        };

        info!(
            client_id = %user.id,
            shipments = count,
            from = profile.tier.as_deref().unwrap_or("none"),
            to = computed_name.as_deref().unwrap_or("none"),
            "partner tier changed"
        );

        profile.tier = computed_name;
        user.client = Some(profile);
        let user_id = user.id;
        tx.put_user(user);
        tx.notify(Notification::in_app(
            user_id,
            NotificationKind::TierChange,
            None,
            message,
            now,
        ));
        changed += 1;
    }

    let outbox = tx.commit();
    publish(state, outbox).await;
    Ok(changed)
}

fn promotion(tier: &TierSetting) -> String {
    format!(
        "Congratulations! You have been promoted to the {} partner tier with a {}% shipping discount",
        tier.name, tier.discount_percent
    )
}
