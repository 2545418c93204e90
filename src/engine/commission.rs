use rust_decimal::Decimal;

use crate::models::performance::CommissionConfig;
use crate::models::shipment::{Priority, Shipment};
use crate::models::tier::TierSetting;
use crate::models::user::ClientProfile;

/// Courier payout for one shipment under the given configuration.
pub fn commission(shipment: &Shipment, config: &CommissionConfig) -> Decimal {
    match *config {
        CommissionConfig::Flat(value) => value,
        CommissionConfig::Percentage(percent) => {
            shipment.total_price() * percent / Decimal::ONE_HUNDRED
        }
    }
}

/// Shipping fee currently charged to a client: flat rate scaled by the
/// priority multiplier, less the partner tier discount.
pub fn client_fee(profile: &ClientProfile, priority: Priority, tiers: &[TierSetting]) -> Decimal {
    let base = profile.flat_rate * profile.multiplier(priority);

    let discount = profile
        .tier
        .as_deref()
        .and_then(|name| tiers.iter().find(|tier| tier.name == name))
        .map(|tier| tier.discount_percent)
        .unwrap_or(Decimal::ZERO);

    (base * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED).round_dp(2)
}
