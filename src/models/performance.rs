use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CommissionConfig {
    Flat(Decimal),
    Percentage(Decimal),
}

impl Default for CommissionConfig {
    fn default() -> Self {
        CommissionConfig::Flat(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierPerformance {
    pub courier_id: Uuid,
    pub commission: CommissionConfig,
    pub consecutive_failures: u32,
    pub is_restricted: bool,
    pub restriction_reason: Option<String>,
    pub rating: f64,
    pub updated_at: DateTime<Utc>,
}

impl CourierPerformance {
    pub fn new(courier_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            courier_id,
            commission: CommissionConfig::default(),
            consecutive_failures: 0,
            is_restricted: false,
            restriction_reason: None,
            rating: 5.0,
            updated_at: now,
        }
    }
}
