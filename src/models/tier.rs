use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierSetting {
    pub name: String,
    pub threshold: u32,
    pub discount_percent: Decimal,
}
