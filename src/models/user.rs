use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::shipment::Priority;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Administrator,
    SuperUser,
    Client,
    Courier,
    AssigningUser,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientProfile {
    pub flat_rate: Decimal,
    #[serde(default)]
    pub priority_multipliers: BTreeMap<Priority, Decimal>,
    #[serde(default)]
    pub tier: Option<String>,
    /// Set when an administrator assigned `tier` directly.
    #[serde(default)]
    pub tier_locked: bool,
    #[serde(default)]
    pub tax_id: Option<String>,
}

impl ClientProfile {
    pub fn multiplier(&self, priority: Priority) -> Decimal {
        self.priority_multipliers
            .get(&priority)
            .copied()
            .unwrap_or(Decimal::ONE)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CourierProfile {
    #[serde(default)]
    pub zones: BTreeSet<String>,
    #[serde(default)]
    pub referrer_id: Option<Uuid>,
    /// Amount credited to the referrer for each delivered shipment.
    #[serde(default)]
    pub referral_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub roles: BTreeSet<Role>,
    pub client: Option<ClientProfile>,
    pub courier: Option<CourierProfile>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn serves_zone(&self, zone: &str) -> bool {
        self.courier
            .as_ref()
            .is_some_and(|profile| profile.zones.contains(zone))
    }
}
