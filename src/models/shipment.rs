use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShipmentStatus {
    WaitingForPackaging,
    PackagedAwaitingAssignment,
    AssignedToCourier,
    OutForDelivery,
    Delivered,
    DeliveryFailed,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::WaitingForPackaging => "WaitingForPackaging",
            ShipmentStatus::PackagedAwaitingAssignment => "PackagedAwaitingAssignment",
            ShipmentStatus::AssignedToCourier => "AssignedToCourier",
            ShipmentStatus::OutForDelivery => "OutForDelivery",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::DeliveryFailed => "DeliveryFailed",
        }
    }

    /// Statuses that count towards a courier's current workload.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::AssignedToCourier | ShipmentStatus::OutForDelivery
        )
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WaitingForPackaging" => Ok(ShipmentStatus::WaitingForPackaging),
            "PackagedAwaitingAssignment" => Ok(ShipmentStatus::PackagedAwaitingAssignment),
            "AssignedToCourier" => Ok(ShipmentStatus::AssignedToCourier),
            "OutForDelivery" => Ok(ShipmentStatus::OutForDelivery),
            "Delivered" => Ok(ShipmentStatus::Delivered),
            "DeliveryFailed" => Ok(ShipmentStatus::DeliveryFailed),
            other => Err(AppError::InvalidStatus(format!(
                "unknown shipment status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEntry {
    pub status: ShipmentStatus,
    pub at: DateTime<Utc>,
}

/// Append-only status log. Never empty, so the current status is always the
/// last entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct StatusHistory(Vec<StatusEntry>);

impl StatusHistory {
    pub fn new(initial: ShipmentStatus, at: DateTime<Utc>) -> Self {
        Self(vec![StatusEntry {
            status: initial,
            at,
        }])
    }

    pub fn current(&self) -> ShipmentStatus {
        self.last().status
    }

    pub fn last(&self) -> &StatusEntry {
        // the constructor seeds one entry and pop_last never removes it
        &self.0[self.0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.0
    }

    /// Appends `status` unless it is already current. Returns whether an
    /// entry was written.
    pub fn push(&mut self, status: ShipmentStatus, at: DateTime<Utc>) -> bool {
        if self.current() == status {
            return false;
        }
        self.0.push(StatusEntry { status, at });
        true
    }

    /// Status recorded just before the current one, if any.
    pub fn previous(&self) -> Option<ShipmentStatus> {
        self.0
            .len()
            .checked_sub(2)
            .map(|idx| self.0[idx].status)
    }

    pub fn pop_last(&mut self) -> Option<StatusEntry> {
        if self.0.len() <= 1 {
            return None;
        }
        self.0.pop()
    }

    /// Timestamp of the most recent entry with the given status.
    pub fn last_time_of(&self, status: ShipmentStatus) -> Option<DateTime<Utc>> {
        self.0
            .iter()
            .rev()
            .find(|entry| entry.status == status)
            .map(|entry| entry.at)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    CashOnDelivery,
    Wallet,
    BankTransfer,
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Priority {
    #[default]
    Standard,
    Express,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub line: String,
    pub city: String,
    pub zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipient {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub sequence: u64,
    pub tracking_code: String,
    pub client_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub recipient: Recipient,
    pub origin: Address,
    pub destination: Address,
    pub package_value: Decimal,
    pub price: Option<Decimal>,
    pub amount_to_collect: Decimal,
    pub payment_method: PaymentMethod,
    pub priority: Priority,
    pub client_fee: Decimal,
    pub courier_commission: Decimal,
    pub status_history: StatusHistory,
    pub packaging_notes: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Shipment {
    pub fn status(&self) -> ShipmentStatus {
        self.status_history.current()
    }

    /// Total billed price, falling back to package value plus the frozen fee.
    pub fn total_price(&self) -> Decimal {
        self.price
            .unwrap_or(self.package_value + self.client_fee)
    }
}

/// Builds the human-readable tracking code: destination region, intake date
/// and the global sequence number.
pub fn tracking_code(destination_city: &str, date: DateTime<Utc>, sequence: u64) -> String {
    let region: String = destination_city
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_ascii_uppercase();
    let region = if region.is_empty() {
        "GEN".to_string()
    } else {
        region
    };

    format!("{region}-{}-{sequence:06}", date.format("%Y%m%d"))
}
