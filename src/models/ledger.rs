use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two independent books kept by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Client,
    Courier,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Client => "client",
            LedgerKind::Courier => "courier",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    Payment,
    WithdrawalRequest,
    WithdrawalProcessed,
    Commission,
    Penalty,
    Bonus,
    ReferralBonus,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Payment => "payment",
            EntryKind::WithdrawalRequest => "withdrawal_request",
            EntryKind::WithdrawalProcessed => "withdrawal_processed",
            EntryKind::Commission => "commission",
            EntryKind::Penalty => "penalty",
            EntryKind::Bonus => "bonus",
            EntryKind::ReferralBonus => "referral_bonus",
        }
    }

    pub fn is_earning(&self) -> bool {
        matches!(
            self,
            EntryKind::Commission | EntryKind::Bonus | EntryKind::ReferralBonus
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub shipment_id: Option<Uuid>,
    pub description: String,
    /// Payout evidence file, removed by the retention job.
    pub evidence: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn processed(
        owner_id: Uuid,
        amount: Decimal,
        kind: EntryKind,
        shipment_id: Option<Uuid>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            amount,
            kind,
            status: EntryStatus::Processed,
            shipment_id,
            description: description.into(),
            evidence: None,
            created_at: now,
        }
    }

    pub fn is_pending_payout(&self) -> bool {
        self.kind == EntryKind::WithdrawalRequest && self.status == EntryStatus::Pending
    }

    /// Whether the entry contributes to the owner's balance.
    pub fn counts(&self) -> bool {
        self.status != EntryStatus::Failed
    }
}
