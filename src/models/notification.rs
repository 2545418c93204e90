use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Channel {
    InApp,
    Sms,
    System,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Sms => "sms",
            Channel::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationKind {
    StatusUpdate,
    Notice,
    VerificationCode,
    Overdue,
    TierChange,
    Payout,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    /// Transport address (phone number) for SMS.
    pub address: Option<String>,
    pub channel: Channel,
    pub kind: NotificationKind,
    pub shipment_id: Option<Uuid>,
    pub message: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn in_app(
        user_id: Uuid,
        kind: NotificationKind,
        shipment_id: Option<Uuid>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            address: None,
            channel: Channel::InApp,
            kind,
            shipment_id,
            message: message.into(),
            status: NotificationStatus::Sent,
            created_at: now,
        }
    }

    pub fn sms(
        phone: impl Into<String>,
        kind: NotificationKind,
        shipment_id: Option<Uuid>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            address: Some(phone.into()),
            channel: Channel::Sms,
            kind,
            shipment_id,
            message: message.into(),
            status: NotificationStatus::Pending,
            created_at: now,
        }
    }

    pub fn system(
        kind: NotificationKind,
        shipment_id: Option<Uuid>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            address: None,
            channel: Channel::System,
            kind,
            shipment_id,
            message: message.into(),
            status: NotificationStatus::Sent,
            created_at: now,
        }
    }
}
