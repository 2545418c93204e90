#![allow(dead_code)]

use std::collections::BTreeSet;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use lastmile_ledger::clock::{Clock, ManualClock};
use lastmile_ledger::engine::assignment::assign;
use lastmile_ledger::engine::directory::{create_shipment, create_user, NewShipment, NewUser};
use lastmile_ledger::engine::lifecycle::{advance, TransitionDetails};
use lastmile_ledger::engine::performance::{update_courier_settings, CourierSettingsUpdate};
use lastmile_ledger::engine::verification::{issue_code, verify, SequenceCodeSource};
use lastmile_ledger::evidence::{EvidenceStore, LocalEvidenceStore};
use lastmile_ledger::models::ledger::{LedgerEntry, LedgerKind};
use lastmile_ledger::models::notification::Notification;
use lastmile_ledger::models::performance::{CommissionConfig, CourierPerformance};
use lastmile_ledger::models::shipment::{
    Address, PaymentMethod, Priority, Recipient, Shipment, ShipmentStatus,
};
use lastmile_ledger::models::user::{ClientProfile, CourierProfile, Role, User};
use lastmile_ledger::notify::{Notifier, NotifyError};
use lastmile_ledger::state::AppState;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

pub const CODE: &str = "424242";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

/// Records every SMS instead of sending it; fails on demand.
#[derive(Default)]
pub struct RecordingSms {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingSms {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Rejected(503));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Evidence store whose deletions always fail.
pub struct BrokenEvidenceStore;

#[async_trait]
impl EvidenceStore for BrokenEvidenceStore {
    async fn remove(&self, _reference: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub sms: Arc<RecordingSms>,
    pub uploads: TempDir,
}

pub fn harness() -> Harness {
    build(vec![CODE.to_string()], Arc::new(RecordingSms::default()), None)
}

pub fn harness_with_codes(codes: &[&str]) -> Harness {
    build(
        codes.iter().map(|code| code.to_string()).collect(),
        Arc::new(RecordingSms::default()),
        None,
    )
}

pub fn harness_with_failing_sms() -> Harness {
    build(
        vec![CODE.to_string()],
        Arc::new(RecordingSms {
            fail: true,
            ..RecordingSms::default()
        }),
        None,
    )
}

pub fn harness_with_evidence_store(store: Arc<dyn EvidenceStore>) -> Harness {
    build(vec![CODE.to_string()], Arc::new(RecordingSms::default()), Some(store))
}

fn build(codes: Vec<String>, sms: Arc<RecordingSms>, evidence: Option<Arc<dyn EvidenceStore>>) -> Harness {
    let clock = Arc::new(ManualClock::new(start()));
    let uploads = tempfile::tempdir().unwrap();
    let evidence: Arc<dyn EvidenceStore> = match evidence {
        Some(store) => store,
        None => Arc::new(LocalEvidenceStore::new(uploads.path())),
    };

    let state = AppState::new(64)
        .with_clock(clock.clone())
        .with_code_source(Arc::new(SequenceCodeSource::new(codes)))
        .with_sms_transport(sms.clone())
        .with_evidence_store(evidence);

    Harness {
        state: Arc::new(state),
        clock,
        sms,
        uploads,
    }
}

impl Harness {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_clock(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub async fn client(&self, flat_rate: Decimal) -> User {
        create_user(
            &self.state,
            NewUser {
                name: "Nile Traders".to_string(),
                email: format!("client-{}@example.com", Uuid::new_v4()),
                phone: Some("+201000000001".to_string()),
                roles: BTreeSet::from([Role::Client]),
                client: Some(ClientProfile {
                    flat_rate,
                    ..ClientProfile::default()
                }),
                courier: None,
            },
        )
        .await
        .unwrap()
    }

    pub async fn courier(&self, zones: &[&str]) -> User {
        self.courier_with(zones, None, Decimal::ZERO).await
    }

    pub async fn courier_with(
        &self,
        zones: &[&str],
        referrer_id: Option<Uuid>,
        referral_rate: Decimal,
    ) -> User {
        create_user(
            &self.state,
            NewUser {
                name: "Karim".to_string(),
                email: format!("courier-{}@example.com", Uuid::new_v4()),
                phone: Some("+201000000002".to_string()),
                roles: BTreeSet::from([Role::Courier]),
                client: None,
                courier: Some(CourierProfile {
                    zones: zones.iter().map(|zone| zone.to_string()).collect(),
                    referrer_id,
                    referral_rate,
                }),
            },
        )
        .await
        .unwrap()
    }

    pub async fn set_commission(&self, courier_id: Uuid, commission: CommissionConfig) {
        update_courier_settings(
            &self.state,
            courier_id,
            CourierSettingsUpdate {
                commission: Some(commission),
                ..CourierSettingsUpdate::default()
            },
        )
        .await
        .unwrap();
    }

    pub async fn shipment(
        &self,
        client_id: Uuid,
        zone: &str,
        package_value: Decimal,
        payment_method: PaymentMethod,
    ) -> Shipment {
        create_shipment(
            &self.state,
            NewShipment {
                client_id,
                recipient: Recipient {
                    name: "Mona".to_string(),
                    phone: Some("+201000000003".to_string()),
                },
                origin: Address {
                    line: "12 Tahrir Sq".to_string(),
                    city: "Cairo".to_string(),
                    zone: "DOWNTOWN".to_string(),
                },
                destination: Address {
                    line: "7 Corniche Rd".to_string(),
                    city: "Cairo".to_string(),
                    zone: zone.to_string(),
                },
                package_value,
                amount_to_collect: Decimal::ZERO,
                payment_method,
                priority: Priority::Standard,
            },
        )
        .await
        .unwrap()
    }

    /// A shipment packaged and waiting for a courier.
    pub async fn packaged(&self, client_id: Uuid, zone: &str) -> Shipment {
        let shipment = self
            .shipment(client_id, zone, Decimal::from(100), PaymentMethod::CashOnDelivery)
            .await;
        self.advance_to(shipment.id, ShipmentStatus::PackagedAwaitingAssignment)
            .await
    }

    pub async fn assigned(&self, client_id: Uuid, courier_id: Uuid, zone: &str) -> Shipment {
        let shipment = self.packaged(client_id, zone).await;
        assign(&self.state, shipment.id, courier_id).await.unwrap()
    }

    pub async fn advance_to(&self, shipment_id: Uuid, status: ShipmentStatus) -> Shipment {
        advance(&self.state, shipment_id, status, TransitionDetails::default())
            .await
            .unwrap()
    }

    pub async fn fail_delivery(&self, shipment_id: Uuid, photo: Option<&str>) -> Shipment {
        advance(
            &self.state,
            shipment_id,
            ShipmentStatus::DeliveryFailed,
            TransitionDetails {
                failure_reason: Some("recipient not home".to_string()),
                failure_photo: photo.map(str::to_string),
                ..TransitionDetails::default()
            },
        )
        .await
        .unwrap()
    }

    /// Issues a code and confirms it straight away.
    pub async fn deliver(&self, shipment_id: Uuid) -> Shipment {
        issue_code(&self.state, shipment_id).await.unwrap();
        verify(&self.state, shipment_id, CODE).await.unwrap()
    }

    pub async fn stored_shipment(&self, shipment_id: Uuid) -> Shipment {
        let tx = self.state.store.begin().await;
        tx.require_shipment(shipment_id).unwrap()
    }

    pub async fn stored_user(&self, user_id: Uuid) -> User {
        let tx = self.state.store.begin().await;
        tx.require_user(user_id).unwrap()
    }

    pub async fn performance(&self, courier_id: Uuid) -> Option<CourierPerformance> {
        let tx = self.state.store.begin().await;
        tx.performance(courier_id).cloned()
    }

    pub async fn entries(&self, ledger: LedgerKind, owner_id: Uuid) -> Vec<LedgerEntry> {
        let tx = self.state.store.begin().await;
        tx.ledger(ledger)
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        let tx = self.state.store.begin().await;
        tx.notifications().to_vec()
    }

    pub async fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.notifications()
            .await
            .into_iter()
            .filter(|notification| notification.user_id == Some(user_id))
            .collect()
    }
}
