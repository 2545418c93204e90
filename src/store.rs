//! In-process transactional store.
//!
//! Every engine operation runs inside one [`Tx`]. A transaction holds the
//! store lock for its whole lifetime, so transactions are fully serialized,
//! and it journals an undo action for every write. Dropping a transaction
//! without calling [`Tx::commit`] replays the journal in reverse, leaving the
//! tables exactly as they were when the transaction began.

use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ledger::{LedgerEntry, LedgerKind};
use crate::models::notification::{Notification, NotificationStatus};
use crate::models::performance::CourierPerformance;
use crate::models::shipment::Shipment;
use crate::models::tier::TierSetting;
use crate::models::user::User;
use crate::models::verification::VerificationCode;

#[derive(Default)]
struct Tables {
    shipments: HashMap<Uuid, Shipment>,
    users: HashMap<Uuid, User>,
    user_order: Vec<Uuid>,
    performance: HashMap<Uuid, CourierPerformance>,
    client_ledger: Vec<LedgerEntry>,
    courier_ledger: Vec<LedgerEntry>,
    codes: HashMap<Uuid, VerificationCode>,
    tier_settings: Vec<TierSetting>,
    notifications: Vec<Notification>,
    shipment_counter: u64,
}

fn shipments(tables: &mut Tables) -> &mut HashMap<Uuid, Shipment> {
    &mut tables.shipments
}

fn users(tables: &mut Tables) -> &mut HashMap<Uuid, User> {
    &mut tables.users
}

fn performance(tables: &mut Tables) -> &mut HashMap<Uuid, CourierPerformance> {
    &mut tables.performance
}

fn codes(tables: &mut Tables) -> &mut HashMap<Uuid, VerificationCode> {
    &mut tables.codes
}

fn ledger_mut(tables: &mut Tables, kind: LedgerKind) -> &mut Vec<LedgerEntry> {
    match kind {
        LedgerKind::Client => &mut tables.client_ledger,
        LedgerKind::Courier => &mut tables.courier_ledger,
    }
}

type Undo = Box<dyn FnOnce(&mut Tables) + Send>;

#[derive(Default)]
pub struct Store {
    tables: Mutex<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction, waiting for any transaction in flight.
    pub async fn begin(&self) -> Tx<'_> {
        Tx {
            tables: self.tables.lock().await,
            undo: Vec::new(),
            outbox: Vec::new(),
        }
    }
}

pub struct Tx<'a> {
    tables: MutexGuard<'a, Tables>,
    undo: Vec<Undo>,
    outbox: Vec<Notification>,
}

impl Tx<'_> {
    /// Makes every write permanent and hands back the notifications recorded
    /// in this transaction for dispatch.
    pub fn commit(mut self) -> Vec<Notification> {
        self.undo.clear();
        std::mem::take(&mut self.outbox)
    }

    pub fn shipment(&self, id: Uuid) -> Option<&Shipment> {
        self.tables.shipments.get(&id)
    }

    pub fn require_shipment(&self, id: Uuid) -> Result<Shipment, AppError> {
        self.shipment(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))
    }

    pub fn shipments(&self) -> impl Iterator<Item = &Shipment> {
        self.tables.shipments.values()
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.tables.users.get(&id)
    }

    pub fn require_user(&self, id: Uuid) -> Result<User, AppError> {
        self.user(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    /// Users in registration order.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.tables
            .user_order
            .iter()
            .filter_map(|id| self.tables.users.get(id))
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.tables
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }

    pub fn performance(&self, courier_id: Uuid) -> Option<&CourierPerformance> {
        self.tables.performance.get(&courier_id)
    }

    pub fn ledger(&self, kind: LedgerKind) -> &[LedgerEntry] {
        match kind {
            LedgerKind::Client => &self.tables.client_ledger,
            LedgerKind::Courier => &self.tables.courier_ledger,
        }
    }

    pub fn code(&self, shipment_id: Uuid) -> Option<&VerificationCode> {
        self.tables.codes.get(&shipment_id)
    }

    pub fn tier_settings(&self) -> &[TierSetting] {
        &self.tables.tier_settings
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.tables.notifications
    }

    pub fn put_shipment(&mut self, shipment: Shipment) {
        self.put_row(shipments, shipment.id, shipment);
    }

    pub fn put_user(&mut self, user: User) {
        if !self.tables.users.contains_key(&user.id) {
            self.tables.user_order.push(user.id);
            self.undo.push(Box::new(|tables: &mut Tables| {
                tables.user_order.pop();
            }));
        }
        self.put_row(users, user.id, user);
    }

    pub fn put_performance(&mut self, record: CourierPerformance) {
        self.put_row(performance, record.courier_id, record);
    }

    pub fn put_code(&mut self, shipment_id: Uuid, code: VerificationCode) {
        self.put_row(codes, shipment_id, code);
    }

    pub fn delete_code(&mut self, shipment_id: Uuid) {
        let previous = self.tables.codes.remove(&shipment_id);
        if let Some(previous) = previous {
            self.undo.push(Box::new(move |tables: &mut Tables| {
                tables.codes.insert(shipment_id, previous);
            }));
        }
    }

    pub fn append_entry(&mut self, kind: LedgerKind, entry: LedgerEntry) {
        ledger_mut(&mut *self.tables, kind).push(entry);
        self.undo.push(Box::new(move |tables: &mut Tables| {
            ledger_mut(tables, kind).pop();
        }));
    }

    /// Replaces the entry with the same id. Only payout lifecycle changes and
    /// evidence retention go through here.
    pub fn replace_entry(&mut self, kind: LedgerKind, entry: LedgerEntry) -> Result<(), AppError> {
        let ledger = ledger_mut(&mut *self.tables, kind);
        let idx = ledger
            .iter()
            .position(|existing| existing.id == entry.id)
            .ok_or_else(|| AppError::NotFound(format!("ledger entry {} not found", entry.id)))?;

        let previous = std::mem::replace(&mut ledger[idx], entry);
        self.undo.push(Box::new(move |tables: &mut Tables| {
            ledger_mut(tables, kind)[idx] = previous;
        }));
        Ok(())
    }

    pub fn set_tier_settings(&mut self, settings: Vec<TierSetting>) {
        let previous = std::mem::replace(&mut self.tables.tier_settings, settings);
        self.undo.push(Box::new(move |tables: &mut Tables| {
            tables.tier_settings = previous;
        }));
    }

    /// Records a notification and queues it for dispatch after commit.
    pub fn notify(&mut self, notification: Notification) {
        self.tables.notifications.push(notification.clone());
        self.outbox.push(notification);
        self.undo.push(Box::new(|tables: &mut Tables| {
            tables.notifications.pop();
        }));
    }

    pub fn set_notification_status(&mut self, id: Uuid, status: NotificationStatus) {
        let Some(idx) = self
            .tables
            .notifications
            .iter()
            .position(|notification| notification.id == id)
        else {
            return;
        };

        let previous = std::mem::replace(&mut self.tables.notifications[idx].status, status);
        self.undo.push(Box::new(move |tables: &mut Tables| {
            tables.notifications[idx].status = previous;
        }));
    }

    /// Locked read-increment-write of the global shipment counter.
    pub fn next_sequence(&mut self) -> u64 {
        let previous = self.tables.shipment_counter;
        self.tables.shipment_counter = previous + 1;
        self.undo.push(Box::new(move |tables: &mut Tables| {
            tables.shipment_counter = previous;
        }));
        previous + 1
    }

    fn put_row<V>(&mut self, table: fn(&mut Tables) -> &mut HashMap<Uuid, V>, id: Uuid, row: V)
    where
        V: Send + 'static,
    {
        let previous = table(&mut *self.tables).insert(id, row);
        self.undo.push(Box::new(move |tables: &mut Tables| match previous {
            Some(previous) => {
                table(tables).insert(id, previous);
            }
            None => {
                table(tables).remove(&id);
            }
        }));
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if self.undo.is_empty() {
            return;
        }

        debug!(writes = self.undo.len(), "rolling back transaction");
        let undo = std::mem::take(&mut self.undo);
        for action in undo.into_iter().rev() {
            action(&mut *self.tables);
        }
    }
}
