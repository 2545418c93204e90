use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::engine::ledger::post;
use crate::engine::notify_user;
use crate::engine::performance::{load_or_default, record_success};
use crate::models::ledger::{EntryKind, LedgerEntry, LedgerKind};
use crate::models::shipment::{PaymentMethod, Shipment};
use crate::observability::metrics::Metrics;
use crate::store::Tx;

/// Writes the financial consequences of a delivered shipment. Runs inside the
/// delivery transaction and uses only the values frozen on the shipment.
pub(crate) fn settle_delivery(
    tx: &mut Tx<'_>,
    metrics: &Metrics,
    shipment: &Shipment,
    now: DateTime<Utc>,
) {
    settle_courier(tx, metrics, shipment, now);
    settle_client(tx, metrics, shipment, now);
}

fn settle_courier(tx: &mut Tx<'_>, metrics: &Metrics, shipment: &Shipment, now: DateTime<Utc>) {
    let Some(courier_id) = shipment.courier_id else {
        return;
    };

    if shipment.courier_commission > Decimal::ZERO {
        post(
            tx,
            metrics,
            LedgerKind::Courier,
            LedgerEntry::processed(
                courier_id,
                shipment.courier_commission,
                EntryKind::Commission,
                Some(shipment.id),
                format!("Commission for shipment {}", shipment.tracking_code),
                now,
            ),
        );
    }

    notify_user(
        tx,
        courier_id,
        Some(shipment.id),
        format!("Shipment {} delivered", shipment.tracking_code),
        now,
    );

    let mut record = load_or_default(tx, courier_id, now);
    record_success(&mut record, now);
    tx.put_performance(record);

    // the referral bonus does not depend on the courier's own commission
    let referral = tx
        .user(courier_id)
        .and_then(|courier| courier.courier.as_ref())
        .and_then(|profile| profile.referrer_id.map(|id| (id, profile.referral_rate)));
    let Some((referrer_id, rate)) = referral else {
        return;
    };
    if rate <= Decimal::ZERO {
        return;
    }
    if tx.user(referrer_id).is_none() {
        warn!(courier_id = %courier_id, referrer_id = %referrer_id, "referrer no longer exists");
        return;
    }

    post(
        tx,
        metrics,
        LedgerKind::Courier,
        LedgerEntry::processed(
            referrer_id,
            rate,
            EntryKind::ReferralBonus,
            Some(shipment.id),
            format!("Referral bonus for shipment {}", shipment.tracking_code),
            now,
        ),
    );
}

fn settle_client(tx: &mut Tx<'_>, metrics: &Metrics, shipment: &Shipment, now: DateTime<Utc>) {
    let fee = shipment.client_fee;
    let code = &shipment.tracking_code;

    let entries: Vec<(Decimal, EntryKind, String)> = match shipment.payment_method {
        PaymentMethod::CashOnDelivery => vec![
            (
                shipment.package_value,
                EntryKind::Deposit,
                format!("Cash collected for shipment {code}"),
            ),
            (-fee, EntryKind::Payment, format!("Shipping fee for shipment {code}")),
        ],
        PaymentMethod::BankTransfer => vec![(
            shipment.amount_to_collect,
            EntryKind::Deposit,
            format!("Transfer collected for shipment {code}"),
        )],
        PaymentMethod::Wallet => vec![
            (
                shipment.total_price(),
                EntryKind::Deposit,
                format!("Payment received for shipment {code}"),
            ),
            (-fee, EntryKind::Payment, format!("Shipping fee for shipment {code}")),
        ],
    };

    for (amount, kind, description) in entries {
        if amount.is_zero() {
            debug!(shipment_id = %shipment.id, kind = kind.as_str(), "skipping zero settlement entry");
            continue;
        }
        if kind == EntryKind::Deposit && amount < Decimal::ZERO {
            continue;
        }

        post(
            tx,
            metrics,
            LedgerKind::Client,
            LedgerEntry::processed(
                shipment.client_id,
                amount,
                kind,
                Some(shipment.id),
                description,
                now,
            ),
        );
    }
}
