mod common;

use lastmile_ledger::engine::ledger::{
    apply_bonus, apply_penalty, client_summary, client_wallet_balance, courier_financials,
    decline_payout, process_payout, request_payout,
};
use lastmile_ledger::error::AppError;
use lastmile_ledger::models::ledger::{EntryKind, EntryStatus, LedgerKind};
use lastmile_ledger::models::notification::NotificationKind;
use lastmile_ledger::models::shipment::PaymentMethod;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::harness;

#[tokio::test]
async fn penalty_and_bonus_are_signed_and_announced() {
    let h = harness();
    let courier = h.courier(&["Z1"]).await;

    let penalty = apply_penalty(&h.state, courier.id, dec!(15), "late return", None)
        .await
        .unwrap();
    let bonus = apply_bonus(&h.state, courier.id, dec!(40), "weekend shift", None)
        .await
        .unwrap();

    assert_eq!(penalty.kind, EntryKind::Penalty);
    assert_eq!(penalty.amount, dec!(-15));
    assert_eq!(bonus.kind, EntryKind::Bonus);
    assert_eq!(bonus.amount, dec!(40));

    let financials = courier_financials(&h.state, courier.id).await.unwrap();
    assert_eq!(financials.balance, dec!(25));
    assert_eq!(financials.earnings, dec!(40));
    assert_eq!(h.notifications_for(courier.id).await.len(), 2);
}

#[tokio::test]
async fn adjustments_validate_amount_and_courier() {
    let h = harness();
    let courier = h.courier(&["Z1"]).await;

    for amount in [dec!(0), dec!(-5)] {
        let err = apply_penalty(&h.state, courier.id, amount, "late", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    let err = apply_bonus(&h.state, Uuid::new_v4(), dec!(5), "ghost", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(h.entries(LedgerKind::Courier, courier.id).await.is_empty());
}

#[tokio::test]
async fn payout_request_is_bounded_by_balance() {
    let h = harness();
    let courier = h.courier(&["Z1"]).await;
    apply_bonus(&h.state, courier.id, dec!(100), "onboarding", None)
        .await
        .unwrap();

    let request = request_payout(&h.state, LedgerKind::Courier, courier.id, dec!(60))
        .await
        .unwrap();
    assert_eq!(request.kind, EntryKind::WithdrawalRequest);
    assert_eq!(request.status, EntryStatus::Pending);
    assert_eq!(request.amount, dec!(-60));

    let financials = courier_financials(&h.state, courier.id).await.unwrap();
    assert_eq!(financials.balance, dec!(40));
    assert_eq!(financials.pending_payouts, dec!(60));

    let err = request_payout(&h.state, LedgerKind::Courier, courier.id, dec!(41))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationFailed(_)));

    let err = request_payout(&h.state, LedgerKind::Courier, courier.id, dec!(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationFailed(_)));
}

#[tokio::test]
async fn processing_a_payout_happens_exactly_once() {
    let h = harness();
    let courier = h.courier(&["Z1"]).await;
    apply_bonus(&h.state, courier.id, dec!(100), "onboarding", None)
        .await
        .unwrap();
    let request = request_payout(&h.state, LedgerKind::Courier, courier.id, dec!(60))
        .await
        .unwrap();

    let processed = process_payout(
        &h.state,
        LedgerKind::Courier,
        request.id,
        Some("payouts/receipt.png".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(processed.status, EntryStatus::Processed);
    assert_eq!(processed.kind, EntryKind::WithdrawalRequest);
    assert_eq!(processed.evidence.as_deref(), Some("payouts/receipt.png"));

    let err = process_payout(&h.state, LedgerKind::Courier, request.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationFailed(_)));
    let err = decline_payout(&h.state, LedgerKind::Courier, request.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationFailed(_)));

    let financials = courier_financials(&h.state, courier.id).await.unwrap();
    assert_eq!(financials.balance, dec!(40));
    assert_eq!(financials.pending_payouts, dec!(0));

    let payout_notices = h
        .notifications_for(courier.id)
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Payout)
        .count();
    assert_eq!(payout_notices, 1);
}

#[tokio::test]
async fn declining_a_payout_restores_the_balance() {
    let h = harness();
    let courier = h.courier(&["Z1"]).await;
    apply_bonus(&h.state, courier.id, dec!(100), "onboarding", None)
        .await
        .unwrap();
    let request = request_payout(&h.state, LedgerKind::Courier, courier.id, dec!(60))
        .await
        .unwrap();

    let declined = decline_payout(
        &h.state,
        LedgerKind::Courier,
        request.id,
        Some("bank details missing".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(declined.status, EntryStatus::Failed);

    let financials = courier_financials(&h.state, courier.id).await.unwrap();
    assert_eq!(financials.balance, dec!(100));

    let notice = h
        .notifications_for(courier.id)
        .await
        .into_iter()
        .find(|n| n.kind == NotificationKind::Payout)
        .unwrap();
    assert!(notice.message.contains("bank details missing"));
}

#[tokio::test]
async fn payout_entries_live_in_their_own_ledger() {
    let h = harness();
    let courier = h.courier(&["Z1"]).await;
    apply_bonus(&h.state, courier.id, dec!(100), "onboarding", None)
        .await
        .unwrap();
    let request = request_payout(&h.state, LedgerKind::Courier, courier.id, dec!(10))
        .await
        .unwrap();

    let err = process_payout(&h.state, LedgerKind::Client, request.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = request_payout(&h.state, LedgerKind::Client, courier.id, dec!(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn client_summary_reports_totals_and_outcomes() {
    let h = harness();
    let client = h.client(dec!(75)).await;
    let courier = h.courier(&["Z1"]).await;

    let delivered = h
        .shipment(client.id, "Z1", dec!(500), PaymentMethod::CashOnDelivery)
        .await;
    h.advance_to(
        delivered.id,
        lastmile_ledger::models::shipment::ShipmentStatus::PackagedAwaitingAssignment,
    )
    .await;
    lastmile_ledger::engine::assignment::assign(&h.state, delivered.id, courier.id)
        .await
        .unwrap();
    h.deliver(delivered.id).await;

    let failed = h.assigned(client.id, courier.id, "Z1").await;
    h.fail_delivery(failed.id, None).await;
    h.packaged(client.id, "Z1").await;

    let summary = client_summary(&h.state, client.id).await.unwrap();
    assert_eq!(summary.shipments, 3);
    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.deposits, dec!(500));
    assert_eq!(summary.payments, dec!(75));
    assert_eq!(summary.penalties, dec!(75));
    assert_eq!(summary.balance, dec!(350));
    assert_eq!(
        client_wallet_balance(&h.state, client.id).await.unwrap(),
        dec!(350)
    );
}
