use tracing::{debug, warn};

use crate::models::notification::{Channel, Notification, NotificationStatus};
use crate::state::AppState;

/// Delivers the notifications of a committed transaction.
///
/// In-app and system notices go to live subscribers. SMS goes through the
/// configured transport and its outcome is written back in a separate
/// transaction; a transport failure never reaches the caller.
pub async fn publish(state: &AppState, outbox: Vec<Notification>) {
    let mut outcomes = Vec::new();

    for notification in outbox {
        match notification.channel {
            Channel::Sms => {
                let Some(sms) = state.sms.as_ref() else {
                    debug!(notification_id = %notification.id, "no sms transport configured");
                    record(state, Channel::Sms, "skipped");
                    continue;
                };

                let status = match sms.send(&notification).await {
                    Ok(()) => NotificationStatus::Sent,
                    Err(err) => {
                        warn!(
                            notification_id = %notification.id,
                            error = %err,
                            "sms dispatch failed"
                        );
                        NotificationStatus::Failed
                    }
                };
                let outcome = if status == NotificationStatus::Sent {
                    "sent"
                } else {
                    "failed"
                };
                record(state, Channel::Sms, outcome);
                outcomes.push((notification.id, status));
            }
            channel @ (Channel::InApp | Channel::System) => {
                record(state, channel, "stored");
                let _ = state.notification_tx.send(notification);
            }
        }
    }

    if outcomes.is_empty() {
        return;
    }

    let mut tx = state.store.begin().await;
    for (id, status) in outcomes {
        tx.set_notification_status(id, status);
    }
    tx.commit();
}

fn record(state: &AppState, channel: Channel, outcome: &str) {
    state
        .metrics
        .notifications_total
        .with_label_values(&[channel.as_str(), outcome])
        .inc();
}
