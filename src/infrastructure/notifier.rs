use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::NotificationSink;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

/// Writes notifications to the log. Used when no messaging channel is wired.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let payload = &notification.payload;
        match notification.kind {
            NotificationKind::Confirmed => info!(
                user = notification.user,
                order = payload.order,
                amount = %payload.amount,
                grant = %payload.credit_grant_text,
                balance = %payload.balance_text,
                "Payment confirmed"
            ),
            NotificationKind::Cancelled => info!(
                user = notification.user,
                order = payload.order,
                "Payment cancelled"
            ),
        }
    }
}

/// Hands notifications to a delivery task through an unbounded queue.
///
/// Enqueueing never blocks the settlement path; if the receiving side is
/// gone the notification is dropped with a warning.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            warn!(
                user = e.0.user,
                order = e.0.payload.order,
                "Notification dropped: delivery queue closed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Credit;
    use crate::domain::notification::NotificationPayload;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn notification() -> Notification {
        Notification {
            user: 1,
            kind: NotificationKind::Confirmed,
            payload: NotificationPayload {
                order: 5,
                amount: dec!(36000),
                credit_grant: Credit::new(dec!(3600)),
                credit_grant_text: "1 hours".to_string(),
                balance_text: "1 hours".to_string(),
                settled_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(notification());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.payload.order, 5);
    }

    #[test]
    fn test_channel_notifier_survives_closed_queue() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(notification());
    }
}
