use super::notification::{Notification, NotificationKind};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Receives the notifications produced for one session.
///
/// Returns whether the notification was accepted by the terminal side.
/// Implementations must not block: the bank calls them inline.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> bool;
}

pub type SharedSink = Arc<dyn NotificationSink>;

/// Adapts a plain `(kind, info, message) -> bool` callback into a sink.
pub struct CallbackSink<F>(pub F);

impl<F> NotificationSink for CallbackSink<F>
where
    F: Fn(NotificationKind, i64, String) -> bool + Send + Sync,
{
    fn notify(&self, notification: Notification) -> bool {
        (self.0)(notification.kind, notification.info, notification.message)
    }
}

impl NotificationSink for UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) -> bool {
        self.send(notification).is_ok()
    }
}
