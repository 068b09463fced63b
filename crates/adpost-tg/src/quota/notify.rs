use teloxide::types::UserId;

/// Delivers informational messages to users. Delivery is best-effort: the
/// quota engine never waits for it and never learns whether it succeeded.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, user_id: UserId, message: String);
}

/// Sink that drops every notification.
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _user_id: UserId, _message: String) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) sent: Mutex<Vec<(UserId, String)>>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, user_id: UserId, message: String) {
            self.sent.lock().push((user_id, message));
        }
    }
}
