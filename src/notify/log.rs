use async_trait::async_trait;
use tracing::info;

use super::Notifier;
use crate::error::Result;
use crate::event::Notification;

/// Writes notifications to the log and nowhere else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        info!(
            kind = %n.kind,
            user = %n.user,
            target = %n.target,
            "{}",
            n.message
        );
        Ok(())
    }
}
