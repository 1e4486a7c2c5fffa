//! Notification delivery.
//!
//! Delivery is best-effort: a failed notify is reported to the caller, never
//! retried here. HTTP backends bound every call with [`HTTP_TIMEOUT`].

mod chat;
mod log;
mod memory;
mod webhook;

pub use chat::{ChatConfig, ChatNotifier};
pub use log::LogNotifier;
pub use memory::MemoryNotifier;
pub use webhook::WebhookNotifier;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::Notification;

/// Upper bound on a single outbound notification request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}
