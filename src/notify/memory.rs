use std::sync::Mutex;

use async_trait::async_trait;

use super::Notifier;
use crate::error::{Error, Result};
use crate::event::{EventKind, Notification};

/// Keeps every notification in memory. Can be switched to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_of(&self, kind: EventKind) -> Vec<Notification> {
        self.sent().into_iter().filter(|n| n.kind == kind).collect()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, n: &Notification) -> Result<()> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(Error::Backend("notifier unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(n.clone());
        Ok(())
    }
}
