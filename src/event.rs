//! Notification events emitted by reconciliation.
//!
//! The set of kinds is closed. Each notifier backend decides how a kind is
//! rendered for its channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// An activity ran past its estimate deadline.
    TimerExpired,
    /// No activity was started by the daily alarm time.
    NoEntryAlarm,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TimerExpired => "TIMER_EXPIRED",
            EventKind::NoEntryAlarm => "NO_ENTRY_ALARM",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A notification handed to a [`Notifier`](crate::notify::Notifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: EventKind,
    pub message: String,
    /// What the event is about, e.g. `activity@coding`.
    pub target: String,
    /// User the event concerns.
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: EventKind,
        message: impl Into<String>,
        target: impl Into<String>,
        user: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            target: target.into(),
            user: user.into(),
            timestamp,
        }
    }
}
