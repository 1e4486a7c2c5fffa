//! Built-in reconciliation checks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use opentelemetry::KeyValue;
use tracing::{debug, info};

use super::reconcile::{Check, CheckOutcome};
use crate::clock::Clock;
use crate::error::Result;
use crate::event::{EventKind, Notification};
use crate::model::User;
use crate::notify::Notifier;
use crate::telemetry::metrics;

/// How long an idle user is left alone after a missed-work alarm.
pub const MISSED_WORK_SNOOZE: Duration = Duration::from_secs(15 * 60);

/// Fires once the active activity's estimate deadline has passed, and
/// otherwise asks to be woken exactly at the deadline.
pub struct TimerCheck {
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl TimerCheck {
    pub fn new(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self { notifier, clock }
    }
}

#[async_trait]
impl Check for TimerCheck {
    fn name(&self) -> &'static str {
        "timer"
    }

    async fn check(&self, user: &User) -> CheckOutcome {
        let Some(deadline) = user.activity.estimate_deadline else {
            return CheckOutcome::done();
        };

        let now = self.clock.now();
        if deadline > now {
            return CheckOutcome::requeue_after(until(now, deadline));
        }

        let notification = Notification::new(
            EventKind::TimerExpired,
            "Estimated time expired",
            format!("activity@{}", user.activity.name),
            &user.name,
            now,
        );
        match send(self.notifier.as_ref(), &notification).await {
            Ok(()) => CheckOutcome::done(),
            Err(e) => CheckOutcome::failed(e),
        }
    }
}

/// Alarms an idle user once the daily deadline (`missed_work_alarm` past
/// local midnight) has passed on a working day.
///
/// Only the current activity is inspected: a user who finished work before
/// the deadline and is idle now is still alarmed.
pub struct MissedWorkCheck {
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    snooze: Duration,
}

impl MissedWorkCheck {
    pub fn new(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>, timezone: Tz) -> Self {
        Self {
            notifier,
            clock,
            timezone,
            snooze: MISSED_WORK_SNOOZE,
        }
    }

    pub fn with_snooze(mut self, snooze: Duration) -> Self {
        self.snooze = snooze;
        self
    }

    fn local_midnight(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.timezone);
        let midnight = local.date_naive().and_time(chrono::NaiveTime::MIN);
        match self.timezone.from_local_datetime(&midnight).earliest() {
            Some(m) => m.with_timezone(&Utc),
            // Midnight skipped by a DST jump: count back from the local time.
            None => now - (local.naive_local() - midnight),
        }
    }
}

#[async_trait]
impl Check for MissedWorkCheck {
    fn name(&self) -> &'static str {
        "missed_work"
    }

    async fn check(&self, user: &User) -> CheckOutcome {
        let now = self.clock.now();
        let weekday = now.with_timezone(&self.timezone).weekday();
        if !user.settings.works_on(weekday) {
            return CheckOutcome::done();
        }

        let Ok(offset) = TimeDelta::from_std(user.settings.missed_work_alarm) else {
            return CheckOutcome::done();
        };
        let Some(alarm) = self.local_midnight(now).checked_add_signed(offset) else {
            return CheckOutcome::done();
        };
        if now < alarm {
            return CheckOutcome::requeue_after(until(now, alarm));
        }

        if user.activity.is_active() {
            debug!(user = %user.name, "user is working, no alarm");
            return CheckOutcome::done();
        }

        let notification = Notification::new(
            EventKind::NoEntryAlarm,
            "No work logged today!",
            "activity@none",
            &user.name,
            now,
        );
        match send(self.notifier.as_ref(), &notification).await {
            Ok(()) => CheckOutcome::requeue_after(self.snooze),
            Err(e) => CheckOutcome::failed(e),
        }
    }
}

fn until(now: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

async fn send(notifier: &dyn Notifier, n: &Notification) -> Result<()> {
    let result = notifier.notify(n).await;
    let label = if result.is_ok() { "ok" } else { "error" };
    metrics::notifications().add(
        1,
        &[
            KeyValue::new("kind", n.kind.as_str()),
            KeyValue::new("result", label),
        ],
    );
    if result.is_ok() {
        info!(user = %n.user, kind = %n.kind, target = %n.target, "notification sent");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::MemoryNotifier;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn midnight_in_zone() {
        let clock = Arc::new(ManualClock::new(at("2024-03-05T10:00:00Z")));
        let check = MissedWorkCheck::new(
            Arc::new(MemoryNotifier::new()),
            clock,
            chrono_tz::Europe::Berlin,
        );
        // 10:00 UTC is 11:00 in Berlin; midnight there is 23:00 UTC the day before.
        assert_eq!(
            check.local_midnight(at("2024-03-05T10:00:00Z")),
            at("2024-03-04T23:00:00Z")
        );
    }

    #[test]
    fn until_never_negative() {
        assert_eq!(
            until(at("2024-03-05T10:00:00Z"), at("2024-03-05T09:00:00Z")),
            Duration::ZERO
        );
    }
}
