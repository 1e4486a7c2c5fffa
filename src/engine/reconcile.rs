//! Reconciliation: evaluate every check against every user concurrently and
//! fold the outcomes into one scheduling decision.
//!
//! Each `(check, user)` pair runs in its own task with an owned snapshot of
//! the user. Results come back over a channel and are reduced with AND (`ok`),
//! OR (`requeue`) and MIN (`retry_after`), so arrival order does not matter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono_tz::Tz;
use opentelemetry::KeyValue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use super::Providers;
use super::checks::{MissedWorkCheck, TimerCheck};
use crate::error::{Error, Result};
use crate::model::User;
use crate::state::State;
use crate::telemetry::{metrics, spans};

/// What one check concluded for one user.
#[derive(Debug)]
pub struct CheckOutcome {
    pub ok: bool,
    /// Ask for the next pass no later than `retry_after`.
    pub requeue: bool,
    pub retry_after: Duration,
    pub error: Option<Error>,
}

impl CheckOutcome {
    /// Nothing to do, no particular wake-up time.
    pub fn done() -> Self {
        Self {
            ok: true,
            requeue: false,
            retry_after: Duration::ZERO,
            error: None,
        }
    }

    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            ok: true,
            requeue: true,
            retry_after: delay,
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            ok: false,
            requeue: false,
            retry_after: Duration::ZERO,
            error: Some(error),
        }
    }

    fn label(&self) -> &'static str {
        if !self.ok {
            "failed"
        } else if self.requeue {
            "requeue"
        } else {
            "ok"
        }
    }
}

/// A per-user condition evaluated on every pass. May notify as a side effect.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self, user: &User) -> CheckOutcome;
}

/// Aggregate of every outcome in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    pub ok: bool,
    pub requeue: bool,
    /// Smallest delay among outcomes that requested a requeue.
    pub retry_after: Option<Duration>,
}

impl Default for ReconcileResult {
    fn default() -> Self {
        Self {
            ok: true,
            requeue: false,
            retry_after: None,
        }
    }
}

impl ReconcileResult {
    pub fn absorb(&mut self, outcome: &CheckOutcome) {
        self.ok &= outcome.ok;
        self.requeue |= outcome.requeue;
        if outcome.requeue {
            self.retry_after = Some(match self.retry_after {
                Some(current) => current.min(outcome.retry_after),
                None => outcome.retry_after,
            });
        }
    }

    /// How long to wait before the next pass.
    pub fn next_delay(&self, default_interval: Duration) -> Duration {
        match self.retry_after {
            Some(retry) if self.requeue => retry.min(default_interval),
            _ => default_interval,
        }
    }
}

/// Summary of one pass.
#[derive(Debug, Clone, Copy)]
pub struct PassReport {
    pub result: ReconcileResult,
    /// Active users evaluated.
    pub users: usize,
    pub launched: usize,
    pub reported: usize,
    /// Cancellation fired during the pass; late results were discarded.
    pub cancelled: bool,
}

pub struct Reconciler {
    state: Arc<dyn State>,
    checks: Vec<Arc<dyn Check>>,
}

impl Reconciler {
    pub fn new(state: Arc<dyn State>, checks: Vec<Arc<dyn Check>>) -> Self {
        Self { state, checks }
    }

    /// The built-in timer and missed-work checks. `timezone` defines local
    /// midnight and the weekday for the missed-work alarm.
    pub fn with_default_checks(providers: &Providers, timezone: Tz) -> Self {
        let checks: Vec<Arc<dyn Check>> = vec![
            Arc::new(TimerCheck::new(
                Arc::clone(&providers.notifier),
                Arc::clone(&providers.clock),
            )),
            Arc::new(MissedWorkCheck::new(
                Arc::clone(&providers.notifier),
                Arc::clone(&providers.clock),
                timezone,
            )),
        ];
        Self::new(Arc::clone(&providers.state), checks)
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run one pass. Only loading the user list can fail; check failures are
    /// folded into `ok = false`.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport> {
        let pass_span = spans::start_pass_span();
        self.run_pass_inner(cancel).instrument(pass_span).await
    }

    async fn run_pass_inner(&self, cancel: &CancellationToken) -> Result<PassReport> {
        let started = Instant::now();
        let span = tracing::Span::current();

        let users: Vec<User> = self
            .state
            .list_users()
            .await?
            .into_iter()
            .filter(|u| {
                if u.inactive {
                    debug!(user = %u.name, "skipping paused user");
                }
                !u.inactive
            })
            .collect();
        span.record("reconcile.users", users.len());

        let launched = users.len() * self.checks.len();
        let (tx, mut rx) = mpsc::channel::<Option<CheckOutcome>>(launched.max(1));

        for check in &self.checks {
            for user in &users {
                let check = Arc::clone(check);
                let user = user.clone();
                let tx = tx.clone();
                let cancel = cancel.clone();
                let check_span = spans::start_check_span(check.name(), &user.name);

                tokio::spawn(
                    async move {
                        let outcome = run_check(check.as_ref(), &user).await;
                        // Late results are dropped once the pass is cancelled.
                        let report = if cancel.is_cancelled() {
                            None
                        } else {
                            Some(outcome)
                        };
                        let _ = tx.send(report).await;
                    }
                    .instrument(check_span),
                );
            }
        }
        drop(tx);

        let mut result = ReconcileResult::default();
        let mut reported = 0;
        while let Some(report) = rx.recv().await {
            reported += 1;
            if let Some(outcome) = report {
                result.absorb(&outcome);
            }
        }

        if reported < launched {
            warn!(launched, reported, "check tasks ended without reporting");
            result.ok = false;
        }

        let cancelled = cancel.is_cancelled();
        span.record("reconcile.ok", result.ok);

        let label = if cancelled {
            "cancelled"
        } else if result.ok {
            "ok"
        } else {
            "failed"
        };
        metrics::reconcile_passes().add(1, &[KeyValue::new("result", label)]);
        metrics::pass_duration_ms().record(started.elapsed().as_secs_f64() * 1000.0, &[]);

        info!(
            users = users.len(),
            ok = result.ok,
            requeue = result.requeue,
            retry_after_ms = result.retry_after.map(|d| d.as_millis() as u64),
            "reconcile pass done"
        );

        Ok(PassReport {
            result,
            users: users.len(),
            launched,
            reported,
            cancelled,
        })
    }
}

async fn run_check(check: &dyn Check, user: &User) -> CheckOutcome {
    let outcome = check.check(user).await;

    if let Some(err) = &outcome.error {
        warn!(check = check.name(), user = %user.name, error = %err, "check failed");
    } else if !outcome.ok {
        warn!(check = check.name(), user = %user.name, "check not ok");
    }

    let label = outcome.label();
    spans::record_check_result(&tracing::Span::current(), label);
    metrics::check_outcomes().add(
        1,
        &[
            KeyValue::new("check", check.name()),
            KeyValue::new("result", label),
        ],
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_takes_min_of_requeued_only() {
        let mut r = ReconcileResult::default();
        r.absorb(&CheckOutcome::requeue_after(Duration::from_secs(600)));
        r.absorb(&CheckOutcome::done());
        r.absorb(&CheckOutcome::requeue_after(Duration::from_secs(120)));
        assert!(r.ok);
        assert!(r.requeue);
        assert_eq!(r.retry_after, Some(Duration::from_secs(120)));
    }

    #[test]
    fn failure_does_not_change_timing() {
        let mut r = ReconcileResult::default();
        r.absorb(&CheckOutcome::failed(Error::Backend("down".into())));
        assert!(!r.ok);
        assert!(!r.requeue);
        assert_eq!(r.retry_after, None);
    }

    #[test]
    fn next_delay_is_capped_by_default() {
        let five = Duration::from_secs(300);
        let mut r = ReconcileResult::default();
        assert_eq!(r.next_delay(five), five);

        r.absorb(&CheckOutcome::requeue_after(Duration::from_secs(60)));
        assert_eq!(r.next_delay(five), Duration::from_secs(60));

        let mut far = ReconcileResult::default();
        far.absorb(&CheckOutcome::requeue_after(Duration::from_secs(3600)));
        assert_eq!(far.next_delay(five), five);
    }
}
