//! Activity lifecycle: start, extend, finish.
//!
//! All timestamps are rounded to the user's `round_to` granularity. Finishing
//! an activity turns it into a time entry on the named job.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use opentelemetry::KeyValue;
use tracing::{debug, error, info};

use super::Providers;
use super::user::load_or_create;
use crate::clock::{Clock, round_to};
use crate::error::{Error, Result};
use crate::model::{Activity, Job, Settings, TimeEntry};
use crate::state::State;
use crate::telemetry::metrics;

/// Parameters for starting an activity.
#[derive(Debug, Clone)]
pub struct StartActivity {
    pub user: String,
    pub name: String,
    pub comment: String,
    /// Shifts the start relative to now. Negative means "started earlier".
    pub start_offset: TimeDelta,
    /// Time from now until the estimate deadline. Falls back to the user's
    /// default estimate.
    pub estimate: Option<TimeDelta>,
}

impl StartActivity {
    pub fn new(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            name: name.into(),
            comment: String::new(),
            start_offset: TimeDelta::zero(),
            estimate: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn start_offset(mut self, offset: TimeDelta) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn estimate(mut self, estimate: TimeDelta) -> Self {
        self.estimate = Some(estimate);
        self
    }
}

/// Parameters for extending the active activity.
#[derive(Debug, Clone)]
pub struct ExtendActivity {
    pub user: String,
    pub comment: String,
    /// Replace the comment instead of appending to it.
    pub reset_comment: bool,
    pub estimate: Option<TimeDelta>,
}

impl ExtendActivity {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            comment: String::new(),
            reset_comment: false,
            estimate: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn reset_comment(mut self, reset: bool) -> Self {
        self.reset_comment = reset;
        self
    }

    pub fn estimate(mut self, estimate: TimeDelta) -> Self {
        self.estimate = Some(estimate);
        self
    }
}

/// Parameters for finishing the active activity into a job.
#[derive(Debug, Clone)]
pub struct FinishActivity {
    pub user: String,
    pub job: String,
    pub comment: String,
    /// Shifts the end relative to now.
    pub end_offset: TimeDelta,
}

impl FinishActivity {
    pub fn new(user: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            job: job.into(),
            comment: String::new(),
            end_offset: TimeDelta::zero(),
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn end_offset(mut self, offset: TimeDelta) -> Self {
        self.end_offset = offset;
        self
    }
}

/// Result of `finish_activity`.
#[derive(Debug, Clone)]
pub enum FinishOutcome {
    /// No activity was active; nothing changed.
    Idle,
    /// The activity was recorded on `job` as `entry` and cleared.
    Finished { job: Job, entry: TimeEntry },
}

impl FinishOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, FinishOutcome::Finished { .. })
    }
}

pub struct ActivityEngine {
    state: Arc<dyn State>,
    clock: Arc<dyn Clock>,
}

impl ActivityEngine {
    pub fn new(providers: &Providers) -> Self {
        Self {
            state: Arc::clone(&providers.state),
            clock: Arc::clone(&providers.clock),
        }
    }

    /// The user's current activity. Idle users get an empty activity.
    pub async fn get_activity(&self, user: &str) -> Result<Activity> {
        Ok(load_or_create(self.state.as_ref(), user).await?.activity)
    }

    /// Time left until the estimate deadline of the current activity.
    /// `None` when idle; zero once the deadline has passed.
    pub async fn time_remaining(&self, user: &str) -> Result<Option<TimeDelta>> {
        let activity = self.get_activity(user).await?;
        Ok(activity
            .estimate_deadline
            .map(|deadline| (deadline - self.clock.now()).max(TimeDelta::zero())))
    }

    pub async fn start_activity(&self, params: StartActivity) -> Result<Activity> {
        if params.name.is_empty() {
            return Err(Error::Validation("activity name cannot be empty".to_string()));
        }

        let mut user = load_or_create(self.state.as_ref(), &params.user).await?;
        if let Err(e) = user.activity.ensure_idle() {
            debug!(user = %params.user, active = %user.activity.name, "start rejected");
            return Err(e);
        }

        let now = self.clock.now();
        let granularity = user.settings.round_to;
        let estimate = estimate_or_default(params.estimate, &user.settings)?;

        user.activity = Activity {
            name: params.name,
            comment: params.comment,
            start: Some(round_to(shift(now, params.start_offset)?, granularity)),
            estimate_deadline: Some(round_to(shift(now, estimate)?, granularity)),
        };

        let user = self.state.upsert_user(user).await?;
        metrics::activity_transitions().add(
            1,
            &[KeyValue::new("from", "idle"), KeyValue::new("to", "active")],
        );
        info!(
            user = %user.name,
            activity = %user.activity.name,
            "activity started"
        );
        Ok(user.activity)
    }

    pub async fn extend_activity(&self, params: ExtendActivity) -> Result<Activity> {
        let mut user = load_or_create(self.state.as_ref(), &params.user).await?;
        user.activity.ensure_active()?;

        let now = self.clock.now();
        let granularity = user.settings.round_to;
        let estimate = estimate_or_default(params.estimate, &user.settings)?;

        if params.reset_comment {
            user.activity.comment = params.comment;
        } else {
            user.activity.add_comment(&params.comment);
        }
        user.activity.estimate_deadline = Some(round_to(shift(now, estimate)?, granularity));

        let user = self.state.upsert_user(user).await?;
        metrics::activity_transitions().add(
            1,
            &[KeyValue::new("from", "active"), KeyValue::new("to", "active")],
        );
        info!(user = %user.name, activity = %user.activity.name, "activity extended");
        Ok(user.activity)
    }

    /// Record the active activity on a job and clear it.
    ///
    /// The job must exist. The job update and the user update are two
    /// separate writes; if the second fails the entry stays on the job and a
    /// retry adds it again only when its timestamps differ.
    pub async fn finish_activity(&self, params: FinishActivity) -> Result<FinishOutcome> {
        let mut user = load_or_create(self.state.as_ref(), &params.user).await?;
        if !user.activity.is_active() {
            debug!(user = %params.user, "nothing to finish");
            return Ok(FinishOutcome::Idle);
        }

        let mut job = self.state.get_job(&params.user, &params.job).await?;

        let now = self.clock.now();
        user.activity.add_comment(&params.comment);
        let start = user
            .activity
            .start
            .ok_or_else(|| Error::InvalidState("active activity has no start".to_string()))?;
        let entry = TimeEntry {
            comment: user.activity.comment.clone(),
            start,
            end: round_to(shift(now, params.end_offset)?, user.settings.round_to),
        };

        job.add_entry(entry.clone());
        let job = self.state.update_job(job).await?;

        let activity = std::mem::take(&mut user.activity);
        if let Err(e) = self.state.upsert_user(user).await {
            error!(
                user = %params.user,
                job = %params.job,
                activity = %activity.name,
                error = %e,
                "entry recorded but activity not cleared"
            );
            return Err(e);
        }

        metrics::activity_transitions().add(
            1,
            &[KeyValue::new("from", "active"), KeyValue::new("to", "idle")],
        );
        info!(
            user = %params.user,
            job = %job.name,
            activity = %activity.name,
            "activity finished"
        );
        Ok(FinishOutcome::Finished { job, entry })
    }
}

fn estimate_or_default(estimate: Option<TimeDelta>, settings: &Settings) -> Result<TimeDelta> {
    match estimate {
        Some(estimate) => Ok(estimate),
        None => TimeDelta::from_std(settings.default_estimate)
            .map_err(|e| Error::Validation(format!("default estimate out of range: {e}"))),
    }
}

fn shift(now: DateTime<Utc>, by: TimeDelta) -> Result<DateTime<Utc>> {
    now.checked_add_signed(by)
        .ok_or_else(|| Error::Validation(format!("offset {by} out of range")))
}
