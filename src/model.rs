//! Core data model.
//!
//! A user tracks at most one activity at a time. Finished activities become
//! time entries on a named job; completing a job turns its entries into
//! immutable records.

use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user and everything the engine tracks for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique key.
    pub name: String,

    /// Paused users are skipped by reconciliation.
    #[serde(default)]
    pub inactive: bool,

    #[serde(default)]
    pub activity: Activity,

    #[serde(default)]
    pub settings: Settings,
}

impl User {
    /// A fresh user with default settings and no activity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inactive: false,
            activity: Activity::default(),
            settings: Settings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// The single in-progress unit of work of a user.
///
/// An empty `name` means no activity is active; in that case both timestamps
/// are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimate_deadline: Option<DateTime<Utc>>,
}

impl Activity {
    pub fn is_active(&self) -> bool {
        !self.name.is_empty()
    }

    /// Fails with `InvalidState` unless an activity is active.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::InvalidState("no activity active".to_string()))
        }
    }

    /// Fails with `Conflict` if an activity is already active.
    pub fn ensure_idle(&self) -> Result<()> {
        if self.is_active() {
            Err(Error::Conflict(format!("activity '{}' active", self.name)))
        } else {
            Ok(())
        }
    }

    /// Append `comment` on a new line. Empty comments are ignored.
    pub fn add_comment(&mut self, comment: &str) {
        if comment.is_empty() {
            return;
        }
        if self.comment.is_empty() {
            self.comment = comment.to_string();
        } else {
            self.comment.push('\n');
            self.comment.push_str(comment);
        }
    }

    pub fn clear(&mut self) {
        *self = Activity::default();
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Per-user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Granularity every activity timestamp is rounded to.
    #[serde(with = "secs", default = "default_round_to")]
    pub round_to: Duration,

    /// Offset from local midnight past which an idle user is alarmed.
    #[serde(with = "secs", default = "default_missed_work_alarm")]
    pub missed_work_alarm: Duration,

    /// Days the missed-work alarm applies to.
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<Weekday>,

    /// Estimate used when start/extend do not pass one.
    #[serde(with = "secs", default = "default_estimate")]
    pub default_estimate: Duration,
}

impl Settings {
    pub fn works_on(&self, day: Weekday) -> bool {
        self.weekdays.contains(&day)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            round_to: default_round_to(),
            missed_work_alarm: default_missed_work_alarm(),
            weekdays: default_weekdays(),
            default_estimate: default_estimate(),
        }
    }
}

fn default_round_to() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_missed_work_alarm() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

fn default_weekdays() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}

fn default_estimate() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Durations stored as whole seconds.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Reusable default field values for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTemplate {
    /// Template name. Empty on templates embedded in a job.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl RecordTemplate {
    /// Overwrite fields with every non-empty field of `patch`.
    pub fn merge(&mut self, patch: &RecordTemplate) {
        fn set(field: &mut String, value: &str) {
            if !value.is_empty() {
                *field = value.to_string();
            }
        }
        set(&mut self.project, &patch.project);
        set(&mut self.task, &patch.task);
        set(&mut self.title, &patch.title);
        set(&mut self.description, &patch.description);
    }
}

/// One finished interval belonging to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    #[serde(default)]
    pub comment: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A named unit of work accumulating time entries until it is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub template: RecordTemplate,
    #[serde(default)]
    pub entries: Vec<TimeEntry>,
}

impl Job {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            created_at,
            template: RecordTemplate::default(),
            entries: Vec::new(),
        }
    }

    /// Merge an entry. An entry with the same `(start, end)` is updated in
    /// place (only if the incoming comment is non-empty); anything else is
    /// appended.
    pub fn add_entry(&mut self, entry: TimeEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.start == entry.start && e.end == entry.end)
        {
            Some(existing) => {
                if !entry.comment.is_empty() {
                    existing.comment = entry.comment;
                }
            }
            None => self.entries.push(entry),
        }
    }

    /// Check the job can be turned into records.
    pub fn validate(&self) -> Result<()> {
        let missing_comments = self.entries.iter().any(|e| e.comment.is_empty());
        let t = &self.template;

        if t.title.is_empty() {
            return Err(Error::Validation("title cannot be empty".to_string()));
        }
        if t.description.is_empty() && missing_comments {
            return Err(Error::Validation(
                "description cannot be empty".to_string(),
            ));
        }
        if t.project.is_empty() {
            return Err(Error::Validation("project cannot be empty".to_string()));
        }
        if t.task.is_empty() {
            return Err(Error::Validation("task cannot be empty".to_string()));
        }
        Ok(())
    }

    /// One record per entry. Pure: the same job always yields the same records.
    pub fn to_records(&self) -> Vec<Record> {
        let t = &self.template;
        self.entries
            .iter()
            .map(|entry| Record {
                title: t.title.clone(),
                description: if entry.comment.is_empty() {
                    t.description.clone()
                } else {
                    format!("{}\n{}", t.description, entry.comment)
                },
                project: t.project.clone(),
                task: t.task.clone(),
                start: entry.start,
                end: entry.end,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// An archived time interval. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub description: String,
    pub project: String,
    pub task: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
