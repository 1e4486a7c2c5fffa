//! Job lifecycle: create, patch, complete into records.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::Providers;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{Job, Record, RecordTemplate, TimeEntry};
use crate::state::{Recorder, State, TemplateProvider};
use crate::telemetry::metrics;

/// What `create_job_if_missing` found or made.
#[derive(Debug, Clone)]
pub struct CreatedJob {
    pub job: Job,
    pub created: bool,
}

/// A sparse patch for an existing job.
///
/// The named template is applied first, then every non-empty explicit field
/// overrides it. Empty strings never clear a value. Entries are merged with
/// the `(start, end)` dedup rule.
#[derive(Debug, Clone, Default)]
pub struct UpdateJob {
    pub owner: String,
    pub name: String,
    pub template: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    pub task: Option<String>,
    pub entries: Vec<TimeEntry>,
}

impl UpdateJob {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn entry(mut self, entry: TimeEntry) -> Self {
        self.entries.push(entry);
        self
    }

    fn field_patch(&self) -> RecordTemplate {
        RecordTemplate {
            name: String::new(),
            project: self.project.clone().unwrap_or_default(),
            task: self.task.clone().unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
        }
    }
}

/// How a job leaves the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Validate, write one record per entry, then delete.
    Finished,
    /// Delete without writing records.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CompleteJob {
    pub owner: String,
    pub name: String,
    pub status: JobStatus,
}

impl CompleteJob {
    pub fn finished(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            status: JobStatus::Finished,
        }
    }

    pub fn cancelled(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            status: JobStatus::Cancelled,
        }
    }
}

/// The deleted job and the records written for it.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub job: Job,
    pub records: Vec<Record>,
}

pub struct JobEngine {
    state: Arc<dyn State>,
    templates: Arc<dyn TemplateProvider>,
    recorder: Arc<dyn Recorder>,
    clock: Arc<dyn Clock>,
}

impl JobEngine {
    pub fn new(providers: &Providers) -> Self {
        Self {
            state: Arc::clone(&providers.state),
            templates: Arc::clone(&providers.templates),
            recorder: Arc::clone(&providers.recorder),
            clock: Arc::clone(&providers.clock),
        }
    }

    /// `None` if no such job exists.
    pub async fn get_job(&self, owner: &str, name: &str) -> Result<Option<Job>> {
        match self.state.get_job(owner, name).await {
            Ok(job) => Ok(Some(job)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_jobs(&self, owner: &str) -> Result<Vec<Job>> {
        self.state.list_jobs(owner).await
    }

    /// Idempotent: a second call with the same name returns the stored job.
    pub async fn create_job_if_missing(&self, owner: &str, name: &str) -> Result<CreatedJob> {
        if name.is_empty() {
            return Err(Error::Validation("job name cannot be empty".to_string()));
        }

        let fresh = Job::new(owner, name, self.clock.now());
        let (job, created) = self.state.create_job_if_missing(fresh).await?;
        if created {
            info!(owner = %owner, job = %name, "job created");
        } else {
            debug!(owner = %owner, job = %name, "job already exists");
        }
        Ok(CreatedJob { job, created })
    }

    pub async fn update_job(&self, params: UpdateJob) -> Result<Job> {
        let mut job = self.state.get_job(&params.owner, &params.name).await?;

        if let Some(name) = params.template.as_deref().filter(|n| !n.is_empty()) {
            match self.resolve_template(name).await {
                Some(template) => job.template.merge(&template),
                None => warn!(job = %params.name, template = %name, "template not found, skipping"),
            }
        }
        job.template.merge(&params.field_patch());
        for entry in params.entries {
            job.add_entry(entry);
        }

        let job = self.state.update_job(job).await?;
        info!(owner = %job.owner, job = %job.name, "job updated");
        Ok(job)
    }

    async fn resolve_template(&self, name: &str) -> Option<RecordTemplate> {
        match self.templates.has_template(name).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(template = %name, error = %e, "template lookup failed");
                return None;
            }
        }
        match self.templates.get_template(name).await {
            Ok(template) => Some(template),
            Err(e) => {
                warn!(template = %name, error = %e, "template lookup failed");
                None
            }
        }
    }

    /// Archive a job.
    ///
    /// Records are written one by one and the job is deleted only after all
    /// of them succeeded. A failure part way leaves earlier records written
    /// and the job in place; completing again re-derives the same records.
    pub async fn complete_job(&self, params: CompleteJob) -> Result<CompletedJob> {
        let job = self.state.get_job(&params.owner, &params.name).await?;

        if params.status == JobStatus::Cancelled {
            let job = self.state.delete_job(&params.owner, &params.name).await?;
            info!(owner = %job.owner, job = %job.name, "job cancelled");
            return Ok(CompletedJob {
                job,
                records: Vec::new(),
            });
        }

        if let Err(e) = job.validate() {
            warn!(owner = %job.owner, job = %job.name, error = %e, "job cannot be completed");
            return Err(e);
        }

        let mut records = Vec::with_capacity(job.entries.len());
        for record in job.to_records() {
            match self.recorder.save_record(record).await {
                Ok(saved) => {
                    metrics::records_saved().add(1, &[]);
                    records.push(saved);
                }
                Err(e) => {
                    error!(
                        owner = %job.owner,
                        job = %job.name,
                        saved = records.len(),
                        error = %e,
                        "record write failed, job kept"
                    );
                    return Err(e);
                }
            }
        }

        let job = self.state.delete_job(&params.owner, &params.name).await?;
        info!(
            owner = %job.owner,
            job = %job.name,
            records = records.len(),
            "job completed"
        );
        Ok(CompletedJob { job, records })
    }
}
