//! Plain state document shared by the memory and file backends.
//!
//! All operations are synchronous and pure over the document; the backends
//! add locking and persistence around them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Job, Record, RecordTemplate, User};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    /// owner -> job name -> job
    #[serde(default)]
    pub jobs: BTreeMap<String, BTreeMap<String, Job>>,
    #[serde(default)]
    pub templates: Vec<RecordTemplate>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl StateData {
    pub fn get_user(&self, name: &str) -> Result<User> {
        self.users
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user '{name}'")))
    }

    pub fn upsert_user(&mut self, user: User) -> User {
        self.users.insert(user.name.clone(), user.clone());
        user
    }

    pub fn list_users(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    pub fn get_job(&self, owner: &str, name: &str) -> Result<Job> {
        self.jobs
            .get(owner)
            .and_then(|jobs| jobs.get(name))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("job '{name}' of '{owner}'")))
    }

    pub fn list_jobs(&self, owner: &str) -> Vec<Job> {
        self.jobs
            .get(owner)
            .map(|jobs| jobs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn create_job_if_missing(&mut self, job: Job) -> (Job, bool) {
        let jobs = self.jobs.entry(job.owner.clone()).or_default();
        match jobs.get(&job.name) {
            Some(existing) => (existing.clone(), false),
            None => {
                jobs.insert(job.name.clone(), job.clone());
                (job, true)
            }
        }
    }

    pub fn update_job(&mut self, job: Job) -> Result<Job> {
        let slot = self
            .jobs
            .get_mut(&job.owner)
            .and_then(|jobs| jobs.get_mut(&job.name))
            .ok_or_else(|| Error::NotFound(format!("job '{}' of '{}'", job.name, job.owner)))?;
        *slot = job.clone();
        Ok(job)
    }

    pub fn delete_job(&mut self, owner: &str, name: &str) -> Result<Job> {
        let jobs = self
            .jobs
            .get_mut(owner)
            .ok_or_else(|| Error::NotFound(format!("job '{name}' of '{owner}'")))?;
        let deleted = jobs
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("job '{name}' of '{owner}'")))?;
        if jobs.is_empty() {
            self.jobs.remove(owner);
        }
        Ok(deleted)
    }

    pub fn get_template(&self, name: &str) -> Result<RecordTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("template '{name}'")))
    }

    pub fn save_record(&mut self, record: Record) -> Record {
        self.records.push(record.clone());
        record
    }
}
