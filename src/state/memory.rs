//! In-memory state backend.
//!
//! Thread-safe, not persisted across restarts. Also serves as template
//! provider and record sink, which makes it the default for tests.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{Recorder, State, StateData, TemplateProvider};
use crate::error::{Error, Result};
use crate::model::{Job, Record, RecordTemplate, User};

#[derive(Debug, Default)]
pub struct MemoryState {
    data: RwLock<StateData>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StateData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of the whole document.
    pub fn snapshot(&self) -> Result<StateData> {
        Ok(self.read()?.clone())
    }

    /// Records written so far, in order.
    pub fn records(&self) -> Result<Vec<Record>> {
        Ok(self.read()?.records.clone())
    }

    pub fn add_template(&self, template: RecordTemplate) -> Result<()> {
        let mut data = self.write()?;
        data.templates.retain(|t| t.name != template.name);
        data.templates.push(template);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StateData>> {
        self.data
            .read()
            .map_err(|_| Error::Backend("state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StateData>> {
        self.data
            .write()
            .map_err(|_| Error::Backend("state lock poisoned".to_string()))
    }
}

#[async_trait]
impl State for MemoryState {
    async fn get_user(&self, name: &str) -> Result<User> {
        self.read()?.get_user(name)
    }

    async fn upsert_user(&self, user: User) -> Result<User> {
        Ok(self.write()?.upsert_user(user))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.read()?.list_users())
    }

    async fn get_job(&self, owner: &str, name: &str) -> Result<Job> {
        self.read()?.get_job(owner, name)
    }

    async fn list_jobs(&self, owner: &str) -> Result<Vec<Job>> {
        Ok(self.read()?.list_jobs(owner))
    }

    async fn create_job_if_missing(&self, job: Job) -> Result<(Job, bool)> {
        Ok(self.write()?.create_job_if_missing(job))
    }

    async fn update_job(&self, job: Job) -> Result<Job> {
        self.write()?.update_job(job)
    }

    async fn delete_job(&self, owner: &str, name: &str) -> Result<Job> {
        self.write()?.delete_job(owner, name)
    }
}

#[async_trait]
impl TemplateProvider for MemoryState {
    async fn list_templates(&self) -> Result<Vec<RecordTemplate>> {
        Ok(self.read()?.templates.clone())
    }

    async fn get_template(&self, name: &str) -> Result<RecordTemplate> {
        self.read()?.get_template(name)
    }
}

#[async_trait]
impl Recorder for MemoryState {
    async fn save_record(&self, record: Record) -> Result<Record> {
        Ok(self.write()?.save_record(record))
    }
}
