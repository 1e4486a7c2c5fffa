//! State capabilities consumed by the engines.
//!
//! One abstraction, several backends: in-memory, JSON file, and Postgres
//! (see [`crate::db`]). Backends are picked at startup from configuration;
//! nothing in the engines knows which one it is talking to.

mod data;
mod file;
mod memory;

pub use data::StateData;
pub use file::FileState;
pub use memory::MemoryState;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Job, Record, RecordTemplate, User};

/// Users and jobs, partitioned by owner.
#[async_trait]
pub trait State: Send + Sync {
    /// Fails with `NotFound` if the user does not exist.
    async fn get_user(&self, name: &str) -> Result<User>;

    /// Insert or replace a user.
    async fn upsert_user(&self, user: User) -> Result<User>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Fails with `NotFound` if the job does not exist.
    async fn get_job(&self, owner: &str, name: &str) -> Result<Job>;

    async fn list_jobs(&self, owner: &str) -> Result<Vec<Job>>;

    /// Store `job` unless a job with the same `(owner, name)` exists.
    /// Returns the stored job and whether it was created.
    async fn create_job_if_missing(&self, job: Job) -> Result<(Job, bool)>;

    /// Replace an existing job. Fails with `NotFound` if it does not exist.
    async fn update_job(&self, job: Job) -> Result<Job>;

    /// Remove a job and return it. Fails with `NotFound` if it does not exist.
    async fn delete_job(&self, owner: &str, name: &str) -> Result<Job>;
}

/// Named record templates.
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    async fn list_templates(&self) -> Result<Vec<RecordTemplate>>;

    /// Fails with `NotFound` if there is no template called `name`.
    async fn get_template(&self, name: &str) -> Result<RecordTemplate>;

    async fn has_template(&self, name: &str) -> Result<bool> {
        match self.get_template(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Archival sink for completed time records.
#[async_trait]
pub trait Recorder: Send + Sync {
    async fn save_record(&self, record: Record) -> Result<Record>;
}
