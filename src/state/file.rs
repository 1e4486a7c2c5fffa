//! JSON file state backend.
//!
//! The document is loaded once on open and rewritten after every mutation
//! (temp file + rename). A failed write leaves both the file and the
//! in-memory copy untouched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Recorder, State, StateData, TemplateProvider};
use crate::error::Result;
use crate::model::{Job, Record, RecordTemplate, User};

pub struct FileState {
    path: PathBuf,
    data: Mutex<StateData>,
}

impl FileState {
    /// Open the state file at `path`, starting empty if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => StateData::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateData::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), users = data.users.len(), "state file loaded");

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut StateData) -> Result<T>) -> Result<T> {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    async fn persist(&self, data: &StateData) -> Result<()> {
        let content = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl State for FileState {
    async fn get_user(&self, name: &str) -> Result<User> {
        self.data.lock().await.get_user(name)
    }

    async fn upsert_user(&self, user: User) -> Result<User> {
        self.mutate(|d| Ok(d.upsert_user(user))).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.data.lock().await.list_users())
    }

    async fn get_job(&self, owner: &str, name: &str) -> Result<Job> {
        self.data.lock().await.get_job(owner, name)
    }

    async fn list_jobs(&self, owner: &str) -> Result<Vec<Job>> {
        Ok(self.data.lock().await.list_jobs(owner))
    }

    async fn create_job_if_missing(&self, job: Job) -> Result<(Job, bool)> {
        {
            let data = self.data.lock().await;
            if let Ok(existing) = data.get_job(&job.owner, &job.name) {
                return Ok((existing, false));
            }
        }
        self.mutate(|d| Ok(d.create_job_if_missing(job))).await
    }

    async fn update_job(&self, job: Job) -> Result<Job> {
        self.mutate(|d| d.update_job(job)).await
    }

    async fn delete_job(&self, owner: &str, name: &str) -> Result<Job> {
        self.mutate(|d| d.delete_job(owner, name)).await
    }
}

#[async_trait]
impl TemplateProvider for FileState {
    async fn list_templates(&self) -> Result<Vec<RecordTemplate>> {
        Ok(self.data.lock().await.templates.clone())
    }

    async fn get_template(&self, name: &str) -> Result<RecordTemplate> {
        self.data.lock().await.get_template(name)
    }
}

#[async_trait]
impl Recorder for FileState {
    async fn save_record(&self, record: Record) -> Result<Record> {
        self.mutate(|d| Ok(d.save_record(record))).await
    }
}
