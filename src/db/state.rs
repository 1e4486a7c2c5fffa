//! State, template and record operations on Postgres.

use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::Db;
use crate::error::{Error, Result};
use crate::model::{Job, Record, RecordTemplate, User};
use crate::state::{Recorder, State, TemplateProvider};

#[async_trait]
impl State for Db {
    async fn get_user(&self, name: &str) -> Result<User> {
        let row: Option<(Json<User>,)> = sqlx::query_as("SELECT data FROM users WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;

        row.map(|(Json(user),)| user)
            .ok_or_else(|| Error::NotFound(format!("user '{name}'")))
    }

    async fn upsert_user(&self, user: User) -> Result<User> {
        sqlx::query(
            "INSERT INTO users (name, inactive, data, updated_at)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (name) DO UPDATE
             SET inactive = EXCLUDED.inactive, data = EXCLUDED.data, updated_at = now()",
        )
        .bind(&user.name)
        .bind(user.inactive)
        .bind(Json(&user))
        .execute(self.pool())
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<(Json<User>,)> = sqlx::query_as("SELECT data FROM users ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(Json(user),)| user).collect())
    }

    async fn get_job(&self, owner: &str, name: &str) -> Result<Job> {
        let row: Option<(Json<Job>,)> =
            sqlx::query_as("SELECT data FROM jobs WHERE owner = $1 AND name = $2")
                .bind(owner)
                .bind(name)
                .fetch_optional(self.pool())
                .await?;

        row.map(|(Json(job),)| job)
            .ok_or_else(|| Error::NotFound(format!("job '{name}' of '{owner}'")))
    }

    async fn list_jobs(&self, owner: &str) -> Result<Vec<Job>> {
        let rows: Vec<(Json<Job>,)> =
            sqlx::query_as("SELECT data FROM jobs WHERE owner = $1 ORDER BY created_at, name")
                .bind(owner)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(Json(job),)| job).collect())
    }

    async fn create_job_if_missing(&self, job: Job) -> Result<(Job, bool)> {
        // The primary key on (owner, name) settles concurrent creates.
        let inserted: Option<(Json<Job>,)> = sqlx::query_as(
            "INSERT INTO jobs (owner, name, data, created_at, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (owner, name) DO NOTHING
             RETURNING data",
        )
        .bind(&job.owner)
        .bind(&job.name)
        .bind(Json(&job))
        .bind(job.created_at)
        .fetch_optional(self.pool())
        .await?;

        match inserted {
            Some((Json(job),)) => Ok((job, true)),
            None => Ok((self.get_job(&job.owner, &job.name).await?, false)),
        }
    }

    async fn update_job(&self, job: Job) -> Result<Job> {
        let rows_affected = sqlx::query(
            "UPDATE jobs SET data = $1, updated_at = now() WHERE owner = $2 AND name = $3",
        )
        .bind(Json(&job))
        .bind(&job.owner)
        .bind(&job.name)
        .execute(self.pool())
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!(
                "job '{}' of '{}'",
                job.name, job.owner
            )));
        }
        Ok(job)
    }

    async fn delete_job(&self, owner: &str, name: &str) -> Result<Job> {
        let row: Option<(Json<Job>,)> =
            sqlx::query_as("DELETE FROM jobs WHERE owner = $1 AND name = $2 RETURNING data")
                .bind(owner)
                .bind(name)
                .fetch_optional(self.pool())
                .await?;

        row.map(|(Json(job),)| job)
            .ok_or_else(|| Error::NotFound(format!("job '{name}' of '{owner}'")))
    }
}

#[async_trait]
impl TemplateProvider for Db {
    async fn list_templates(&self) -> Result<Vec<RecordTemplate>> {
        let rows: Vec<(Json<RecordTemplate>,)> =
            sqlx::query_as("SELECT data FROM record_templates ORDER BY name")
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(Json(t),)| t).collect())
    }

    async fn get_template(&self, name: &str) -> Result<RecordTemplate> {
        let row: Option<(Json<RecordTemplate>,)> =
            sqlx::query_as("SELECT data FROM record_templates WHERE name = $1")
                .bind(name)
                .fetch_optional(self.pool())
                .await?;

        row.map(|(Json(t),)| t)
            .ok_or_else(|| Error::NotFound(format!("template '{name}'")))
    }
}

#[async_trait]
impl Recorder for Db {
    async fn save_record(&self, record: Record) -> Result<Record> {
        sqlx::query(
            "INSERT INTO records (id, data, start_at, end_at, created_at)
             VALUES ($1, $2, $3, $4, now())",
        )
        .bind(Uuid::new_v4())
        .bind(Json(&record))
        .bind(record.start)
        .bind(record.end)
        .execute(self.pool())
        .await?;
        Ok(record)
    }
}
