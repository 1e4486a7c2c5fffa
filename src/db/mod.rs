//! Postgres state backend.
//!
//! Users, jobs, templates and records live as JSONB documents keyed by their
//! natural keys; jobs are partitioned by owner. [`Db`] implements
//! [`State`](crate::state::State), [`TemplateProvider`](crate::state::TemplateProvider)
//! and [`Recorder`](crate::state::Recorder) directly (see [`state`]).

pub mod state;

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::{Error, Result};

/// One reconcile loop plus a handful of concurrent checks per user.
const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Connect and bring the schema up to date. This is what the service
    /// and the CLI use; tests call the two steps separately.
    pub async fn open(url: &str) -> Result<Self> {
        let db = Self::connect(url).await?;
        db.migrate().await?;
        info!("postgres state ready");
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Backend(format!("state migration failed: {e}")))
    }

    /// Fails if the pool cannot hand out a working connection.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
