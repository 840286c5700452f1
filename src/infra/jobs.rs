//! Background job queue.
//!
//! Thin producer-side wrapper around apalis Postgres storage; the
//! consumer runs as the `jobs work` CLI command.

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::jobs::EmailJob;

/// Handle for enqueuing background jobs.
pub struct JobQueue {
    email_storage: Mutex<PostgresStorage<EmailJob>>,
}

impl JobQueue {
    /// Connect to the job store, creating the apalis tables if needed.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await
            .map_err(|e| AppError::internal(format!("Failed to connect to job store: {}", e)))?;

        PostgresStorage::setup(&pool)
            .await
            .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

        Ok(Self {
            email_storage: Mutex::new(PostgresStorage::new(pool)),
        })
    }

    /// Enqueue an email for the background worker.
    pub async fn enqueue_email(&self, job: EmailJob) -> AppResult<()> {
        let mut storage = self.email_storage.lock().await;
        storage
            .push(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue email job: {}", e)))?;
        Ok(())
    }
}
