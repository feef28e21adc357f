//! Named run-locks for scheduled jobs
//!
//! A job takes a PostgreSQL session advisory lock keyed by its name. The
//! lock lives on one dedicated connection; a second process asking for the
//! same name gets `None` and should exit without doing any work.

use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use tracing::{debug, warn};

use crate::error::DatabaseError;
use crate::pool::DatabasePool;

/// Holds an advisory lock until released or dropped
pub struct JobLock {
    name: String,
    conn: PoolConnection<Postgres>,
}

impl JobLock {
    /// Tries to take the lock for `name` without waiting
    pub async fn try_acquire(pool: &DatabasePool, name: &str) -> Result<Option<Self>, DatabaseError> {
        let mut conn = pool.acquire().await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock(hashtext($1))")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;

        if !acquired {
            debug!(job = name, "run-lock held elsewhere");
            return Ok(None);
        }

        // A dropped guard closes its connection, which ends the session and its locks
        conn.close_on_drop();
        debug!(job = name, "run-lock acquired");
        Ok(Some(Self {
            name: name.to_string(),
            conn,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Releases the lock explicitly
    pub async fn release(mut self) -> Result<(), DatabaseError> {
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock(hashtext($1))")
            .bind(&self.name)
            .fetch_one(&mut *self.conn)
            .await?;
        if !released {
            warn!(job = %self.name, "run-lock was not held at release");
        }
        Ok(())
    }
}
