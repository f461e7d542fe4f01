//! Idempotent schema steps for the rental portal, plus the runner used by
//! `rental-admin migrate`.
//!
//! Every statement can run any number of times. When a step fails the runner
//! records it as manual so the operator gets the exact SQL to run by hand.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, pool::PoolConnection};
use tokio::sync::Mutex;

/// Session-level advisory lock key held for the whole migration run.
pub const MIGRATION_LOCK_KEY: i64 = 0x7265_6e74_616c;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStep {
    pub name: &'static str,
    pub sql: &'static str,
}

pub const CREATE_USERS: MigrationStep = MigrationStep {
    name: "create_users_table",
    sql: "CREATE TABLE IF NOT EXISTS users (\
          id UUID PRIMARY KEY, \
          email TEXT NOT NULL UNIQUE, \
          password_hash TEXT NOT NULL, \
          role VARCHAR(20) NOT NULL DEFAULT 'RENTER', \
          created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
};

pub const CREATE_LISTINGS: MigrationStep = MigrationStep {
    name: "create_listings_table",
    sql: "CREATE TABLE IF NOT EXISTS listings (\
          id UUID PRIMARY KEY, \
          owner_id UUID NOT NULL REFERENCES users(id), \
          title TEXT NOT NULL, \
          description TEXT NOT NULL DEFAULT '', \
          address TEXT NOT NULL, \
          city TEXT NOT NULL, \
          monthly_rent INTEGER NOT NULL, \
          bedrooms INTEGER NOT NULL DEFAULT 0, \
          bathrooms INTEGER NOT NULL DEFAULT 0, \
          images TEXT[] NOT NULL DEFAULT '{}', \
          published BOOLEAN NOT NULL DEFAULT false, \
          created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
          updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
};

pub const ADD_STATUS_COLUMN: MigrationStep = MigrationStep {
    name: "add_listing_status_column",
    sql: "ALTER TABLE listings ADD COLUMN IF NOT EXISTS status VARCHAR(20) DEFAULT 'AVAILABLE'",
};

pub const ADD_VERSION_COLUMN: MigrationStep = MigrationStep {
    name: "add_listing_version_column",
    sql: "ALTER TABLE listings ADD COLUMN IF NOT EXISTS version INTEGER NOT NULL DEFAULT 1",
};

pub const BACKFILL_STATUS: MigrationStep = MigrationStep {
    name: "backfill_listing_status",
    sql: "UPDATE listings SET status = 'AVAILABLE' WHERE status IS NULL",
};

/// All steps, in the order they must run.
pub const ALL_STEPS: [MigrationStep; 5] = [
    CREATE_USERS,
    CREATE_LISTINGS,
    ADD_STATUS_COLUMN,
    ADD_VERSION_COLUMN,
    BACKFILL_STATUS,
];

/// Anything that can execute a single SQL statement and report affected rows.
#[async_trait]
pub trait SchemaExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<u64, sqlx::Error>;
}

/// The single connection that holds `MIGRATION_LOCK_KEY`. Every step runs on it.
struct LockedConnection {
    conn: Mutex<PoolConnection<Postgres>>,
}

#[async_trait]
impl SchemaExecutor for LockedConnection {
    async fn execute(&self, sql: &str) -> Result<u64, sqlx::Error> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query(sql).execute(&mut **conn).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Applied { rows_affected: u64 },
    /// Automated execution failed; the statement has to be run by hand.
    Manual { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: MigrationStep,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    /// Rows affected by the named step, if it was applied.
    pub fn rows_affected(&self, name: &str) -> Option<u64> {
        self.steps
            .iter()
            .find(|report| report.step.name == name)
            .and_then(|report| match report.outcome {
                StepOutcome::Applied { rows_affected } => Some(rows_affected),
                StepOutcome::Manual { .. } => None,
            })
    }

    pub fn manual_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|report| matches!(report.outcome, StepOutcome::Manual { .. }))
    }

    pub fn is_complete(&self) -> bool {
        self.manual_steps().next().is_none()
    }
}

/// Runs every step in order. A failed step does not stop the run; it is recorded
/// as manual and the remaining steps are still attempted.
pub async fn run_steps(executor: &dyn SchemaExecutor, steps: &[MigrationStep]) -> MigrationReport {
    let mut report = MigrationReport::default();

    for step in steps {
        let outcome = match executor.execute(step.sql).await {
            Ok(rows_affected) => {
                tracing::info!(step = step.name, rows_affected, "migration step applied");
                StepOutcome::Applied { rows_affected }
            }
            Err(e) => {
                tracing::warn!(step = step.name, error = %e, "migration step failed, manual run required");
                StepOutcome::Manual {
                    error: e.to_string(),
                }
            }
        };
        report.steps.push(StepReport {
            step: *step,
            outcome,
        });
    }

    report
}

/// run_locked
///
/// `run_steps` against Postgres under a session advisory lock, so concurrent
/// runs (parallel test setups, two operators) apply the steps one after the other.
pub async fn run_locked(pool: &PgPool, steps: &[MigrationStep]) -> Result<MigrationReport, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;
    tracing::debug!(lock = MIGRATION_LOCK_KEY, "migration lock acquired");

    let locked = LockedConnection {
        conn: Mutex::new(conn),
    };
    let report = run_steps(&locked, steps).await;

    let mut conn = locked.conn.into_inner();
    if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await
    {
        // A pooled connection must not keep the lock; closing it releases it.
        drop(conn.detach());
        return Err(e);
    }

    Ok(report)
}
