//! Operator commands behind the `rental-admin` binary: schema migration, table
//! inspection and user maintenance.

use clap::{Parser, Subcommand, ValueEnum};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::{Role, encode_session_token},
    config::{AppConfig, ConfigError},
    migrations::{ALL_STEPS, MigrationReport, MigrationStep, StepOutcome, run_locked},
};

const MIN_PASSWORD_LEN: usize = 8;

/// Longest lifetime `issue-token` will sign (30 days).
pub const MAX_TOKEN_TTL_HOURS: i64 = 720;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("no user with email `{0}`")]
    UserNotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} migration step(s) must be run manually")]
    ManualStepsRequired(usize),
}

#[derive(Debug, Parser)]
#[command(name = "rental-admin")]
#[command(about = "Operator commands for the rental portal database")]
#[command(version)]
pub struct AdminCli {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum AdminCommand {
    #[command(about = "Apply the idempotent schema steps")]
    Migrate {
        #[arg(long, help = "Print the SQL without executing it")]
        dry_run: bool,
    },

    #[command(about = "Show the column layout and row count of a table")]
    Inspect {
        #[arg(value_enum)]
        table: Table,
    },

    #[command(about = "Create a user with a bcrypt-hashed password")]
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "RENTER", help = "ADMIN, LANDLORD or RENTER")]
        role: Role,
    },

    #[command(about = "Replace a user's password")]
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    #[command(about = "Change a user's role")]
    SetRole {
        #[arg(long)]
        email: String,
        #[arg(long, help = "ADMIN, LANDLORD or RENTER")]
        role: Role,
    },

    #[command(about = "Mint a development session token for a user")]
    IssueToken {
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

/// Tables `inspect` may look at. Closed so the name can go into SQL as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Table {
    Users,
    Listings,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Listings => "listings",
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, AdminError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AdminError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub fn token_ttl(hours: i64) -> Result<chrono::Duration, AdminError> {
    if hours <= 0 || hours > MAX_TOKEN_TTL_HOURS {
        return Err(AdminError::Validation(format!(
            "ttl-hours must be between 1 and {}",
            MAX_TOKEN_TTL_HOURS
        )));
    }
    chrono::Duration::try_hours(hours)
        .ok_or_else(|| AdminError::Validation(format!("ttl-hours {} is out of range", hours)))
}

/// SQL an operator has to run by hand for every step the runner could not apply.
pub fn manual_sql(report: &MigrationReport) -> Vec<String> {
    report
        .manual_steps()
        .map(|r| format!("-- {}\n{};", r.step.name, r.step.sql))
        .collect()
}

pub fn dry_run_plan(steps: &[MigrationStep]) -> String {
    steps
        .iter()
        .map(|step| format!("-- {}\n{};", step.name, step.sql))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Executes one parsed command against the database.
pub async fn run(command: AdminCommand, pool: &PgPool, config: &AppConfig) -> Result<(), AdminError> {
    match command {
        AdminCommand::Migrate { dry_run: true } => {
            println!("{}", dry_run_plan(&ALL_STEPS));
            Ok(())
        }
        AdminCommand::Migrate { dry_run: false } => migrate(pool).await,
        AdminCommand::Inspect { table } => inspect(pool, table).await,
        AdminCommand::CreateUser {
            email,
            password,
            role,
        } => {
            let hash = hash_password(&password)?;
            let id = sqlx::query_scalar::<_, Uuid>(
                "INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(&email)
            .bind(hash)
            .bind(role.as_str())
            .fetch_one(pool)
            .await?;
            tracing::info!(user_id = %id, %email, %role, "user created");
            println!("{}", id);
            Ok(())
        }
        AdminCommand::ResetPassword { email, password } => {
            let hash = hash_password(&password)?;
            let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE email = $1")
                .bind(&email)
                .bind(hash)
                .execute(pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(AdminError::UserNotFound(email));
            }
            tracing::info!(%email, "password reset");
            Ok(())
        }
        AdminCommand::SetRole { email, role } => {
            let result = sqlx::query("UPDATE users SET role = $2 WHERE email = $1")
                .bind(&email)
                .bind(role.as_str())
                .execute(pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(AdminError::UserNotFound(email));
            }
            tracing::info!(%email, %role, "role changed");
            Ok(())
        }
        AdminCommand::IssueToken { email, ttl_hours } => {
            let ttl = token_ttl(ttl_hours)?;
            let (id, raw_role) = sqlx::query_as::<_, (Uuid, String)>(
                "SELECT id, role FROM users WHERE email = $1",
            )
            .bind(&email)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AdminError::UserNotFound(email.clone()))?;

            let role: Role = raw_role
                .parse()
                .map_err(|e: crate::auth::InvalidRole| AdminError::Validation(e.to_string()))?;
            let token = encode_session_token(id, role, ttl, &config.jwt_secret)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn migrate(pool: &PgPool) -> Result<(), AdminError> {
    let report = run_locked(pool, &ALL_STEPS).await?;

    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Applied { rows_affected } => {
                println!("applied  {} ({} rows)", step.step.name, rows_affected)
            }
            StepOutcome::Manual { error } => println!("MANUAL   {} ({})", step.step.name, error),
        }
    }

    let manual = manual_sql(&report);
    if manual.is_empty() {
        return Ok(());
    }

    println!("\nRun the following by hand:\n");
    for sql in &manual {
        println!("{}\n", sql);
    }
    Err(AdminError::ManualStepsRequired(manual.len()))
}

async fn inspect(pool: &PgPool, table: Table) -> Result<(), AdminError> {
    let columns = sqlx::query_as::<_, (String, String, String, Option<String>)>(
        "SELECT column_name::text, data_type::text, is_nullable::text, column_default::text \
         FROM information_schema.columns WHERE table_name = $1 ORDER BY ordinal_position",
    )
    .bind(table.as_str())
    .fetch_all(pool)
    .await?;

    if columns.is_empty() {
        println!("table `{}` does not exist", table.as_str());
        return Ok(());
    }

    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table.as_str()))
        .fetch_one(pool)
        .await?;

    println!("{} ({} rows)", table.as_str(), count);
    for (name, data_type, nullable, default) in columns {
        println!(
            "  {:<16} {:<28} nullable={:<3} default={}",
            name,
            data_type,
            nullable,
            default.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
