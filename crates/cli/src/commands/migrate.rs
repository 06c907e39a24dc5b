//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! zagros-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ZAGROS_DATABASE_URL` - `PostgreSQL` connection string
//!
//! Migration files live in `crates/server/migrations/` and are embedded
//! into the binary at compile time.

use super::CommandError;

/// Run all pending database migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
