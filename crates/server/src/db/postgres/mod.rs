//! `PostgreSQL` implementations of the store contracts.
//!
//! Queries use the runtime sqlx API with `FromRow` row structs and map
//! rows into domain types at the boundary; a stored value that no longer
//! parses surfaces as [`RepositoryError::DataCorruption`] rather than a
//! panic.

mod activity;
mod orders;
mod products;
mod users;
mod verifications;

pub use activity::PgActivityStore;
pub use orders::PgOrderStore;
pub use products::PgProductStore;
pub use users::PgUserStore;
pub use verifications::PgVerificationStore;
