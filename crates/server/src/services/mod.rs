//! Business services.
//!
//! Each service owns one slice of the domain and talks to storage and
//! gateways exclusively through the contracts in [`crate::db`] and
//! [`crate::gateways`]. Route handlers stay thin: parse input, call a
//! service, translate the error.

pub mod accounts;
pub mod activity;
pub mod orders;
pub mod reports;
pub mod verification;

pub use accounts::{AccountError, AccountService, AuthTokens};
pub use activity::ActivityLogger;
pub use orders::{
    AccessoryInput, CallbackStatus, CartItemInput, OrderError, OrderListQuery, OrderService,
    PaymentOutcome, PaymentStarted, ValidatedCart,
};
pub use reports::{FinancialQuery, GroupBy, ReportPeriod, ReportService};
pub use verification::{CodeIssued, VerificationError, VerificationService};
