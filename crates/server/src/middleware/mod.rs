//! HTTP middleware.

pub mod rate_limit;
pub mod request_id;

pub use rate_limit::{api_rate_limiter, login_rate_limiter, sms_rate_limiter};
pub use request_id::request_id_middleware;
