//! HTTP middleware.

pub mod auth;

pub use auth::{check_basic_auth, constant_time_compare, BasicAuthLayer};
