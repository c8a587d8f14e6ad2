//! Middleware module for the journal server

pub mod rate_limit;

pub use rate_limit::{webhook_rate_limit_middleware, RateLimiter};
