//! Per-tenant rate limiting ports and application service.
//!
//! Each tenant owns an independent token bucket, so one municipality's load
//! cannot starve another.

mod config;
mod ports;
mod service;

pub use config::RateLimitRule;
pub use ports::{RateLimitDecision, TenantRateLimiter};
pub use service::RateLimitService;
