//! Clinic Auth: failed-attempt rate limiting, password verification,
//! JWT issuance/validation and the login flow that ties them together.

pub mod config;
pub mod error;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod token;

pub use config::{AuthConfig, RateLimitConfig, RateLimitPolicy};
pub use error::AuthError;
pub use rate_limit::{
    MemoryRateLimitStore, RateLimitAction, RateLimitEntry, RateLimitStats, RateLimitStatus,
    RateLimitStore, RateLimiter, spawn_sweeper,
};
pub use service::{AuthService, LoginInput, LoginOutput, RefreshInput, RegisterInput};
pub use token::{AccessTokenClaims, ValidatedClaims};
