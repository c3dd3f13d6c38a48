//! Authentication and rate-limit configuration.

use chrono::Duration;
use serde::Deserialize;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Session (refresh token) lifetime in seconds (default: 8 hours).
    pub session_lifetime_secs: u64,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Optional pepper prepended to passwords before Argon2id verification.
    pub pepper: Option<String>,
    /// Minimum password length accepted at registration.
    pub min_password_length: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            access_token_lifetime_secs: 900,
            session_lifetime_secs: 28_800,
            jwt_issuer: "clinic".into(),
            pepper: None,
            min_password_length: 8,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Window, attempt ceiling and block length for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitPolicy {
    pub window_secs: u64,
    pub max_attempts: u32,
    pub block_secs: u64,
}

impl RateLimitPolicy {
    pub const fn new(window_secs: u64, max_attempts: u32, block_secs: u64) -> Self {
        Self {
            window_secs,
            max_attempts,
            block_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs as i64)
    }

    pub fn block(&self) -> Duration {
        Duration::seconds(self.block_secs as i64)
    }
}

/// Per-action policies plus housekeeping intervals.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub login: RateLimitPolicy,
    pub password_reset: RateLimitPolicy,
    pub registration: RateLimitPolicy,
    pub two_factor: RateLimitPolicy,
    /// How often the background sweep runs (default: 5 minutes).
    pub sweep_interval_secs: u64,
    /// Entries whose first attempt is older than this are dropped by the
    /// sweep regardless of state (default: 2 hours).
    pub max_entry_age_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login: RateLimitPolicy::new(15 * 60, 5, 30 * 60),
            password_reset: RateLimitPolicy::new(60 * 60, 3, 60 * 60),
            registration: RateLimitPolicy::new(60 * 60, 5, 60 * 60),
            two_factor: RateLimitPolicy::new(5 * 60, 5, 15 * 60),
            sweep_interval_secs: 300,
            max_entry_age_secs: 7200,
        }
    }
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn max_entry_age(&self) -> Duration {
        Duration::seconds(self.max_entry_age_secs as i64)
    }
}
