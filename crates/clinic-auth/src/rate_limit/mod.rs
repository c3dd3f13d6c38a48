//! Failed-attempt rate limiting for authentication-adjacent actions.
//!
//! Each `(action, identifier)` pair gets a fixed window that opens on the
//! first failed attempt. Reaching the action's attempt ceiling inside the
//! window blocks the pair for the action's block duration. Checking a pair
//! never mutates state; only failures, successes and the sweep do.

mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use store::{MemoryRateLimitStore, RateLimitStore};

use crate::config::{RateLimitConfig, RateLimitPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitAction {
    Login,
    PasswordReset,
    Registration,
    TwoFactor,
}

impl RateLimitAction {
    pub const ALL: [RateLimitAction; 4] = [
        RateLimitAction::Login,
        RateLimitAction::PasswordReset,
        RateLimitAction::Registration,
        RateLimitAction::TwoFactor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RateLimitAction::Login => "login",
            RateLimitAction::PasswordReset => "password_reset",
            RateLimitAction::Registration => "registration",
            RateLimitAction::TwoFactor => "two_factor",
        }
    }

    fn key(self, identifier: &str) -> String {
        format!("{}:{identifier}", self.as_str())
    }
}

impl fmt::Display for RateLimitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure counter for one `action:identifier` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub first_attempt_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl RateLimitEntry {
    fn first(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            first_attempt_at: now,
            blocked_until: None,
        }
    }

    fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }

    fn block_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until <= now)
    }

    fn window_elapsed_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.first_attempt_at > window
    }
}

/// Outcome of a check or a recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub blocked: bool,
    pub remaining_attempts: u32,
    pub blocked_until: Option<DateTime<Utc>>,
    /// User-facing text; empty when there is nothing to say.
    pub message: String,
}

impl RateLimitStatus {
    fn open(remaining_attempts: u32, message: String) -> Self {
        Self {
            blocked: false,
            remaining_attempts,
            blocked_until: None,
            message,
        }
    }

    fn blocked(until: DateTime<Utc>, message: String) -> Self {
        Self {
            blocked: true,
            remaining_attempts: 0,
            blocked_until: Some(until),
            message,
        }
    }
}

/// Snapshot of the store for administrative views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    pub total_entries: usize,
    pub blocked_entries: usize,
    pub entries_by_action: BTreeMap<String, usize>,
}

fn plural(n: i64) -> &'static str {
    if n > 1 { "s" } else { "" }
}

/// Whole minutes, rounded up.
fn ceil_minutes(d: Duration) -> i64 {
    let ms = d.num_milliseconds().max(0);
    (ms + 59_999) / 60_000
}

fn remaining_message(remaining: u32) -> String {
    let s = plural(i64::from(remaining));
    format!("{remaining} attempt{s} remaining.")
}

pub struct RateLimiter<S: RateLimitStore = MemoryRateLimitStore> {
    store: S,
    config: RateLimitConfig,
}

impl RateLimiter<MemoryRateLimitStore> {
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(MemoryRateLimitStore::new(), config)
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn policy(&self, action: RateLimitAction) -> RateLimitPolicy {
        match action {
            RateLimitAction::Login => self.config.login,
            RateLimitAction::PasswordReset => self.config.password_reset,
            RateLimitAction::Registration => self.config.registration,
            RateLimitAction::TwoFactor => self.config.two_factor,
        }
    }

    pub async fn is_rate_limited(&self, action: RateLimitAction, identifier: &str) -> RateLimitStatus {
        self.is_rate_limited_at(action, identifier, Utc::now()).await
    }

    pub async fn is_rate_limited_at(
        &self,
        action: RateLimitAction,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> RateLimitStatus {
        let policy = self.policy(action);
        let Some(entry) = self.store.get(&action.key(identifier)).await else {
            return RateLimitStatus::open(policy.max_attempts, String::new());
        };

        if let Some(until) = entry.blocked_until {
            if until > now {
                let minutes = ceil_minutes(until - now);
                return RateLimitStatus::blocked(
                    until,
                    format!(
                        "Too many attempts. Try again in {minutes} minute{}.",
                        plural(minutes)
                    ),
                );
            }
            // An expired block leaves nothing to carry over.
            return RateLimitStatus::open(policy.max_attempts, String::new());
        }

        if entry.window_elapsed_at(now, policy.window()) {
            return RateLimitStatus::open(policy.max_attempts, String::new());
        }

        let remaining = policy.max_attempts.saturating_sub(entry.count);
        let message = if remaining <= 2 {
            remaining_message(remaining)
        } else {
            String::new()
        };
        RateLimitStatus::open(remaining, message)
    }

    pub async fn record_failed_attempt(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> RateLimitStatus {
        self.record_failed_attempt_at(action, identifier, Utc::now())
            .await
    }

    pub async fn record_failed_attempt_at(
        &self,
        action: RateLimitAction,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> RateLimitStatus {
        let policy = self.policy(action);
        let window = policy.window();

        let entry = self
            .store
            .upsert(&action.key(identifier), |current| {
                // The window only ages out failures of an unblocked pair.
                let mut next = match current {
                    Some(e)
                        if e.is_blocked_at(now)
                            || (!e.window_elapsed_at(now, window) && !e.block_expired_at(now)) =>
                    {
                        RateLimitEntry {
                            count: e.count.saturating_add(1),
                            ..e.clone()
                        }
                    }
                    _ => RateLimitEntry::first(now),
                };
                if next.count >= policy.max_attempts {
                    next.blocked_until = Some(now + policy.block());
                }
                next
            })
            .await;

        match entry.blocked_until {
            Some(until) => {
                warn!(
                    action = %action,
                    identifier,
                    attempts = entry.count,
                    blocked_until = %until,
                    "Rate limit exceeded, identifier blocked"
                );
                let minutes = ceil_minutes(policy.block());
                RateLimitStatus::blocked(
                    until,
                    format!("Too many attempts. Blocked for {minutes} minutes."),
                )
            }
            None => {
                let remaining = policy.max_attempts.saturating_sub(entry.count);
                RateLimitStatus::open(remaining, remaining_message(remaining))
            }
        }
    }

    /// Forget all failures for the pair, e.g. after a successful login.
    pub async fn clear_rate_limit(&self, action: RateLimitAction, identifier: &str) {
        self.store.remove(&action.key(identifier)).await;
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    /// Drop entries whose block has expired or whose first attempt is older
    /// than the configured maximum entry age.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let max_age = self.config.max_entry_age();
        let removed = self
            .store
            .retain(|_, entry| {
                !(entry.block_expired_at(now) || now - entry.first_attempt_at > max_age)
            })
            .await;
        if removed > 0 {
            debug!(removed, "Swept stale rate-limit entries");
        }
        removed
    }

    pub async fn stats(&self) -> RateLimitStats {
        self.stats_at(Utc::now()).await
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> RateLimitStats {
        let entries = self.store.entries().await;
        let mut stats = RateLimitStats {
            total_entries: entries.len(),
            ..Default::default()
        };
        for (key, entry) in &entries {
            let action = key.split(':').next().unwrap_or_default();
            *stats.entries_by_action.entry(action.to_string()).or_default() += 1;
            if entry.is_blocked_at(now) {
                stats.blocked_entries += 1;
            }
        }
        stats
    }
}

/// Run [`RateLimiter::sweep`] every `every` until the returned handle is
/// aborted.
pub fn spawn_sweeper<S>(limiter: Arc<RateLimiter<S>>, every: std::time::Duration) -> JoinHandle<()>
where
    S: RateLimitStore + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.sweep().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::in_memory(RateLimitConfig::default())
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn unknown_identifier_is_open_with_full_budget() {
        let rl = limiter();
        let status = rl.is_rate_limited_at(RateLimitAction::Login, "alice", t0()).await;
        assert!(!status.blocked);
        assert_eq!(status.remaining_attempts, 5);
        assert!(status.message.is_empty());
        assert_eq!(status.blocked_until, None);
    }

    #[tokio::test]
    async fn max_failures_block_for_block_duration() {
        let rl = limiter();
        let now = t0();
        let mut last = None;
        for i in 0..5 {
            last = Some(
                rl.record_failed_attempt_at(
                    RateLimitAction::Login,
                    "alice",
                    now + Duration::seconds(i),
                )
                .await,
            );
        }
        let last = last.unwrap();
        assert!(last.blocked);
        assert_eq!(last.message, "Too many attempts. Blocked for 30 minutes.");
        let expected = now + Duration::seconds(4) + Duration::minutes(30);
        assert_eq!(last.blocked_until, Some(expected));

        let check = rl
            .is_rate_limited_at(RateLimitAction::Login, "alice", now + Duration::seconds(5))
            .await;
        assert!(check.blocked);
        assert_eq!(check.remaining_attempts, 0);
        assert_eq!(check.blocked_until, Some(expected));
    }

    #[tokio::test]
    async fn sixth_login_is_blocked_with_minute_countdown() {
        let rl = limiter();
        let now = t0();
        for _ in 0..5 {
            rl.record_failed_attempt_at(RateLimitAction::Login, "alice", now)
                .await;
        }

        let sixth = rl
            .is_rate_limited_at(RateLimitAction::Login, "alice", now + Duration::seconds(90))
            .await;
        assert!(sixth.blocked);
        // 28.5 minutes left rounds up to 29.
        assert_eq!(sixth.message, "Too many attempts. Try again in 29 minutes.");

        let last_minute = rl
            .is_rate_limited_at(
                RateLimitAction::Login,
                "alice",
                now + Duration::minutes(29) + Duration::seconds(30),
            )
            .await;
        assert_eq!(last_minute.message, "Too many attempts. Try again in 1 minute.");
    }

    #[tokio::test]
    async fn checking_does_not_consume_attempts() {
        let rl = limiter();
        for _ in 0..10 {
            rl.is_rate_limited_at(RateLimitAction::Login, "bob", t0()).await;
        }
        let status = rl.is_rate_limited_at(RateLimitAction::Login, "bob", t0()).await;
        assert_eq!(status.remaining_attempts, 5);
        assert_eq!(rl.stats_at(t0()).await.total_entries, 0);
    }

    #[tokio::test]
    async fn warning_appears_when_two_or_fewer_attempts_remain() {
        let rl = limiter();
        let now = t0();
        for _ in 0..2 {
            rl.record_failed_attempt_at(RateLimitAction::Login, "carol", now)
                .await;
        }
        let three_left = rl.is_rate_limited_at(RateLimitAction::Login, "carol", now).await;
        assert_eq!(three_left.remaining_attempts, 3);
        assert!(three_left.message.is_empty());

        let recorded = rl
            .record_failed_attempt_at(RateLimitAction::Login, "carol", now)
            .await;
        assert_eq!(recorded.remaining_attempts, 2);
        assert_eq!(recorded.message, "2 attempts remaining.");

        rl.record_failed_attempt_at(RateLimitAction::Login, "carol", now)
            .await;
        let one_left = rl.is_rate_limited_at(RateLimitAction::Login, "carol", now).await;
        assert_eq!(one_left.message, "1 attempt remaining.");
    }

    #[tokio::test]
    async fn clear_unblocks_immediately() {
        let rl = limiter();
        let now = t0();
        for _ in 0..3 {
            rl.record_failed_attempt_at(RateLimitAction::PasswordReset, "dave", now)
                .await;
        }
        assert!(
            rl.is_rate_limited_at(RateLimitAction::PasswordReset, "dave", now)
                .await
                .blocked
        );

        rl.clear_rate_limit(RateLimitAction::PasswordReset, "dave").await;
        let status = rl
            .is_rate_limited_at(RateLimitAction::PasswordReset, "dave", now)
            .await;
        assert!(!status.blocked);
        assert_eq!(status.remaining_attempts, 3);
    }

    #[tokio::test]
    async fn attempt_after_window_resets_count() {
        let rl = limiter();
        let now = t0();
        for _ in 0..4 {
            rl.record_failed_attempt_at(RateLimitAction::Login, "erin", now)
                .await;
        }

        let later = now + Duration::minutes(16);
        let status = rl
            .is_rate_limited_at(RateLimitAction::Login, "erin", later)
            .await;
        assert_eq!(status.remaining_attempts, 5);

        let recorded = rl
            .record_failed_attempt_at(RateLimitAction::Login, "erin", later)
            .await;
        assert!(!recorded.blocked);
        assert_eq!(recorded.remaining_attempts, 4);
    }

    #[tokio::test]
    async fn expired_block_starts_a_fresh_window() {
        let rl = limiter();
        let now = t0();
        for _ in 0..5 {
            rl.record_failed_attempt_at(RateLimitAction::TwoFactor, "frank", now)
                .await;
        }
        let after_block = now + Duration::minutes(15);
        let status = rl
            .is_rate_limited_at(RateLimitAction::TwoFactor, "frank", after_block)
            .await;
        assert!(!status.blocked);
        assert_eq!(status.remaining_attempts, 5);

        let recorded = rl
            .record_failed_attempt_at(RateLimitAction::TwoFactor, "frank", after_block)
            .await;
        assert!(!recorded.blocked);
        assert_eq!(recorded.remaining_attempts, 4);
    }

    #[tokio::test]
    async fn failure_after_window_keeps_an_active_block() {
        let rl = limiter();
        let now = t0();
        for i in 0..5 {
            rl.record_failed_attempt_at(RateLimitAction::Login, "gus", now + Duration::minutes(3 * i))
                .await;
        }
        let blocked_until = now + Duration::minutes(12) + Duration::minutes(30);

        // Window (15 min) has elapsed since the first failure; the block has not.
        let later = now + Duration::minutes(16);
        let recorded = rl
            .record_failed_attempt_at(RateLimitAction::Login, "gus", later)
            .await;
        assert!(recorded.blocked);
        assert_eq!(recorded.blocked_until, Some(later + Duration::minutes(30)));
        assert!(recorded.blocked_until > Some(blocked_until));

        let check = rl
            .is_rate_limited_at(RateLimitAction::Login, "gus", later + Duration::minutes(1))
            .await;
        assert!(check.blocked);
        assert_eq!(check.remaining_attempts, 0);
    }

    #[tokio::test]
    async fn actions_and_identifiers_are_independent() {
        let rl = limiter();
        let now = t0();
        for _ in 0..5 {
            rl.record_failed_attempt_at(RateLimitAction::Login, "10.0.0.1", now)
                .await;
        }
        assert!(
            rl.is_rate_limited_at(RateLimitAction::Login, "10.0.0.1", now)
                .await
                .blocked
        );
        assert!(
            !rl.is_rate_limited_at(RateLimitAction::Login, "10.0.0.2", now)
                .await
                .blocked
        );
        assert!(
            !rl.is_rate_limited_at(RateLimitAction::Registration, "10.0.0.1", now)
                .await
                .blocked
        );
    }

    #[tokio::test]
    async fn sweep_drops_expired_blocks_and_old_entries() {
        let rl = limiter();
        let now = t0();

        // Blocked for 60 minutes starting at `now`.
        for _ in 0..3 {
            rl.record_failed_attempt_at(RateLimitAction::PasswordReset, "expired-block", now)
                .await;
        }
        // Single failure, never blocked.
        rl.record_failed_attempt_at(RateLimitAction::Login, "old", now)
            .await;
        // Recent failure.
        rl.record_failed_attempt_at(
            RateLimitAction::Login,
            "recent",
            now + Duration::minutes(100),
        )
        .await;

        assert_eq!(rl.sweep_at(now + Duration::minutes(30)).await, 0);

        let removed = rl.sweep_at(now + Duration::minutes(121)).await;
        assert_eq!(removed, 2);

        let stats = rl.stats_at(now + Duration::minutes(121)).await;
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.entries_by_action.get("login"), Some(&1));
    }

    #[tokio::test]
    async fn stats_count_blocked_entries_per_action() {
        let rl = limiter();
        let now = t0();
        for _ in 0..5 {
            rl.record_failed_attempt_at(RateLimitAction::Login, "gina", now)
                .await;
        }
        rl.record_failed_attempt_at(RateLimitAction::Login, "hank", now)
            .await;
        rl.record_failed_attempt_at(RateLimitAction::Registration, "hank", now)
            .await;

        let stats = rl.stats_at(now).await;
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.blocked_entries, 1);
        assert_eq!(stats.entries_by_action.get("login"), Some(&2));
        assert_eq!(stats.entries_by_action.get("registration"), Some(&1));
    }

    #[tokio::test]
    async fn custom_policy_is_honoured() {
        let config = RateLimitConfig {
            login: RateLimitPolicy::new(60, 2, 120),
            ..Default::default()
        };
        let rl = RateLimiter::in_memory(config);
        let now = t0();
        rl.record_failed_attempt_at(RateLimitAction::Login, "ivy", now)
            .await;
        let second = rl
            .record_failed_attempt_at(RateLimitAction::Login, "ivy", now)
            .await;
        assert!(second.blocked);
        assert_eq!(second.blocked_until, Some(now + Duration::minutes(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_runs_on_interval() {
        let rl = Arc::new(limiter());
        let long_ago = Utc::now() - Duration::hours(3);
        rl.record_failed_attempt_at(RateLimitAction::Login, "stale", long_ago)
            .await;

        let handle = spawn_sweeper(rl.clone(), std::time::Duration::from_secs(300));
        tokio::time::sleep(std::time::Duration::from_secs(301)).await;
        tokio::task::yield_now().await;

        assert_eq!(rl.stats().await.total_entries, 0);
        handle.abort();
    }
}
