//! Authentication service: login, registration and logout, guarded by
//! the failed-attempt rate limiter.

use std::sync::Arc;

use chrono::{Duration, Utc};
use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::models::session::OpenSession;
use clinic_core::models::tenant::QuotaResource;
use clinic_core::models::user::{CreateUser, User, UserStatus};
use clinic_core::repository::{SessionRepository, TenantRepository, UserRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::rate_limit::{
    MemoryRateLimitStore, RateLimitAction, RateLimitStats, RateLimitStatus, RateLimitStore,
    RateLimiter,
};
use crate::token::{self, ValidatedClaims};

/// Input for the login flow. The tenant is not part of the input: a user
/// always signs into their primary tenant and switches afterwards.
#[derive(Debug)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LoginOutput {
    pub access_token: String,
    /// Raw opaque token; only its hash is stored.
    pub refresh_token: String,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Exchange of a refresh token for a new token pair. `tenant_id` is the
/// one returned at login.
#[derive(Debug)]
pub struct RefreshInput {
    pub tenant_id: Uuid,
    pub refresh_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct RegisterInput {
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
}

fn rate_limited(status: RateLimitStatus) -> ClinicError {
    AuthError::RateLimited {
        message: status.message,
        blocked_until: status.blocked_until,
    }
    .into()
}

fn normalize(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer has no
/// dependency on the database crate.
pub struct AuthService<U, S, T, R = MemoryRateLimitStore>
where
    U: UserRepository,
    S: SessionRepository,
    T: TenantRepository,
    R: RateLimitStore,
{
    user_repo: U,
    session_repo: S,
    tenant_repo: T,
    limiter: Arc<RateLimiter<R>>,
    config: AuthConfig,
}

impl<U, S, T, R> AuthService<U, S, T, R>
where
    U: UserRepository,
    S: SessionRepository,
    T: TenantRepository,
    R: RateLimitStore,
{
    pub fn new(
        user_repo: U,
        session_repo: S,
        tenant_repo: T,
        limiter: Arc<RateLimiter<R>>,
        config: AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            tenant_repo,
            limiter,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter<R>> {
        &self.limiter
    }

    /// Fail with `RateLimited` if any identifier is currently blocked.
    async fn ensure_not_blocked(
        &self,
        action: RateLimitAction,
        identifiers: &[String],
    ) -> ClinicResult<()> {
        for identifier in identifiers {
            let status = self.limiter.is_rate_limited(action, identifier).await;
            if status.blocked {
                warn!(action = %action, identifier = %identifier, "Blocked identifier rejected");
                return Err(rate_limited(status));
            }
        }
        Ok(())
    }

    /// Record a failure on every identifier. Returns the blocking status
    /// if one of them just crossed the ceiling.
    async fn record_failure(
        &self,
        action: RateLimitAction,
        identifiers: &[String],
    ) -> Option<RateLimitStatus> {
        let mut blocked = None;
        for identifier in identifiers {
            let status = self.limiter.record_failed_attempt(action, identifier).await;
            if status.blocked && blocked.is_none() {
                blocked = Some(status);
            }
        }
        blocked
    }

    async fn fail_login(&self, identifiers: &[String]) -> ClinicError {
        match self.record_failure(RateLimitAction::Login, identifiers).await {
            Some(status) => rate_limited(status),
            None => AuthError::InvalidCredentials.into(),
        }
    }

    /// Authenticate with username/email + password and open a session in
    /// the user's primary tenant.
    ///
    /// Both the login name and the client IP are rate limited.
    pub async fn login(&self, input: LoginInput) -> ClinicResult<LoginOutput> {
        let mut identifiers = vec![normalize(&input.username_or_email)];
        if let Some(ip) = &input.ip_address {
            identifiers.push(ip.clone());
        }

        self.ensure_not_blocked(RateLimitAction::Login, &identifiers)
            .await?;

        let user = match self.user_repo.find_for_login(&input.username_or_email).await {
            Ok(user) => user,
            Err(ClinicError::NotFound { .. }) => return Err(self.fail_login(&identifiers).await),
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            warn!(user_id = %user.id, "Login failed: bad password");
            return Err(self.fail_login(&identifiers).await);
        }

        ensure_active(&user)?;

        for identifier in &identifiers {
            self.limiter
                .clear_rate_limit(RateLimitAction::Login, identifier)
                .await;
        }

        let output = self
            .open_session(&user, input.ip_address, input.user_agent)
            .await?;
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "User logged in");
        Ok(output)
    }

    /// Rotate a refresh token: the presented token's session is closed and
    /// a new session with a new token pair replaces it.
    pub async fn refresh(&self, input: RefreshInput) -> ClinicResult<LoginOutput> {
        let digest = token::refresh_digest(&input.refresh_token);
        let session = match self
            .session_repo
            .find_by_refresh_digest(input.tenant_id, &digest)
            .await
        {
            Ok(session) => session,
            Err(ClinicError::NotFound { .. }) => {
                return Err(AuthError::TokenInvalid("unknown refresh token".into()).into());
            }
            Err(e) => return Err(e),
        };

        // Single use, even when it turns out to be expired.
        self.session_repo
            .invalidate(session.tenant_id, session.id)
            .await?;
        if session.is_expired_at(Utc::now()) {
            return Err(AuthError::TokenExpired.into());
        }

        let user = match self
            .user_repo
            .get_by_id(session.tenant_id, session.user_id)
            .await
        {
            Ok(user) => user,
            Err(ClinicError::NotFound { .. }) => return Err(AuthError::AccountInactive.into()),
            Err(e) => return Err(e),
        };
        ensure_active(&user)?;

        let output = self
            .open_session(&user, input.ip_address, input.user_agent)
            .await?;
        info!(
            user_id = %user.id,
            replaced = %session.id,
            session_id = %output.session_id,
            "Session refreshed"
        );
        Ok(output)
    }

    /// Store a new session for `user` and issue its token pair. Expired
    /// sessions of the tenant are purged first.
    async fn open_session(
        &self,
        user: &User,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> ClinicResult<LoginOutput> {
        let now = Utc::now();
        match self.session_repo.purge_expired(user.tenant_id, now).await {
            Ok(0) => {}
            Ok(purged) => debug!(tenant_id = %user.tenant_id, purged, "Purged expired sessions"),
            Err(e) => warn!(tenant_id = %user.tenant_id, error = %e, "Session purge failed"),
        }

        let raw_refresh = token::generate_refresh_token();
        let session = self
            .session_repo
            .create(OpenSession {
                tenant_id: user.tenant_id,
                user_id: user.id,
                refresh_digest: token::refresh_digest(&raw_refresh),
                ip_address,
                user_agent,
                expires_at: now + Duration::seconds(self.config.session_lifetime_secs as i64),
            })
            .await?;

        let access_token =
            token::issue_access_token(user.id, user.tenant_id, session.id, &self.config)?;

        Ok(LoginOutput {
            access_token,
            refresh_token: raw_refresh,
            session_id: session.id,
            user_id: user.id,
            tenant_id: user.tenant_id,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    /// Create a user in `input.tenant_id`, subject to the registration
    /// rate limit (per IP, or per email without one) and the tenant's
    /// user quota.
    pub async fn register(&self, input: RegisterInput) -> ClinicResult<User> {
        let identifiers = vec![
            input
                .ip_address
                .clone()
                .unwrap_or_else(|| normalize(&input.email)),
        ];

        self.ensure_not_blocked(RateLimitAction::Registration, &identifiers)
            .await?;

        if let Err(e) = password::check_policy(&input.password, self.config.min_password_length)
        {
            self.record_failure(RateLimitAction::Registration, &identifiers)
                .await;
            return Err(e.into());
        }

        for taken in [&input.username, &input.email] {
            match self.user_repo.find_for_login(taken).await {
                Ok(_) => {
                    self.record_failure(RateLimitAction::Registration, &identifiers)
                        .await;
                    return Err(ClinicError::AlreadyExists {
                        entity: "user".into(),
                    });
                }
                Err(ClinicError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let tenant = self.tenant_repo.get_by_id(input.tenant_id).await?;
        let current = self.user_repo.count(tenant.id).await?;
        tenant.ensure_capacity(QuotaResource::Users, current)?;

        let user = self
            .user_repo
            .create(CreateUser {
                tenant_id: tenant.id,
                username: input.username,
                email: input.email,
                password: input.password,
                metadata: None,
            })
            .await?;

        info!(user_id = %user.id, tenant_id = %tenant.id, "User registered");
        Ok(user)
    }

    /// Gate a two-factor verification.
    ///
    /// `code_valid` is the verdict of the caller's code check. Invalid
    /// codes count towards the two-factor limit; a valid one clears it.
    pub async fn verify_two_factor_attempt(
        &self,
        identifier: &str,
        code_valid: bool,
    ) -> ClinicResult<()> {
        let identifiers = [normalize(identifier)];
        self.ensure_not_blocked(RateLimitAction::TwoFactor, &identifiers)
            .await?;

        if code_valid {
            self.limiter
                .clear_rate_limit(RateLimitAction::TwoFactor, &identifiers[0])
                .await;
            return Ok(());
        }

        match self
            .record_failure(RateLimitAction::TwoFactor, &identifiers)
            .await
        {
            Some(status) => Err(rate_limited(status)),
            None => Err(AuthError::InvalidCredentials.into()),
        }
    }

    /// Count a password-reset request against its limit. Every request
    /// counts, successful or not.
    pub async fn record_password_reset_attempt(
        &self,
        identifier: &str,
    ) -> ClinicResult<RateLimitStatus> {
        let identifier = normalize(identifier);
        self.ensure_not_blocked(RateLimitAction::PasswordReset, std::slice::from_ref(&identifier))
            .await?;
        Ok(self
            .limiter
            .record_failed_attempt(RateLimitAction::PasswordReset, &identifier)
            .await)
    }

    pub async fn logout(&self, tenant_id: Uuid, session_id: Uuid) -> ClinicResult<()> {
        self.session_repo.invalidate(tenant_id, session_id).await?;
        info!(tenant_id = %tenant_id, session_id = %session_id, "Session closed");
        Ok(())
    }

    pub fn validate_access_token(&self, token: &str) -> ClinicResult<ValidatedClaims> {
        Ok(token::validate_access_token(token, &self.config)?)
    }

    pub async fn rate_limit_stats(&self) -> RateLimitStats {
        self.limiter.stats().await
    }
}

fn ensure_active(user: &User) -> Result<(), AuthError> {
    match user.status {
        UserStatus::Active => Ok(()),
        UserStatus::Locked => Err(AuthError::AccountLocked),
        UserStatus::Inactive => Err(AuthError::AccountInactive),
        UserStatus::PendingVerification => Err(AuthError::AccountPendingVerification),
    }
}
