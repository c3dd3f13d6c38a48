//! Shared application state.

use std::sync::Arc;

use clinic_auth::{AuthConfig, AuthService, RateLimiter};
use clinic_db::repository::{
    SurrealAuditLogRepository, SurrealPatientRepository, SurrealSessionRepository,
    SurrealTenantRepository, SurrealUserRepository, SurrealUserSettingsRepository,
    SurrealUserTenantLinkRepository,
};
use clinic_tenancy::{PatientService, TenantService};
use surrealdb::{Connection, Surreal};

pub type Auth<C> =
    AuthService<SurrealUserRepository<C>, SurrealSessionRepository<C>, SurrealTenantRepository<C>>;

pub type Tenants<C> = TenantService<
    SurrealTenantRepository<C>,
    SurrealUserRepository<C>,
    SurrealUserTenantLinkRepository<C>,
    SurrealUserSettingsRepository<C>,
>;

pub type Patients<C> = PatientService<
    SurrealPatientRepository<C>,
    SurrealTenantRepository<C>,
    SurrealAuditLogRepository<C>,
>;

pub struct AppState<C: Connection> {
    pub auth: Arc<Auth<C>>,
    pub tenants: Arc<Tenants<C>>,
    pub patients: Arc<Patients<C>>,
    pub limiter: Arc<RateLimiter>,
}

impl<C: Connection> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            tenants: Arc::clone(&self.tenants),
            patients: Arc::clone(&self.patients),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<C: Connection> AppState<C> {
    /// Wire every service to the same database handle.
    pub fn new(db: Surreal<C>, auth_config: AuthConfig) -> Self {
        let limiter = Arc::new(RateLimiter::in_memory(auth_config.rate_limit.clone()));
        let pepper = auth_config.pepper.clone();
        let users = || match &pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
            None => SurrealUserRepository::new(db.clone()),
        };

        let tenants = TenantService::new(
            SurrealTenantRepository::new(db.clone()),
            users(),
            SurrealUserTenantLinkRepository::new(db.clone()),
            SurrealUserSettingsRepository::new(db.clone()),
        );
        let patients = PatientService::new(
            SurrealPatientRepository::new(db.clone()),
            SurrealTenantRepository::new(db.clone()),
            SurrealAuditLogRepository::new(db.clone()),
        );
        let auth = AuthService::new(
            users(),
            SurrealSessionRepository::new(db.clone()),
            SurrealTenantRepository::new(db.clone()),
            Arc::clone(&limiter),
            auth_config,
        );

        Self {
            auth: Arc::new(auth),
            tenants: Arc::new(tenants),
            patients: Arc::new(patients),
            limiter,
        }
    }
}
