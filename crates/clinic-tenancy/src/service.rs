//! Tenant membership, active-tenant selection and context resolution.

use chrono::Utc;
use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::models::tenant::{CreateTenant, Tenant, TenantStatus};
use clinic_core::models::tenant_link::{CreateUserTenantLink, UserTenantLink};
use clinic_core::repository::{
    TenantRepository, UserRepository, UserSettingsRepository, UserTenantLinkRepository,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{RequestContext, TenantContext};

/// A tenant the user may act as.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableTenant {
    pub tenant: Tenant,
    pub is_primary: bool,
}

pub struct TenantService<T, U, L, S>
where
    T: TenantRepository,
    U: UserRepository,
    L: UserTenantLinkRepository,
    S: UserSettingsRepository,
{
    tenant_repo: T,
    user_repo: U,
    link_repo: L,
    settings_repo: S,
}

impl<T, U, L, S> TenantService<T, U, L, S>
where
    T: TenantRepository,
    U: UserRepository,
    L: UserTenantLinkRepository,
    S: UserSettingsRepository,
{
    pub fn new(tenant_repo: T, user_repo: U, link_repo: L, settings_repo: S) -> Self {
        Self {
            tenant_repo,
            user_repo,
            link_repo,
            settings_repo,
        }
    }

    /// The user's primary tenant first, then every tenant reachable
    /// through a link that is active right now. No duplicates.
    pub async fn get_user_tenants(&self, user_id: Uuid) -> ClinicResult<Vec<AvailableTenant>> {
        let user = self.user_repo.get_identity(user_id).await?;
        let primary = self.tenant_repo.get_by_id(user.tenant_id).await?;

        let mut available = vec![AvailableTenant {
            tenant: primary,
            is_primary: true,
        }];

        let now = Utc::now();
        let links = self.link_repo.list_for_user(user_id).await?;
        for link in links.iter().filter(|l| l.is_active_at(now)) {
            if available.iter().any(|a| a.tenant.id == link.tenant_id) {
                continue;
            }
            match self.tenant_repo.get_by_id(link.tenant_id).await {
                Ok(tenant) => available.push(AvailableTenant {
                    tenant,
                    is_primary: false,
                }),
                Err(ClinicError::NotFound { .. }) => {
                    warn!(user_id = %user_id, tenant_id = %link.tenant_id, "Link points at a missing tenant");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(available)
    }

    /// Persist `tenant_id` as the user's active tenant. Calling it again
    /// with the same tenant is a no-op in effect.
    pub async fn set_active_tenant(&self, user_id: Uuid, tenant_id: Uuid) -> ClinicResult<Tenant> {
        let available = self.get_user_tenants(user_id).await?;
        let Some(chosen) = available.into_iter().find(|a| a.tenant.id == tenant_id) else {
            warn!(user_id = %user_id, tenant_id = %tenant_id, "Denied switch to unauthorized tenant");
            return Err(ClinicError::forbidden("no access to the requested tenant"));
        };

        self.settings_repo
            .set_active_tenant(user_id, tenant_id)
            .await?;
        info!(user_id = %user_id, tenant_id = %tenant_id, "Active tenant changed");
        Ok(chosen.tenant)
    }

    /// The persisted selection while it is still authorized, otherwise
    /// the primary tenant.
    pub async fn get_active_tenant(&self, user_id: Uuid) -> ClinicResult<Tenant> {
        let mut available = self.get_user_tenants(user_id).await?;

        if let Some(selected) = self.settings_repo.get_active_tenant(user_id).await? {
            if let Some(pos) = available.iter().position(|a| a.tenant.id == selected) {
                return Ok(available.swap_remove(pos).tenant);
            }
            debug!(user_id = %user_id, tenant_id = %selected, "Stale active tenant, using primary");
        }

        // The primary tenant is always first.
        Ok(available.swap_remove(0).tenant)
    }

    /// Build the context for a request by `user_id`. Fails with
    /// `Forbidden` when the active tenant is not operational.
    pub async fn resolve_context(
        &self,
        user_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> ClinicResult<RequestContext> {
        let tenant = self.get_active_tenant(user_id).await?;
        match tenant.status {
            TenantStatus::Active => {}
            TenantStatus::Suspended => {
                warn!(user_id = %user_id, tenant_id = %tenant.id, "Request against suspended tenant");
                return Err(ClinicError::forbidden("tenant is suspended"));
            }
            TenantStatus::Inactive => {
                warn!(user_id = %user_id, tenant_id = %tenant.id, "Request against inactive tenant");
                return Err(ClinicError::forbidden("tenant is inactive"));
            }
        }

        Ok(RequestContext::new(user_id, TenantContext::from(&tenant))
            .with_client(ip_address, user_agent))
    }

    pub async fn validate_tenant_access(&self, user_id: Uuid, tenant_id: Uuid) -> ClinicResult<()> {
        let available = self.get_user_tenants(user_id).await?;
        if available.iter().any(|a| a.tenant.id == tenant_id) {
            Ok(())
        } else {
            Err(ClinicError::forbidden("no access to the requested tenant"))
        }
    }

    pub async fn create_tenant(&self, input: CreateTenant) -> ClinicResult<Tenant> {
        if input.slug.trim().is_empty() || input.name.trim().is_empty() {
            return Err(ClinicError::Validation {
                message: "tenant name and slug are required".into(),
            });
        }
        let tenant = self.tenant_repo.create(input).await?;
        info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant created");
        Ok(tenant)
    }

    /// Give a user access to a tenant other than their primary one.
    pub async fn grant_link(&self, input: CreateUserTenantLink) -> ClinicResult<UserTenantLink> {
        let user = self.user_repo.get_identity(input.user_id).await?;
        if user.tenant_id == input.tenant_id {
            return Err(ClinicError::Validation {
                message: "user already belongs to this tenant".into(),
            });
        }
        if let (Some(from), Some(until)) = (input.valid_from, input.valid_until) {
            if until < from {
                return Err(ClinicError::Validation {
                    message: "valid_until precedes valid_from".into(),
                });
            }
        }
        self.tenant_repo.get_by_id(input.tenant_id).await?;

        let link = self.link_repo.create(input).await?;
        info!(user_id = %link.user_id, tenant_id = %link.tenant_id, "Tenant link granted");
        Ok(link)
    }

    /// Revoke the user's access to `tenant_id`. A persisted selection of
    /// that tenant falls back to the primary on the next lookup.
    pub async fn revoke_link(&self, user_id: Uuid, tenant_id: Uuid) -> ClinicResult<()> {
        self.link_repo.revoke(user_id, tenant_id).await?;
        info!(user_id = %user_id, tenant_id = %tenant_id, "Tenant link revoked");
        Ok(())
    }
}
