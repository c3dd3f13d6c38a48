//! Explicit tenant context carried through every scoped call.

use clinic_core::models::tenant::{Tenant, TenantPlan, TenantStatus};
use serde::Serialize;
use uuid::Uuid;

/// Snapshot of the tenant a request acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub slug: String,
    pub name: String,
    pub plan: TenantPlan,
    pub status: TenantStatus,
    pub max_users: u32,
    pub max_patients: u32,
}

impl From<&Tenant> for TenantContext {
    fn from(tenant: &Tenant) -> Self {
        Self {
            tenant_id: tenant.id,
            slug: tenant.slug.clone(),
            name: tenant.name.clone(),
            plan: tenant.plan,
            status: tenant.status,
            max_users: tenant.max_users,
            max_patients: tenant.max_patients,
        }
    }
}

/// Who is acting, as which tenant, from where.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub tenant: TenantContext,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: Uuid, tenant: TenantContext) -> Self {
        Self {
            user_id,
            tenant,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant.tenant_id
    }
}
