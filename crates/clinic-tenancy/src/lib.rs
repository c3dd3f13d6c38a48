//! Clinic Tenancy: tenant context resolution, active-tenant selection,
//! tenant-scoped patient access with plan quotas, auditing, and
//! cross-tenant patient authorizations.
//!
//! Tenant identity is always passed explicitly as a [`RequestContext`];
//! nothing in this crate reads an ambient "current tenant".

pub mod audit;
pub mod authorizations;
pub mod context;
pub mod patients;
pub mod service;

pub use audit::Auditor;
pub use authorizations::{AccessRequest, AuthorizationService};
pub use context::{RequestContext, TenantContext};
pub use patients::{PatientExport, PatientService};
pub use service::{AvailableTenant, TenantService};
